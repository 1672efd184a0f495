//! 値の表示用プリンタ
//!
//! 型名のパターンとデコーダーの組を順序付きで保持し、表示する値の型に
//! 最初にマッチした組でデコードします。ホストの値表示機構から呼ばれる
//! 想定で、バックトレースコマンドとは独立しています。

use crate::any_executor::{TargetState, TypeErasedObject, TypeErasureDecoder};
use crate::io_executor::{ExecutorDecoder, ExecutorDescriptor};
use crate::{DecodeConfig, Result};
use coroscope_target::ValueAccessor;
use regex::Regex;
use tracing::debug;

/// 値をデコードする方法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderKind {
    /// 関数テーブルのシンボルから保持型を求める
    TypeErasure,
    /// `io_context` エグゼキュータのビットフィールド
    IoContextExecutor,
}

/// 登録されたプリンタ
#[derive(Debug, Clone)]
pub struct Printer {
    pub name: String,
    pub matcher: Regex,
    pub kind: DecoderKind,
}

/// 子要素
#[derive(Debug, Clone)]
pub enum Child<V> {
    /// ホストの値（さらにプリンタにかけられる）
    Value(V),
    Text(String),
}

/// プリンタの出力
#[derive(Debug, Clone)]
pub struct Printed<V> {
    /// 要約（なければホストの既定の表示）
    pub summary: Option<String>,
    pub children: Vec<(String, Child<V>)>,
}

impl<V> Printed<V> {
    fn from_type_erased(object: TypeErasedObject<V>) -> Self {
        let summary = match (&object.state, &object.target_type) {
            (TargetState::Empty, _) => format!("{} [no target]", object.static_type),
            (_, Some(target)) => format!("{} targeting {}", object.static_type, target),
            (_, None) => format!("{} [unknown target]", object.static_type),
        };
        let children = object
            .target_value
            .map(|value| vec![("[target]".to_string(), Child::Value(value))])
            .unwrap_or_default();
        Self {
            summary: Some(summary),
            children,
        }
    }

    fn from_executor(executor: ExecutorDescriptor<V>) -> Self {
        Self {
            summary: None,
            children: vec![
                ("io_context".to_string(), Child::Value(executor.context)),
                ("allocator".to_string(), Child::Value(executor.allocator)),
                ("blocking".to_string(), Child::Text(executor.blocking.to_string())),
                (
                    "relationship".to_string(),
                    Child::Text(executor.relationship.to_string()),
                ),
                (
                    "outstanding_work".to_string(),
                    Child::Text(executor.work_tracking.to_string()),
                ),
            ],
        }
    }
}

/// プリンタの登録表
#[derive(Debug, Clone)]
pub struct PrinterRegistry {
    printers: Vec<Printer>,
    type_erasure: TypeErasureDecoder,
    executor: ExecutorDecoder,
}

impl PrinterRegistry {
    /// 空の登録表を作成する
    pub fn new(config: DecodeConfig) -> Result<Self> {
        Ok(Self {
            printers: Vec::new(),
            type_erasure: TypeErasureDecoder::new(config)?,
            executor: ExecutorDecoder::new()?,
        })
    }

    /// asio のエグゼキュータ用のプリンタを登録した表を作成する
    pub fn asio(config: DecodeConfig) -> Result<Self> {
        let mut registry = Self::new(config)?;
        registry
            .add(
                "any_executor",
                r"^(boost::)*asio::execution::any_executor<.*$",
                DecoderKind::TypeErasure,
            )?
            .add(
                "any_completion_executor",
                r"^(boost::)*asio::any_completion_executor$",
                DecoderKind::TypeErasure,
            )?
            .add(
                "any_io_executor",
                r"^(boost::)*asio::any_io_executor$",
                DecoderKind::TypeErasure,
            )?
            .add(
                "io_context executor",
                r"^(boost::)*asio::io_context::basic_executor_type<.*$",
                DecoderKind::IoContextExecutor,
            )?;
        Ok(registry)
    }

    /// プリンタを末尾に追加する
    pub fn add(&mut self, name: &str, pattern: &str, kind: DecoderKind) -> Result<&mut Self> {
        self.printers.push(Printer {
            name: name.to_string(),
            matcher: Regex::new(pattern)?,
            kind,
        });
        Ok(self)
    }

    /// 登録順のプリンタ
    pub fn printers(&self) -> &[Printer] {
        &self.printers
    }

    /// 型名に最初にマッチするプリンタ
    pub fn lookup(&self, type_name: &str) -> Option<&Printer> {
        self.printers.iter().find(|p| p.matcher.is_match(type_name))
    }

    /// 型消去デコーダー
    pub fn type_erasure(&self) -> &TypeErasureDecoder {
        &self.type_erasure
    }

    /// 値を表示用にデコードする
    ///
    /// マッチするプリンタがなければ None。デコードに失敗した場合も None を返し、
    /// ホストの既定の表示に任せます。
    pub fn print<H: ValueAccessor>(&self, host: &H, value: &H::Value) -> Option<Printed<H::Value>> {
        let type_name = host.type_name(&host.type_of(value));
        let printer = self.lookup(&type_name)?;

        match printer.kind {
            DecoderKind::TypeErasure => Some(Printed::from_type_erased(
                self.type_erasure.decode(host, value),
            )),
            DecoderKind::IoContextExecutor => match self.executor.decode(host, value) {
                Ok(executor) => Some(Printed::from_executor(executor)),
                Err(e) => {
                    debug!(printer = %printer.name, error = %e, "executor decode failed");
                    None
                }
            },
        }
    }

    /// 値をプリンタで再帰的に展開し、インデント付きの行にする
    ///
    /// `[target]` の値がさらにラッパーであればそれも展開します。
    pub fn render<H: ValueAccessor>(&self, host: &H, label: &str, value: &H::Value, max_depth: usize) -> Vec<String> {
        let mut lines = Vec::new();
        self.render_into(host, label, value, 0, max_depth, &mut lines);
        lines
    }

    fn render_into<H: ValueAccessor>(
        &self,
        host: &H,
        label: &str,
        value: &H::Value,
        depth: usize,
        max_depth: usize,
        lines: &mut Vec<String>,
    ) {
        let indent = "  ".repeat(depth);
        let printed = if depth < max_depth {
            self.print(host, value)
        } else {
            None
        };

        let printed = match printed {
            Some(printed) => printed,
            None => {
                lines.push(format!("{}{} = {}", indent, label, describe(host, value)));
                return;
            }
        };

        let summary = printed
            .summary
            .unwrap_or_else(|| host.type_name(&host.type_of(value)));
        lines.push(format!("{}{} = {}", indent, label, summary));
        for (name, child) in printed.children {
            match child {
                Child::Value(child) => {
                    self.render_into(host, &name, &child, depth + 1, max_depth, lines)
                }
                Child::Text(text) => lines.push(format!("{}  {} = {}", indent, name, text)),
            }
        }
    }
}

/// プリンタを持たない値の既定の表示
fn describe<H: ValueAccessor>(host: &H, value: &H::Value) -> String {
    let type_name = host.type_name(&host.type_of(value));
    if let Ok(raw) = host.read_u64(value) {
        return format!("({}) 0x{:x}", type_name, raw);
    }
    match host.address_of(value) {
        Ok(address) => format!("{} @ 0x{:x}", type_name, address),
        Err(_) => type_name,
    }
}
