//! 拡張の初期化とコマンド実行
//!
//! ホストのドライバは起動時に一度だけ `Extension::init` を呼び、コマンド表と
//! プリンタ表を構築します。読み込みだけで何かが登録されることはありません。

use crate::backtrace::render_backtrace;
use crate::command::{Command, CommandInfo, COMMANDS};
use crate::errors::CommandError;
use crate::expr_eval::{parse_expression, ExpressionEvaluator};
use crate::printers::PrinterRegistry;
use crate::{DecodeConfig, Result};
use coroscope_async::{AwaitableDetector, FrameWalker, WalkConfig, WalkOutcome};
use coroscope_target::{DebugInfoProvider, ValueAccessor};
use regex::Regex;
use tracing::debug;

/// 拡張の設定
#[derive(Debug, Clone)]
pub struct ExtensionConfig {
    pub walk: WalkConfig,
    pub decode: DecodeConfig,
    /// `print` でラッパーを展開する深さ
    pub print_depth: usize,
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            walk: WalkConfig::default(),
            decode: DecodeConfig::default(),
            print_depth: 4,
        }
    }
}

/// 初期化済みの拡張
pub struct Extension {
    config: ExtensionConfig,
    detector: AwaitableDetector,
    printers: PrinterRegistry,
    commands: &'static [CommandInfo],
    /// 任意の関数名にマッチする（最内フレームの検索用）
    any_frame: Regex,
}

impl Extension {
    /// コマンド表とプリンタ表を構築する
    pub fn init(config: ExtensionConfig) -> Result<Self> {
        let printers = PrinterRegistry::asio(config.decode.clone())?;
        debug!(
            commands = COMMANDS.len(),
            printers = printers.printers().len(),
            "extension initialised"
        );
        Ok(Self {
            detector: AwaitableDetector::new()?,
            printers,
            commands: COMMANDS,
            any_frame: Regex::new("")?,
            config,
        })
    }

    /// 登録済みのコマンド
    pub fn commands(&self) -> &'static [CommandInfo] {
        self.commands
    }

    /// 登録済みのプリンタ表
    pub fn printers(&self) -> &PrinterRegistry {
        &self.printers
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    /// 現在の論理スタックを再構築する
    pub fn backtrace<H>(&self, host: &H) -> WalkOutcome
    where
        H: DebugInfoProvider + ValueAccessor,
    {
        FrameWalker::new(host, self.detector.clone(), self.config.walk.clone()).walk()
    }

    /// コマンドを実行し、出力行を返す
    pub fn invoke<H>(&self, host: &H, line: &str) -> std::result::Result<Vec<String>, CommandError>
    where
        H: DebugInfoProvider + ValueAccessor,
    {
        let command = Command::parse(line).ok_or_else(|| self.reject(line))?;

        match command {
            Command::AwaitableBacktrace => Ok(render_backtrace(&self.backtrace(host))),
            Command::Print(expr) => self.print(host, &expr),
            Command::Printers => Ok(self
                .printers
                .printers()
                .iter()
                .map(|p| format!("  {:<24} {}", p.name, p.matcher.as_str()))
                .collect()),
            Command::Help => Ok(self
                .commands
                .iter()
                .map(|c| format!("  {:<16} - {}", c.usage, c.help))
                .collect()),
        }
    }

    fn print<H>(&self, host: &H, input: &str) -> std::result::Result<Vec<String>, CommandError>
    where
        H: DebugInfoProvider + ValueAccessor,
    {
        let expr = parse_expression(input)?;
        let frame = host
            .find_matching_frame(&self.any_frame)
            .ok_or(CommandError::NoFrame)?;
        let value = ExpressionEvaluator::new(host, &frame).evaluate(&expr)?;
        Ok(self
            .printers
            .render(host, input.trim(), &value, self.config.print_depth))
    }

    /// パースできなかった入力のエラー
    fn reject(&self, line: &str) -> CommandError {
        let head = line.split_whitespace().next().unwrap_or_default();
        match self.commands.iter().find(|c| c.name == head || c.aliases.contains(&head)) {
            Some(info) => CommandError::MissingArgument {
                command: info.name,
                argument: info.usage,
            },
            None => CommandError::UnknownCommand(head.to_string()),
        }
    }
}
