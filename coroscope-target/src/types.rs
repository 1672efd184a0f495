//! スナップショットの型モデル

use crate::{Result, TargetError, TemplateArgument};
use std::collections::HashMap;

/// ポインタのサイズ（バイト）
pub const POINTER_SIZE: u64 = 8;

/// スナップショット内の型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotType {
    Void,
    /// 整数型
    Integer { name: String, size: u64 },
    /// ポインタ型
    Pointer(Box<SnapshotType>),
    /// 型テーブルに登録された構造体（名前で参照）
    Named(String),
}

impl SnapshotType {
    /// 符号なし64ビット整数
    pub fn u64() -> Self {
        SnapshotType::Integer {
            name: "unsigned long".to_string(),
            size: 8,
        }
    }

    /// 構造体への参照
    pub fn named(name: impl Into<String>) -> Self {
        SnapshotType::Named(name.into())
    }

    /// この型へのポインタ
    pub fn pointer(self) -> Self {
        SnapshotType::Pointer(Box::new(self))
    }

    /// 参照先の型（ポインタでなければNone）
    pub fn pointee(&self) -> Option<&SnapshotType> {
        match self {
            SnapshotType::Pointer(inner) => Some(inner),
            _ => None,
        }
    }
}

/// 構造体のフィールド
#[derive(Debug, Clone)]
pub struct FieldLayout {
    pub name: String,
    /// 構造体先頭からのオフセット（バイト）
    pub offset: u64,
    pub ty: SnapshotType,
}

/// 構造体のレイアウト
#[derive(Debug, Clone)]
pub struct StructLayout {
    pub name: String,
    pub size: u64,
    pub fields: Vec<FieldLayout>,
    pub template_args: Vec<TemplateArgument<SnapshotType>>,
}

impl StructLayout {
    /// 空の構造体レイアウトを作成する
    pub fn new(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            size,
            fields: Vec::new(),
            template_args: Vec::new(),
        }
    }

    /// フィールドを追加する
    pub fn field(mut self, name: impl Into<String>, offset: u64, ty: SnapshotType) -> Self {
        self.fields.push(FieldLayout {
            name: name.into(),
            offset,
            ty,
        });
        self
    }

    /// テンプレート引数を追加する
    pub fn template_arg(mut self, arg: TemplateArgument<SnapshotType>) -> Self {
        self.template_args.push(arg);
        self
    }

    /// 名前でフィールドを検索する
    pub fn find_field(&self, name: &str) -> Option<&FieldLayout> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// 型テーブル
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    structs: HashMap<String, StructLayout>,
    /// typedef名 -> 元の型名
    typedefs: HashMap<String, String>,
}

impl TypeTable {
    /// 空の型テーブルを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 構造体を登録する
    pub fn add_struct(&mut self, layout: StructLayout) -> &mut Self {
        self.structs.insert(layout.name.clone(), layout);
        self
    }

    /// typedefを登録する
    pub fn add_typedef(&mut self, alias: impl Into<String>, target: impl Into<String>) -> &mut Self {
        self.typedefs.insert(alias.into(), target.into());
        self
    }

    /// typedefを辿って実体の名前にする
    pub fn strip_typedefs<'a>(&'a self, mut name: &'a str) -> &'a str {
        // 循環したtypedefで止まらないよう回数を制限する
        for _ in 0..self.typedefs.len() {
            match self.typedefs.get(name) {
                Some(target) => name = target.as_str(),
                None => break,
            }
        }
        name
    }

    /// 構造体レイアウトを取得する
    pub fn layout(&self, name: &str) -> Option<&StructLayout> {
        self.structs.get(self.strip_typedefs(name))
    }

    /// 型名から型を検索する
    pub fn lookup(&self, name: &str) -> Result<SnapshotType> {
        let name = self.strip_typedefs(name.trim());
        match name {
            "void" => Ok(SnapshotType::Void),
            "unsigned long" | "unsigned long long" | "std::size_t" | "std::uintptr_t" => {
                Ok(SnapshotType::Integer {
                    name: name.to_string(),
                    size: 8,
                })
            }
            "unsigned int" | "int" => Ok(SnapshotType::Integer {
                name: name.to_string(),
                size: 4,
            }),
            _ if self.structs.contains_key(name) => Ok(SnapshotType::Named(name.to_string())),
            _ => Err(TargetError::UnknownType(name.to_string())),
        }
    }

    /// 型の表示名（typedefは除去済み）
    pub fn display_name(&self, ty: &SnapshotType) -> String {
        match ty {
            SnapshotType::Void => "void".to_string(),
            SnapshotType::Integer { name, .. } => name.clone(),
            SnapshotType::Pointer(inner) => format!("{} *", self.display_name(inner)),
            SnapshotType::Named(name) => self.strip_typedefs(name).to_string(),
        }
    }

    /// 型のサイズ（バイト）
    pub fn size_of(&self, ty: &SnapshotType) -> u64 {
        match ty {
            SnapshotType::Void => 1,
            SnapshotType::Integer { size, .. } => *size,
            SnapshotType::Pointer(_) => POINTER_SIZE,
            SnapshotType::Named(name) => self.layout(name).map_or(0, |l| l.size),
        }
    }
}
