//! スナップショットホスト
//!
//! 停止したプロセスのある時点の状態（メモリ・型・シンボル・物理スタック）を
//! メモリ上に保持し、`DebugInfoProvider` と `ValueAccessor` を実装します。
//! ライブのデバッガを持たない環境でもフレームウォーカーやデコーダーを
//! 動かせるようにするためのものです。

use crate::{
    DebugInfoProvider, MemoryImage, PhysicalFrame, Result, SnapshotType, SourceLocation,
    SymbolTable, Symbolizer, TargetError, TemplateArgument, TypeTable, ValueAccessor,
};
use regex::Regex;
use std::collections::HashMap;
use tracing::trace;

/// 値の置き場所
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Place {
    /// ターゲットメモリ上のアドレス
    Memory(u64),
    /// メモリを持たない即値
    Immediate(u64),
}

/// スナップショット内の値
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotValue {
    pub ty: SnapshotType,
    pub place: Place,
}

impl SnapshotValue {
    /// メモリ上の値
    pub fn at(address: u64, ty: SnapshotType) -> Self {
        Self {
            ty,
            place: Place::Memory(address),
        }
    }
}

/// 物理フレームとそのローカル変数
#[derive(Debug, Clone)]
struct FrameEntry {
    frame: PhysicalFrame,
    variables: HashMap<String, SnapshotValue>,
}

/// スナップショットホスト
pub struct SnapshotTarget<S: Symbolizer = SymbolTable> {
    memory: MemoryImage,
    types: TypeTable,
    symbolizer: S,
    /// 最内フレームが先頭
    frames: Vec<FrameEntry>,
}

impl SnapshotTarget<SymbolTable> {
    /// 空のシンボルテーブルでスナップショットを作成する
    pub fn new(memory: MemoryImage, types: TypeTable) -> Self {
        Self::with_symbolizer(memory, types, SymbolTable::new())
    }
}

impl<S: Symbolizer> SnapshotTarget<S> {
    /// シンボル解決器を指定してスナップショットを作成する
    pub fn with_symbolizer(memory: MemoryImage, types: TypeTable, symbolizer: S) -> Self {
        Self {
            memory,
            types,
            symbolizer,
            frames: Vec::new(),
        }
    }

    /// 物理フレームを外側に積む（最初に積んだものが最内フレーム）
    pub fn push_frame(
        &mut self,
        function_name: impl Into<String>,
        pc: u64,
        variables: impl IntoIterator<Item = (String, SnapshotValue)>,
    ) -> &mut Self {
        let level = self.frames.len();
        self.frames.push(FrameEntry {
            frame: PhysicalFrame {
                level,
                pc,
                function_name: function_name.into(),
            },
            variables: variables.into_iter().collect(),
        });
        self
    }

    /// メモリイメージ
    pub fn memory(&self) -> &MemoryImage {
        &self.memory
    }

    /// 型テーブル
    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    /// シンボル解決器
    pub fn symbolizer(&self) -> &S {
        &self.symbolizer
    }

    /// 物理スタック（最内フレームが先頭）
    pub fn physical_frames(&self) -> impl Iterator<Item = &PhysicalFrame> {
        self.frames.iter().map(|entry| &entry.frame)
    }

    /// 値のバイト列をu64として読む
    ///
    /// 1ワードより大きい整数は `TypeMismatch`。
    fn load_word(&self, value: &SnapshotValue) -> Result<u64> {
        let size = match &value.ty {
            SnapshotType::Integer { size, .. } if *size <= crate::POINTER_SIZE => *size,
            SnapshotType::Pointer(_) => crate::POINTER_SIZE,
            other => {
                return Err(TargetError::TypeMismatch {
                    expected: "word-sized integer or pointer",
                    found: self.types.display_name(other),
                })
            }
        };
        match value.place {
            Place::Immediate(raw) => Ok(truncate(raw, size)),
            Place::Memory(addr) => {
                let bytes = self.memory.read(addr, size as usize)?;
                let mut word = [0u8; 8];
                word[..bytes.len()].copy_from_slice(&bytes);
                Ok(u64::from_le_bytes(word))
            }
        }
    }
}

fn truncate(raw: u64, size: u64) -> u64 {
    if size >= 8 {
        raw
    } else {
        raw & ((1u64 << (size * 8)) - 1)
    }
}

impl<S: Symbolizer> DebugInfoProvider for SnapshotTarget<S> {
    fn resolve(&self, address: u64) -> Result<SourceLocation> {
        self.symbolizer.resolve(address)
    }

    fn find_matching_frame(&self, pattern: &Regex) -> Option<PhysicalFrame> {
        self.physical_frames()
            .find(|frame| pattern.is_match(&frame.function_name))
            .cloned()
    }
}

impl<S: Symbolizer> ValueAccessor for SnapshotTarget<S> {
    type Value = SnapshotValue;
    type Type = SnapshotType;

    fn frame_variable(&self, frame: &PhysicalFrame, name: &str) -> Result<SnapshotValue> {
        self.frames
            .get(frame.level)
            .and_then(|entry| entry.variables.get(name))
            .cloned()
            .ok_or_else(|| TargetError::NoSuchVariable(name.to_string()))
    }

    fn read_field(&self, value: &SnapshotValue, name: &str) -> Result<SnapshotValue> {
        let type_name = self.types.display_name(&value.ty);
        let field_not_found = || TargetError::FieldNotFound {
            type_name: type_name.clone(),
            field: name.to_string(),
        };

        let layout = match &value.ty {
            SnapshotType::Named(struct_name) => {
                self.types.layout(struct_name).ok_or_else(field_not_found)?
            }
            _ => return Err(field_not_found()),
        };
        let field = layout.find_field(name).ok_or_else(field_not_found)?;

        match value.place {
            Place::Memory(addr) => addr
                .checked_add(field.offset)
                .map(|field_addr| SnapshotValue::at(field_addr, field.ty.clone()))
                .ok_or(TargetError::InvalidAddress(addr)),
            Place::Immediate(_) => Err(TargetError::NotAddressable),
        }
    }

    fn cast_as(&self, value: &SnapshotValue, ty: &SnapshotType) -> Result<SnapshotValue> {
        trace!(
            from = %self.types.display_name(&value.ty),
            to = %self.types.display_name(ty),
            "reinterpret"
        );
        Ok(SnapshotValue {
            ty: ty.clone(),
            place: value.place,
        })
    }

    fn dereference(&self, pointer: &SnapshotValue) -> Result<SnapshotValue> {
        let pointee = pointer
            .ty
            .pointee()
            .ok_or_else(|| TargetError::TypeMismatch {
                expected: "pointer",
                found: self.types.display_name(&pointer.ty),
            })?
            .clone();
        let addr = self.load_word(pointer)?;

        // 参照先の先頭が読めなければ無効なポインタとみなす
        let probe = self.types.size_of(&pointee).clamp(1, crate::POINTER_SIZE);
        self.memory
            .read(addr, probe as usize)
            .map_err(|_| TargetError::InvalidAddress(addr))?;

        Ok(SnapshotValue::at(addr, pointee))
    }

    fn format_symbolic(&self, value: &SnapshotValue) -> Result<String> {
        let addr = self.load_word(value)?;
        Ok(match self.symbolizer.symbol_name(addr) {
            Some(name) => format!("<{}>", name),
            None => format!("0x{:x}", addr),
        })
    }

    fn read_u64(&self, value: &SnapshotValue) -> Result<u64> {
        self.load_word(value)
    }

    fn address_of(&self, value: &SnapshotValue) -> Result<u64> {
        match value.place {
            Place::Memory(addr) => Ok(addr),
            Place::Immediate(_) => Err(TargetError::NotAddressable),
        }
    }

    fn integer(&self, raw: u64) -> SnapshotValue {
        SnapshotValue {
            ty: SnapshotType::u64(),
            place: Place::Immediate(raw),
        }
    }

    fn type_of(&self, value: &SnapshotValue) -> SnapshotType {
        value.ty.clone()
    }

    fn type_name(&self, ty: &SnapshotType) -> String {
        self.types.display_name(ty)
    }

    fn lookup_type(&self, name: &str) -> Result<SnapshotType> {
        self.types.lookup(name)
    }

    fn pointer_to(&self, ty: &SnapshotType) -> SnapshotType {
        ty.clone().pointer()
    }

    fn template_argument(
        &self,
        ty: &SnapshotType,
        index: usize,
    ) -> Result<TemplateArgument<SnapshotType>> {
        let type_name = self.types.display_name(ty);
        let missing = || TargetError::NoTemplateArgument {
            type_name: type_name.clone(),
            index,
        };
        match ty {
            SnapshotType::Named(name) => self
                .types
                .layout(name)
                .and_then(|layout| layout.template_args.get(index))
                .cloned()
                .ok_or_else(missing),
            _ => Err(missing()),
        }
    }
}
