//! 値アクセサの共通操作
//!
//! フレームウォーカーとデコーダーが共有する、`ValueAccessor` を組み合わせた操作です。

use crate::{Result, TargetError, ValueAccessor};
use tracing::trace;

/// `ValueAccessor` の拡張操作
pub trait ValueAccessorExt: ValueAccessor {
    /// 候補の綴りを順に試し、最初に見つかったフィールドを読む
    ///
    /// フィールドが存在しない場合だけ次の候補に進み、それ以外のエラーは
    /// そのまま返します。すべての候補がなければ最後の `FieldNotFound`。
    fn read_first_field(&self, value: &Self::Value, names: &[&str]) -> Result<Self::Value> {
        let mut last_err = None;
        for name in names {
            match self.read_field(value, name) {
                Ok(field) => return Ok(field),
                Err(e) if e.is_field_not_found() => {
                    trace!(field = %name, "field spelling not present, trying next");
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| TargetError::FieldNotFound {
            type_name: self.type_name(&self.type_of(value)),
            field: String::new(),
        }))
    }

    /// `void **` 型
    fn void_pointer_pointer(&self) -> Result<Self::Type> {
        let void = self.lookup_type("void")?;
        Ok(self.pointer_to(&self.pointer_to(&void)))
    }

    /// 値を `ty *` として再解釈し、参照先を返す
    fn deref_as(&self, value: &Self::Value, ty: &Self::Type) -> Result<Self::Value> {
        let pointer = self.cast_as(value, &self.pointer_to(ty))?;
        self.dereference(&pointer)
    }

    /// アドレスを `ty *` として再解釈し、参照先を返す
    fn value_at(&self, address: u64, ty: &Self::Type) -> Result<Self::Value> {
        self.deref_as(&self.integer(address), ty)
    }

    /// ポインタがヌルかどうか
    fn is_null(&self, pointer: &Self::Value) -> Result<bool> {
        Ok(self.read_u64(pointer)? == 0)
    }
}

impl<A: ValueAccessor + ?Sized> ValueAccessorExt for A {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryImage, SnapshotTarget, SnapshotType, SnapshotValue, StructLayout, TypeTable};

    fn handle_target(field: &str) -> (SnapshotTarget, SnapshotValue) {
        let mut memory = MemoryImage::new();
        memory.map_zeroed(0x2000, 0x40);
        memory.store(0x2000, 0x2010u64).unwrap();
        memory.store(0x2010, 0x4242u64).unwrap();

        let mut types = TypeTable::new();
        types.add_struct(
            StructLayout::new("std::coroutine_handle<void>", 8)
                .field(field, 0, SnapshotType::Void.pointer()),
        );

        let target = SnapshotTarget::new(memory, types);
        let handle = SnapshotValue::at(0x2000, SnapshotType::named("std::coroutine_handle<void>"));
        (target, handle)
    }

    #[test]
    fn test_read_first_field_either_spelling() {
        for spelling in ["__handle_", "_M_fr_ptr"] {
            let (target, handle) = handle_target(spelling);
            let field = target
                .read_first_field(&handle, &["__handle_", "_M_fr_ptr"])
                .unwrap();
            assert_eq!(target.read_u64(&field).unwrap(), 0x2010);
        }
    }

    #[test]
    fn test_read_first_field_none_present() {
        let (target, handle) = handle_target("ptr_");
        let err = target
            .read_first_field(&handle, &["__handle_", "_M_fr_ptr"])
            .unwrap_err();
        assert_eq!(
            err,
            TargetError::FieldNotFound {
                type_name: "std::coroutine_handle<void>".to_string(),
                field: "_M_fr_ptr".to_string(),
            }
        );
    }

    #[test]
    fn test_void_pointer_pointer_deref() {
        let (target, handle) = handle_target("__handle_");
        let field = target.read_field(&handle, "__handle_").unwrap();
        let voidpp = target.void_pointer_pointer().unwrap();
        let data = target.cast_as(&field, &voidpp).unwrap();
        let first_word = target.dereference(&data).unwrap();
        assert_eq!(target.read_u64(&first_word).unwrap(), 0x4242);
    }
}
