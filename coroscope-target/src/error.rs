//! ホスト操作のエラー型

use thiserror::Error;

/// ホスト（デバッグ環境）へのアクセスで発生するエラー
///
/// フィールド読み取り・キャスト・デリファレンス・アドレス解決のどれもが
/// 失敗しうるため、呼び出し側はこれを部分的な結果に変換して扱います。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    /// 構造体に指定名のフィールドが存在しない（ABIによる綴りの違いなど）
    #[error("no field named `{field}` in `{type_name}`")]
    FieldNotFound { type_name: String, field: String },

    /// メモリが読み取れない
    #[error("cannot access memory at address 0x{0:x}")]
    InvalidAddress(u64),

    /// アドレスに対応するデバッグ情報がない
    #[error("no debug info for address 0x{0:016x}")]
    ResolutionError(u64),

    /// バイナリ中に該当する型がない
    #[error("no type named `{0}`")]
    UnknownType(String),

    /// フレームに指定名の変数がない
    #[error("no variable named `{0}` in frame")]
    NoSuchVariable(String),

    /// アドレスを持たない値（即値）のアドレスを要求した
    #[error("value is not addressable")]
    NotAddressable,

    /// テンプレート引数が存在しない
    #[error("`{type_name}` has no template argument {index}")]
    NoTemplateArgument { type_name: String, index: usize },

    /// 操作に対して値の型が不適切
    #[error("expected {expected}, found `{found}`")]
    TypeMismatch { expected: &'static str, found: String },
}

impl TargetError {
    /// フィールド名の不一致によるエラーかどうか
    ///
    /// 別の綴りで読み直す価値があるのはこの場合だけです。
    pub fn is_field_not_found(&self) -> bool {
        matches!(self, TargetError::FieldNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = TargetError::InvalidAddress(0xdead);
        assert_eq!(err.to_string(), "cannot access memory at address 0xdead");

        let err = TargetError::ResolutionError(0x1000);
        assert_eq!(err.to_string(), "no debug info for address 0x0000000000001000");

        let err = TargetError::FieldNotFound {
            type_name: "std::coroutine_handle<void>".to_string(),
            field: "__handle_".to_string(),
        };
        assert!(err.is_field_not_found());
        assert!(!TargetError::NotAddressable.is_field_not_found());
    }
}
