//! 拡張コマンドのエラー

use thiserror::Error;

/// ドライバのフレームが物理スタックにない場合のメッセージ
pub const MSG_NOT_IN_AWAITABLE: &str = "not in an awaitable";

/// 登録されたコマンドの実行エラー
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("'{command}' requires an argument: {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },

    #[error("no physical frame to evaluate in")]
    NoFrame,

    #[error("invalid expression '{0}'")]
    InvalidExpression(String),

    #[error(transparent)]
    Target(#[from] coroscope_target::TargetError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use coroscope_target::TargetError;

    #[test]
    fn test_messages() {
        assert_eq!(
            CommandError::UnknownCommand("frobnicate".to_string()).to_string(),
            "unknown command: frobnicate"
        );
        assert_eq!(
            CommandError::from(TargetError::InvalidAddress(0x10)).to_string(),
            "cannot access memory at address 0x10"
        );
    }
}
