//! awaitableフレームの検出
//!
//! コルーチンのドライバ（`awaitable_frame_base<...>::resume`）を物理スタックから
//! 見つけるためのパターンと、活性化レコードのフィールド名を保持します。

use crate::Result;
use regex::Regex;

/// コルーチンハンドルのフレームポインタフィールド名
///
/// libc++ は `__handle_`、libstdc++ は `_M_fr_ptr`。先に見つかったものを使う。
pub const HANDLE_FIELD_NAMES: [&str; 2] = ["__handle_", "_M_fr_ptr"];

/// awaitableフレーム検出器
#[derive(Debug, Clone)]
pub struct AwaitableDetector {
    /// ドライバの再開エントリポイントのパターン
    resume_pattern: Regex,
    /// 再開エントリポイントのレシーバ変数名
    receiver: String,
    /// 活性化レコードのコルーチンハンドルフィールド名
    coroutine_field: String,
    /// 活性化レコードの呼び出し元フィールド名
    caller_field: String,
    handle_fields: Vec<String>,
}

impl AwaitableDetector {
    /// asio の awaitable 用の検出器を作成する
    pub fn new() -> Result<Self> {
        let resume_pattern = Regex::new(r"^.*asio::detail::awaitable_frame_base<.*>::resume")?;

        Ok(Self {
            resume_pattern,
            receiver: "this".to_string(),
            coroutine_field: "coro_".to_string(),
            caller_field: "caller_".to_string(),
            handle_fields: HANDLE_FIELD_NAMES.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// 再開エントリポイントのパターンを差し替える
    pub fn with_resume_pattern(mut self, pattern: &str) -> Result<Self> {
        self.resume_pattern = Regex::new(pattern)?;
        Ok(self)
    }

    /// 関数名がドライバの再開エントリポイントかどうか
    pub fn is_resume_entry(&self, function_name: &str) -> bool {
        self.resume_pattern.is_match(function_name)
    }

    pub fn resume_pattern(&self) -> &Regex {
        &self.resume_pattern
    }

    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    pub fn coroutine_field(&self) -> &str {
        &self.coroutine_field
    }

    pub fn caller_field(&self) -> &str {
        &self.caller_field
    }

    /// ハンドルフィールドの候補（試す順）
    pub fn handle_fields(&self) -> Vec<&str> {
        self.handle_fields.iter().map(String::as_str).collect()
    }
}
