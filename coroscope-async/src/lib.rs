//! Coroscope コルーチン論理スタック
//!
//! このクレートは、C++20 コルーチン（asio の `awaitable<>`）の論理的な
//! 呼び出しチェーンを再構築する機能を提供します。物理スタックに現れる
//! ドライバのフレームから活性化レコードの `caller_` リンクを辿り、
//! await されているコルーチンごとに再開アドレスとソース位置を求めます。

pub mod detector;
pub mod logical_stack;
pub mod walker;

pub use detector::{AwaitableDetector, HANDLE_FIELD_NAMES};
pub use logical_stack::{LogicalStack, StackFrame, StopReason, WalkOutcome};
pub use walker::{FrameWalker, WalkConfig};

/// async機能の結果型
pub type Result<T> = anyhow::Result<T>;
