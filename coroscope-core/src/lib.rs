//! Coroscope コア機能
//!
//! このクレートは、型消去されたエグゼキュータのデコーダーと、それらを
//! 値の表示に使うプリンタ表、論理スタックを表示するコマンドを提供します。
//! ホストは `Extension::init` を一度呼んでから `Extension::invoke` で
//! コマンドを実行します。

pub mod any_executor;
pub mod backtrace;
pub mod command;
pub mod errors;
pub mod expr_eval;
pub mod extension;
pub mod io_executor;
pub mod parse;
pub mod printers;

pub use any_executor::{DecodeConfig, TargetState, TypeErasedObject, TypeErasureDecoder};
pub use backtrace::render_backtrace;
pub use command::{Command, CommandInfo};
pub use errors::CommandError;
pub use extension::{Extension, ExtensionConfig};
pub use io_executor::{
    Blocking, ExecutorDecoder, ExecutorDescriptor, ExecutorFlags, Relationship, WorkTracking,
};
pub use printers::{Child, DecoderKind, Printed, Printer, PrinterRegistry};

// 他のクレートから使用するために再エクスポート
pub use coroscope_async::{StackFrame, StopReason, WalkConfig, WalkOutcome};

/// コア機能の結果型
pub type Result<T> = anyhow::Result<T>;
