//! Coroscope ターゲットアクセス
//!
//! このクレートは、停止中のプロセスを観察するためにホスト（デバッグ環境）が
//! 提供するインターフェースを定義します。デバッグ情報プロバイダと値アクセサ、
//! それらのエラー型、およびメモリ上に状態を保持するスナップショットホストを含みます。

pub mod access;
pub mod error;
pub mod host;
pub mod memory;
pub mod snapshot;
pub mod symbols;
pub mod types;

pub use access::ValueAccessorExt;
pub use error::TargetError;
pub use host::{
    DebugInfoProvider, PhysicalFrame, SourceLocation, Symbolizer, TemplateArgument, ValueAccessor,
};
pub use memory::{MemoryImage, MemoryReadable};
pub use snapshot::{Place, SnapshotTarget, SnapshotValue};
pub use symbols::{SymbolEntry, SymbolTable};
pub use types::{FieldLayout, SnapshotType, StructLayout, TypeTable, POINTER_SIZE};

/// ターゲットアクセスの結果型
pub type Result<T> = std::result::Result<T, TargetError>;
