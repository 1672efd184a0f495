//! Coroscope ELF/DWARF デバッグ情報解析
//!
//! このクレートは、ELFファイルのシンボルテーブルとDWARF行情報を使って
//! コードアドレスを関数名・ファイル・行に解決する機能を提供します。
//! C++（Itanium ABI）とRustのシンボルのデマングルにも対応します。

pub mod lines;
pub mod loader;
pub mod symbolizer;
pub mod symbols;

pub use lines::{LineInfo, LineInfoProvider};
pub use loader::{DwarfLoader, DwarfReader};
pub use symbolizer::ElfSymbolizer;
pub use symbols::{demangle_symbol, Symbol, SymbolResolver};

/// DWARF解析の結果型
pub type Result<T> = anyhow::Result<T>;
