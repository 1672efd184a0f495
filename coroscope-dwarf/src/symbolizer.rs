//! ELFバイナリを使ったアドレス解決

use crate::{DwarfLoader, LineInfoProvider, Result, Symbol, SymbolResolver};
use coroscope_target::{SourceLocation, Symbolizer, TargetError};
use std::path::Path;
use tracing::debug;

/// ELFのシンボルテーブルと行情報でアドレスを解決する
pub struct ElfSymbolizer {
    symbols: SymbolResolver,
    lines: LineInfoProvider,
    /// 実行時アドレス - リンク時アドレス
    load_bias: u64,
}

impl ElfSymbolizer {
    /// ELFファイルを読み込んで作成する
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let loader = DwarfLoader::load(path)?;
        Self::new(&loader)
    }

    /// 読み込み済みのローダーから作成する
    pub fn new(loader: &DwarfLoader) -> Result<Self> {
        Ok(Self {
            symbols: SymbolResolver::new(loader)?,
            lines: LineInfoProvider::new(loader)?,
            load_bias: 0,
        })
    }

    /// PIEのロードバイアスを設定する
    pub fn with_load_bias(mut self, load_bias: u64) -> Self {
        self.load_bias = load_bias;
        self
    }

    /// ロードバイアス
    pub fn load_bias(&self) -> u64 {
        self.load_bias
    }

    /// シンボル解決器
    pub fn symbols(&self) -> &SymbolResolver {
        &self.symbols
    }

    /// 実行時アドレスをリンク時アドレスに変換する
    fn link_address(&self, address: u64) -> Option<u64> {
        address.checked_sub(self.load_bias)
    }

    /// 実行時アドレスを含むシンボル
    pub fn symbol_at(&self, address: u64) -> Option<&Symbol> {
        self.link_address(address)
            .and_then(|addr| self.symbols.reverse_resolve(addr))
    }
}

impl Symbolizer for ElfSymbolizer {
    fn resolve(&self, address: u64) -> coroscope_target::Result<SourceLocation> {
        let link = self
            .link_address(address)
            .ok_or(TargetError::ResolutionError(address))?;
        let symbol = self
            .symbols
            .reverse_resolve(link)
            .ok_or(TargetError::ResolutionError(address))?;

        let line = match self.lines.lookup(link) {
            Ok(Some(line)) => line,
            Ok(None) => return Err(TargetError::ResolutionError(address)),
            Err(e) => {
                debug!(address = format_args!("0x{:x}", address), error = %e, "line lookup failed");
                return Err(TargetError::ResolutionError(address));
            }
        };

        Ok(SourceLocation {
            function_name: symbol.display_name().to_string(),
            file: line.file,
            line: line.line,
        })
    }

    fn symbol_name(&self, address: u64) -> Option<String> {
        self.symbol_at(address)
            .map(|symbol| symbol.display_name().to_string())
    }
}
