//! シンボル解決機能

use crate::{DwarfLoader, Result};
use object::{Object, ObjectSymbol, SymbolKind};
use std::collections::HashMap;

/// シンボル情報
#[derive(Debug, Clone)]
pub struct Symbol {
    /// マングルされたシンボル名
    pub name: String,
    /// デマングルされたシンボル名（可読な形式）
    pub demangled_name: String,
    pub address: u64,
    pub size: u64,
}

impl Symbol {
    /// シンボルを作成し、デマングルされた名前を設定する
    pub fn new(name: String, address: u64, size: u64) -> Self {
        let demangled_name = demangle_symbol(&name);
        Self {
            name,
            demangled_name,
            address,
            size,
        }
    }

    /// 表示用の名前を取得（デマングル可能ならデマングル後、できなければマングル名）
    pub fn display_name(&self) -> &str {
        &self.demangled_name
    }

    /// アドレスがシンボルの範囲内か
    pub fn contains(&self, addr: u64) -> bool {
        addr.checked_sub(self.address)
            .is_some_and(|offset| offset < self.size)
    }
}

/// シンボル名をデマングルする
///
/// Itanium C++ ABI（`_Z`）とRustのシンボルに対応します。
pub fn demangle_symbol(name: &str) -> String {
    // Rustのレガシーマングリングも`_ZN`で始まるため先に試す
    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{:#}", demangled);
    }

    if name.starts_with("_Z") {
        if let Some(demangled) = addr2line::demangle(name, gimli::DW_LANG_C_plus_plus) {
            return demangled;
        }
    }

    name.to_string()
}

/// シンボル解決
pub struct SymbolResolver {
    /// シンボル名 -> シンボル情報のマップ
    symbols_by_name: HashMap<String, Symbol>,
    /// アドレス順にソートされたシンボル
    symbols_by_address: Vec<Symbol>,
    /// PIE（Position Independent Executable）かどうか
    is_pie: bool,
}

impl SymbolResolver {
    /// DWARFローダーからシンボル解決を作成する
    pub fn new(loader: &DwarfLoader) -> Result<Self> {
        let mut symbols_by_name = HashMap::new();
        let mut symbols_by_address = Vec::new();

        for symbol in loader.object_file().symbols() {
            // 関数とデータ（型消去のテーブルはデータシンボル）だけを対象にする
            if !matches!(symbol.kind(), SymbolKind::Text | SymbolKind::Data) {
                continue;
            }
            if let Ok(name) = symbol.name() {
                if !name.is_empty() && symbol.address() != 0 {
                    let sym = Symbol::new(name.to_string(), symbol.address(), symbol.size());
                    symbols_by_name.insert(name.to_string(), sym.clone());
                    symbols_by_address.push(sym);
                }
            }
        }

        symbols_by_address.sort_by_key(|s| s.address);
        tracing::debug!(count = symbols_by_address.len(), "symbol table loaded");

        Ok(Self {
            symbols_by_name,
            symbols_by_address,
            is_pie: loader.is_pie(),
        })
    }

    /// PIE（Position Independent Executable）かどうかを取得する
    pub fn is_pie(&self) -> bool {
        self.is_pie
    }

    /// シンボル名からアドレスを解決する
    pub fn resolve(&self, symbol: &str) -> Option<u64> {
        self.symbols_by_name.get(symbol).map(|s| s.address)
    }

    /// アドレスを含むシンボルを返す
    ///
    /// サイズ情報のないシンボルは、次のシンボルまでを範囲とみなします。
    pub fn reverse_resolve(&self, addr: u64) -> Option<&Symbol> {
        let idx = match self
            .symbols_by_address
            .binary_search_by_key(&addr, |s| s.address)
        {
            Ok(idx) => idx,
            Err(0) => return None,
            Err(idx) => idx - 1,
        };

        let sym = &self.symbols_by_address[idx];
        if sym.size == 0 || sym.contains(addr) {
            Some(sym)
        } else {
            None
        }
    }

    /// すべてのシンボルを取得する
    pub fn all_symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols_by_address.iter()
    }

    /// パターンにマッチするシンボルを検索する
    /// マングル名とデマングル名の両方で検索する
    pub fn find_symbols(&self, pattern: &str) -> Vec<Symbol> {
        let mut found: Vec<Symbol> = self
            .symbols_by_address
            .iter()
            .filter(|s| s.name.contains(pattern) || s.demangled_name.contains(pattern))
            .cloned()
            .collect();
        found.dedup_by_key(|s| s.address);
        found
    }
}
