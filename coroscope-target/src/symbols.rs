//! メモリ上のシンボルテーブル

use crate::{Result, SourceLocation, Symbolizer, TargetError};
use std::collections::BTreeMap;

/// シンボル情報
#[derive(Debug, Clone)]
pub struct SymbolEntry {
    pub name: String,
    pub address: u64,
    pub size: u64,
    /// 行情報（なければ関数名だけ解決できる）
    pub location: Option<(String, u32)>,
}

impl SymbolEntry {
    fn contains(&self, addr: u64) -> bool {
        addr.checked_sub(self.address)
            .is_some_and(|offset| offset < self.size.max(1))
    }
}

/// アドレス範囲付きのシンボルテーブル
#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    by_address: BTreeMap<u64, SymbolEntry>,
}

impl SymbolTable {
    /// 空のシンボルテーブルを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 行情報付きの関数シンボルを追加する
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        address: u64,
        size: u64,
        file: impl Into<String>,
        line: u32,
    ) -> &mut Self {
        self.insert(SymbolEntry {
            name: name.into(),
            address,
            size,
            location: Some((file.into(), line)),
        })
    }

    /// 行情報のないシンボル（データ・テーブルなど）を追加する
    pub fn add_object(&mut self, name: impl Into<String>, address: u64, size: u64) -> &mut Self {
        self.insert(SymbolEntry {
            name: name.into(),
            address,
            size,
            location: None,
        })
    }

    fn insert(&mut self, entry: SymbolEntry) -> &mut Self {
        self.by_address.insert(entry.address, entry);
        self
    }

    /// アドレスを含むシンボルを検索する
    pub fn lookup(&self, addr: u64) -> Option<&SymbolEntry> {
        self.by_address
            .range(..=addr)
            .next_back()
            .map(|(_, entry)| entry)
            .filter(|entry| entry.contains(addr))
    }

    /// シンボル数
    pub fn len(&self) -> usize {
        self.by_address.len()
    }

    /// 空かどうか
    pub fn is_empty(&self) -> bool {
        self.by_address.is_empty()
    }
}

impl Symbolizer for SymbolTable {
    fn resolve(&self, address: u64) -> Result<SourceLocation> {
        let entry = self
            .lookup(address)
            .ok_or(TargetError::ResolutionError(address))?;
        let (file, line) = entry
            .location
            .clone()
            .ok_or(TargetError::ResolutionError(address))?;
        Ok(SourceLocation {
            function_name: entry.name.clone(),
            file,
            line,
        })
    }

    fn symbol_name(&self, address: u64) -> Option<String> {
        self.lookup(address).map(|entry| entry.name.clone())
    }
}
