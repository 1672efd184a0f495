//! ソース行情報

use crate::{DwarfLoader, DwarfReader, Result};

/// ソース行情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInfo {
    pub file: String,
    pub line: u32,
    pub column: Option<u32>,
}

/// ソース行情報の取得
pub struct LineInfoProvider {
    context: addr2line::Context<DwarfReader>,
}

impl LineInfoProvider {
    /// ソース行情報プロバイダを作成する
    pub fn new(loader: &DwarfLoader) -> Result<Self> {
        let context = addr2line::Context::from_dwarf(loader.load_dwarf()?)
            .map_err(|e| anyhow::anyhow!("Failed to build line table context: {}", e))?;
        Ok(Self { context })
    }

    /// アドレスからソース行情報を取得する
    ///
    /// ファイル名と行番号の両方が揃っている場合だけ返します。
    pub fn lookup(&self, addr: u64) -> Result<Option<LineInfo>> {
        let location = self
            .context
            .find_location(addr)
            .map_err(|e| anyhow::anyhow!("Failed to look up 0x{:x}: {}", addr, e))?;

        Ok(location.and_then(|loc| match (loc.file, loc.line) {
            (Some(file), Some(line)) => Some(LineInfo {
                file: file.to_string(),
                line,
                column: loc.column,
            }),
            _ => None,
        }))
    }
}
