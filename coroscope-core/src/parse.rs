//! パース関連のユーティリティ関数

use anyhow::Result;

/// アドレス文字列をu64にパース
///
/// `0x` 付きの16進数、10進数、それ以外は接頭辞なしの16進数として解釈します。
/// 桁区切りの `_` と `'` は無視します（`0x5555_5555_4000` など）。
///
/// # Examples
/// ```
/// use coroscope_core::parse::parse_address;
///
/// assert_eq!(parse_address("0x1234").unwrap(), 0x1234);
/// assert_eq!(parse_address("0x7f00_0000").unwrap(), 0x7f00_0000);
/// assert_eq!(parse_address("1234").unwrap(), 1234);
/// ```
pub fn parse_address(s: &str) -> Result<u64> {
    let trimmed = s.trim();
    let digits: String = trimmed.chars().filter(|c| !matches!(c, '_' | '\'')).collect();

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
            .map_err(|e| anyhow::anyhow!("Invalid hexadecimal address '{}': {}", trimmed, e))
    } else {
        digits
            .parse::<u64>()
            .or_else(|_| u64::from_str_radix(&digits, 16))
            .map_err(|e| anyhow::anyhow!("Invalid address '{}': {}", trimmed, e))
    }
}
