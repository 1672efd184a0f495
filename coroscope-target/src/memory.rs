//! メモリイメージ
//!
//! 停止したプロセスのある時点のメモリを、マップ済み領域の集合として保持します。
//! 利用側からは読み取り専用です。

use crate::{Result, TargetError};

/// メモリから読み取り可能な型
pub trait MemoryReadable: Sized {
    /// バイト配列から値を構築
    fn from_le_bytes(bytes: &[u8]) -> Option<Self>;

    /// リトルエンディアンバイト配列に変換
    fn to_le_bytes(&self) -> Vec<u8>;

    /// 型のサイズ（バイト数）
    fn size() -> usize;
}

macro_rules! impl_memory_readable {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl MemoryReadable for $ty {
                fn from_le_bytes(bytes: &[u8]) -> Option<Self> {
                    let array = bytes.try_into().ok()?;
                    Some(<$ty>::from_le_bytes(array))
                }

                fn to_le_bytes(&self) -> Vec<u8> {
                    (*self).to_le_bytes().to_vec()
                }

                fn size() -> usize {
                    std::mem::size_of::<$ty>()
                }
            }
        )+
    };
}

impl_memory_readable!(u8, u16, u32, u64);

/// マップ済みのメモリ領域
#[derive(Debug, Clone)]
struct MemoryRegion {
    start: u64,
    bytes: Vec<u8>,
}

impl MemoryRegion {
    fn contains(&self, addr: u64, size: usize) -> bool {
        addr.checked_sub(self.start)
            .and_then(|offset| offset.checked_add(size as u64))
            .is_some_and(|end| end <= self.bytes.len() as u64)
    }
}

/// メモリイメージ
#[derive(Debug, Clone, Default)]
pub struct MemoryImage {
    regions: Vec<MemoryRegion>,
}

impl MemoryImage {
    /// 空のメモリイメージを作成する
    pub fn new() -> Self {
        Self::default()
    }

    /// 領域をマップする
    ///
    /// 既存の領域と重なる場合、読み取りでは先にマップされた領域が優先されます。
    pub fn map(&mut self, start: u64, bytes: Vec<u8>) -> &mut Self {
        self.regions.push(MemoryRegion { start, bytes });
        self
    }

    /// ゼロ埋めされた領域をマップする
    pub fn map_zeroed(&mut self, start: u64, len: usize) -> &mut Self {
        self.map(start, vec![0; len])
    }

    /// スナップショット構築時に値を書き込む
    ///
    /// マップされていないアドレスへの書き込みは `InvalidAddress`。
    pub fn store<T: MemoryReadable>(&mut self, addr: u64, value: T) -> Result<()> {
        let bytes = value.to_le_bytes();
        let region = self
            .regions
            .iter_mut()
            .find(|r| r.contains(addr, bytes.len()))
            .ok_or(TargetError::InvalidAddress(addr))?;
        let offset = (addr - region.start) as usize;
        region.bytes[offset..offset + bytes.len()].copy_from_slice(&bytes);
        Ok(())
    }

    /// メモリからデータを読み取る
    pub fn read(&self, addr: u64, size: usize) -> Result<Vec<u8>> {
        let region = self
            .regions
            .iter()
            .find(|r| r.contains(addr, size))
            .ok_or(TargetError::InvalidAddress(addr))?;
        let offset = (addr - region.start) as usize;
        Ok(region.bytes[offset..offset + size].to_vec())
    }

    /// 型付き値を読み取る
    pub fn read_typed<T: MemoryReadable>(&self, addr: u64) -> Result<T> {
        let bytes = self.read(addr, T::size())?;
        T::from_le_bytes(&bytes).ok_or(TargetError::InvalidAddress(addr))
    }

    /// u64値を読み取る（リトルエンディアン）
    pub fn read_u64(&self, addr: u64) -> Result<u64> {
        self.read_typed(addr)
    }

    /// 指定されたアドレスがマップされているか
    pub fn is_mapped(&self, addr: u64) -> bool {
        self.regions.iter().any(|r| r.contains(addr, 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_within_region() {
        let mut memory = MemoryImage::new();
        memory.map_zeroed(0x1000, 0x20);
        memory.store(0x1008, 0xdead_beef_u64).unwrap();

        assert_eq!(memory.read_u64(0x1008).unwrap(), 0xdead_beef);
        assert_eq!(memory.read_typed::<u32>(0x1008).unwrap(), 0xdead_beef);
        assert_eq!(memory.read_typed::<u8>(0x1000).unwrap(), 0);
    }

    #[test]
    fn test_read_outside_region() {
        let mut memory = MemoryImage::new();
        memory.map_zeroed(0x1000, 0x10);

        assert_eq!(memory.read(0x2000, 1), Err(TargetError::InvalidAddress(0x2000)));
        // 領域の終端をまたぐ読み取り
        assert_eq!(memory.read_u64(0x100c), Err(TargetError::InvalidAddress(0x100c)));
        assert!(memory.is_mapped(0x100f));
        assert!(!memory.is_mapped(0x1010));
    }

    #[test]
    fn test_region_at_top_of_address_space() {
        let mut memory = MemoryImage::new();
        memory.map_zeroed(u64::MAX - 7, 8);
        memory.store(u64::MAX - 7, 0x1122_3344_5566_7788u64).unwrap();

        assert_eq!(memory.read_u64(u64::MAX - 7).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(memory.read(u64::MAX, 1).unwrap(), vec![0x11]);
        assert_eq!(memory.read(u64::MAX, 2), Err(TargetError::InvalidAddress(u64::MAX)));
        assert!(memory.is_mapped(u64::MAX));
    }

    #[test]
    fn test_store_unmapped() {
        let mut memory = MemoryImage::new();
        assert!(memory.store(0x10, 1u64).is_err());
    }
}
