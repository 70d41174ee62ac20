//! Width-polymorphic slot field access.
//!
//! A slot is `hash` followed by `packed_address`, each either 4 or 8 bytes
//! little-endian. The widths are fixed per index file by its header; the
//! enums below carry that choice as a value instead of a type parameter so
//! one code path serves both layouts.

use xxhash_rust::xxh3::xxh3_64_with_seed;
use xxhash_rust::xxh32::xxh32;

use crate::index_engine::error::{Error, Result};

/// Width of the per-slot hash field, and the hash function that fills it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashKind {
    Bits32,
    Bits64,
}

impl HashKind {
    pub fn size(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    pub(crate) fn from_size(size: u32) -> Result<Self> {
        match size {
            4 => Ok(Self::Bits32),
            8 => Ok(Self::Bits64),
            other => Err(Error::Corruption(format!("invalid hash size {other}"))),
        }
    }

    /// Hashes a key with the index's seed. The 32-bit result is widened so
    /// both kinds flow through the same u64 plumbing.
    #[inline]
    pub fn hash(self, key: &[u8], seed: u32) -> u64 {
        match self {
            Self::Bits32 => u64::from(xxh32(key, seed)),
            Self::Bits64 => xxh3_64_with_seed(key, u64::from(seed)),
        }
    }

    #[inline]
    pub fn read_hash(self, buf: &[u8], offset: usize) -> u64 {
        match self {
            Self::Bits32 => {
                u64::from(u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()))
            }
            Self::Bits64 => u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap()),
        }
    }

    #[inline]
    pub fn write_hash(self, value: u64, buf: &mut [u8], offset: usize) {
        match self {
            Self::Bits32 => {
                buf[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes())
            }
            Self::Bits64 => buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes()),
        }
    }
}

/// Width of the per-slot packed address field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddressSize {
    Bits32,
    Bits64,
}

impl AddressSize {
    pub fn size(self) -> usize {
        match self {
            Self::Bits32 => 4,
            Self::Bits64 => 8,
        }
    }

    pub(crate) fn from_size(size: u32) -> Result<Self> {
        match size {
            4 => Ok(Self::Bits32),
            8 => Ok(Self::Bits64),
            other => Err(Error::Corruption(format!("invalid address size {other}"))),
        }
    }

    #[inline]
    pub fn read_address(self, buf: &[u8], offset: usize) -> u64 {
        match self {
            Self::Bits32 => {
                u64::from(u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()))
            }
            Self::Bits64 => u64::from_le_bytes(buf[offset..offset + 8].try_into().unwrap()),
        }
    }

    #[inline]
    pub fn write_address(self, value: u64, buf: &mut [u8], offset: usize) {
        match self {
            Self::Bits32 => {
                buf[offset..offset + 4].copy_from_slice(&(value as u32).to_le_bytes())
            }
            Self::Bits64 => buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_round_trip_both_widths() {
        let mut buf = [0u8; 16];
        HashKind::Bits32.write_hash(0xDEAD_BEEF, &mut buf, 0);
        assert_eq!(HashKind::Bits32.read_hash(&buf, 0), 0xDEAD_BEEF);

        HashKind::Bits64.write_hash(0x1122_3344_5566_7788, &mut buf, 4);
        assert_eq!(HashKind::Bits64.read_hash(&buf, 4), 0x1122_3344_5566_7788);
    }

    #[test]
    fn address_round_trip_both_widths() {
        let mut buf = [0u8; 16];
        AddressSize::Bits32.write_address(123_456, &mut buf, 2);
        assert_eq!(AddressSize::Bits32.read_address(&buf, 2), 123_456);

        AddressSize::Bits64.write_address(u64::MAX >> 1, &mut buf, 8);
        assert_eq!(AddressSize::Bits64.read_address(&buf, 8), u64::MAX >> 1);
    }

    #[test]
    fn seed_changes_hash() {
        let key = b"some key";
        assert_ne!(
            HashKind::Bits64.hash(key, 1),
            HashKind::Bits64.hash(key, 2)
        );
        assert_ne!(
            HashKind::Bits32.hash(key, 1),
            HashKind::Bits32.hash(key, 2)
        );
    }

    #[test]
    fn hash_32_fits_in_32_bits() {
        let hash = HashKind::Bits32.hash(b"key", 42);
        assert!(hash <= u64::from(u32::MAX));
    }
}
