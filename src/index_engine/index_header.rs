use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::index_engine::constants::*;
use crate::index_engine::error::{Error, Result};
use crate::index_engine::log_header::LogHeader;
use crate::index_engine::slot_codec::{AddressSize, HashKind};

/// Fixed 120-byte header at the start of every index file.
///
/// Identity fields tie the index to the log prefix it was built from; the
/// statistics are filled in during the build and are purely informational
/// at lookup time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexHeader {
    pub file_identifier: u32,
    pub hash_seed: u32,
    /// Log prefix covered by this index. Must not exceed the log's own
    /// data end.
    pub data_end: u64,
    pub max_key_len: u64,
    pub max_value_len: u64,
    pub hash_kind: HashKind,
    pub address_size: AddressSize,
    pub hash_capacity: u64,
    pub num_puts: u64,
    pub entry_block_bits: u32,
    // Statistics
    pub num_entries: u64,
    pub total_displacement: u64,
    pub max_displacement: u64,
    pub hash_collisions: u64,
    pub total_key_bytes: u64,
    pub total_value_bytes: u64,
}

impl IndexHeader {
    pub(crate) fn new(
        log: &LogHeader,
        hash_kind: HashKind,
        address_size: AddressSize,
        hash_capacity: u64,
        hash_seed: u32,
        entry_block_bits: u32,
    ) -> Self {
        Self {
            file_identifier: log.file_identifier,
            hash_seed,
            data_end: log.data_end,
            max_key_len: log.max_key_len,
            max_value_len: log.max_value_len,
            hash_kind,
            address_size,
            hash_capacity,
            num_puts: log.num_puts,
            entry_block_bits,
            num_entries: 0,
            total_displacement: 0,
            max_displacement: 0,
            hash_collisions: 0,
            total_key_bytes: 0,
            total_value_bytes: 0,
        }
    }

    /// Reads and validates the header of the index at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; INDEX_HEADER_SIZE];
        file.read_exact(&mut buf).map_err(|_| {
            Error::Corruption(format!("index file '{}' is too small", path.display()))
        })?;
        Self::read_from(&buf)
    }

    pub(crate) fn read_from(buf: &[u8; INDEX_HEADER_SIZE]) -> Result<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != INDEX_MAGIC {
            return Err(Error::Corruption("not an index file (bad magic)".into()));
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported index format version {version}"
            )));
        }
        let header = Self {
            file_identifier: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            hash_seed: u32::from_le_bytes(buf[12..16].try_into().unwrap()),
            data_end: u64::from_le_bytes(buf[16..24].try_into().unwrap()),
            max_key_len: u64::from_le_bytes(buf[24..32].try_into().unwrap()),
            max_value_len: u64::from_le_bytes(buf[32..40].try_into().unwrap()),
            hash_kind: HashKind::from_size(u32::from_le_bytes(buf[40..44].try_into().unwrap()))?,
            address_size: AddressSize::from_size(u32::from_le_bytes(
                buf[44..48].try_into().unwrap(),
            ))?,
            hash_capacity: u64::from_le_bytes(buf[48..56].try_into().unwrap()),
            num_puts: u64::from_le_bytes(buf[56..64].try_into().unwrap()),
            entry_block_bits: u32::from_le_bytes(buf[64..68].try_into().unwrap()),
            num_entries: u64::from_le_bytes(buf[72..80].try_into().unwrap()),
            total_displacement: u64::from_le_bytes(buf[80..88].try_into().unwrap()),
            max_displacement: u64::from_le_bytes(buf[88..96].try_into().unwrap()),
            hash_collisions: u64::from_le_bytes(buf[96..104].try_into().unwrap()),
            total_key_bytes: u64::from_le_bytes(buf[104..112].try_into().unwrap()),
            total_value_bytes: u64::from_le_bytes(buf[112..120].try_into().unwrap()),
        };
        if header.hash_capacity == 0 {
            return Err(Error::Corruption("index with zero hash capacity".into()));
        }
        if header.entry_block_bits >= 32 {
            return Err(Error::Corruption(format!(
                "implausible entry block bits {}",
                header.entry_block_bits
            )));
        }
        Ok(header)
    }

    pub(crate) fn serialize(&self) -> [u8; INDEX_HEADER_SIZE] {
        let mut buf = [0u8; INDEX_HEADER_SIZE];
        buf[0..4].copy_from_slice(&INDEX_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.file_identifier.to_le_bytes());
        buf[12..16].copy_from_slice(&self.hash_seed.to_le_bytes());
        buf[16..24].copy_from_slice(&self.data_end.to_le_bytes());
        buf[24..32].copy_from_slice(&self.max_key_len.to_le_bytes());
        buf[32..40].copy_from_slice(&self.max_value_len.to_le_bytes());
        buf[40..44].copy_from_slice(&(self.hash_kind.size() as u32).to_le_bytes());
        buf[44..48].copy_from_slice(&(self.address_size.size() as u32).to_le_bytes());
        buf[48..56].copy_from_slice(&self.hash_capacity.to_le_bytes());
        buf[56..64].copy_from_slice(&self.num_puts.to_le_bytes());
        buf[64..68].copy_from_slice(&self.entry_block_bits.to_le_bytes());
        buf[72..80].copy_from_slice(&self.num_entries.to_le_bytes());
        buf[80..88].copy_from_slice(&self.total_displacement.to_le_bytes());
        buf[88..96].copy_from_slice(&self.max_displacement.to_le_bytes());
        buf[96..104].copy_from_slice(&self.hash_collisions.to_le_bytes());
        buf[104..112].copy_from_slice(&self.total_key_bytes.to_le_bytes());
        buf[112..120].copy_from_slice(&self.total_value_bytes.to_le_bytes());
        buf
    }

    /// Bytes per slot: hash field plus packed address field.
    pub fn slot_size(&self) -> usize {
        self.hash_kind.size() + self.address_size.size()
    }

    /// Exact size a well-formed index file with this header must have.
    pub fn expected_file_size(&self) -> u64 {
        INDEX_HEADER_SIZE as u64 + self.hash_capacity * self.slot_size() as u64
    }

    pub(crate) fn added_entry(&mut self, key_len: u64, value_len: u64) {
        self.num_entries += 1;
        self.total_key_bytes += key_len;
        self.total_value_bytes += value_len;
    }

    pub(crate) fn replaced_entry(
        &mut self,
        old_key_len: u64,
        old_value_len: u64,
        new_key_len: u64,
        new_value_len: u64,
    ) {
        self.total_key_bytes = self.total_key_bytes - old_key_len + new_key_len;
        self.total_value_bytes = self.total_value_bytes - old_value_len + new_value_len;
    }

    pub(crate) fn deleted_entry(&mut self, key_len: u64, value_len: u64) {
        self.num_entries -= 1;
        self.total_key_bytes -= key_len;
        self.total_value_bytes -= value_len;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_engine::compression::CompressionType;

    fn sample() -> IndexHeader {
        let mut log = LogHeader::new(CompressionType::None, 0);
        log.register_put(8, 100);
        log.data_end = 500;
        let mut header = IndexHeader::new(&log, HashKind::Bits64, AddressSize::Bits32, 13, 42, 3);
        header.added_entry(8, 100);
        header.total_displacement = 5;
        header.max_displacement = 2;
        header
    }

    #[test]
    fn serialize_parse_round_trip() {
        let header = sample();
        let parsed = IndexHeader::read_from(&header.serialize()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn slot_size_follows_widths() {
        let mut header = sample();
        assert_eq!(header.slot_size(), 12);
        header.hash_kind = HashKind::Bits32;
        header.address_size = AddressSize::Bits64;
        assert_eq!(header.slot_size(), 12);
        header.address_size = AddressSize::Bits32;
        assert_eq!(header.slot_size(), 8);
    }

    #[test]
    fn expected_file_size_counts_all_slots() {
        let header = sample();
        assert_eq!(
            header.expected_file_size(),
            INDEX_HEADER_SIZE as u64 + 13 * 12
        );
    }

    #[test]
    fn replace_and_delete_adjust_byte_totals() {
        let mut header = sample();
        header.replaced_entry(8, 100, 8, 40);
        assert_eq!(header.total_value_bytes, 40);
        header.deleted_entry(8, 40);
        assert_eq!(header.num_entries, 0);
        assert_eq!(header.total_key_bytes, 0);
        assert_eq!(header.total_value_bytes, 0);
    }
}
