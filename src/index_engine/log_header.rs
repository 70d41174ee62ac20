use rand::Rng;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::index_engine::compression::CompressionType;
use crate::index_engine::constants::*;
use crate::index_engine::error::{Error, Result};

/// Fixed 64-byte header at the start of every log file.
///
/// The writer rewrites it on every flush so that `data_end` and the counters
/// always describe a durable prefix of the file. Everything past `data_end`
/// is garbage from an interrupted write and is ignored by readers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogHeader {
    pub file_identifier: u32,
    pub compression_type: CompressionType,
    pub compression_block_size: u32,
    pub num_puts: u64,
    pub num_deletes: u64,
    pub max_key_len: u64,
    pub max_value_len: u64,
    pub max_entries_per_block: u32,
    pub data_end: u64,
}

impl LogHeader {
    /// Fresh header for a new log. The file identifier ties the log to the
    /// indexes later built from it.
    pub(crate) fn new(compression_type: CompressionType, compression_block_size: u32) -> Self {
        Self {
            file_identifier: rand::rng().random(),
            compression_type,
            compression_block_size,
            num_puts: 0,
            num_deletes: 0,
            max_key_len: 0,
            max_value_len: 0,
            max_entries_per_block: 0,
            data_end: LOG_HEADER_SIZE as u64,
        }
    }

    /// Reads and validates the header of the log at `path`.
    pub fn read(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let mut buf = [0u8; LOG_HEADER_SIZE];
        file.read_exact(&mut buf).map_err(|_| {
            Error::Corruption(format!("log file '{}' is too small", path.display()))
        })?;
        Self::read_from(&buf)
    }

    pub(crate) fn read_from(buf: &[u8; LOG_HEADER_SIZE]) -> Result<Self> {
        let magic = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        if magic != LOG_MAGIC {
            return Err(Error::Corruption("not a log file (bad magic)".into()));
        }
        let version = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version != FORMAT_VERSION {
            return Err(Error::Corruption(format!(
                "unsupported log format version {version}"
            )));
        }
        let compression_type =
            CompressionType::from_u32(u32::from_le_bytes(buf[12..16].try_into().unwrap()))?;
        let compression_block_size = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        if compression_type == CompressionType::Zstd && compression_block_size == 0 {
            return Err(Error::Corruption(
                "compressed log with zero block size".into(),
            ));
        }
        let header = Self {
            file_identifier: u32::from_le_bytes(buf[8..12].try_into().unwrap()),
            compression_type,
            compression_block_size,
            num_puts: u64::from_le_bytes(buf[20..28].try_into().unwrap()),
            num_deletes: u64::from_le_bytes(buf[28..36].try_into().unwrap()),
            max_key_len: u64::from_le_bytes(buf[36..44].try_into().unwrap()),
            max_value_len: u64::from_le_bytes(buf[44..52].try_into().unwrap()),
            max_entries_per_block: u32::from_le_bytes(buf[52..56].try_into().unwrap()),
            data_end: u64::from_le_bytes(buf[56..64].try_into().unwrap()),
        };
        if header.data_end < LOG_HEADER_SIZE as u64 {
            return Err(Error::Corruption(format!(
                "log data end {} precedes the header",
                header.data_end
            )));
        }
        Ok(header)
    }

    pub(crate) fn serialize(&self) -> [u8; LOG_HEADER_SIZE] {
        let mut buf = [0u8; LOG_HEADER_SIZE];
        buf[0..4].copy_from_slice(&LOG_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.file_identifier.to_le_bytes());
        buf[12..16].copy_from_slice(&self.compression_type.as_u32().to_le_bytes());
        buf[16..20].copy_from_slice(&self.compression_block_size.to_le_bytes());
        buf[20..28].copy_from_slice(&self.num_puts.to_le_bytes());
        buf[28..36].copy_from_slice(&self.num_deletes.to_le_bytes());
        buf[36..44].copy_from_slice(&self.max_key_len.to_le_bytes());
        buf[44..52].copy_from_slice(&self.max_value_len.to_le_bytes());
        buf[52..56].copy_from_slice(&self.max_entries_per_block.to_le_bytes());
        buf[56..64].copy_from_slice(&self.data_end.to_le_bytes());
        buf
    }

    pub(crate) fn register_put(&mut self, key_len: u64, value_len: u64) {
        self.num_puts += 1;
        self.max_key_len = self.max_key_len.max(key_len);
        self.max_value_len = self.max_value_len.max(value_len);
    }

    pub(crate) fn register_delete(&mut self, key_len: u64) {
        self.num_deletes += 1;
        self.max_key_len = self.max_key_len.max(key_len);
    }
}
