//! Positioned reads over the log payload.
//!
//! The uncompressed variant is a plain cursor over the shared mapping. The
//! zstd variant caches one decompressed block at a time and loads the next
//! block on demand, so reads that cross a block boundary (large values) are
//! transparent to callers. Cursors are single-threaded; `duplicate` hands an
//! independent cursor over the same mapping to each concurrent reader.

use memmap2::Mmap;
use std::sync::Arc;

use crate::index_engine::compression::CompressionType;
use crate::index_engine::error::{Error, Result};
use crate::index_engine::log_header::LogHeader;
use crate::index_engine::vlq;

pub enum BlockInput {
    Uncompressed {
        data: Arc<Mmap>,
        pos: u64,
    },
    Zstd {
        data: Arc<Mmap>,
        /// Offset of the next unread compressed byte.
        file_pos: u64,
        /// Offset of the cached block's length prefix.
        block_start: u64,
        block: Vec<u8>,
        block_pos: usize,
        loaded: bool,
    },
}

impl BlockInput {
    /// Cursor matching the log's compression mode, positioned at offset 0.
    pub fn new(data: Arc<Mmap>, header: &LogHeader) -> Self {
        match header.compression_type {
            CompressionType::None => Self::Uncompressed { data, pos: 0 },
            CompressionType::Zstd => Self::Zstd {
                data,
                file_pos: 0,
                block_start: 0,
                block: Vec::new(),
                block_pos: 0,
                loaded: false,
            },
        }
    }

    /// Repositions the cursor. For compressed logs `target` must be a block
    /// boundary; seeking back to the cached block is free.
    pub fn seek(&mut self, target: u64) {
        match self {
            Self::Uncompressed { pos, .. } => *pos = target,
            Self::Zstd {
                file_pos,
                block_start,
                block_pos,
                loaded,
                ..
            } => {
                if *loaded && target == *block_start {
                    *block_pos = 0;
                } else {
                    *loaded = false;
                    *file_pos = target;
                }
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        match self {
            Self::Uncompressed { data, pos } => {
                let at = *pos as usize;
                if at >= data.len() {
                    return Err(Error::Corruption("read past the end of the log".into()));
                }
                *pos += 1;
                Ok(data[at])
            }
            Self::Zstd { .. } => {
                self.ensure_block_bytes()?;
                if let Self::Zstd {
                    block, block_pos, ..
                } = self
                {
                    let byte = block[*block_pos];
                    *block_pos += 1;
                    Ok(byte)
                } else {
                    unreachable!()
                }
            }
        }
    }

    pub fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            Self::Uncompressed { data, pos } => {
                let start = *pos as usize;
                let end = start + buf.len();
                if end > data.len() {
                    return Err(Error::Corruption("read past the end of the log".into()));
                }
                buf.copy_from_slice(&data[start..end]);
                *pos = end as u64;
                Ok(())
            }
            Self::Zstd { .. } => {
                let mut filled = 0;
                while filled < buf.len() {
                    self.ensure_block_bytes()?;
                    if let Self::Zstd {
                        block, block_pos, ..
                    } = self
                    {
                        let take = (buf.len() - filled).min(block.len() - *block_pos);
                        buf[filled..filled + take]
                            .copy_from_slice(&block[*block_pos..*block_pos + take]);
                        *block_pos += take;
                        filled += take;
                    }
                }
                Ok(())
            }
        }
    }

    pub fn skip(&mut self, amount: u64) -> Result<()> {
        match self {
            Self::Uncompressed { pos, .. } => {
                *pos += amount;
                Ok(())
            }
            Self::Zstd { .. } => {
                let mut left = amount;
                while left > 0 {
                    self.ensure_block_bytes()?;
                    if let Self::Zstd {
                        block, block_pos, ..
                    } = self
                    {
                        let take = left.min((block.len() - *block_pos) as u64);
                        *block_pos += take as usize;
                        left -= take;
                    }
                }
                Ok(())
            }
        }
    }

    pub fn read_vlq(&mut self) -> Result<u64> {
        vlq::read_u64(|| self.read_u8())
    }

    /// Independent cursor over the same mapping, with a cold block cache.
    pub fn duplicate(&self) -> Self {
        match self {
            Self::Uncompressed { data, .. } => Self::Uncompressed {
                data: Arc::clone(data),
                pos: 0,
            },
            Self::Zstd { data, .. } => Self::Zstd {
                data: Arc::clone(data),
                file_pos: 0,
                block_start: 0,
                block: Vec::new(),
                block_pos: 0,
                loaded: false,
            },
        }
    }

    /// Address the next entry read from this position would carry: its own
    /// offset for uncompressed logs, its block's offset otherwise.
    pub(crate) fn next_entry_position(&self) -> u64 {
        match self {
            Self::Uncompressed { pos, .. } => *pos,
            Self::Zstd {
                file_pos,
                block_start,
                block,
                block_pos,
                loaded,
                ..
            } => {
                if *loaded && *block_pos < block.len() {
                    *block_start
                } else {
                    *file_pos
                }
            }
        }
    }

    /// True once every byte of the `[start, data_end)` payload has been
    /// consumed by sequential reads.
    pub(crate) fn exhausted(&self, data_end: u64) -> bool {
        match self {
            Self::Uncompressed { pos, .. } => *pos >= data_end,
            Self::Zstd {
                file_pos,
                block,
                block_pos,
                loaded,
                ..
            } => (!*loaded || *block_pos >= block.len()) && *file_pos >= data_end,
        }
    }

    /// Loads the next compressed block when the cache is cold or drained.
    fn ensure_block_bytes(&mut self) -> Result<()> {
        let Self::Zstd {
            data,
            file_pos,
            block_start,
            block,
            block_pos,
            loaded,
        } = self
        else {
            return Ok(());
        };
        if *loaded && *block_pos < block.len() {
            return Ok(());
        }

        let start = *file_pos;
        let mut cursor = start as usize;
        let compressed_len = vlq::read_u64(|| {
            if cursor >= data.len() {
                return Err(Error::Corruption(
                    "block length prefix past the end of the log".into(),
                ));
            }
            let byte = data[cursor];
            cursor += 1;
            Ok(byte)
        })?;
        let comp_end = cursor
            .checked_add(compressed_len as usize)
            .filter(|&end| end <= data.len())
            .ok_or_else(|| {
                Error::Corruption(format!(
                    "compressed block at {start} extends past the end of the log"
                ))
            })?;
        let decoded = CompressionType::Zstd.decompress(&data[cursor..comp_end])?;
        if decoded.is_empty() {
            return Err(Error::Corruption(format!("empty block at offset {start}")));
        }

        *block = decoded;
        *block_start = start;
        *block_pos = 0;
        *file_pos = comp_end as u64;
        *loaded = true;
        Ok(())
    }
}
