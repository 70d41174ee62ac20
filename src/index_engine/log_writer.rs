use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::index_engine::compression::CompressionType;
use crate::index_engine::constants::*;
use crate::index_engine::error::{Error, Result};
use crate::index_engine::log_header::LogHeader;
use crate::index_engine::vlq;

/// Knobs for creating a log file.
#[derive(Clone, Copy, Debug)]
pub struct LogWriterOptions {
    pub compression: CompressionType,
    /// Uncompressed fill at which a compression block is cut. Ignored for
    /// uncompressed logs.
    pub compression_block_size: u32,
    /// Sync file contents to disk on every `flush`.
    pub fsync: bool,
}

impl Default for LogWriterOptions {
    fn default() -> Self {
        Self {
            compression: CompressionType::None,
            compression_block_size: DEFAULT_COMPRESSION_BLOCK_SIZE,
            fsync: false,
        }
    }
}

/// Appends PUT and DELETE entries to a log file.
///
/// Entries become visible to readers and the index builder only after
/// `flush`, which cuts any pending compression block and rewrites the header
/// so that `data_end` covers everything written so far.
///
/// For compressed logs every block starts at an entry boundary. An entry
/// larger than the block size spans several blocks and closes the last one
/// behind it, so a block never begins mid-entry and in-block entry indexes
/// stay decodable.
pub struct LogWriter {
    file: BufWriter<File>,
    header: LogHeader,
    path: PathBuf,
    /// File offset where the next entry or block lands.
    tail: u64,
    block_size: usize,
    block_buf: Vec<u8>,
    entries_in_block: u32,
    fsync: bool,
}

impl LogWriter {
    /// Creates a new log at `path`, truncating anything already there.
    pub fn create(path: &Path, options: LogWriterOptions) -> Result<Self> {
        if options.compression == CompressionType::Zstd && options.compression_block_size == 0 {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "compression block size must be non-zero",
            )));
        }
        let block_size = match options.compression {
            CompressionType::None => 0,
            CompressionType::Zstd => options.compression_block_size,
        };
        let header = LogHeader::new(options.compression, block_size);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&header.serialize())?;

        debug!("Created log at {}", path.display());
        Ok(Self {
            file: writer,
            tail: header.data_end,
            header,
            path: path.to_path_buf(),
            block_size: block_size as usize,
            block_buf: Vec::new(),
            entries_in_block: 0,
            fsync: options.fsync,
        })
    }

    /// Reopens an existing log for appending. Bytes past the header's
    /// `data_end` were never covered by a flush and are discarded.
    pub fn append(path: &Path) -> Result<Self> {
        let header = LogHeader::read(path)?;
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let file_len = file.metadata()?.len();
        if file_len > header.data_end {
            warn!(
                "Truncating {} bytes of unflushed data in {}",
                file_len - header.data_end,
                path.display()
            );
            file.set_len(header.data_end)?;
        } else if file_len < header.data_end {
            return Err(Error::Corruption(format!(
                "log file '{}' is shorter than its data end",
                path.display()
            )));
        }

        let mut writer = BufWriter::new(file);
        writer.seek(SeekFrom::End(0))?;
        Ok(Self {
            tail: header.data_end,
            block_size: header.compression_block_size as usize,
            file: writer,
            header,
            path: path.to_path_buf(),
            block_buf: Vec::new(),
            entries_in_block: 0,
            fsync: false,
        })
    }

    /// Appends a PUT entry.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(
            vlq::encoded_len(key.len() as u64 + 1)
                + vlq::encoded_len(value.len() as u64)
                + key.len()
                + value.len(),
        );
        vlq::write_u64(&mut frame, key.len() as u64 + 1);
        vlq::write_u64(&mut frame, value.len() as u64);
        frame.extend_from_slice(key);
        frame.extend_from_slice(value);
        self.append_framed(&frame)?;
        self.header.register_put(key.len() as u64, value.len() as u64);
        Ok(())
    }

    /// Appends a DELETE tombstone. The deleted key rides in the value field
    /// behind a zero key-length marker.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        let mut frame =
            Vec::with_capacity(1 + vlq::encoded_len(key.len() as u64) + key.len());
        vlq::write_u64(&mut frame, 0);
        vlq::write_u64(&mut frame, key.len() as u64);
        frame.extend_from_slice(key);
        self.append_framed(&frame)?;
        self.header.register_delete(key.len() as u64);
        Ok(())
    }

    /// Makes everything appended so far durable: cuts the pending block,
    /// rewrites the header with the new `data_end` and counters, and
    /// optionally fsyncs.
    pub fn flush(&mut self) -> Result<()> {
        if !self.block_buf.is_empty() {
            let fill = self.block_buf.len();
            self.flush_block_chunk(fill)?;
        }
        self.header.data_end = self.tail;

        self.file.flush()?;
        let file = self.file.get_mut();
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&self.header.serialize())?;
        file.seek(SeekFrom::End(0))?;
        if self.fsync {
            file.sync_all()?;
        }
        debug!(
            "Flushed log {} (data_end={}, puts={}, deletes={})",
            self.path.display(),
            self.header.data_end,
            self.header.num_puts,
            self.header.num_deletes
        );
        Ok(())
    }

    /// Header as of the last mutation; `data_end` reflects the last `flush`.
    pub fn header(&self) -> &LogHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_framed(&mut self, frame: &[u8]) -> Result<()> {
        match self.header.compression_type {
            CompressionType::None => {
                self.file.write_all(frame)?;
                self.tail += frame.len() as u64;
                if self.header.max_entries_per_block == 0 {
                    self.header.max_entries_per_block = 1;
                }
                Ok(())
            }
            CompressionType::Zstd => {
                // A whole entry that no longer fits goes into the next block.
                if !self.block_buf.is_empty()
                    && self.block_buf.len() + frame.len() > self.block_size
                {
                    let fill = self.block_buf.len();
                    self.flush_block_chunk(fill)?;
                }
                self.entries_in_block += 1;
                self.block_buf.extend_from_slice(frame);

                let mut spanned = false;
                while self.block_buf.len() >= self.block_size {
                    self.flush_block_chunk(self.block_size)?;
                    spanned = true;
                }
                // A spanning entry's tail block began mid-entry; close it so
                // the next entry starts a fresh block.
                if spanned && !self.block_buf.is_empty() {
                    let fill = self.block_buf.len();
                    self.flush_block_chunk(fill)?;
                }
                Ok(())
            }
        }
    }

    /// Compresses and writes the first `len` buffered bytes as one block.
    fn flush_block_chunk(&mut self, len: usize) -> Result<()> {
        let compressed = self.header.compression_type.compress(&self.block_buf[..len])?;
        let mut prefix = Vec::with_capacity(vlq::encoded_len(compressed.len() as u64));
        vlq::write_u64(&mut prefix, compressed.len() as u64);

        self.file.write_all(&prefix)?;
        self.file.write_all(&compressed)?;
        self.tail += (prefix.len() + compressed.len()) as u64;

        self.header.max_entries_per_block =
            self.header.max_entries_per_block.max(self.entries_in_block);
        self.entries_in_block = 0;
        self.block_buf.drain(..len);
        Ok(())
    }
}
