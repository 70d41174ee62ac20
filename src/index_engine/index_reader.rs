use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::index_engine::block_input::BlockInput;
use crate::index_engine::constants::*;
use crate::index_engine::error::{Error, Result};
use crate::index_engine::hash_table::SlotLayout;
use crate::index_engine::index_header::IndexHeader;
use crate::index_engine::log_header::LogHeader;
use crate::index_engine::log_iterator::{LogEntryKind, LogIterator};

/// Read handle over an index file and the log it was built from.
///
/// A handle is single-threaded: the log cursor and the key scratch buffer
/// behind it are shared mutable state, which is why `get` takes `&mut self`
/// and why at most one [`Entry`] can be outstanding per handle (the borrow
/// checker enforces the documented contract). Concurrent readers each take
/// their own handle via [`duplicate`](Self::duplicate), which shares the
/// read-only mappings but nothing mutable.
pub struct IndexReader {
    header: IndexHeader,
    log_header: LogHeader,
    layout: SlotLayout,
    index_mmap: Arc<Mmap>,
    log_mmap: Arc<Mmap>,
    log_input: BlockInput,
    key_buf: Vec<u8>,
    // State of the entry returned by the last `get`
    current_key_len: usize,
    current_value_len: u64,
    remaining: u64,
}

impl IndexReader {
    /// Opens an index/log pair and validates that they belong together:
    /// matching file identifiers, an index data end inside the log, and an
    /// index file sized exactly `header + capacity × slot_size`.
    ///
    /// Mappings acquired before a validation failure are released on the
    /// error path (drop order takes care of it).
    pub fn open(index_path: &Path, log_path: &Path) -> Result<Self> {
        let header = IndexHeader::read(index_path)?;
        let log_header = LogHeader::read(log_path)?;

        if header.file_identifier != log_header.file_identifier {
            return Err(Error::Corruption(format!(
                "index file '{}' does not belong to log file '{}'",
                index_path.display(),
                log_path.display()
            )));
        }
        if header.data_end > log_header.data_end {
            return Err(Error::Corruption(format!(
                "index file '{}' references more data than exists in the log file",
                index_path.display()
            )));
        }

        let index_file = File::open(index_path)?;
        let index_len = index_file.metadata()?.len();
        if index_len != header.expected_file_size() {
            return Err(Error::Corruption(format!(
                "index file '{}' has size {} but the header requires {}",
                index_path.display(),
                index_len,
                header.expected_file_size()
            )));
        }
        let index_mmap = Arc::new(unsafe { Mmap::map(&index_file)? });

        let log_file = File::open(log_path)?;
        let log_mmap = Arc::new(unsafe { Mmap::map(&log_file)? });
        let log_input = BlockInput::new(Arc::clone(&log_mmap), &log_header);

        debug!(
            "Opened index {} over log {} ({} live entries)",
            index_path.display(),
            log_path.display(),
            header.num_entries
        );

        let key_buf = vec![0u8; (header.max_key_len as usize).max(MIN_KEY_SCRATCH)];
        Ok(Self {
            layout: SlotLayout::from_header(&header),
            header,
            log_header,
            index_mmap,
            log_mmap,
            log_input,
            key_buf,
            current_key_len: 0,
            current_value_len: 0,
            remaining: 0,
        })
    }

    /// Point lookup. On a hit the returned [`Entry`] exposes the value as a
    /// bounded stream over this handle's log cursor; drain or drop it before
    /// the next `get`.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Entry<'_>>> {
        // Abandon whatever is left of a previous entry's stream.
        self.remaining = 0;

        let slots = &self.index_mmap[INDEX_HEADER_SIZE..];
        let hit = self
            .layout
            .lookup(slots, &mut self.log_input, &mut self.key_buf, key)?;
        match hit {
            Some(hit) => {
                self.current_key_len = hit.key_len as usize;
                self.current_value_len = hit.value_len;
                self.remaining = hit.value_len;
                Ok(Some(Entry { reader: self }))
            }
            None => Ok(None),
        }
    }

    /// True iff the log entry at `(position, entry_index)` is the live
    /// version indexed for `key`. Never touches the log.
    pub fn is_at(&self, key: &[u8], position: u64, entry_index: u64) -> bool {
        let slots = &self.index_mmap[INDEX_HEADER_SIZE..];
        self.layout.is_at(slots, key, position, entry_index)
    }

    /// Independent handle over the same mappings: fresh log cursor, scratch
    /// buffer, and entry state. The mappings are unmapped when the last
    /// holder drops.
    pub fn duplicate(&self) -> Self {
        Self {
            header: self.header.clone(),
            log_header: self.log_header.clone(),
            layout: self.layout,
            index_mmap: Arc::clone(&self.index_mmap),
            log_mmap: Arc::clone(&self.log_mmap),
            log_input: self.log_input.duplicate(),
            key_buf: vec![0u8; self.key_buf.len()],
            current_key_len: 0,
            current_value_len: 0,
            remaining: 0,
        }
    }

    /// Iterates the live entries of the indexed log prefix in log order,
    /// yielding each key at most once with its latest value. Runs on its own
    /// cursor, so the handle stays usable.
    pub fn live_entries(&self) -> LiveEntries {
        let input = BlockInput::new(Arc::clone(&self.log_mmap), &self.log_header);
        LiveEntries {
            layout: self.layout,
            index_mmap: Arc::clone(&self.index_mmap),
            iter: LogIterator::new(&self.log_header, input),
            prev_block: None,
            entry_index: 0,
        }
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn log_header(&self) -> &LogHeader {
        &self.log_header
    }

    /// Number of live keys in the index.
    pub fn num_entries(&self) -> u64 {
        self.header.num_entries
    }
}

/// A found key-value pair.
///
/// The value is a bounded sequential stream over the owning handle's log
/// cursor: reading advances the shared cursor and decrements the remaining
/// count. [`Read`] returns 0 once the value is exhausted, so `read_exact`
/// past the end fails with `UnexpectedEof`.
pub struct Entry<'a> {
    reader: &'a mut IndexReader,
}

impl Entry<'_> {
    pub fn key_len(&self) -> usize {
        self.reader.current_key_len
    }

    /// The matched key, as read back from the log during lookup.
    pub fn key(&self) -> &[u8] {
        &self.reader.key_buf[..self.reader.current_key_len]
    }

    pub fn value_len(&self) -> u64 {
        self.reader.current_value_len
    }

    /// Bytes of the value not yet consumed through the stream.
    pub fn remaining(&self) -> u64 {
        self.reader.remaining
    }

    /// Materializes the rest of the value in one allocation. Streaming stays
    /// available for values too large for a contiguous buffer.
    pub fn value_bytes(&mut self) -> Result<Vec<u8>> {
        let len: usize = self
            .reader
            .remaining
            .try_into()
            .map_err(|_| Error::ValueTooLarge {
                len: self.reader.remaining,
            })?;
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf).map_err(Error::Io)?;
        Ok(buf)
    }
}

impl Read for Entry<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let take = (buf.len() as u64).min(self.reader.remaining) as usize;
        if take == 0 {
            return Ok(0);
        }
        self.reader
            .log_input
            .read_fully(&mut buf[..take])
            .map_err(io::Error::from)?;
        self.reader.remaining -= take as u64;
        Ok(take)
    }
}

/// Iterator over the live entries of a (log, index) pair. Produced by
/// [`IndexReader::live_entries`].
pub struct LiveEntries {
    layout: SlotLayout,
    index_mmap: Arc<Mmap>,
    iter: LogIterator,
    prev_block: Option<u64>,
    entry_index: u64,
}

impl LiveEntries {
    /// Next live key-value pair, or `None` at the end of the prefix.
    pub fn next_entry(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            let slots_start = INDEX_HEADER_SIZE;
            let Some(entry) = self.iter.next_entry()? else {
                return Ok(None);
            };
            if self.prev_block == Some(entry.position) {
                self.entry_index += 1;
            } else {
                self.prev_block = Some(entry.position);
                self.entry_index = 0;
            }
            if entry.kind != LogEntryKind::Put {
                continue;
            }
            let slots = &self.index_mmap[slots_start..];
            if !self
                .layout
                .is_at(slots, entry.key, entry.position, self.entry_index)
            {
                continue;
            }

            let key = entry.key.to_vec();
            let value_len: usize =
                entry
                    .value_len
                    .try_into()
                    .map_err(|_| Error::ValueTooLarge {
                        len: entry.value_len,
                    })?;
            let mut value = vec![0u8; value_len];
            self.iter.read_value(&mut value)?;
            return Ok(Some((key, value)));
        }
    }
}
