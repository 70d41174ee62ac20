use crate::index_engine::block_input::BlockInput;
use crate::index_engine::constants::*;
use crate::index_engine::error::{Error, Result};
use crate::index_engine::log_header::LogHeader;

/// Kind of a log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogEntryKind {
    Put,
    Delete,
}

/// One decoded log entry. Borrows the iterator's key scratch buffer, so it
/// only lives until the next `next_entry` call.
#[derive(Debug)]
pub struct LogEntryRef<'a> {
    pub kind: LogEntryKind,
    /// Address the entry is indexed under: the entry's own offset for
    /// uncompressed logs, its block's offset for compressed ones.
    pub position: u64,
    pub key: &'a [u8],
    /// Value length in bytes; zero for tombstones.
    pub value_len: u64,
}

/// Forward pass over every entry of a log prefix, in write order.
///
/// The value bytes of a PUT are consumed lazily: callers that need them call
/// `read_value` before advancing, everyone else gets them skipped on the
/// next `next_entry`.
pub struct LogIterator {
    input: BlockInput,
    data_end: u64,
    max_key_len: u64,
    key_buf: Vec<u8>,
    /// Unconsumed value bytes of the entry handed out last.
    pending_value: u64,
}

impl LogIterator {
    /// Iterates `input` from the start of the payload to the header's data
    /// end.
    pub fn new(header: &LogHeader, mut input: BlockInput) -> Self {
        input.seek(LOG_HEADER_SIZE as u64);
        Self {
            input,
            data_end: header.data_end,
            max_key_len: header.max_key_len,
            key_buf: vec![0u8; (header.max_key_len as usize).max(MIN_KEY_SCRATCH)],
            pending_value: 0,
        }
    }

    /// Decodes the next entry, or `None` once the prefix is exhausted.
    pub fn next_entry(&mut self) -> Result<Option<LogEntryRef<'_>>> {
        if self.pending_value > 0 {
            self.input.skip(self.pending_value)?;
            self.pending_value = 0;
        }
        if self.input.exhausted(self.data_end) {
            return Ok(None);
        }

        let position = self.input.next_entry_position();
        let key_len_plus_one = self.input.read_vlq()?;
        let value_len = self.input.read_vlq()?;

        if key_len_plus_one == 0 {
            // Tombstone: the deleted key rides in the value field.
            let key_len = self.checked_key_len(value_len)?;
            self.input.read_fully(&mut self.key_buf[..key_len])?;
            Ok(Some(LogEntryRef {
                kind: LogEntryKind::Delete,
                position,
                key: &self.key_buf[..key_len],
                value_len: 0,
            }))
        } else {
            let key_len = self.checked_key_len(key_len_plus_one - 1)?;
            self.input.read_fully(&mut self.key_buf[..key_len])?;
            self.pending_value = value_len;
            Ok(Some(LogEntryRef {
                kind: LogEntryKind::Put,
                position,
                key: &self.key_buf[..key_len],
                value_len,
            }))
        }
    }

    /// Reads value bytes of the entry handed out by the last `next_entry`.
    /// Anything not consumed before the next `next_entry` is skipped.
    pub fn read_value(&mut self, buf: &mut [u8]) -> Result<()> {
        if buf.len() as u64 > self.pending_value {
            return Err(Error::Eof);
        }
        self.input.read_fully(buf)?;
        self.pending_value -= buf.len() as u64;
        Ok(())
    }

    fn checked_key_len(&self, key_len: u64) -> Result<usize> {
        if key_len > self.max_key_len {
            return Err(Error::Corruption(format!(
                "entry key length {} exceeds the log's maximum {}",
                key_len, self.max_key_len
            )));
        }
        Ok(key_len as usize)
    }
}
