use memmap2::Mmap;
use rand::Rng;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::index_engine::block_input::BlockInput;
use crate::index_engine::constants::*;
use crate::index_engine::error::Result;
use crate::index_engine::hash_table::SlotLayout;
use crate::index_engine::index_header::IndexHeader;
use crate::index_engine::log_header::LogHeader;
use crate::index_engine::log_iterator::{LogEntryKind, LogIterator};
use crate::index_engine::slot_buffer::SlotBuffer;
use crate::index_engine::slot_codec::{AddressSize, HashKind};

/// Builds the hash index for a log file.
///
/// The index is always a function of the log prefix described by the log
/// header's `data_end`; there is no incremental update. Building replays
/// every PUT and DELETE through the Robin-Hood engine, scans the finished
/// slot array for displacement statistics, and writes header plus slots in
/// one pass.
///
/// # Example
///
/// ```no_run
/// use logdex::IndexBuilder;
/// # fn main() -> Result<(), logdex::Error> {
/// IndexBuilder::new()
///     .sparsity(1.5)
///     .fsync(true)
///     .build("data.log".as_ref(), "data.idx".as_ref())?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct IndexBuilder {
    hash_kind: Option<HashKind>,
    sparsity: Option<f64>,
    fsync: bool,
    hash_seed: Option<u32>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forces 32- or 64-bit slot hashes. Unset picks 32-bit for logs with
    /// fewer than 2^23 PUTs and 64-bit beyond that.
    pub fn hash_kind(mut self, kind: HashKind) -> Self {
        self.hash_kind = Some(kind);
        self
    }

    /// Slots allocated per PUT entry, floored at 1.3 so the table always
    /// keeps at least one empty slot.
    pub fn sparsity(mut self, sparsity: f64) -> Self {
        self.sparsity = Some(sparsity);
        self
    }

    /// Sync the index file to disk before returning from `build`.
    pub fn fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    /// Pins the hash seed instead of drawing a random one. Two builds of the
    /// same log with the same seed produce byte-identical index files.
    pub fn hash_seed(mut self, seed: u32) -> Self {
        self.hash_seed = Some(seed);
        self
    }

    /// Builds the index for the log at `log_path` and writes it to
    /// `index_path`, replacing any existing file. Returns the final header,
    /// statistics included.
    pub fn build(&self, log_path: &Path, index_path: &Path) -> Result<IndexHeader> {
        let log_header = LogHeader::read(log_path)?;

        let entry_block_bits = calc_entry_block_bits(log_header.max_entries_per_block);
        let address_size = pick_address_size(&log_header, entry_block_bits);
        let hash_kind = self.hash_kind.unwrap_or(if log_header.num_puts < HASH_32_CUTOFF {
            HashKind::Bits32
        } else {
            HashKind::Bits64
        });
        let sparsity = self.sparsity.unwrap_or(MIN_SPARSITY).max(MIN_SPARSITY);
        let capacity = 1u64 | (log_header.num_puts as f64 * sparsity) as u64;
        let hash_seed = self.hash_seed.unwrap_or_else(|| rand::rng().random());

        let mut header = IndexHeader::new(
            &log_header,
            hash_kind,
            address_size,
            capacity,
            hash_seed,
            entry_block_bits,
        );
        let layout = SlotLayout::from_header(&header);
        debug!(
            "Building index for {} ({} puts, capacity {}, {:?}/{:?}, B={})",
            log_path.display(),
            log_header.num_puts,
            capacity,
            hash_kind,
            address_size,
            entry_block_bits
        );

        let log_file = File::open(log_path)?;
        let log_mmap = Arc::new(unsafe { Mmap::map(&log_file)? });
        let mut resolve_input = BlockInput::new(Arc::clone(&log_mmap), &log_header);
        let mut iter = LogIterator::new(&log_header, BlockInput::new(log_mmap, &log_header));

        let mut buffer = SlotBuffer::zeroed(capacity as usize * layout.slot_size());
        let mut key_buf = vec![0u8; (log_header.max_key_len as usize).max(MIN_KEY_SCRATCH)];

        let mut prev_block: Option<u64> = None;
        let mut entry_index = 0u64;
        while let Some(entry) = iter.next_entry()? {
            if prev_block == Some(entry.position) {
                entry_index += 1;
            } else {
                prev_block = Some(entry.position);
                entry_index = 0;
            }
            match entry.kind {
                LogEntryKind::Put => layout.put(
                    buffer.as_mut_slice(),
                    &mut resolve_input,
                    &mut key_buf,
                    &mut header,
                    entry.key,
                    entry.value_len,
                    entry.position,
                    entry_index,
                )?,
                LogEntryKind::Delete => layout.delete(
                    buffer.as_mut_slice(),
                    &mut resolve_input,
                    &mut key_buf,
                    &mut header,
                    entry.key,
                )?,
            }
        }

        let scan = layout.displacement_scan(buffer.as_slice());
        header.total_displacement = scan.total_displacement;
        header.max_displacement = scan.max_displacement;
        header.hash_collisions = scan.hash_collisions;

        let mut index_file = File::create(index_path)?;
        index_file.write_all(&header.serialize())?;
        buffer.write_to(&mut index_file)?;
        index_file.flush()?;
        if self.fsync {
            index_file.sync_all()?;
        }

        info!(
            "Built index {} ({} live entries, max displacement {})",
            index_path.display(),
            header.num_entries,
            header.max_displacement
        );
        Ok(header)
    }
}

/// Smallest B with `2^B >= max_entries_per_block`; 0 for an empty log.
fn calc_entry_block_bits(max_entries_per_block: u32) -> u32 {
    let mut bits = 0;
    while (1u64 << bits) < u64::from(max_entries_per_block) {
        bits += 1;
    }
    bits
}

/// Narrow addresses are enough while the shifted block offset still fits in
/// 32 bits with room to spare.
fn pick_address_size(log_header: &LogHeader, entry_block_bits: u32) -> AddressSize {
    match 30u32.checked_sub(entry_block_bits) {
        Some(shift) if log_header.data_end <= 1u64 << shift => AddressSize::Bits32,
        _ => AddressSize::Bits64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_block_bits_covers_block_sizes() {
        assert_eq!(calc_entry_block_bits(0), 0);
        assert_eq!(calc_entry_block_bits(1), 0);
        assert_eq!(calc_entry_block_bits(2), 1);
        assert_eq!(calc_entry_block_bits(3), 2);
        assert_eq!(calc_entry_block_bits(4), 2);
        assert_eq!(calc_entry_block_bits(5), 3);
        assert_eq!(calc_entry_block_bits(1 << 16), 16);
    }

    #[test]
    fn address_size_tracks_data_end_and_bits() {
        let mut log = LogHeader::new(crate::index_engine::CompressionType::None, 0);
        log.data_end = 1 << 20;
        assert_eq!(pick_address_size(&log, 0), AddressSize::Bits32);
        assert_eq!(pick_address_size(&log, 10), AddressSize::Bits32);
        assert_eq!(pick_address_size(&log, 11), AddressSize::Bits64);
        log.data_end = (1 << 30) + 1;
        assert_eq!(pick_address_size(&log, 0), AddressSize::Bits64);
    }
}
