//! Robin-Hood open-addressed hash table over a flat slot array.
//!
//! Each slot holds `(hash, packed_address)`; `packed_address == 0` marks an
//! empty slot. Probes walk forward from the home slot `hash % capacity` and
//! stop early at any slot whose own displacement is smaller than the probe's,
//! which bounds lookups without tombstones. Insertion steals slots from less
//! displaced entries; deletion backward-shifts the chain to close the hole.
//!
//! Equal slot hashes do not imply equal keys, so candidates are resolved by
//! seeking the log to the slot's address, skipping the preceding entries of
//! that block, and comparing the stored key byte for byte.

use crate::index_engine::block_input::BlockInput;
use crate::index_engine::error::{Error, Result};
use crate::index_engine::index_header::IndexHeader;
use crate::index_engine::slot_codec::{AddressSize, HashKind};

/// Geometry and hashing parameters shared by every slot operation.
#[derive(Clone, Copy, Debug)]
pub struct SlotLayout {
    pub hash_kind: HashKind,
    pub address_size: AddressSize,
    pub capacity: u64,
    pub entry_block_bits: u32,
    pub hash_seed: u32,
}

/// A successful lookup. The log cursor used for the probe is left positioned
/// at the first byte of the value.
#[derive(Debug)]
pub(crate) struct LookupHit {
    pub key_len: u64,
    pub value_len: u64,
}

/// Displacement statistics gathered by a single forward pass over the slots.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DisplacementScan {
    pub total_displacement: u64,
    pub max_displacement: u64,
    pub hash_collisions: u64,
}

impl SlotLayout {
    pub fn from_header(header: &IndexHeader) -> Self {
        Self {
            hash_kind: header.hash_kind,
            address_size: header.address_size,
            capacity: header.hash_capacity,
            entry_block_bits: header.entry_block_bits,
            hash_seed: header.hash_seed,
        }
    }

    pub fn slot_size(&self) -> usize {
        self.hash_kind.size() + self.address_size.size()
    }

    pub fn entry_block_mask(&self) -> u64 {
        (1u64 << self.entry_block_bits) - 1
    }

    /// Slot a hash lands in when undisplaced.
    pub fn home_slot(&self, hash: u64) -> u64 {
        hash % self.capacity
    }

    /// Distance from `hash`'s home slot to `slot`, wrapped around the ring.
    pub fn displacement(&self, slot: u64, hash: u64) -> u64 {
        let home = self.home_slot(hash);
        if slot >= home {
            slot - home
        } else {
            slot + self.capacity - home
        }
    }

    #[inline]
    fn read_slot(&self, slots: &[u8], slot: u64) -> (u64, u64) {
        let pos = slot as usize * self.slot_size();
        let hash = self.hash_kind.read_hash(slots, pos);
        let packed = self.address_size.read_address(slots, pos + self.hash_kind.size());
        (hash, packed)
    }

    #[inline]
    fn write_slot(&self, slots: &mut [u8], slot: u64, hash: u64, packed: u64) {
        let pos = slot as usize * self.slot_size();
        self.hash_kind.write_hash(hash, slots, pos);
        self.address_size
            .write_address(packed, slots, pos + self.hash_kind.size());
    }

    /// Inserts or overwrites the entry at `(position, entry_index)` keyed by
    /// `key`. `log` is used to disambiguate equal hashes against stored keys.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn put(
        &self,
        slots: &mut [u8],
        log: &mut BlockInput,
        key_buf: &mut [u8],
        header: &mut IndexHeader,
        key: &[u8],
        value_len: u64,
        mut position: u64,
        mut entry_index: u64,
    ) -> Result<()> {
        if header.num_entries >= self.capacity {
            return Err(Error::Capacity {
                entries: header.num_entries,
                capacity: self.capacity,
            });
        }

        let mut hash = self.hash_kind.hash(key, self.hash_seed);
        let mut slot = self.home_slot(hash);
        let mut displacement = 0u64;
        let mut might_be_collision = true;
        let mut tries = self.capacity;

        loop {
            let (stored_hash, stored_packed) = self.read_slot(slots, slot);
            if stored_packed == 0 {
                let packed = (position << self.entry_block_bits) | entry_index;
                self.write_slot(slots, slot, hash, packed);
                header.added_entry(key.len() as u64, value_len);
                return Ok(());
            }

            let stored_entry_index = stored_packed & self.entry_block_mask();
            let stored_position = stored_packed >> self.entry_block_bits;

            if might_be_collision && hash == stored_hash {
                if let Some((stored_key_len, stored_value_len)) =
                    self.resolve_key(log, key_buf, key, stored_position, stored_entry_index)?
                {
                    // Same key written again: point the slot at the newer
                    // log entry.
                    let packed = (position << self.entry_block_bits) | entry_index;
                    self.write_slot(slots, slot, hash, packed);
                    header.replaced_entry(
                        stored_key_len,
                        stored_value_len,
                        key.len() as u64,
                        value_len,
                    );
                    return Ok(());
                }
            }

            let other_displacement = self.displacement(slot, stored_hash);
            if displacement > other_displacement {
                // Steal the slot and carry the evicted entry onward. The
                // evicted hash cannot have a duplicate key further down the
                // chain, so key resolution is skipped from here on.
                let packed = (position << self.entry_block_bits) | entry_index;
                self.write_slot(slots, slot, hash, packed);
                hash = stored_hash;
                position = stored_position;
                entry_index = stored_entry_index;
                displacement = other_displacement;
                might_be_collision = false;
            }

            displacement += 1;
            slot += 1;
            if slot == self.capacity {
                slot = 0;
            }
            tries -= 1;
            if tries == 0 {
                return Err(Error::Capacity {
                    entries: header.num_entries,
                    capacity: self.capacity,
                });
            }
        }
    }

    /// Removes `key` if present, backward-shifting the probe chain so that
    /// Robin-Hood ordering survives without tombstones. A miss is a no-op.
    pub(crate) fn delete(
        &self,
        slots: &mut [u8],
        log: &mut BlockInput,
        key_buf: &mut [u8],
        header: &mut IndexHeader,
        key: &[u8],
    ) -> Result<()> {
        let hash = self.hash_kind.hash(key, self.hash_seed);
        let mut slot = self.home_slot(hash);
        let mut displacement = 0u64;

        loop {
            let (stored_hash, stored_packed) = self.read_slot(slots, slot);
            if stored_packed == 0 {
                return Ok(());
            }

            if hash == stored_hash {
                let stored_entry_index = stored_packed & self.entry_block_mask();
                let stored_position = stored_packed >> self.entry_block_bits;
                if let Some((stored_key_len, stored_value_len)) =
                    self.resolve_key(log, key_buf, key, stored_position, stored_entry_index)?
                {
                    loop {
                        let next_slot = if slot + 1 == self.capacity { 0 } else { slot + 1 };
                        let (next_hash, next_packed) = self.read_slot(slots, next_slot);
                        if next_packed == 0 {
                            break;
                        }
                        if self.home_slot(next_hash) == next_slot {
                            break;
                        }
                        self.write_slot(slots, slot, next_hash, next_packed);
                        slot = next_slot;
                    }
                    self.write_slot(slots, slot, 0, 0);
                    header.deleted_entry(stored_key_len, stored_value_len);
                    return Ok(());
                }
            }

            let other_displacement = self.displacement(slot, stored_hash);
            if displacement > other_displacement {
                return Ok(());
            }
            displacement += 1;
            slot += 1;
            if slot == self.capacity {
                slot = 0;
            }
        }
    }

    /// Probes for `key`. On a hit the cursor is left at the value's first
    /// byte and the key bytes sit in `key_buf`.
    pub(crate) fn lookup(
        &self,
        slots: &[u8],
        log: &mut BlockInput,
        key_buf: &mut [u8],
        key: &[u8],
    ) -> Result<Option<LookupHit>> {
        let hash = self.hash_kind.hash(key, self.hash_seed);
        let mut slot = self.home_slot(hash);
        let mut displacement = 0u64;

        loop {
            let (stored_hash, stored_packed) = self.read_slot(slots, slot);
            if stored_packed == 0 {
                return Ok(None);
            }

            if hash == stored_hash {
                let stored_entry_index = stored_packed & self.entry_block_mask();
                let stored_position = stored_packed >> self.entry_block_bits;
                if let Some((key_len, value_len)) =
                    self.resolve_key(log, key_buf, key, stored_position, stored_entry_index)?
                {
                    return Ok(Some(LookupHit { key_len, value_len }));
                }
            }

            let other_displacement = self.displacement(slot, stored_hash);
            if displacement > other_displacement {
                return Ok(None);
            }
            displacement += 1;
            slot += 1;
            if slot == self.capacity {
                slot = 0;
            }
        }
    }

    /// True iff the live slot for `key` references exactly the log entry at
    /// `(position, entry_index)`. Pure slot-array check; the log is never
    /// touched, which makes it cheap enough to call per iterated entry.
    pub(crate) fn is_at(
        &self,
        slots: &[u8],
        key: &[u8],
        position: u64,
        entry_index: u64,
    ) -> bool {
        let hash = self.hash_kind.hash(key, self.hash_seed);
        let mut slot = self.home_slot(hash);
        let mut displacement = 0u64;

        loop {
            let (stored_hash, stored_packed) = self.read_slot(slots, slot);
            if stored_packed == 0 {
                return false;
            }

            let stored_entry_index = stored_packed & self.entry_block_mask();
            let stored_position = stored_packed >> self.entry_block_bits;
            if hash == stored_hash
                && stored_position == position
                && stored_entry_index == entry_index
            {
                return true;
            }

            let other_displacement = self.displacement(slot, stored_hash);
            if displacement > other_displacement {
                return false;
            }
            displacement += 1;
            slot += 1;
            if slot == self.capacity {
                slot = 0;
            }
        }
    }

    /// Seeks the log to a candidate entry and compares its key to `key`.
    ///
    /// Returns the stored entry's `(key_len, value_len)` on a match; the
    /// cursor then rests at the value's first byte with the stored key in
    /// `key_buf`. On a length or byte mismatch the cursor state is
    /// meaningless and the caller re-seeks for the next candidate.
    fn resolve_key(
        &self,
        log: &mut BlockInput,
        key_buf: &mut [u8],
        key: &[u8],
        position: u64,
        entry_index: u64,
    ) -> Result<Option<(u64, u64)>> {
        log.seek(position);
        skip_entries(log, entry_index)?;

        let key_len_plus_one = log.read_vlq()?;
        if key_len_plus_one == 0 {
            return Err(Error::Corruption(
                "index references a delete tombstone".into(),
            ));
        }
        let stored_key_len = key_len_plus_one - 1;
        let value_len = log.read_vlq()?;
        if stored_key_len != key.len() as u64 {
            return Ok(None);
        }
        if stored_key_len > key_buf.len() as u64 {
            return Err(Error::Corruption(format!(
                "stored key length {stored_key_len} exceeds the index's maximum"
            )));
        }
        let scratch = &mut key_buf[..stored_key_len as usize];
        log.read_fully(scratch)?;
        if &scratch[..] == key {
            Ok(Some((stored_key_len, value_len)))
        } else {
            Ok(None)
        }
    }

    /// Single forward pass over the slot array: accumulates displacement
    /// totals and counts adjacent non-empty slots sharing a hash, including
    /// the first/last pair when the ring wraps.
    pub fn displacement_scan(&self, slots: &[u8]) -> DisplacementScan {
        let mut scan = DisplacementScan::default();

        let mut prev_hash = 0u64;
        let mut has_prev = false;
        let mut first_hash = 0u64;
        let mut has_first = false;
        let mut last_hash = 0u64;
        let mut has_last = false;

        for slot in 0..self.capacity {
            let (hash, packed) = self.read_slot(slots, slot);
            if packed == 0 {
                has_prev = false;
                continue;
            }
            if has_prev && prev_hash == hash {
                scan.hash_collisions += 1;
            }
            prev_hash = hash;
            has_prev = true;

            let displacement = self.displacement(slot, hash);
            scan.total_displacement += displacement;
            scan.max_displacement = scan.max_displacement.max(displacement);

            if slot == 0 {
                first_hash = hash;
                has_first = true;
            }
            if slot == self.capacity - 1 {
                last_hash = hash;
                has_last = true;
            }
        }

        if has_first && has_last && first_hash == last_hash && self.capacity > 1 {
            scan.hash_collisions += 1;
        }
        scan
    }
}

/// Skips `count` entries from the cursor's current in-block position by
/// walking their framing: a zero key-length marks a tombstone whose key
/// rides in the value field.
pub(crate) fn skip_entries(log: &mut BlockInput, count: u64) -> Result<()> {
    for _ in 0..count {
        let key_len_plus_one = log.read_vlq()?;
        let value_len = log.read_vlq()?;
        if key_len_plus_one == 0 {
            log.skip(value_len)?;
        } else {
            log.skip(key_len_plus_one - 1 + value_len)?;
        }
    }
    Ok(())
}
