#[cfg(test)]
mod tests {
    use logdex::constants::INDEX_HEADER_SIZE;
    use logdex::{
        IndexBuilder, IndexHeader, IndexReader, LogWriter, LogWriterOptions, SlotLayout,
    };
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};

    fn temp_paths() -> (TempDir, PathBuf, PathBuf) {
        let dir = tempdir().expect("Failed to create temp dir");
        let log = dir.path().join("test.log");
        let index = dir.path().join("test.idx");
        (dir, log, index)
    }

    /// Decoded view of every non-empty slot: (slot index, hash).
    fn occupied_slots(index_path: &Path, header: &IndexHeader) -> Vec<(u64, u64)> {
        let layout = SlotLayout::from_header(header);
        let bytes = std::fs::read(index_path).expect("Failed to read index");
        let slots = &bytes[INDEX_HEADER_SIZE..];
        let mut occupied = Vec::new();
        for slot in 0..layout.capacity {
            let pos = slot as usize * layout.slot_size();
            let hash = layout.hash_kind.read_hash(slots, pos);
            let packed = layout
                .address_size
                .read_address(slots, pos + layout.hash_kind.size());
            if packed != 0 {
                occupied.push((slot, hash));
            }
        }
        occupied
    }

    /// Asserts the Robin-Hood layout invariants and checks the header's
    /// displacement statistics against an independent pass.
    fn assert_invariants(index_path: &Path, header: &IndexHeader) {
        let layout = SlotLayout::from_header(header);
        let occupied = occupied_slots(index_path, header);

        assert_eq!(
            occupied.len() as u64,
            header.num_entries,
            "non-empty slot count must match the header"
        );

        let by_slot: HashMap<u64, u64> = occupied.iter().copied().collect();
        let mut total = 0u64;
        let mut max = 0u64;
        for &(slot, hash) in &occupied {
            let displacement = layout.displacement(slot, hash);
            total += displacement;
            max = max.max(displacement);
            assert!(
                displacement <= header.max_displacement,
                "slot {slot} displaced {displacement}, header max {}",
                header.max_displacement
            );

            // A displaced entry's chain may not contain a hole, and
            // displacements may only grow by one step at a time.
            if displacement > 0 {
                let prev_slot = if slot == 0 { layout.capacity - 1 } else { slot - 1 };
                let prev_hash = by_slot
                    .get(&prev_slot)
                    .unwrap_or_else(|| panic!("hole before displaced slot {slot}"));
                let prev_displacement = layout.displacement(prev_slot, *prev_hash);
                assert!(
                    displacement <= prev_displacement + 1,
                    "displacement jumped from {prev_displacement} to {displacement} at slot {slot}"
                );
            }
        }
        assert_eq!(total, header.total_displacement);
        assert_eq!(max, header.max_displacement);
    }

    #[test]
    fn test_invariants_hold_after_pure_inserts() {
        let (_dir, log, index) = temp_paths();
        let mut writer =
            LogWriter::create(&log, LogWriterOptions::default()).expect("Failed to create log");
        for i in 0..2_000u32 {
            writer
                .put(format!("key-{i}").as_bytes(), &i.to_le_bytes())
                .expect("Failed to put");
        }
        writer.flush().expect("Failed to flush");

        let header = IndexBuilder::new().build(&log, &index).expect("Build failed");
        assert_eq!(header.num_entries, 2_000);
        assert_invariants(&index, &header);
    }

    #[test]
    fn test_invariants_hold_after_random_workload() {
        let (_dir, log, index) = temp_paths();
        let mut rng = StdRng::seed_from_u64(0xC0FFEE);
        let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

        let mut writer =
            LogWriter::create(&log, LogWriterOptions::default()).expect("Failed to create log");
        for _ in 0..5_000 {
            let key = format!("key-{}", rng.random_range(0..800u32)).into_bytes();
            if rng.random_bool(0.3) {
                writer.delete(&key).expect("Failed to delete");
                model.remove(&key);
            } else {
                let value = format!("value-{}", rng.random::<u32>()).into_bytes();
                writer.put(&key, &value).expect("Failed to put");
                model.insert(key, value);
            }
        }
        writer.flush().expect("Failed to flush");

        let header = IndexBuilder::new()
            .hash_seed(7)
            .build(&log, &index)
            .expect("Build failed");
        assert_eq!(header.num_entries, model.len() as u64);
        assert_invariants(&index, &header);

        // Every surviving key resolves to its last-written value; every
        // deleted key misses.
        let mut reader = IndexReader::open(&index, &log).expect("Open failed");
        for (key, expected) in &model {
            let mut entry = reader
                .get(key)
                .expect("Lookup failed")
                .unwrap_or_else(|| panic!("missing key {}", String::from_utf8_lossy(key)));
            assert_eq!(&entry.value_bytes().expect("Failed to read value"), expected);
        }
        for i in 0..800u32 {
            let key = format!("key-{i}").into_bytes();
            if !model.contains_key(&key) {
                assert!(reader.get(&key).expect("Lookup failed").is_none());
            }
        }
    }

    #[test]
    fn test_displacement_scan_counts_adjacent_and_ring_collisions() {
        // Hand-built slot array: capacity 5, 8-byte slots (32-bit hash and
        // address). Slots 0, 1, 2 and 4 occupied; 0 and 1 share a hash, and
        // 4 wraps around to share one with 0.
        let header_template = {
            let (_dir, log, index) = temp_paths();
            let mut writer = LogWriter::create(&log, LogWriterOptions::default())
                .expect("Failed to create log");
            writer.put(b"k", b"v").expect("Failed to put");
            writer.flush().expect("Failed to flush");
            IndexBuilder::new().build(&log, &index).expect("Build failed")
        };
        let mut header = header_template;
        header.hash_capacity = 5;
        let layout = SlotLayout::from_header(&header);
        assert_eq!(layout.slot_size(), 8);

        let mut slots = vec![0u8; 5 * 8];
        let mut write = |slot: usize, hash: u64, packed: u64| {
            layout.hash_kind.write_hash(hash, &mut slots, slot * 8);
            layout
                .address_size
                .write_address(packed, &mut slots, slot * 8 + 4);
        };
        write(0, 10, 100); // home 0
        write(1, 10, 200); // same hash, displaced by 1
        write(2, 7, 300); // home 2
        write(4, 10, 400); // home 0, wrapped predecessor of slot 0

        let scan = layout.displacement_scan(&slots);
        // Adjacent pair (0,1) plus the ring pair (4,0)
        assert_eq!(scan.hash_collisions, 2);
        // Displacements: slot0 hash10 -> 0, slot1 hash10 -> 1, slot2 -> 0,
        // slot4 hash10 -> 4
        assert_eq!(scan.total_displacement, 5);
        assert_eq!(scan.max_displacement, 4);
    }

    #[test]
    fn test_mod_capacity_collisions_stay_retrievable() {
        // With a tiny table, distinct hashes constantly share home slots;
        // every key must still resolve through displaced probes.
        let (_dir, log, index) = temp_paths();
        let mut writer =
            LogWriter::create(&log, LogWriterOptions::default()).expect("Failed to create log");
        for i in 0..50u32 {
            writer
                .put(format!("collide-{i}").as_bytes(), &i.to_le_bytes())
                .expect("Failed to put");
        }
        writer.flush().expect("Failed to flush");

        let header = IndexBuilder::new()
            .sparsity(1.3)
            .hash_seed(99)
            .build(&log, &index)
            .expect("Build failed");
        assert_invariants(&index, &header);

        let mut reader = IndexReader::open(&index, &log).expect("Open failed");
        for i in 0..50u32 {
            let mut entry = reader
                .get(format!("collide-{i}").as_bytes())
                .expect("Lookup failed")
                .expect("key must be present");
            assert_eq!(entry.value_bytes().unwrap(), i.to_le_bytes());
        }
    }

    #[test]
    fn test_interleaved_deletes_preserve_chains() {
        let (_dir, log, index) = temp_paths();
        let mut writer =
            LogWriter::create(&log, LogWriterOptions::default()).expect("Failed to create log");
        for i in 0..300u32 {
            writer
                .put(format!("key-{i}").as_bytes(), &i.to_le_bytes())
                .expect("Failed to put");
        }
        // Delete every third key after the fact
        for i in (0..300u32).step_by(3) {
            writer.delete(format!("key-{i}").as_bytes()).expect("Failed to delete");
        }
        writer.flush().expect("Failed to flush");

        let header = IndexBuilder::new().build(&log, &index).expect("Build failed");
        assert_eq!(header.num_entries, 200);
        assert_invariants(&index, &header);

        let mut reader = IndexReader::open(&index, &log).expect("Open failed");
        for i in 0..300u32 {
            let key = format!("key-{i}");
            let found = reader.get(key.as_bytes()).expect("Lookup failed").is_some();
            assert_eq!(found, i % 3 != 0, "wrong liveness for {key}");
        }
    }
}
