//! Single-process micro-benchmarks for the log + hash index pair. Writes
//! 500 K entries, builds the index, then exercises sequential and random
//! lookup paths.

use logdex::{IndexBuilder, IndexReader, LogWriter, LogWriterOptions};
use rand::{Rng, rng};
use std::path::Path;
use std::time::Instant;
use tempfile::tempdir;
use thousands::Separable;

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

const NUM_ENTRIES: usize = 500_000;
const NUM_RANDOM_CHECKS: usize = 500_000;
const VALUE_SIZE: usize = 32;

// ---------------------------------------------------------------------------
// main
// ---------------------------------------------------------------------------

fn main() {
    let dir = tempdir().expect("Failed to create temp dir");
    let log_path = dir.path().join("bench.log");
    let index_path = dir.path().join("bench.idx");

    println!("Running index benchmark…");
    benchmark_log_writes(&log_path);
    benchmark_index_build(&log_path, &index_path);
    benchmark_sequential_reads(&log_path, &index_path);
    benchmark_random_reads(&log_path, &index_path);
    println!("✅ Benchmarks completed.");
}

fn benchmark_log_writes(log_path: &Path) {
    let mut writer =
        LogWriter::create(log_path, LogWriterOptions::default()).expect("Failed to create log");
    let value = vec![0xABu8; VALUE_SIZE];

    let start = Instant::now();
    for i in 0..NUM_ENTRIES {
        writer
            .put(format!("key-{i}").as_bytes(), &value)
            .expect("Failed to put");
    }
    writer.flush().expect("Failed to flush");
    let elapsed = start.elapsed();

    println!(
        "Wrote {} entries in {:.2?} ({} entries/s)",
        NUM_ENTRIES.separate_with_commas(),
        elapsed,
        ((NUM_ENTRIES as f64 / elapsed.as_secs_f64()) as u64).separate_with_commas()
    );
}

fn benchmark_index_build(log_path: &Path, index_path: &Path) {
    let start = Instant::now();
    let header = IndexBuilder::new()
        .build(log_path, index_path)
        .expect("Build failed");
    let elapsed = start.elapsed();

    println!(
        "Built index over {} puts in {:.2?} (max displacement {})",
        header.num_puts.separate_with_commas(),
        elapsed,
        header.max_displacement
    );
}

fn benchmark_sequential_reads(log_path: &Path, index_path: &Path) {
    let mut reader = IndexReader::open(index_path, log_path).expect("Open failed");

    let start = Instant::now();
    for i in 0..NUM_ENTRIES {
        let entry = reader
            .get(format!("key-{i}").as_bytes())
            .expect("Lookup failed")
            .expect("Key missing");
        assert_eq!(entry.value_len() as usize, VALUE_SIZE);
    }
    let elapsed = start.elapsed();

    println!(
        "Sequential: {} lookups in {:.2?} ({} lookups/s)",
        NUM_ENTRIES.separate_with_commas(),
        elapsed,
        ((NUM_ENTRIES as f64 / elapsed.as_secs_f64()) as u64).separate_with_commas()
    );
}

fn benchmark_random_reads(log_path: &Path, index_path: &Path) {
    let mut reader = IndexReader::open(index_path, log_path).expect("Open failed");
    let mut rng = rng();

    let start = Instant::now();
    for _ in 0..NUM_RANDOM_CHECKS {
        let i = rng.random_range(0..NUM_ENTRIES);
        let entry = reader
            .get(format!("key-{i}").as_bytes())
            .expect("Lookup failed")
            .expect("Key missing");
        assert_eq!(entry.value_len() as usize, VALUE_SIZE);
    }
    let elapsed = start.elapsed();

    println!(
        "Random: {} lookups in {:.2?} ({} lookups/s)",
        NUM_RANDOM_CHECKS.separate_with_commas(),
        elapsed,
        ((NUM_RANDOM_CHECKS as f64 / elapsed.as_secs_f64()) as u64).separate_with_commas()
    );
}
