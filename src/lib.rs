//! # Logdex
//!
//! An embedded, read-optimized key-value store built from two on-disk
//! artifacts:
//! - an **append-only log** holding the authoritative record of PUT and
//!   DELETE operations, optionally zstd block-compressed, and
//! - a **static hash index** over a log prefix, giving O(1) point lookups
//!   through a memory-mapped Robin-Hood table.
//!
//! ## Features
//! - **Zero-copy reads**: both files are memory-mapped with `memmap2`;
//!   values stream straight out of the mapping.
//! - **Robin-Hood probing**: displacement-ordered slots let lookups stop
//!   early without tombstones; deletions backward-shift in place.
//! - **Compact slots**: 4- or 8-byte hashes and packed block addresses,
//!   chosen per log at build time.
//! - **Block compression**: logs can trade read latency for space with
//!   zstd-compressed entry blocks, transparently decompressed on lookup.
//!
//! ## Example Usage
//! ```rust
//! use logdex::{IndexBuilder, IndexReader, LogWriter, LogWriterOptions};
//!
//! let dir = std::env::temp_dir().join("logdex-doc-example");
//! std::fs::create_dir_all(&dir).unwrap();
//! let log_path = dir.join("example.log");
//! let index_path = dir.join("example.idx");
//!
//! // Write a log
//! let mut writer = LogWriter::create(&log_path, LogWriterOptions::default()).unwrap();
//! writer.put(b"key1", b"value1").unwrap();
//! writer.put(b"key2", b"value2").unwrap();
//! writer.put(b"key1", b"value1-updated").unwrap();
//! writer.delete(b"key2").unwrap();
//! writer.flush().unwrap();
//!
//! // Build its index
//! IndexBuilder::new().build(&log_path, &index_path).unwrap();
//!
//! // Point lookups
//! let mut reader = IndexReader::open(&index_path, &log_path).unwrap();
//! let mut entry = reader.get(b"key1").unwrap().unwrap();
//! assert_eq!(entry.value_bytes().unwrap(), b"value1-updated");
//! assert!(reader.get(b"key2").unwrap().is_none());
//! ```
//!
//! ## Modules
//! - `index_engine` - Log and index file formats, builder, and reader.
//!
//! ## Safety Notes
//! - A log must be quiescent for the prefix being indexed; builds and reads
//!   take no cross-process locks.
//! - Reader handles are single-threaded; use `duplicate()` per thread.

pub mod index_engine;

pub use index_engine::*;
