use clap::{Parser, Subcommand};
use logdex::{HashKind, IndexBuilder, IndexReader};
use std::io::{self, Write};
use std::path::PathBuf;

/// Log + hash index key-value store CLI
#[derive(Parser)]
#[command(
    name = "logdex",
    version,
    about = "Read-optimized key-value store: append-only log plus a static hash index"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the hash index for a log file
    Build {
        /// Path to the log file
        log: PathBuf,
        /// Path for the index file
        index: PathBuf,
        /// Slot hash width in bits (32 or 64); chosen from the log size when omitted
        #[arg(long)]
        hash_bits: Option<u32>,
        /// Slots allocated per PUT entry (floored at 1.3)
        #[arg(long, default_value_t = 1.3)]
        sparsity: f64,
        /// Sync the index file to disk before exiting
        #[arg(long)]
        fsync: bool,
    },

    /// Read the value associated with a key
    Get {
        /// Path to the index file
        index: PathBuf,
        /// Path to the log file
        log: PathBuf,
        /// The key to look up
        key: String,
    },

    /// Print index header fields and statistics
    Info {
        /// Path to the index file
        index: PathBuf,
        /// Path to the log file
        log: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Build {
            log,
            index,
            hash_bits,
            sparsity,
            fsync,
        } => {
            let mut builder = IndexBuilder::new().sparsity(*sparsity).fsync(*fsync);
            match hash_bits {
                Some(32) => builder = builder.hash_kind(HashKind::Bits32),
                Some(64) => builder = builder.hash_kind(HashKind::Bits64),
                Some(other) => {
                    eprintln!("Error: --hash-bits must be 32 or 64, got {other}");
                    std::process::exit(1);
                }
                None => {}
            }
            let header = builder.build(log, index).expect("Failed to build index");
            println!(
                "Indexed {} live entries ({} puts in log, capacity {})",
                header.num_entries, header.num_puts, header.hash_capacity
            );
        }
        Commands::Get { index, log, key } => {
            let mut reader = IndexReader::open(index, log).expect("Failed to open index");
            match reader.get(key.as_bytes()).expect("Lookup failed") {
                Some(mut entry) => {
                    let stdout = io::stdout();
                    let mut out = stdout.lock();
                    io::copy(&mut entry, &mut out).expect("Failed to write value");
                    out.flush().expect("Failed to flush output");
                }
                None => {
                    eprintln!("Error: Key '{key}' not found");
                    std::process::exit(1);
                }
            }
        }
        Commands::Info { index, log } => {
            let reader = IndexReader::open(index, log).expect("Failed to open index");
            let header = reader.header();
            println!("file identifier:     {:#010x}", header.file_identifier);
            println!("data end:            {}", header.data_end);
            println!("hash:                {} bits", header.hash_kind.size() * 8);
            println!("address:             {} bits", header.address_size.size() * 8);
            println!("capacity:            {}", header.hash_capacity);
            println!("live entries:        {}", header.num_entries);
            println!("puts in log:         {}", header.num_puts);
            println!("entry block bits:    {}", header.entry_block_bits);
            println!("max displacement:    {}", header.max_displacement);
            println!("total displacement:  {}", header.total_displacement);
            println!("hash collisions:     {}", header.hash_collisions);
            println!("live key bytes:      {}", header.total_key_bytes);
            println!("live value bytes:    {}", header.total_value_bytes);
        }
    }
}
