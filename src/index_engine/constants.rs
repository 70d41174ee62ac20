// Fixed header sizes for both on-disk artifacts
pub const LOG_HEADER_SIZE: usize = 64;
pub const INDEX_HEADER_SIZE: usize = 120;

// "LGDX" / "LDXH"
pub const LOG_MAGIC: u32 = 0x4C47_4458;
pub const INDEX_MAGIC: u32 = 0x4C44_5848;

pub const FORMAT_VERSION: u32 = 1;

// Slots-per-entry ratio never drops below this; guarantees at least one
// empty slot in every index.
pub const MIN_SPARSITY: f64 = 1.3;

// Uncompressed fill at which a compression block is cut
pub const DEFAULT_COMPRESSION_BLOCK_SIZE: u32 = 4096;

// Logs with fewer PUTs than this default to 32-bit slot hashes
pub const HASH_32_CUTOFF: u64 = 1 << 23;

// Key scratch buffers are at least this large regardless of max_key_len
pub const MIN_KEY_SCRATCH: usize = 1024;
