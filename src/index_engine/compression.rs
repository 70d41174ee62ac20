use crate::index_engine::error::{Error, Result};

/// Block compression applied to the log payload.
///
/// Uncompressed logs address entries directly by byte offset; compressed
/// logs group entries into blocks and address them by block offset plus an
/// in-block entry index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Zstd,
}

impl CompressionType {
    pub(crate) fn from_u32(raw: u32) -> Result<Self> {
        match raw {
            0 => Ok(Self::None),
            1 => Ok(Self::Zstd),
            other => Err(Error::Corruption(format!(
                "unknown compression type {other}"
            ))),
        }
    }

    pub(crate) fn as_u32(self) -> u32 {
        match self {
            Self::None => 0,
            Self::Zstd => 1,
        }
    }

    /// Compresses one block of entry data.
    pub(crate) fn compress(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(input.to_vec()),
            Self::Zstd => Ok(zstd::bulk::compress(input, zstd::DEFAULT_COMPRESSION_LEVEL)?),
        }
    }

    /// Decompresses one block. The zstd frame carries its own content size,
    /// so no capacity hint is needed.
    pub(crate) fn decompress(self, input: &[u8]) -> Result<Vec<u8>> {
        match self {
            Self::None => Ok(input.to_vec()),
            Self::Zstd => zstd::decode_all(input).map_err(|e| {
                Error::Corruption(format!("failed to decompress log block: {e}"))
            }),
        }
    }
}
