use std::io;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by log and index operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An on-disk structure failed validation: mismatched identifiers, a
    /// reference past the data end, a bad size, or unparseable framing.
    #[error("corrupt file: {0}")]
    Corruption(String),

    /// The builder ran out of slots. Cannot happen while the sparsity floor
    /// holds; treated as fatal corruption of the input log.
    #[error("no free slots in the hash: {entries} >= {capacity}")]
    Capacity { entries: u64, capacity: u64 },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// A bounded value stream was read past its remaining byte count.
    #[error("read past the end of the value stream")]
    Eof,

    /// `value_bytes` was asked to materialize a value that does not fit in a
    /// contiguous in-memory buffer. The streaming read remains available.
    #[error("value is {len} bytes, too large for a contiguous buffer")]
    ValueTooLarge { len: u64 },
}

impl From<Error> for io::Error {
    fn from(err: Error) -> io::Error {
        match err {
            Error::Io(e) => e,
            Error::Eof => io::Error::new(io::ErrorKind::UnexpectedEof, err.to_string()),
            Error::Corruption(_) => io::Error::new(io::ErrorKind::InvalidData, err.to_string()),
            other => io::Error::other(other.to_string()),
        }
    }
}
