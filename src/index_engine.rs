pub mod constants;

mod error;
pub use error::*;

mod vlq;

mod compression;
pub use compression::CompressionType;

mod log_header;
pub use log_header::*;

mod log_writer;
pub use log_writer::*;

mod log_iterator;
pub use log_iterator::*;

mod block_input;
pub use block_input::*;

mod slot_codec;
pub use slot_codec::*;

mod slot_buffer;
pub use slot_buffer::*;

mod hash_table;
pub use hash_table::{DisplacementScan, SlotLayout};

mod index_header;
pub use index_header::*;

mod index_builder;
pub use index_builder::*;

mod index_reader;
pub use index_reader::*;
