use std::io::Write;

use crate::index_engine::error::Result;

/// Mutable zeroed byte region holding the slot array while an index is
/// built. Zero bytes are exactly the empty-slot encoding, so a fresh buffer
/// is a valid empty table. Dropped after the flush.
pub struct SlotBuffer {
    data: Vec<u8>,
}

impl SlotBuffer {
    pub fn zeroed(len: usize) -> Self {
        Self {
            data: vec![0u8; len],
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.data)?;
        Ok(())
    }
}
