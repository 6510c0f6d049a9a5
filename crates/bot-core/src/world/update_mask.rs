use std::collections::BTreeMap;

use crate::packet::{PacketError, PacketReader, PacketResult, PacketWriter};

/// The block count is a single byte, so 255 blocks of 32 bits is the widest mask on the wire.
pub const MAX_BLOCKS: usize = u8::MAX as usize;

/// Sparse field values carried by a values or create update block, keyed by field index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMask {
    values: BTreeMap<u16, u32>,
}

impl UpdateMask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a block count, that many bitmask words, then one value per set bit in ascending
    /// index order.
    pub fn read(reader: &mut PacketReader<'_>) -> PacketResult<Self> {
        let block_count = reader.u8()? as usize;
        let mut blocks = Vec::with_capacity(block_count);
        for _ in 0..block_count {
            blocks.push(reader.u32_le()?);
        }

        let mut values = BTreeMap::new();
        for (block, bits) in blocks.into_iter().enumerate() {
            for bit in 0..32 {
                if bits & (1 << bit) != 0 {
                    let index = (block * 32 + bit) as u16;
                    values.insert(index, reader.u32_le()?);
                }
            }
        }

        Ok(Self { values })
    }

    /// Fails without writing anything when an index lies past the last encodable block.
    pub fn write(&self, writer: &mut PacketWriter) -> PacketResult<()> {
        let block_count = self
            .values
            .keys()
            .next_back()
            .map(|last| *last as usize / 32 + 1)
            .unwrap_or(0);
        let count_byte = u8::try_from(block_count).map_err(|_| {
            PacketError::Layout(format!(
                "update mask needs {block_count} blocks, at most {MAX_BLOCKS} fit"
            ))
        })?;
        let mut blocks = vec![0u32; block_count];
        for index in self.values.keys() {
            blocks[*index as usize / 32] |= 1 << (index % 32);
        }

        writer.u8(count_byte);
        for block in blocks {
            writer.u32_le(block);
        }
        for value in self.values.values() {
            writer.u32_le(*value);
        }
        Ok(())
    }

    pub fn set(&mut self, index: u16, value: u32) -> &mut Self {
        self.values.insert(index, value);
        self
    }

    pub fn set_u64(&mut self, index: u16, value: u64) -> &mut Self {
        self.values.insert(index, value as u32);
        self.values.insert(index + 1, (value >> 32) as u32);
        self
    }

    pub fn set_f32(&mut self, index: u16, value: f32) -> &mut Self {
        self.values.insert(index, value.to_bits());
        self
    }

    pub fn get(&self, index: u16) -> Option<u32> {
        self.values.get(&index).copied()
    }

    pub fn contains(&self, index: u16) -> bool {
        self.values.contains_key(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.values.iter().map(|(k, v)| (*k, *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
