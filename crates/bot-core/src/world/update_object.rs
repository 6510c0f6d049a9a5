use std::io::Read;

use flate2::read::ZlibDecoder;

use super::fields::ObjectType;
use super::movement::MovementBlock;
use super::update_mask::UpdateMask;
use crate::packet::{PacketError, PacketReader, PacketResult};

pub const UPDATETYPE_VALUES: u8 = 0;
pub const UPDATETYPE_MOVEMENT: u8 = 1;
pub const UPDATETYPE_CREATE_OBJECT: u8 = 2;
pub const UPDATETYPE_CREATE_OBJECT2: u8 = 3;
pub const UPDATETYPE_OUT_OF_RANGE_OBJECTS: u8 = 4;
pub const UPDATETYPE_NEAR_OBJECTS: u8 = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateBlock {
    Values {
        guid: u64,
        mask: UpdateMask,
    },
    Movement {
        guid: u64,
        movement: MovementBlock,
    },
    /// Both create variants; `spawned` is set for `CREATE_OBJECT2`.
    Create {
        guid: u64,
        object_type: ObjectType,
        movement: MovementBlock,
        mask: UpdateMask,
        spawned: bool,
    },
    OutOfRange {
        guids: Vec<u64>,
    },
    NearObjects {
        guids: Vec<u64>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateObject {
    pub blocks: Vec<UpdateBlock>,
}

impl UpdateObject {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let count = reader.u32_le()?;
        let mut blocks = Vec::new();
        for _ in 0..count {
            blocks.push(read_block(&mut reader)?);
        }
        Ok(Self { blocks })
    }

    /// `SMSG_COMPRESSED_UPDATE_OBJECT`: inflated size followed by a zlib stream of a plain body.
    pub fn decode_compressed(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let inflated_size = reader.u32_le()? as usize;
        let mut decoder = ZlibDecoder::new(reader.rest());
        let mut inflated = Vec::with_capacity(inflated_size.min(1 << 20));
        decoder
            .read_to_end(&mut inflated)
            .map_err(|e| PacketError::Decompress(e.to_string()))?;
        if inflated.len() != inflated_size {
            return Err(PacketError::Decompress(format!(
                "expected {inflated_size} bytes, inflated {}",
                inflated.len()
            )));
        }
        Self::decode(&inflated)
    }
}

fn read_guid_list(reader: &mut PacketReader<'_>) -> PacketResult<Vec<u64>> {
    let count = reader.u32_le()?;
    let mut guids = Vec::new();
    for _ in 0..count {
        guids.push(reader.packed_guid()?.0);
    }
    Ok(guids)
}

fn read_block(reader: &mut PacketReader<'_>) -> PacketResult<UpdateBlock> {
    let update_type = reader.u8()?;
    let block = match update_type {
        UPDATETYPE_VALUES => {
            let guid = reader.packed_guid()?.0;
            let mask = UpdateMask::read(reader)?;
            UpdateBlock::Values { guid, mask }
        }
        UPDATETYPE_MOVEMENT => {
            let guid = reader.packed_guid()?.0;
            let movement = reader.read_layout::<MovementBlock>()?;
            UpdateBlock::Movement { guid, movement }
        }
        UPDATETYPE_CREATE_OBJECT | UPDATETYPE_CREATE_OBJECT2 => {
            let guid = reader.packed_guid()?.0;
            let object_type = ObjectType::from(reader.u8()?);
            let movement = reader.read_layout::<MovementBlock>()?;
            let mask = UpdateMask::read(reader)?;
            UpdateBlock::Create {
                guid,
                object_type,
                movement,
                mask,
                spawned: update_type == UPDATETYPE_CREATE_OBJECT2,
            }
        }
        UPDATETYPE_OUT_OF_RANGE_OBJECTS => UpdateBlock::OutOfRange {
            guids: read_guid_list(reader)?,
        },
        UPDATETYPE_NEAR_OBJECTS => UpdateBlock::NearObjects {
            guids: read_guid_list(reader)?,
        },
        other => return Err(PacketError::UnknownUpdateType(other)),
    };
    Ok(block)
}

/// `SMSG_DESTROY_OBJECT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyObject {
    pub guid: u64,
    pub is_death: bool,
}

impl DestroyObject {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let guid = reader.u64_le()?;
        let is_death = reader.u8()? != 0;
        Ok(Self { guid, is_death })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    use super::*;
    use crate::packet::PacketWriter;
    use crate::world::fields::UNIT_FIELD_HEALTH;
    use crate::world::movement::{PackedGuid, UpdateFlags};

    fn sample_body() -> Vec<u8> {
        let mut w = PacketWriter::new();
        w.u32_le(4);

        // Creature spawn with a stationary position.
        w.u8(UPDATETYPE_CREATE_OBJECT2)
            .packed_guid(PackedGuid(0xF130_0000_0000_0101))
            .u8(3)
            .u16_le(UpdateFlags::HAS_POSITION.bits())
            .f32_le(1.0)
            .f32_le(2.0)
            .f32_le(3.0)
            .f32_le(0.0);
        let mut mask = UpdateMask::new();
        mask.set(0x03, 299).set(UNIT_FIELD_HEALTH, 55);
        mask.write(&mut w).unwrap();

        w.u8(UPDATETYPE_VALUES).packed_guid(PackedGuid(0xF130_0000_0000_0101));
        let mut mask = UpdateMask::new();
        mask.set(UNIT_FIELD_HEALTH, 54);
        mask.write(&mut w).unwrap();

        w.u8(UPDATETYPE_OUT_OF_RANGE_OBJECTS)
            .u32_le(2)
            .packed_guid(PackedGuid(7))
            .packed_guid(PackedGuid(8));

        w.u8(UPDATETYPE_NEAR_OBJECTS).u32_le(0);
        w.into_inner()
    }

    #[test]
    fn decodes_every_block_kind() {
        let update = UpdateObject::decode(&sample_body()).unwrap();
        assert_eq!(update.blocks.len(), 4);

        match &update.blocks[0] {
            UpdateBlock::Create {
                guid,
                object_type,
                movement,
                mask,
                spawned,
            } => {
                assert_eq!(*guid, 0xF130_0000_0000_0101);
                assert_eq!(*object_type, ObjectType::Unit);
                assert!(*spawned);
                assert_eq!(movement.position().unwrap().point.z, 3.0);
                assert_eq!(mask.get(UNIT_FIELD_HEALTH), Some(55));
            }
            other => panic!("unexpected block {other:?}"),
        }
        assert!(matches!(&update.blocks[1], UpdateBlock::Values { mask, .. } if mask.get(UNIT_FIELD_HEALTH) == Some(54)));
        assert_eq!(update.blocks[2], UpdateBlock::OutOfRange { guids: vec![7, 8] });
        assert_eq!(update.blocks[3], UpdateBlock::NearObjects { guids: vec![] });
    }

    #[test]
    fn movement_block_entry() {
        let mut w = PacketWriter::new();
        w.u32_le(1)
            .u8(UPDATETYPE_MOVEMENT)
            .packed_guid(PackedGuid(9))
            .u16_le(UpdateFlags::HAS_POSITION.bits())
            .f32_le(4.0)
            .f32_le(5.0)
            .f32_le(6.0)
            .f32_le(1.0);
        let update = UpdateObject::decode(w.as_slice()).unwrap();
        match &update.blocks[0] {
            UpdateBlock::Movement { guid, movement } => {
                assert_eq!(*guid, 9);
                assert_eq!(movement.position().unwrap().point.x, 4.0);
            }
            other => panic!("unexpected block {other:?}"),
        }
    }

    #[test]
    fn compressed_body_inflates_to_same_blocks() {
        let body = sample_body();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&body).unwrap();
        let compressed = encoder.finish().unwrap();

        let mut w = PacketWriter::new();
        w.u32_le(body.len() as u32).bytes(&compressed);
        let packed = UpdateObject::decode_compressed(w.as_slice()).unwrap();
        assert_eq!(packed, UpdateObject::decode(&body).unwrap());

        let mut w = PacketWriter::new();
        w.u32_le(body.len() as u32 + 1).bytes(&compressed);
        assert!(matches!(
            UpdateObject::decode_compressed(w.as_slice()),
            Err(PacketError::Decompress(_))
        ));
    }

    #[test]
    fn unknown_type_and_truncation_fail() {
        let err = UpdateObject::decode(&[1, 0, 0, 0, 9]).unwrap_err();
        assert_eq!(err, PacketError::UnknownUpdateType(9));

        let body = sample_body();
        let err = UpdateObject::decode(&body[..body.len() - 6]).unwrap_err();
        assert!(matches!(err, PacketError::OutOfBounds { .. }));
    }

    #[test]
    fn destroy_object_reads_guid_and_death_flag() {
        let mut w = PacketWriter::new();
        w.u64_le(0x42).u8(1);
        assert_eq!(
            DestroyObject::decode(w.as_slice()).unwrap(),
            DestroyObject {
                guid: 0x42,
                is_death: true
            }
        );
    }
}
