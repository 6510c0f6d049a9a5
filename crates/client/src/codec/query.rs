//! Name, creature and game-object queries.

use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};

const ENTRY_NOT_FOUND: u32 = 0x8000_0000;

pub fn build_name_query(guid: u64) -> Vec<u8> {
    guid.to_le_bytes().to_vec()
}

/// `CMSG_CREATURE_QUERY` and `CMSG_GAMEOBJECT_QUERY` share a layout.
pub fn build_entry_query(entry: u32, guid: u64) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(12);
    writer.u32_le(entry).u64_le(guid);
    writer.into_inner()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameInfo {
    pub name: String,
    pub realm: String,
    pub race: u8,
    pub gender: u8,
    pub class: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameQueryResponse {
    pub guid: u64,
    /// `None` when the server does not know the guid.
    pub info: Option<NameInfo>,
}

impl NameQueryResponse {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let guid = reader.packed_guid()?.0;
        if reader.u8()? != 0 {
            return Ok(Self { guid, info: None });
        }
        let name = reader.cstring()?;
        let realm = reader.cstring()?;
        let race = reader.u8()?;
        let gender = reader.u8()?;
        let class = reader.u8()?;
        Ok(Self {
            guid,
            info: Some(NameInfo {
                name,
                realm,
                race,
                gender,
                class,
            }),
        })
    }
}

/// Entry plus first name of a creature or game-object template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateName {
    pub entry: u32,
    pub name: Option<String>,
}

pub fn decode_creature_response(body: &[u8]) -> PacketResult<TemplateName> {
    let mut reader = PacketReader::new(body);
    let entry = reader.u32_le()?;
    if entry & ENTRY_NOT_FOUND != 0 {
        return Ok(TemplateName {
            entry: entry & !ENTRY_NOT_FOUND,
            name: None,
        });
    }
    Ok(TemplateName {
        entry,
        name: Some(reader.cstring()?),
    })
}

pub fn decode_gameobject_response(body: &[u8]) -> PacketResult<TemplateName> {
    let mut reader = PacketReader::new(body);
    let entry = reader.u32_le()?;
    if entry & ENTRY_NOT_FOUND != 0 {
        return Ok(TemplateName {
            entry: entry & !ENTRY_NOT_FOUND,
            name: None,
        });
    }
    let _go_type = reader.u32_le()?;
    let _display_id = reader.u32_le()?;
    Ok(TemplateName {
        entry,
        name: Some(reader.cstring()?),
    })
}
