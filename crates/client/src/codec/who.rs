use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};

const MAX_LEVEL: u32 = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhoQuery {
    pub name: Option<String>,
    pub guild: Option<String>,
    pub min_level: Option<u32>,
    pub max_level: Option<u32>,
}

impl WhoQuery {
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// `CMSG_WHO`: level range, name, guild, race and class masks, zones, search strings.
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = PacketWriter::new();
        writer
            .u32_le(self.min_level.unwrap_or(0))
            .u32_le(self.max_level.unwrap_or(MAX_LEVEL))
            .cstring(self.name.as_deref().unwrap_or(""))
            .cstring(self.guild.as_deref().unwrap_or(""))
            .u32_le(u32::MAX)
            .u32_le(u32::MAX)
            .u32_le(0)
            .u32_le(0);
        writer.into_inner()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoEntry {
    pub name: String,
    pub guild: String,
    pub level: u32,
    pub class: u32,
    pub race: u32,
    pub gender: u8,
    pub zone: u32,
}

pub fn decode_who(body: &[u8]) -> PacketResult<Vec<WhoEntry>> {
    let mut reader = PacketReader::new(body);
    let displayed = reader.u32_le()?;
    let _total = reader.u32_le()?;
    (0..displayed)
        .map(|_| {
            Ok(WhoEntry {
                name: reader.cstring()?,
                guild: reader.cstring()?,
                level: reader.u32_le()?,
                class: reader.u32_le()?,
                race: reader.u32_le()?,
                gender: reader.u8()?,
                zone: reader.u32_le()?,
            })
        })
        .collect()
}
