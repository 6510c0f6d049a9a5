//! World login sequence and keep-alive packets.

use binrw::BinRead;
use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};
use rusty_bot_core::world::{OrientedPoint3D, Point3D};
use sha1::{Digest, Sha1};

use crate::auth::packets::CLIENT_BUILD;
use crate::error::WorldAuthStatus;

pub const EQUIPMENT_SLOTS: usize = 23;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub server_seed: u32,
    pub seeds: [u8; 32],
}

impl AuthChallenge {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        reader.skip(4)?;
        Ok(Self {
            server_seed: reader.u32_le()?,
            seeds: reader.array()?,
        })
    }
}

/// `SHA1(account, 0u32, client_seed, server_seed, K)`.
pub fn auth_session_digest(
    account: &str,
    client_seed: u32,
    server_seed: u32,
    session_key: &[u8],
) -> [u8; 20] {
    let digest = Sha1::new()
        .chain_update(account.to_uppercase().as_bytes())
        .chain_update(0u32.to_le_bytes())
        .chain_update(client_seed.to_le_bytes())
        .chain_update(server_seed.to_le_bytes())
        .chain_update(session_key)
        .finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

pub fn build_auth_session(
    account: &str,
    client_seed: u32,
    realm_id: u32,
    digest: &[u8; 20],
) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(64 + account.len());
    writer
        .u32_le(u32::from(CLIENT_BUILD))
        .u32_le(0)
        .cstring(&account.to_uppercase())
        .u32_le(0)
        .u32_le(client_seed)
        .u32_le(0)
        .u32_le(0)
        .u32_le(realm_id)
        .u64_le(3)
        .bytes(digest)
        .u32_le(0);
    writer.into_inner()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResponse {
    Ok,
    Queued { position: u32 },
    Failed(WorldAuthStatus),
}

impl AuthResponse {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let status = reader.u8()?;
        Ok(match status {
            WorldAuthStatus::OK => Self::Ok,
            WorldAuthStatus::WAIT_QUEUE => Self::Queued {
                position: if reader.remaining() >= 4 {
                    reader.u32_le()?
                } else {
                    0
                },
            },
            other => Self::Failed(WorldAuthStatus(other)),
        })
    }
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct EquipmentSlot {
    pub display_id: u32,
    pub inventory_type: u8,
    pub enchant_aura: u32,
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct Appearance {
    pub skin: u8,
    pub face: u8,
    pub hair_style: u8,
    pub hair_color: u8,
    pub facial_hair: u8,
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq, Eq)]
#[br(little)]
pub struct PetInfo {
    pub display_id: u32,
    pub level: u32,
    pub family: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSummary {
    pub guid: u64,
    pub name: String,
    pub race: u8,
    pub class: u8,
    pub gender: u8,
    pub appearance: Appearance,
    pub level: u8,
    pub zone: u32,
    pub map: u32,
    pub position: Point3D,
    pub guild_id: u32,
    pub flags: u32,
    pub customization_flags: u32,
    pub first_login: bool,
    pub pet: PetInfo,
    pub equipment: Vec<EquipmentSlot>,
}

pub fn decode_char_enum(body: &[u8]) -> PacketResult<Vec<CharacterSummary>> {
    let mut reader = PacketReader::new(body);
    let count = reader.u8()?;
    let mut characters = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let guid = reader.u64_le()?;
        let name = reader.cstring()?;
        let race = reader.u8()?;
        let class = reader.u8()?;
        let gender = reader.u8()?;
        let appearance = reader.read_layout::<Appearance>()?;
        let level = reader.u8()?;
        let zone = reader.u32_le()?;
        let map = reader.u32_le()?;
        let position = reader.read_layout::<Point3D>()?;
        let guild_id = reader.u32_le()?;
        let flags = reader.u32_le()?;
        let customization_flags = reader.u32_le()?;
        let first_login = reader.u8()? != 0;
        let pet = reader.read_layout::<PetInfo>()?;
        let equipment = (0..EQUIPMENT_SLOTS)
            .map(|_| reader.read_layout::<EquipmentSlot>())
            .collect::<PacketResult<Vec<_>>>()?;
        characters.push(CharacterSummary {
            guid,
            name,
            race,
            class,
            gender,
            appearance,
            level,
            zone,
            map,
            position,
            guild_id,
            flags,
            customization_flags,
            first_login,
            pet,
            equipment,
        });
    }
    Ok(characters)
}

pub fn build_player_login(guid: u64) -> Vec<u8> {
    guid.to_le_bytes().to_vec()
}

#[derive(BinRead, Debug, Clone, Copy, PartialEq)]
#[br(little)]
pub struct LoginVerifyWorld {
    pub map: u32,
    pub position: OrientedPoint3D,
}

pub fn build_ping(sequence: u32, latency: u32) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(8);
    writer.u32_le(sequence).u32_le(latency);
    writer.into_inner()
}

pub fn decode_pong(body: &[u8]) -> PacketResult<u32> {
    PacketReader::new(body).u32_le()
}

pub fn decode_time_sync_request(body: &[u8]) -> PacketResult<u32> {
    PacketReader::new(body).u32_le()
}

pub fn build_time_sync_response(counter: u32, client_ticks: u32) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(8);
    writer.u32_le(counter).u32_le(client_ticks);
    writer.into_inner()
}
