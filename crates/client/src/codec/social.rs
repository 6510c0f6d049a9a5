//! Friend list packets. Area, level and class only follow a non-zero (online, AFK, DND) status.

use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};
use rusty_bot_core::world::{FriendEntry, FriendUpdate};

const SOCIAL_FLAG_FRIEND: u32 = 0x01;
const CONTACT_LIST_ALL: u32 = 0x07;

pub const FRIEND_DB_ERROR: u8 = 0x00;
pub const FRIEND_LIST_FULL: u8 = 0x01;
pub const FRIEND_ONLINE: u8 = 0x02;
pub const FRIEND_OFFLINE: u8 = 0x03;
pub const FRIEND_NOT_FOUND: u8 = 0x04;
pub const FRIEND_REMOVED: u8 = 0x05;
pub const FRIEND_ADDED_ONLINE: u8 = 0x06;
pub const FRIEND_ADDED_OFFLINE: u8 = 0x07;
pub const FRIEND_ALREADY: u8 = 0x08;
pub const FRIEND_SELF: u8 = 0x09;
pub const FRIEND_ENEMY: u8 = 0x0A;

pub fn build_contact_list_request() -> Vec<u8> {
    CONTACT_LIST_ALL.to_le_bytes().to_vec()
}

pub fn build_add_friend(name: &str, note: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.cstring(name).cstring(note);
    writer.into_inner()
}

pub fn build_del_friend(guid: u64) -> Vec<u8> {
    guid.to_le_bytes().to_vec()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Presence {
    status: u8,
    area: u32,
    level: u32,
    class: u32,
}

fn read_presence(reader: &mut PacketReader<'_>) -> PacketResult<Presence> {
    let status = reader.u8()?;
    if status == 0 {
        return Ok(Presence::default());
    }
    Ok(Presence {
        status,
        area: reader.u32_le()?,
        level: reader.u32_le()?,
        class: reader.u32_le()?,
    })
}

/// `SMSG_CONTACT_LIST`: friends only, names left empty for the name cache to fill.
pub fn decode_contact_list(body: &[u8]) -> PacketResult<Vec<FriendEntry>> {
    let mut reader = PacketReader::new(body);
    let _list_flags = reader.u32_le()?;
    let count = reader.u32_le()?;
    let mut friends = Vec::new();
    for _ in 0..count {
        let guid = reader.u64_le()?;
        let flags = reader.u32_le()?;
        let note = reader.cstring()?;
        if flags & SOCIAL_FLAG_FRIEND == 0 {
            continue;
        }
        let presence = read_presence(&mut reader)?;
        friends.push(FriendEntry {
            guid,
            name: String::new(),
            note,
            status: presence.status,
            area: presence.area,
            level: presence.level,
            class: presence.class,
        });
    }
    Ok(friends)
}

/// `SMSG_FRIEND_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FriendStatus {
    Online { guid: u64, update: FriendUpdate },
    Offline { guid: u64 },
    Added(FriendEntry),
    Removed { guid: u64 },
    /// Any other result code: list full, not found, already a friend and so on.
    Failed { result: u8, guid: u64 },
}

impl FriendStatus {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let result = reader.u8()?;
        let guid = reader.u64_le()?;
        Ok(match result {
            FRIEND_ONLINE => {
                let presence = read_presence(&mut reader)?;
                Self::Online {
                    guid,
                    update: FriendUpdate {
                        status: Some(presence.status),
                        area: Some(presence.area),
                        level: Some(presence.level),
                        class: Some(presence.class),
                        ..FriendUpdate::default()
                    },
                }
            }
            FRIEND_OFFLINE => Self::Offline { guid },
            FRIEND_ADDED_ONLINE | FRIEND_ADDED_OFFLINE => {
                let note = reader.cstring()?;
                let presence = if result == FRIEND_ADDED_ONLINE {
                    read_presence(&mut reader)?
                } else {
                    Presence::default()
                };
                Self::Added(FriendEntry {
                    guid,
                    name: String::new(),
                    note,
                    status: presence.status,
                    area: presence.area,
                    level: presence.level,
                    class: presence.class,
                })
            }
            FRIEND_REMOVED => Self::Removed { guid },
            result => Self::Failed { result, guid },
        })
    }
}

pub fn friend_result_label(result: u8) -> &'static str {
    match result {
        FRIEND_DB_ERROR => "friend list database error",
        FRIEND_LIST_FULL => "friend list is full",
        FRIEND_NOT_FOUND => "player not found",
        FRIEND_ALREADY => "already on your friend list",
        FRIEND_SELF => "you cannot befriend yourself",
        FRIEND_ENEMY => "player is hostile",
        _ => "friend list error",
    }
}
