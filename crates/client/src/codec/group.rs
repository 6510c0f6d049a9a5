//! Party packets.

use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};

const GROUP_TYPE_LFG: u8 = 0x08;

pub fn build_invite(name: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.cstring(name).u32_le(0);
    writer.into_inner()
}

pub fn build_uninvite(name: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.cstring(name);
    writer.into_inner()
}

pub fn build_set_leader(guid: u64) -> Vec<u8> {
    guid.to_le_bytes().to_vec()
}

pub fn build_accept() -> Vec<u8> {
    0u32.to_le_bytes().to_vec()
}

/// `CMSG_GROUP_DECLINE` and `CMSG_GROUP_DISBAND` have empty bodies.
pub fn build_empty() -> Vec<u8> {
    Vec::new()
}

/// `SMSG_PARTY_COMMAND_RESULT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartyCommandResult {
    pub operation: u32,
    pub member: String,
    pub result: u32,
}

impl PartyCommandResult {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let operation = reader.u32_le()?;
        let member = reader.cstring()?;
        let result = reader.u32_le()?;
        Ok(Self {
            operation,
            member,
            result,
        })
    }

    pub fn is_success(&self) -> bool {
        self.result == 0
    }

    /// Human text for the (operation, result) pair.
    pub fn label(&self) -> String {
        let operation = match self.operation {
            0 => "invite",
            1 => "uninvite",
            2 => "leave",
            4 => "swap",
            _ => "group command",
        };
        let outcome = match self.result {
            0 => "ok",
            1 => "player not found",
            2 => "not in your group",
            3 => "not in your instance",
            4 => "group is full",
            5 => "already in a group",
            6 => "you are not in a group",
            7 => "you are not the leader",
            8 => "wrong faction",
            9 => "is ignoring you",
            12 => "dungeon finder pending",
            13 => "invites restricted",
            other => return format!("{operation} {}: error {other}", self.member),
        };
        if self.member.is_empty() {
            format!("{operation}: {outcome}")
        } else {
            format!("{operation} {}: {outcome}", self.member)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    pub name: String,
    pub guid: u64,
    pub online: bool,
    pub subgroup: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupList {
    pub group_type: u8,
    pub members: Vec<GroupMember>,
    pub leader_guid: u64,
}

impl GroupList {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        let group_type = reader.u8()?;
        reader.skip(3)?;
        if group_type & GROUP_TYPE_LFG != 0 {
            reader.skip(1 + 4)?;
        }
        reader.skip(8 + 4)?;

        let count = reader.u32_le()?;
        let mut members = Vec::with_capacity(count.min(40) as usize);
        for _ in 0..count {
            let name = reader.cstring()?;
            let guid = reader.u64_le()?;
            let online = reader.u8()? != 0;
            let subgroup = reader.u8()?;
            reader.skip(2)?;
            members.push(GroupMember {
                name,
                guid,
                online,
                subgroup,
            });
        }
        let leader_guid = reader.u64_le()?;
        Ok(Self {
            group_type,
            members,
            leader_guid,
        })
    }

    /// The leader's name: a member, or ourselves, since the list never includes the reader.
    pub fn leader_name(&self, self_guid: u64, self_name: &str) -> Option<String> {
        if let Some(member) = self.members.iter().find(|m| m.guid == self.leader_guid) {
            return Some(member.name.clone());
        }
        (self.leader_guid == self_guid && self_guid != 0).then(|| self_name.to_string())
    }
}

pub fn decode_name(body: &[u8]) -> PacketResult<String> {
    PacketReader::new(body).cstring()
}

/// `SMSG_GROUP_INVITE`: status byte then the inviter's name.
pub fn decode_invite(body: &[u8]) -> PacketResult<String> {
    let mut reader = PacketReader::new(body);
    reader.skip(1)?;
    reader.cstring()
}
