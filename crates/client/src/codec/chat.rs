//! Chat, channel and system-notice packets.

use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};

/// `SMSG_MESSAGECHAT` / `CMSG_MESSAGECHAT` message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChatKind {
    System,
    Say,
    Party,
    Raid,
    Guild,
    Officer,
    Yell,
    Whisper,
    WhisperForeign,
    WhisperInform,
    Emote,
    TextEmote,
    MonsterSay,
    MonsterParty,
    MonsterYell,
    MonsterWhisper,
    MonsterEmote,
    Channel,
    BattlegroundNeutral,
    BattlegroundAlliance,
    BattlegroundHorde,
    RaidLeader,
    RaidWarning,
    RaidBossEmote,
    RaidBossWhisper,
    Achievement,
    GuildAchievement,
    PartyLeader,
    Other(u8),
}

impl From<u8> for ChatKind {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::System,
            0x01 => Self::Say,
            0x02 => Self::Party,
            0x03 => Self::Raid,
            0x04 => Self::Guild,
            0x05 => Self::Officer,
            0x06 => Self::Yell,
            0x07 => Self::Whisper,
            0x08 => Self::WhisperForeign,
            0x09 => Self::WhisperInform,
            0x0A => Self::Emote,
            0x0B => Self::TextEmote,
            0x0C => Self::MonsterSay,
            0x0D => Self::MonsterParty,
            0x0E => Self::MonsterYell,
            0x0F => Self::MonsterWhisper,
            0x10 => Self::MonsterEmote,
            0x11 => Self::Channel,
            0x24 => Self::BattlegroundNeutral,
            0x25 => Self::BattlegroundAlliance,
            0x26 => Self::BattlegroundHorde,
            0x27 => Self::RaidLeader,
            0x28 => Self::RaidWarning,
            0x29 => Self::RaidBossEmote,
            0x2A => Self::RaidBossWhisper,
            0x30 => Self::Achievement,
            0x31 => Self::GuildAchievement,
            0x33 => Self::PartyLeader,
            other => Self::Other(other),
        }
    }
}

impl From<ChatKind> for u8 {
    fn from(kind: ChatKind) -> Self {
        match kind {
            ChatKind::System => 0x00,
            ChatKind::Say => 0x01,
            ChatKind::Party => 0x02,
            ChatKind::Raid => 0x03,
            ChatKind::Guild => 0x04,
            ChatKind::Officer => 0x05,
            ChatKind::Yell => 0x06,
            ChatKind::Whisper => 0x07,
            ChatKind::WhisperForeign => 0x08,
            ChatKind::WhisperInform => 0x09,
            ChatKind::Emote => 0x0A,
            ChatKind::TextEmote => 0x0B,
            ChatKind::MonsterSay => 0x0C,
            ChatKind::MonsterParty => 0x0D,
            ChatKind::MonsterYell => 0x0E,
            ChatKind::MonsterWhisper => 0x0F,
            ChatKind::MonsterEmote => 0x10,
            ChatKind::Channel => 0x11,
            ChatKind::BattlegroundNeutral => 0x24,
            ChatKind::BattlegroundAlliance => 0x25,
            ChatKind::BattlegroundHorde => 0x26,
            ChatKind::RaidLeader => 0x27,
            ChatKind::RaidWarning => 0x28,
            ChatKind::RaidBossEmote => 0x29,
            ChatKind::RaidBossWhisper => 0x2A,
            ChatKind::Achievement => 0x30,
            ChatKind::GuildAchievement => 0x31,
            ChatKind::PartyLeader => 0x33,
            ChatKind::Other(value) => value,
        }
    }
}

impl ChatKind {
    /// Creature speech carries the speaker's name inline instead of relying on a name query.
    pub fn embeds_sender_name(self) -> bool {
        matches!(
            self,
            Self::MonsterSay
                | Self::MonsterParty
                | Self::MonsterYell
                | Self::MonsterWhisper
                | Self::MonsterEmote
                | Self::RaidBossEmote
                | Self::RaidBossWhisper
                | Self::WhisperForeign
        )
    }

    /// Battleground announcements address a receiver but name no sender.
    pub fn is_battleground_notice(self) -> bool {
        matches!(
            self,
            Self::BattlegroundNeutral | Self::BattlegroundAlliance | Self::BattlegroundHorde
        )
    }
}

/// Where an outgoing message goes. Channels are addressed by their joined index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatTarget {
    Say,
    Yell,
    Guild,
    Party,
    Raid,
    Channel(u8),
    Whisper(String),
}

impl ChatTarget {
    pub fn kind(&self) -> ChatKind {
        match self {
            Self::Say => ChatKind::Say,
            Self::Yell => ChatKind::Yell,
            Self::Guild => ChatKind::Guild,
            Self::Party => ChatKind::Party,
            Self::Raid => ChatKind::Raid,
            Self::Channel(_) => ChatKind::Channel,
            Self::Whisper(_) => ChatKind::Whisper,
        }
    }
}

/// `CMSG_MESSAGECHAT`. `destination` is the whisper target or channel name.
pub fn build_message_chat(
    kind: ChatKind,
    language: u32,
    destination: Option<&str>,
    text: &str,
) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(10 + text.len());
    writer.u32_le(u32::from(u8::from(kind))).u32_le(language);
    if let Some(destination) = destination {
        writer.cstring(destination);
    }
    writer.cstring(text);
    writer.into_inner()
}

/// A decoded chat packet before the sender's name is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPayload {
    pub kind: ChatKind,
    pub language: u32,
    pub sender_guid: u64,
    /// Present when the packet carries the name itself.
    pub sender_name: Option<String>,
    pub channel: Option<String>,
    pub target_guid: u64,
    pub text: String,
    pub tag: u8,
}

/// `gm` selects the `SMSG_GM_MESSAGECHAT` variant, which inserts the sender's name.
pub fn decode_message_chat(body: &[u8], gm: bool) -> PacketResult<ChatPayload> {
    let mut reader = PacketReader::new(body);
    let kind = ChatKind::from(reader.u8()?);
    let language = reader.u32_le()?;
    let sender_guid = reader.u64_le()?;
    reader.skip(4)?;

    let mut sender_name = None;
    let mut channel = None;
    let target_guid;
    if kind.embeds_sender_name() {
        sender_name = Some(sized_string(&mut reader)?);
        target_guid = reader.u64_le()?;
        let named_receiver = !is_player_guid(target_guid) && !is_pet_guid(target_guid);
        if target_guid != 0 && named_receiver && kind != ChatKind::WhisperForeign {
            sized_string(&mut reader)?;
        }
    } else if kind.is_battleground_notice() {
        target_guid = reader.u64_le()?;
        if target_guid != 0 && !is_player_guid(target_guid) {
            sized_string(&mut reader)?;
        }
    } else {
        if gm {
            sender_name = Some(sized_string(&mut reader)?);
        }
        if kind == ChatKind::Channel {
            channel = Some(reader.cstring()?);
        }
        target_guid = reader.u64_le()?;
    }

    let text = sized_string(&mut reader)?;
    let tag = reader.u8()?;
    if matches!(kind, ChatKind::Achievement | ChatKind::GuildAchievement) {
        reader.skip(4)?;
    }

    Ok(ChatPayload {
        kind,
        language,
        sender_guid,
        sender_name,
        channel,
        target_guid,
        text,
        tag,
    })
}

/// u32 length (including the terminator) followed by the NUL-terminated text.
fn sized_string(reader: &mut PacketReader<'_>) -> PacketResult<String> {
    let _len = reader.u32_le()?;
    reader.cstring()
}

const HIGH_GUID_PET: u64 = 0xF140;

fn is_player_guid(guid: u64) -> bool {
    guid >> 48 == 0
}

fn is_pet_guid(guid: u64) -> bool {
    guid >> 48 == HIGH_GUID_PET
}

/// A chat line ready for consumers, sender resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub kind: ChatKind,
    pub language: u32,
    pub sender_guid: u64,
    pub sender: String,
    pub channel: Option<String>,
    pub text: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            kind: ChatKind::System,
            language: 0,
            sender_guid: 0,
            sender: String::new(),
            channel: None,
            text: text.into(),
        }
    }
}

impl ChatPayload {
    pub fn into_message(self, sender: String) -> ChatMessage {
        ChatMessage {
            kind: self.kind,
            language: self.language,
            sender_guid: self.sender_guid,
            sender,
            channel: self.channel,
            text: self.text,
        }
    }
}

pub const CHANNEL_PLAYER_JOINED: u8 = 0x00;
pub const CHANNEL_PLAYER_LEFT: u8 = 0x01;
pub const CHANNEL_YOU_JOINED: u8 = 0x02;
pub const CHANNEL_YOU_LEFT: u8 = 0x03;
pub const CHANNEL_WRONG_PASSWORD: u8 = 0x04;
pub const CHANNEL_NOT_MEMBER: u8 = 0x05;
pub const CHANNEL_MUTED: u8 = 0x11;
pub const CHANNEL_BANNED: u8 = 0x13;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNotify {
    pub kind: u8,
    pub channel: String,
}

impl ChannelNotify {
    pub fn decode(body: &[u8]) -> PacketResult<Self> {
        let mut reader = PacketReader::new(body);
        Ok(Self {
            kind: reader.u8()?,
            channel: reader.cstring()?,
        })
    }

    pub fn describe(&self) -> String {
        let what = match self.kind {
            CHANNEL_PLAYER_JOINED => "a player joined",
            CHANNEL_PLAYER_LEFT => "a player left",
            CHANNEL_YOU_JOINED => "joined",
            CHANNEL_YOU_LEFT => "left",
            CHANNEL_WRONG_PASSWORD => "wrong password",
            CHANNEL_NOT_MEMBER => "not a member",
            CHANNEL_MUTED => "you are muted",
            CHANNEL_BANNED => "you are banned",
            other => return format!("[{}] notice 0x{other:02x}", self.channel),
        };
        format!("[{}] {what}", self.channel)
    }
}

pub fn build_join_channel(name: &str, password: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer
        .u32_le(0)
        .u8(0)
        .u8(0)
        .cstring(name)
        .cstring(password);
    writer.into_inner()
}

pub fn build_leave_channel(name: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer.u32_le(0).cstring(name);
    writer.into_inner()
}

pub fn decode_notification(body: &[u8]) -> PacketResult<String> {
    PacketReader::new(body).cstring()
}

pub fn decode_motd(body: &[u8]) -> PacketResult<Vec<String>> {
    let mut reader = PacketReader::new(body);
    let count = reader.u32_le()?;
    (0..count).map(|_| reader.cstring()).collect()
}

pub fn decode_player_not_found(body: &[u8]) -> PacketResult<String> {
    PacketReader::new(body).cstring()
}
