use std::fmt;

use rusty_bot_core::packet::PacketError;
use thiserror::Error;

/// Status byte of `SMSG_AUTH_RESPONSE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldAuthStatus(pub u8);

impl WorldAuthStatus {
    pub const OK: u8 = 0x0C;
    pub const WAIT_QUEUE: u8 = 0x1B;

    pub fn label(self) -> Option<&'static str> {
        Some(match self.0 {
            0x0D => "failed",
            0x0E => "rejected",
            0x0F => "bad server proof",
            0x10 => "unavailable",
            0x11 => "system error",
            0x12 => "billing error",
            0x13 => "billing expired",
            0x14 => "version mismatch",
            0x15 => "unknown account",
            0x16 => "incorrect password",
            0x17 => "session expired",
            0x18 => "server shutting down",
            0x19 => "already logging in",
            0x1C => "banned",
            0x1D => "account in use",
            _ => return None,
        })
    }
}

impl fmt::Display for WorldAuthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.label() {
            Some(label) => f.write_str(label),
            None => write!(f, "0x{:02x}", self.0),
        }
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("logon challenge failed with status 0x{0:02x}")]
    AuthChallengeFailed(u8),
    #[error("logon proof failed with status 0x{0:02x}")]
    AuthProofFailed(u8),
    #[error("server proof M2 does not match")]
    ServerM2Mismatch,
    #[error("server sent an unusable SRP6 ephemeral")]
    InvalidServerEphemeral,
    #[error("realm list is empty")]
    NoRealmsAvailable,
    #[error("realm address {0:?} has no port")]
    InvalidRealmAddress(String),
    #[error("realm address {0:?} has an invalid port")]
    InvalidRealmPort(String),
    #[error("server requested a reconnect but no session key is cached")]
    ReconnectRequired,
    #[error("reconnect challenge failed with status 0x{0:02x}")]
    ReconnectChallengeFailed(u8),
    #[error("reconnect proof failed with status 0x{0:02x}")]
    ReconnectProofFailed(u8),
    #[error("unexpected auth opcode 0x{0:02x}")]
    UnexpectedAuthOpcode(u8),
    #[error("malformed auth packet: {0}")]
    MalformedAuthPacket(PacketError),
    #[error("world authentication failed: {0}")]
    WorldAuthFailed(WorldAuthStatus),
    #[error("character {requested:?} not found (available: {available:?})")]
    CharacterNotFound {
        requested: String,
        available: Vec<String>,
    },
    #[error("failed to decode opcode 0x{opcode:04x}: {source}")]
    PacketDecode {
        opcode: u16,
        #[source]
        source: PacketError,
    },
    #[error("connection closed unexpectedly")]
    ConnectionClosedUnexpectedly,
    #[error("timed out waiting for opcode 0x{0:04x}")]
    ExpectTimeout(u16),
    #[error("a wait for opcode 0x{0:04x} is already pending")]
    ExpectAlreadyPending(u16),
    #[error("{0:?} is not in the group")]
    UnknownPartyMember(String),
    #[error("{0:?} is not on the friend list")]
    UnknownFriend(String),
    #[error("no joined channel with index {0}")]
    UnknownChannel(u8),
    #[error("no chat mode used yet")]
    NoStickyChatMode,
    #[error("invalid reconnect key: {0}")]
    InvalidReconnectKey(String),
    #[error("session is closed")]
    SessionClosed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    pub fn is_reconnect_required(&self) -> bool {
        matches!(self, Self::ReconnectRequired)
    }

    pub fn decode(opcode: u16, source: PacketError) -> Self {
        Self::PacketDecode { opcode, source }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
