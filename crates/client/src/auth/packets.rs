//! Realm server packets.
//!
//! Parsers look at the buffered bytes without consuming them. A response is only decoded once
//! its length fields say it is complete, so a short buffer is [`Parsed::NeedMoreBytes`] and a
//! read error inside a complete packet is [`Parsed::Malformed`].

use md5::{Digest, Md5};
use rusty_bot_core::packet::{PacketReader, PacketResult, PacketWriter};

use crate::error::ClientError;
use crate::wotlk::opcode::AuthCmd;
use crate::wotlk::srp::SrpParams;

pub const CLIENT_BUILD: u16 = 12340;
const PROTOCOL_VERSION: u8 = 0x08;
const CLIENT_VERSION: [u8; 3] = [3, 3, 5];
const CLIENT_IP: [u8; 4] = [127, 0, 0, 1];

const SECURITY_PIN: u8 = 0x01;
const SECURITY_MATRIX: u8 = 0x02;
const SECURITY_TOKEN: u8 = 0x04;

const REALM_HAS_VERSION: u8 = 0x04;

#[derive(Debug)]
pub enum Parsed<T> {
    NeedMoreBytes,
    /// The value and how many bytes it occupied.
    Complete(T, usize),
    Malformed(ClientError),
}

/// A server response: either accepted with its payload or rejected with a status byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    Accepted(T),
    Rejected(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectChallenge {
    pub challenge_data: [u8; 16],
    pub checksum_salt: [u8; 16],
}

#[derive(Debug, Clone, PartialEq)]
pub struct Realm {
    pub icon: u8,
    pub lock: u8,
    pub flags: u8,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub population: f32,
    pub characters: u8,
    pub timezone: u8,
    pub id: u8,
}

impl Realm {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// `LOGON_CHALLENGE`, or `RECONNECT_CHALLENGE` when `cmd` says so; the layout is shared.
pub fn build_logon_challenge(cmd: u8, account: &str) -> Vec<u8> {
    let account = account.to_uppercase();
    let mut writer = PacketWriter::with_capacity(34 + account.len());
    writer
        .u8(cmd)
        .u8(PROTOCOL_VERSION)
        .u16_le(30 + account.len() as u16)
        .bytes(b"WoW\0")
        .bytes(&CLIENT_VERSION)
        .u16_le(CLIENT_BUILD)
        .bytes(b"68x\0")
        .bytes(b"niW\0")
        .bytes(b"SUne")
        .u32_le(0)
        .bytes(&CLIENT_IP)
        .u8(account.len() as u8)
        .bytes(account.as_bytes());
    writer.into_inner()
}

pub fn build_logon_proof(public_ephemeral: &[u8; 32], client_proof: &[u8; 20]) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(75);
    writer
        .u8(AuthCmd::LOGON_PROOF)
        .bytes(public_ephemeral)
        .bytes(client_proof)
        .bytes(&[0u8; 20])
        .u8(0)
        .u8(0);
    writer.into_inner()
}

/// MD5 over account, server challenge, client data and the cached key, zero-extended to 20.
pub fn reconnect_proof_digest(
    account: &str,
    challenge_data: &[u8; 16],
    client_data: &[u8; 16],
    session_key: &[u8],
) -> [u8; 20] {
    let digest = Md5::new()
        .chain_update(account.to_uppercase().as_bytes())
        .chain_update(challenge_data)
        .chain_update(client_data)
        .chain_update(session_key)
        .finalize();
    let mut proof = [0u8; 20];
    proof[..16].copy_from_slice(&digest);
    proof
}

pub fn build_reconnect_proof(client_data: &[u8; 16], proof: &[u8; 20]) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(58);
    writer
        .u8(AuthCmd::RECONNECT_PROOF)
        .bytes(client_data)
        .bytes(proof)
        .bytes(&[0u8; 20])
        .u8(0);
    writer.into_inner()
}

pub fn build_realm_list_request() -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(5);
    writer.u8(AuthCmd::REALM_LIST).u32_le(0);
    writer.into_inner()
}

/// `cmd, 0, status` then, on success, B, g, N, salt, the version challenge and security flags.
pub fn parse_logon_challenge(buf: &[u8]) -> Parsed<Reply<SrpParams>> {
    if buf.len() < 3 {
        return Parsed::NeedMoreBytes;
    }
    let status = buf[2];
    if status != 0 {
        return Parsed::Complete(Reply::Rejected(status), 3);
    }

    let Some(len) = logon_challenge_len(buf) else {
        return Parsed::NeedMoreBytes;
    };
    decode(&buf[..len], |reader| {
        reader.skip(3)?;
        let server_ephemeral = reader.array::<32>()?;
        let g_len = usize::from(reader.u8()?);
        let generator = reader.bytes(g_len)?.to_vec();
        let n_len = usize::from(reader.u8()?);
        let modulus = reader.bytes(n_len)?.to_vec();
        let salt = reader.array::<32>()?;
        Ok(Reply::Accepted(SrpParams {
            generator,
            modulus,
            server_ephemeral,
            salt,
        }))
    })
}

/// Full length of a successful challenge response, once enough of it is buffered to tell.
fn logon_challenge_len(buf: &[u8]) -> Option<usize> {
    let g_len_at = 3 + 32;
    let g_len = usize::from(*buf.get(g_len_at)?);
    let n_len_at = g_len_at + 1 + g_len;
    let n_len = usize::from(*buf.get(n_len_at)?);
    let flags_at = n_len_at + 1 + n_len + 32 + 16;
    let flags = *buf.get(flags_at)?;

    let mut len = flags_at + 1;
    if flags & SECURITY_PIN != 0 {
        len += 4 + 16;
    }
    if flags & SECURITY_MATRIX != 0 {
        len += 1 + 1 + 1 + 1 + 8;
    }
    if flags & SECURITY_TOKEN != 0 {
        len += 1;
    }
    (buf.len() >= len).then_some(len)
}

/// `cmd, status` then, on success, M2, account flags, survey id and login flags.
pub fn parse_logon_proof(buf: &[u8]) -> Parsed<Reply<[u8; 20]>> {
    if buf.len() < 2 {
        return Parsed::NeedMoreBytes;
    }
    let status = buf[1];
    if status != 0 {
        return Parsed::Complete(Reply::Rejected(status), 2);
    }
    if buf.len() < 32 {
        return Parsed::NeedMoreBytes;
    }
    decode(&buf[..32], |reader| {
        reader.skip(2)?;
        let server_proof = reader.array::<20>()?;
        Ok(Reply::Accepted(server_proof))
    })
}

pub fn parse_reconnect_challenge(buf: &[u8]) -> Parsed<Reply<ReconnectChallenge>> {
    if buf.len() < 2 {
        return Parsed::NeedMoreBytes;
    }
    let status = buf[1];
    if status != 0 {
        return Parsed::Complete(Reply::Rejected(status), 2);
    }
    if buf.len() < 34 {
        return Parsed::NeedMoreBytes;
    }
    decode(&buf[..34], |reader| {
        reader.skip(2)?;
        Ok(Reply::Accepted(ReconnectChallenge {
            challenge_data: reader.array()?,
            checksum_salt: reader.array()?,
        }))
    })
}

/// `cmd, status, u16 flags`.
pub fn parse_reconnect_proof(buf: &[u8]) -> Parsed<Reply<()>> {
    if buf.len() < 4 {
        return Parsed::NeedMoreBytes;
    }
    match buf[1] {
        0 => Parsed::Complete(Reply::Accepted(()), 4),
        status => Parsed::Complete(Reply::Rejected(status), 4),
    }
}

pub fn parse_realm_list(buf: &[u8]) -> Parsed<Vec<Realm>> {
    if buf.len() < 3 {
        return Parsed::NeedMoreBytes;
    }
    let len = 3 + usize::from(u16::from_le_bytes([buf[1], buf[2]]));
    if buf.len() < len {
        return Parsed::NeedMoreBytes;
    }

    let mut reader = PacketReader::new(&buf[..len]);
    match read_realms(&mut reader) {
        Ok(realms) => Parsed::Complete(realms, len),
        Err(err) => Parsed::Malformed(err),
    }
}

fn read_realms(reader: &mut PacketReader<'_>) -> Result<Vec<Realm>, ClientError> {
    let malformed = ClientError::MalformedAuthPacket;
    reader.skip(3 + 4).map_err(malformed)?;
    let count = reader.u16_le().map_err(malformed)?;

    let mut realms = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let icon = reader.u8().map_err(malformed)?;
        let lock = reader.u8().map_err(malformed)?;
        let flags = reader.u8().map_err(malformed)?;
        let name = reader.cstring().map_err(malformed)?;
        let address = reader.cstring().map_err(malformed)?;
        let population = reader.f32_le().map_err(malformed)?;
        let characters = reader.u8().map_err(malformed)?;
        let timezone = reader.u8().map_err(malformed)?;
        let id = reader.u8().map_err(malformed)?;
        if flags & REALM_HAS_VERSION != 0 {
            reader.skip(3 + 2).map_err(malformed)?;
        }

        let (host, port) = split_address(&address)?;
        realms.push(Realm {
            icon,
            lock,
            flags,
            name,
            host,
            port,
            population,
            characters,
            timezone,
            id,
        });
    }
    Ok(realms)
}

fn split_address(address: &str) -> Result<(String, u16), ClientError> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| ClientError::InvalidRealmAddress(address.to_string()))?;
    let port = port
        .parse::<u16>()
        .map_err(|_| ClientError::InvalidRealmPort(address.to_string()))?;
    Ok((host.to_string(), port))
}

fn decode<T>(
    packet: &[u8],
    read: impl FnOnce(&mut PacketReader<'_>) -> PacketResult<T>,
) -> Parsed<T> {
    let mut reader = PacketReader::new(packet);
    match read(&mut reader) {
        Ok(value) => Parsed::Complete(value, packet.len()),
        Err(err) => Parsed::Malformed(ClientError::MalformedAuthPacket(err)),
    }
}

/// Realm list response body as a server would send it.
pub fn encode_realm_list(realms: &[Realm]) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer
        .u8(AuthCmd::REALM_LIST)
        .u16_le(0)
        .u32_le(0)
        .u16_le(realms.len() as u16);
    for realm in realms {
        writer
            .u8(realm.icon)
            .u8(realm.lock)
            .u8(realm.flags)
            .cstring(&realm.name)
            .cstring(&realm.address())
            .f32_le(realm.population)
            .u8(realm.characters)
            .u8(realm.timezone)
            .u8(realm.id);
        if realm.flags & REALM_HAS_VERSION != 0 {
            writer.bytes(&CLIENT_VERSION).u16_le(CLIENT_BUILD);
        }
    }
    writer.u16_le(0x0010);
    let size = (writer.position() - 3) as u16;
    writer.patch_u16_le(1, size);
    writer.into_inner()
}
