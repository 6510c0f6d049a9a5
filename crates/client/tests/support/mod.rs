//! Scripted realm and world servers listening on loopback.

#![allow(dead_code)]

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use num_bigint::BigInt;
use rusty_bot_client::auth::Realm;
use rusty_bot_client::auth::packets::encode_realm_list;
use rusty_bot_client::config::SessionConfig;
use rusty_bot_client::wotlk::opcode::{AuthCmd, Opcode};
use rusty_bot_client::wotlk::rc4::{Role, SessionCipher};
use rusty_bot_client::wotlk::srp::{
    bigint_to_wire, calculate_interleaved, calculate_m1, calculate_m2, calculate_u,
    calculate_verifier, calculate_x, server_public_ephemeral, server_session_secret,
    wire_to_bigint,
};
use rusty_bot_core::packet::{PacketReader, PacketWriter};
use rusty_bot_core::world::PackedGuid;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub const ACCOUNT: &str = "bot";
pub const PASSWORD: &str = "pass";
pub const CHARACTER: &str = "Botty";
pub const CHARACTER_GUID: u64 = 0x10;
pub const ECHO_GUID: u64 = 0x42;
pub const ECHO_NAME: &str = "Echo";

/// The 32-byte prime every 3.3.5a realm uses, as it travels on the wire.
pub const N_WIRE: [u8; 32] = [
    0xB7, 0x9B, 0x3E, 0x2A, 0x87, 0x82, 0x3C, 0xAB, 0x8F, 0x5E, 0xBF, 0xBF, 0x8E, 0xB1, 0x01, 0x08,
    0x53, 0x50, 0x06, 0x29, 0x8B, 0x5B, 0xAD, 0xBD, 0x5B, 0x53, 0xE1, 0x89, 0x5E, 0x64, 0x4B, 0x89,
];
const GENERATOR: u8 = 7;
const SALT: [u8; 32] = [0x5A; 32];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RealmScript {
    /// Full SRP6 login; the challenge reply goes out in two writes when `split_challenge` is set.
    Login { split_challenge: bool },
    RejectChallenge(u8),
    /// Answers every logon challenge with a reconnect challenge.
    DemandReconnect,
}

pub struct MockRealm {
    pub config: SessionConfig,
    pub connections: Arc<AtomicUsize>,
    pub task: JoinHandle<()>,
}

pub async fn spawn_realm(script: RealmScript, world_port: u16) -> MockRealm {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let connections = Arc::new(AtomicUsize::new(0));
    let counter = connections.clone();
    let task = tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            // A failed exchange only ends that connection.
            let _ = serve_realm(stream, script, world_port).await;
        }
    });
    MockRealm {
        config: SessionConfig::new("127.0.0.1", port, ACCOUNT, PASSWORD, CHARACTER),
        connections,
        task,
    }
}

async fn read_logon_challenge(stream: &mut TcpStream) -> io::Result<Vec<u8>> {
    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;
    let mut rest = vec![0u8; usize::from(u16::from_le_bytes([header[2], header[3]]))];
    stream.read_exact(&mut rest).await?;
    Ok(rest)
}

async fn serve_realm(mut stream: TcpStream, script: RealmScript, world_port: u16) -> io::Result<()> {
    read_logon_challenge(&mut stream).await?;
    let split_challenge = match script {
        RealmScript::RejectChallenge(status) => {
            stream
                .write_all(&[AuthCmd::LOGON_CHALLENGE, 0, status])
                .await?;
            return Ok(());
        }
        RealmScript::DemandReconnect => {
            let mut reply = vec![AuthCmd::RECONNECT_CHALLENGE, 0];
            reply.extend_from_slice(&[0x11; 32]);
            stream.write_all(&reply).await?;
            return Ok(());
        }
        RealmScript::Login { split_challenge } => split_challenge,
    };

    let generator = BigInt::from(GENERATOR);
    let modulus = wire_to_bigint(&N_WIRE);
    let x = calculate_x(
        &ACCOUNT.to_uppercase(),
        &PASSWORD.to_uppercase(),
        &SALT,
    );
    let verifier = calculate_verifier(&generator, &modulus, &x);
    let server_private = wire_to_bigint(&[0x42; 19]);
    let server_b = server_public_ephemeral(&generator, &modulus, &verifier, &server_private);

    let mut challenge = vec![AuthCmd::LOGON_CHALLENGE, 0, 0];
    challenge.extend_from_slice(&bigint_to_wire(&server_b, 32));
    challenge.extend_from_slice(&[1, GENERATOR, 32]);
    challenge.extend_from_slice(&N_WIRE);
    challenge.extend_from_slice(&SALT);
    challenge.extend_from_slice(&[0; 16]);
    challenge.push(0);
    if split_challenge {
        stream.write_all(&challenge[..20]).await?;
        stream.flush().await?;
        tokio::time::sleep(Duration::from_millis(30)).await;
        stream.write_all(&challenge[20..]).await?;
    } else {
        stream.write_all(&challenge).await?;
    }

    let mut proof = [0u8; 75];
    stream.read_exact(&mut proof).await?;
    let client_a = wire_to_bigint(&proof[1..33]);
    let u = calculate_u(&client_a, &server_b);
    let secret = server_session_secret(&client_a, &verifier, &u, &server_private, &modulus);
    let key = calculate_interleaved(&secret);
    let m1 = calculate_m1(
        &modulus,
        &generator,
        &ACCOUNT.to_uppercase(),
        &SALT,
        &client_a,
        &server_b,
        &key,
    );
    if proof[33..53] != m1 {
        stream.write_all(&[AuthCmd::LOGON_PROOF, 0x04]).await?;
        return Ok(());
    }
    let mut reply = vec![AuthCmd::LOGON_PROOF, 0];
    reply.extend_from_slice(&calculate_m2(&client_a, &m1, &key));
    reply.extend_from_slice(&[0; 10]);
    stream.write_all(&reply).await?;

    let mut request = [0u8; 5];
    stream.read_exact(&mut request).await?;
    stream
        .write_all(&encode_realm_list(&[Realm {
            icon: 0,
            lock: 0,
            flags: 0,
            name: "Mock".into(),
            host: "127.0.0.1".into(),
            port: world_port,
            population: 0.0,
            characters: 1,
            timezone: 1,
            id: 1,
        }]))
        .await?;
    Ok(())
}

/// Server half of a world connection.
pub struct ServerConn {
    stream: TcpStream,
    cipher: Option<SessionCipher>,
}

impl ServerConn {
    pub async fn send(&mut self, opcode: u16, body: &[u8]) -> io::Result<()> {
        let mut header = Vec::with_capacity(4);
        header.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        header.extend_from_slice(&opcode.to_le_bytes());
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut header);
        }
        header.extend_from_slice(body);
        self.stream.write_all(&header).await
    }

    /// Next client packet, `None` once the client hung up.
    pub async fn recv(&mut self) -> io::Result<Option<(u16, Vec<u8>)>> {
        let mut header = [0u8; 6];
        match self.stream.read_exact(&mut header).await {
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err),
        }
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt(&mut header);
        }
        let size = usize::from(u16::from_be_bytes([header[0], header[1]]));
        let opcode = u32::from_le_bytes([header[2], header[3], header[4], header[5]]) as u16;
        let mut body = vec![0u8; size - 4];
        self.stream.read_exact(&mut body).await?;
        Ok(Some((opcode, body)))
    }

    /// Receives until `opcode`, keeping whatever else arrived first.
    pub async fn recv_until(&mut self, opcode: u16, seen: &mut Vec<u16>) -> io::Result<Vec<u8>> {
        loop {
            let Some((got, body)) = self.recv().await? else {
                return Err(io::ErrorKind::UnexpectedEof.into());
            };
            seen.push(got);
            if got == opcode {
                return Ok(body);
            }
        }
    }
}

pub fn encode_character(writer: &mut PacketWriter, guid: u64, name: &str) {
    writer
        .u64_le(guid)
        .cstring(name)
        .u8(1)
        .u8(1)
        .u8(0)
        .bytes(&[1, 2, 3, 4, 5])
        .u8(80)
        .u32_le(12)
        .u32_le(0)
        .f32_le(-8949.95)
        .f32_le(-132.49)
        .f32_le(83.53)
        .u32_le(0)
        .u32_le(0)
        .u32_le(0)
        .u8(0)
        .u32_le(0)
        .u32_le(0)
        .u32_le(0);
    for _ in 0..23 {
        writer.u32_le(0).u8(0).u32_le(0);
    }
}

fn say_from(guid: u64, text: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer
        .u8(0x01)
        .u32_le(7)
        .u64_le(guid)
        .u32_le(0)
        .u64_le(0)
        .u32_le(text.len() as u32 + 1)
        .cstring(text)
        .u8(0);
    writer.into_inner()
}

fn name_response(guid: u64, name: &str) -> Vec<u8> {
    let mut writer = PacketWriter::new();
    writer
        .packed_guid(PackedGuid(guid))
        .u8(0)
        .cstring(name)
        .cstring("")
        .u8(1)
        .u8(0)
        .u8(1)
        .u8(0);
    writer.into_inner()
}

/// Opcodes the client sent, in order, collected until it disconnected.
pub type WorldLog = Vec<u16>;

pub async fn bind_world() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, port)
}

/// Walks one client through world login, then echoes every chat line back as a say from
/// `ECHO_GUID` and answers name queries for it.
pub fn spawn_world(listener: TcpListener, session_key: [u8; 40]) -> JoinHandle<io::Result<WorldLog>> {
    tokio::spawn(async move {
        let (stream, _) = listener.accept().await?;
        let mut conn = ServerConn {
            stream,
            cipher: None,
        };
        let mut log = Vec::new();

        let mut challenge = PacketWriter::new();
        challenge.u32_le(1).u32_le(0xDEAD_BEEF).bytes(&[0x33; 32]);
        conn.send(Opcode::SMSG_AUTH_CHALLENGE, challenge.as_slice())
            .await?;
        let session = conn.recv_until(Opcode::CMSG_AUTH_SESSION, &mut log).await?;
        let mut reader = PacketReader::new(&session);
        assert_eq!(reader.u32_le().unwrap(), 12340);
        conn.cipher = Some(SessionCipher::new(&session_key, Role::Server));

        conn.send(Opcode::SMSG_AUTH_RESPONSE, &[0x0C, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2])
            .await?;

        conn.recv_until(Opcode::CMSG_CHAR_ENUM, &mut log).await?;
        let mut characters = PacketWriter::new();
        characters.u8(1);
        encode_character(&mut characters, CHARACTER_GUID, CHARACTER);
        conn.send(Opcode::SMSG_CHAR_ENUM, characters.as_slice())
            .await?;

        let login = conn.recv_until(Opcode::CMSG_PLAYER_LOGIN, &mut log).await?;
        assert_eq!(login, CHARACTER_GUID.to_le_bytes().to_vec());
        let mut verify = PacketWriter::new();
        verify
            .u32_le(0)
            .f32_le(-8949.95)
            .f32_le(-132.49)
            .f32_le(83.53)
            .f32_le(0.0);
        conn.send(Opcode::SMSG_LOGIN_VERIFY_WORLD, verify.as_slice())
            .await?;

        while let Some((opcode, body)) = conn.recv().await? {
            log.push(opcode);
            match opcode {
                Opcode::CMSG_MESSAGECHAT => {
                    let mut reader = PacketReader::new(&body);
                    let _kind = reader.u32_le().unwrap();
                    let _language = reader.u32_le().unwrap();
                    let text = reader.cstring().unwrap();
                    conn.send(Opcode::SMSG_MESSAGECHAT, &say_from(ECHO_GUID, &text))
                        .await?;
                }
                Opcode::CMSG_NAME_QUERY => {
                    let guid = PacketReader::new(&body).u64_le().unwrap();
                    conn.send(
                        Opcode::SMSG_NAME_QUERY_RESPONSE,
                        &name_response(guid, ECHO_NAME),
                    )
                    .await?;
                }
                _ => {}
            }
        }
        Ok(log)
    })
}
