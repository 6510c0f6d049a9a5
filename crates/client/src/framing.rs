//! Turns the world socket's byte stream into frames, and frames into bytes.
//!
//! Client headers are 6 bytes (u16 BE size covering the opcode, u32 LE opcode). Server headers
//! are 4 bytes (u16 BE size, u16 LE opcode), or 5 when the first decrypted byte has bit `0x80`
//! set and the size is a 3-byte BE value. Once encryption is on only header bytes pass through
//! the cipher.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use rusty_bot_core::packet::{PacketError, PacketResult};

use crate::wotlk::rc4::{Role, SessionCipher};

const LONG_SIZE_FLAG: u8 = 0x80;

/// Growable byte buffer fed by socket reads.
#[derive(Debug, Default)]
pub struct AccumulationBuffer {
    data: Vec<u8>,
}

impl AccumulationBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, chunk: &[u8]) {
        self.data.extend_from_slice(chunk);
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// The first `n` bytes without consuming them, if that many are buffered.
    pub fn peek(&self, n: usize) -> Option<&[u8]> {
        self.data.get(..n)
    }

    /// Removes and returns the first `n` bytes. Callers check `len()` first; asking for more
    /// than is buffered returns what there is.
    pub fn drain(&mut self, n: usize) -> Vec<u8> {
        let n = n.min(self.data.len());
        self.data.drain(..n).collect()
    }
}

/// One decoded server frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldPacket {
    pub opcode: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderState {
    Empty,
    /// First size byte decrypted; the rest of the header is still pending.
    Partial { first: u8 },
    Ready { body_len: usize, opcode: u16 },
}

/// Client side of the world connection's framing.
#[derive(Debug)]
pub struct WorldFramer {
    buffer: AccumulationBuffer,
    header: HeaderState,
    cipher: Option<SessionCipher>,
}

impl Default for WorldFramer {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldFramer {
    pub fn new() -> Self {
        Self {
            buffer: AccumulationBuffer::new(),
            header: HeaderState::Empty,
            cipher: None,
        }
    }

    /// Starts header encryption in both directions. Called once, right after
    /// `CMSG_AUTH_SESSION` has been written.
    pub fn enable_encryption(&mut self, session_key: &[u8]) {
        self.cipher = Some(SessionCipher::new(session_key, Role::Client));
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend(chunk);
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Next complete frame, or `None` until more bytes arrive. Call until `None` after every
    /// `feed` so frames coalesced into one read are all drained.
    pub fn next_packet(&mut self) -> PacketResult<Option<WorldPacket>> {
        loop {
            match self.header {
                HeaderState::Empty => {
                    if self.buffer.len() < 4 {
                        return Ok(None);
                    }
                    let mut first = self.buffer.drain(1);
                    self.decrypt(&mut first);
                    self.header = HeaderState::Partial { first: first[0] };
                }
                HeaderState::Partial { first } => {
                    let long = first & LONG_SIZE_FLAG != 0;
                    let rest_len = if long { 4 } else { 3 };
                    if self.buffer.len() < rest_len {
                        return Ok(None);
                    }
                    let mut rest = self.buffer.drain(rest_len);
                    self.decrypt(&mut rest);

                    let (size, opcode) = parse_server_header(first, &rest)
                        .map_err(|err| PacketError::Layout(err.to_string()))?;
                    let body_len = size.checked_sub(2).ok_or_else(|| {
                        PacketError::Layout(format!("world header size {size} is below 2"))
                    })?;
                    self.header = HeaderState::Ready { body_len, opcode };
                }
                HeaderState::Ready { body_len, opcode } => {
                    if self.buffer.len() < body_len {
                        return Ok(None);
                    }
                    let body = self.buffer.drain(body_len);
                    self.header = HeaderState::Empty;
                    return Ok(Some(WorldPacket { opcode, body }));
                }
            }
        }
    }

    /// Header plus body for an outgoing packet, header encrypted when the cipher is on. An
    /// oversized body fails before the cipher advances.
    pub fn encode(&mut self, opcode: u16, body: &[u8]) -> PacketResult<Vec<u8>> {
        let mut header = encode_header(opcode, body.len())?;
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.encrypt(&mut header);
        }
        let mut out = Vec::with_capacity(header.len() + body.len());
        out.extend_from_slice(&header);
        out.extend_from_slice(body);
        Ok(out)
    }

    fn decrypt(&mut self, bytes: &mut [u8]) {
        if let Some(cipher) = self.cipher.as_mut() {
            cipher.decrypt(bytes);
        }
    }
}

/// Size and opcode from a decrypted server header. `rest` is everything after the first byte.
fn parse_server_header(first: u8, rest: &[u8]) -> io::Result<(usize, u16)> {
    let mut header = Vec::with_capacity(1 + rest.len());
    header.push(first & !LONG_SIZE_FLAG);
    header.extend_from_slice(rest);
    let mut cursor = Cursor::new(header.as_slice());
    let size = if first & LONG_SIZE_FLAG != 0 {
        cursor.read_u24::<BigEndian>()? as usize
    } else {
        usize::from(cursor.read_u16::<BigEndian>()?)
    };
    let opcode = cursor.read_u16::<LittleEndian>()?;
    Ok((size, opcode))
}

/// Largest body a client header can describe: the u16 size also counts the 4 opcode bytes.
pub const MAX_CLIENT_BODY: usize = u16::MAX as usize - 4;

/// Plain client header: size counts the 4 opcode bytes plus the body.
pub fn encode_header(opcode: u16, body_len: usize) -> PacketResult<[u8; 6]> {
    let size = u16::try_from(4 + body_len).map_err(|_| {
        PacketError::Layout(format!(
            "body of {body_len} bytes exceeds the {MAX_CLIENT_BODY}-byte client frame limit"
        ))
    })?;
    let mut header = [0u8; 6];
    BigEndian::write_u16(&mut header[..2], size);
    LittleEndian::write_u32(&mut header[2..], u32::from(opcode));
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_frame(opcode: u16, body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((body.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(&opcode.to_le_bytes());
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn accumulation_buffer_peek_and_drain() {
        let mut buffer = AccumulationBuffer::new();
        buffer.extend(&[1, 2, 3]);
        buffer.extend(&[4]);
        assert_eq!(buffer.peek(2), Some(&[1u8, 2][..]));
        assert_eq!(buffer.peek(5), None);
        assert_eq!(buffer.drain(3), vec![1, 2, 3]);
        assert_eq!(buffer.as_slice(), &[4]);
        assert_eq!(buffer.drain(10), vec![4]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn header_layout_is_big_endian_size_little_endian_opcode() {
        assert_eq!(
            encode_header(0x01ED, 10).unwrap(),
            [0x00, 0x0E, 0xED, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn oversized_client_body_is_rejected_without_advancing_the_cipher() {
        assert_eq!(encode_header(0x0095, MAX_CLIENT_BODY).unwrap()[..2], [0xFF, 0xFF]);
        assert!(matches!(
            encode_header(0x0095, MAX_CLIENT_BODY + 1),
            Err(PacketError::Layout(_))
        ));

        let key = [0x5A; 40];
        let mut framer = WorldFramer::new();
        framer.enable_encryption(&key);
        let mut server = SessionCipher::new(&key, Role::Server);
        let oversized = vec![0u8; MAX_CLIENT_BODY + 1];
        assert!(framer.encode(0x0095, &oversized).is_err());

        let outgoing = framer.encode(0x0095, b"ok").unwrap();
        let mut header = [0u8; 6];
        header.copy_from_slice(&outgoing[..6]);
        server.decrypt(&mut header);
        assert_eq!(header, encode_header(0x0095, 2).unwrap());
    }

    #[test]
    fn coalesced_frames_are_all_drained() {
        let mut framer = WorldFramer::new();
        let mut stream = server_frame(0x01DD, &[1, 0, 0, 0]);
        stream.extend(server_frame(0x0390, &[7, 0, 0, 0]));
        stream.extend(server_frame(0x01CB, b"hi\0"));
        framer.feed(&stream);

        let opcodes: Vec<u16> = std::iter::from_fn(|| framer.next_packet().unwrap())
            .map(|packet| packet.opcode)
            .collect();
        assert_eq!(opcodes, vec![0x01DD, 0x0390, 0x01CB]);
        assert_eq!(framer.buffered(), 0);
    }

    #[test]
    fn split_frame_waits_for_body() {
        let mut framer = WorldFramer::new();
        let frame = server_frame(0x0096, &[9; 12]);
        framer.feed(&frame[..3]);
        assert_eq!(framer.next_packet().unwrap(), None);
        framer.feed(&frame[3..8]);
        assert_eq!(framer.next_packet().unwrap(), None);
        framer.feed(&frame[8..]);
        let packet = framer.next_packet().unwrap().unwrap();
        assert_eq!(packet.opcode, 0x0096);
        assert_eq!(packet.body, vec![9; 12]);
    }

    #[test]
    fn long_header_uses_three_size_bytes() {
        let body = vec![0xAB; 0x8000];
        let size = body.len() + 2;
        let mut frame = vec![
            0x80 | (size >> 16) as u8,
            (size >> 8) as u8,
            size as u8,
        ];
        frame.extend_from_slice(&0x01F6u16.to_le_bytes());
        frame.extend_from_slice(&body);

        let mut framer = WorldFramer::new();
        framer.feed(&frame[..4]);
        assert_eq!(framer.next_packet().unwrap(), None);
        framer.feed(&frame[4..]);
        let packet = framer.next_packet().unwrap().unwrap();
        assert_eq!(packet.opcode, 0x01F6);
        assert_eq!(packet.body.len(), 0x8000);
    }

    #[test]
    fn undersized_header_is_rejected() {
        let mut framer = WorldFramer::new();
        framer.feed(&[0x00, 0x01, 0xDD, 0x01]);
        assert!(matches!(framer.next_packet(), Err(PacketError::Layout(_))));
    }

    #[test]
    fn encrypted_headers_round_trip_with_server_cipher() {
        let key = [0x5A; 40];
        let mut framer = WorldFramer::new();
        framer.enable_encryption(&key);
        let mut server = SessionCipher::new(&key, Role::Server);

        let outgoing = framer.encode(0x0095, b"abc").unwrap();
        let mut header = [0u8; 6];
        header.copy_from_slice(&outgoing[..6]);
        server.decrypt(&mut header);
        assert_eq!(header, encode_header(0x0095, 3).unwrap());
        assert_eq!(&outgoing[6..], b"abc");

        for opcode in [0x01EEu16, 0x003B] {
            let mut frame = server_frame(opcode, &[1, 2]);
            server.encrypt(&mut frame[..4]);
            framer.feed(&frame);
        }
        assert_eq!(framer.next_packet().unwrap().unwrap().opcode, 0x01EE);
        assert_eq!(framer.next_packet().unwrap().unwrap().opcode, 0x003B);
    }
}
