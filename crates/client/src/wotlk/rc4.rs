use std::fmt::{Debug, Formatter};

use hmacsha::HmacSha;
use sha1_09::Sha1;

/// HMAC key for the client-to-server stream.
const ENCRYPTION_KEY: [u8; 16] = [
    0xC2, 0xB3, 0x72, 0x3C, 0xC6, 0xAE, 0xD9, 0xB5, 0x34, 0x3C, 0x53, 0xEE, 0x2F, 0x43, 0x67, 0xCE,
];

/// HMAC key for the server-to-client stream.
const DECRYPTION_KEY: [u8; 16] = [
    0xCC, 0x98, 0xAE, 0x04, 0xE8, 0x97, 0xEA, 0xCA, 0x12, 0xDD, 0xC0, 0x93, 0x42, 0x91, 0x53, 0x57,
];

const KEYSTREAM_DROP: usize = 1024;

/// Which end of the world connection this cipher serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

/// Header cipher for one world connection. Both streams advance with every call, so the same
/// instance must see every header in wire order.
pub struct SessionCipher {
    outbound: RC4,
    inbound: RC4,
}

impl SessionCipher {
    pub fn new(session_key: &[u8], role: Role) -> Self {
        let (outbound, inbound) = match role {
            Role::Client => (&ENCRYPTION_KEY, &DECRYPTION_KEY),
            Role::Server => (&DECRYPTION_KEY, &ENCRYPTION_KEY),
        };
        Self {
            outbound: keyed_stream(outbound, session_key),
            inbound: keyed_stream(inbound, session_key),
        }
    }

    pub fn encrypt(&mut self, data: &mut [u8]) {
        self.outbound.apply(data);
    }

    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.inbound.apply(data);
    }
}

impl Debug for SessionCipher {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionCipher")
    }
}

fn keyed_stream(hmac_key: &[u8], session_key: &[u8]) -> RC4 {
    let digest = HmacSha::new(hmac_key, session_key, Sha1::default()).compute_digest();
    let mut stream = RC4::new(&digest);
    let mut sync = [0u8; KEYSTREAM_DROP];
    stream.apply(&mut sync);
    stream
}

struct RC4 {
    i: u8,
    j: u8,
    state: [u8; 256],
}

impl RC4 {
    /// `key` is an HMAC-SHA1 digest, never empty.
    fn new(key: &[u8]) -> Self {
        let mut state = [0u8; 256];
        for (i, x) in state.iter_mut().enumerate() {
            *x = i as u8;
        }

        let mut j: u8 = 0;
        for i in 0..256 {
            let k = key.get(i % key.len().max(1)).copied().unwrap_or(0);
            j = j.wrapping_add(state[i]).wrapping_add(k);
            state.swap(i, j as usize);
        }

        Self { i: 0, j: 0, state }
    }

    fn next_byte(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);
        self.state.swap(self.i as usize, self.j as usize);
        self.state[(self.state[self.i as usize].wrapping_add(self.state[self.j as usize])) as usize]
    }

    fn apply(&mut self, data: &mut [u8]) {
        for x in data.iter_mut() {
            *x ^= self.next_byte();
        }
    }
}
