//! SRP6 as spoken by WotLK realm servers.
//!
//! Every big number (N, g, A, B, salt-derived x) travels little-endian. The two conversions
//! below are the only places that byte order is decided.

use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use sha1::{Digest, Sha1};

use crate::error::{ClientError, Result};

/// SRP6 multiplier.
pub const SRP_K: u32 = 3;

pub fn wire_to_bigint(bytes: &[u8]) -> BigInt {
    BigInt::from_bytes_le(Sign::Plus, bytes)
}

/// Little-endian bytes of `value`, zero-padded up to `width`.
pub fn bigint_to_wire(value: &BigInt, width: usize) -> Vec<u8> {
    let (_, mut bytes) = value.to_bytes_le();
    if bytes.len() < width {
        bytes.resize(width, 0);
    }
    bytes
}

pub fn pad_to_32_bytes(value: &BigInt) -> [u8; 32] {
    let bytes = bigint_to_wire(value, 32);
    let mut buffer = [0u8; 32];
    let len = bytes.len().min(32);
    buffer[..len].copy_from_slice(&bytes[..len]);
    buffer
}

pub fn mod_floor(value: &BigInt, modulus: &BigInt) -> BigInt {
    ((value % modulus) + modulus) % modulus
}

pub fn random_private_ephemeral() -> BigInt {
    let bytes: [u8; 19] = rand::random();
    wire_to_bigint(&bytes)
}

pub fn calculate_x(account: &str, password: &str, salt: &[u8; 32]) -> BigInt {
    let identity_hash = Sha1::new()
        .chain_update(format!("{}:{}", account, password).as_bytes())
        .finalize();

    let x = Sha1::new().chain_update(salt).chain_update(identity_hash).finalize();
    wire_to_bigint(&x)
}

pub fn calculate_verifier(generator: &BigInt, modulus: &BigInt, x: &BigInt) -> BigInt {
    generator.modpow(x, modulus)
}

pub fn calculate_u(client_a: &BigInt, server_b: &BigInt) -> BigInt {
    let u = Sha1::new()
        .chain_update(pad_to_32_bytes(client_a))
        .chain_update(pad_to_32_bytes(server_b))
        .finalize();
    wire_to_bigint(&u)
}

/// Hashes the even and odd bytes of S separately and interleaves the digests into K.
pub fn calculate_interleaved(s: &BigInt) -> [u8; 40] {
    let padded = pad_to_32_bytes(s);
    let even: Vec<u8> = padded.iter().step_by(2).copied().collect();
    let odd: Vec<u8> = padded.iter().skip(1).step_by(2).copied().collect();

    let hashed1 = Sha1::new().chain_update(even).finalize();
    let hashed2 = Sha1::new().chain_update(odd).finalize();

    let mut session_key = [0u8; 40];
    for index in 0..20 {
        session_key[index * 2] = hashed1[index];
        session_key[index * 2 + 1] = hashed2[index];
    }
    session_key
}

pub fn calculate_m1(
    modulus: &BigInt,
    generator: &BigInt,
    account: &str,
    salt: &[u8; 32],
    client_a: &BigInt,
    server_b: &BigInt,
    session_key: &[u8],
) -> [u8; 20] {
    let n_hash = Sha1::new().chain_update(modulus.to_bytes_le().1).finalize();
    let g_hash = Sha1::new().chain_update(generator.to_bytes_le().1).finalize();
    let mut xor_hash = [0u8; 20];
    for (idx, byte) in xor_hash.iter_mut().enumerate() {
        *byte = n_hash[idx] ^ g_hash[idx];
    }
    let account_hash = Sha1::new().chain_update(account.as_bytes()).finalize();

    let out = Sha1::new()
        .chain_update(xor_hash)
        .chain_update(account_hash)
        .chain_update(salt)
        .chain_update(pad_to_32_bytes(client_a))
        .chain_update(pad_to_32_bytes(server_b))
        .chain_update(session_key)
        .finalize();

    let mut m1 = [0u8; 20];
    m1.copy_from_slice(&out);
    m1
}

pub fn calculate_m2(client_a: &BigInt, client_m1: &[u8; 20], session_key: &[u8]) -> [u8; 20] {
    let out = Sha1::new()
        .chain_update(pad_to_32_bytes(client_a))
        .chain_update(client_m1)
        .chain_update(session_key)
        .finalize();

    let mut m2 = [0u8; 20];
    m2.copy_from_slice(&out);
    m2
}

/// Server side: `B = k·v + g^b mod N`.
pub fn server_public_ephemeral(
    generator: &BigInt,
    modulus: &BigInt,
    verifier: &BigInt,
    private_ephemeral: &BigInt,
) -> BigInt {
    let gb = generator.modpow(private_ephemeral, modulus);
    mod_floor(&(BigInt::from(SRP_K) * verifier + gb), modulus)
}

/// Server side: `S = (A·v^u)^b mod N`.
pub fn server_session_secret(
    client_a: &BigInt,
    verifier: &BigInt,
    u: &BigInt,
    private_ephemeral: &BigInt,
    modulus: &BigInt,
) -> BigInt {
    let vu = verifier.modpow(u, modulus);
    let avu = mod_floor(&(client_a * vu), modulus);
    avu.modpow(private_ephemeral, modulus)
}

/// Parameters from a logon challenge response, as received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrpParams {
    pub generator: Vec<u8>,
    pub modulus: Vec<u8>,
    pub server_ephemeral: [u8; 32],
    pub salt: [u8; 32],
}

/// Client half of one handshake. Account and password are uppercased before use.
#[derive(Debug)]
pub struct SrpClient {
    account: String,
    public_ephemeral: BigInt,
    session_key: [u8; 40],
    client_proof: [u8; 20],
    expected_server_proof: [u8; 20],
}

impl SrpClient {
    pub fn new(
        account: &str,
        password: &str,
        params: &SrpParams,
        private_ephemeral: &BigInt,
    ) -> Result<Self> {
        let account = account.to_uppercase();
        let password = password.to_uppercase();

        let modulus = wire_to_bigint(&params.modulus);
        let generator = wire_to_bigint(&params.generator);
        let server_b = wire_to_bigint(&params.server_ephemeral);
        if modulus.is_zero() || mod_floor(&server_b, &modulus).is_zero() {
            return Err(ClientError::InvalidServerEphemeral);
        }

        let public_ephemeral = generator.modpow(private_ephemeral, &modulus);
        let x = calculate_x(&account, &password, &params.salt);
        let verifier = calculate_verifier(&generator, &modulus, &x);
        let u = calculate_u(&public_ephemeral, &server_b);

        let base = mod_floor(&(&server_b - BigInt::from(SRP_K) * verifier), &modulus);
        let s = base.modpow(&(private_ephemeral + u * x), &modulus);
        let session_key = calculate_interleaved(&s);

        let client_proof = calculate_m1(
            &modulus,
            &generator,
            &account,
            &params.salt,
            &public_ephemeral,
            &server_b,
            &session_key,
        );
        let expected_server_proof = calculate_m2(&public_ephemeral, &client_proof, &session_key);

        Ok(Self {
            account,
            public_ephemeral,
            session_key,
            client_proof,
            expected_server_proof,
        })
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn public_ephemeral(&self) -> [u8; 32] {
        pad_to_32_bytes(&self.public_ephemeral)
    }

    pub fn client_proof(&self) -> [u8; 20] {
        self.client_proof
    }

    pub fn session_key(&self) -> [u8; 40] {
        self.session_key
    }

    pub fn validate_proof(&self, server_proof: &[u8; 20]) -> bool {
        &self.expected_server_proof == server_proof
    }
}
