//! Realm server login: SRP6 or reconnect proof, then the realm list.

pub mod packets;

use num_bigint::BigInt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::config::{RetryPolicy, SESSION_KEY_LEN, SessionConfig};
use crate::error::{ClientError, Result};
use crate::framing::AccumulationBuffer;
use crate::wotlk::opcode::AuthCmd;
use crate::wotlk::srp::{SrpClient, random_private_ephemeral};

pub use packets::{Parsed, Realm, Reply};

/// Session key plus the realm to connect to.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub session_key: [u8; SESSION_KEY_LEN],
    pub realm: Realm,
}

#[derive(Debug)]
enum Phase {
    Challenge,
    Proof(Box<SrpClient>),
    ReconnectProof,
    Realms { session_key: [u8; SESSION_KEY_LEN] },
    Done,
}

/// What the driver should do after feeding bytes to the handshake.
#[derive(Debug)]
pub enum AuthStep {
    /// Nothing complete yet; read more.
    Wait,
    Send(Vec<u8>),
    Done(AuthResult),
}

/// Socket-free auth state machine. The driver owns the connection and the buffer.
#[derive(Debug)]
pub struct AuthHandshake {
    account: String,
    password: String,
    reconnect_key: Option<[u8; SESSION_KEY_LEN]>,
    private_ephemeral: BigInt,
    phase: Phase,
}

impl AuthHandshake {
    pub fn new(
        account: &str,
        password: &str,
        reconnect_key: Option<[u8; SESSION_KEY_LEN]>,
    ) -> Self {
        Self::with_private_ephemeral(account, password, reconnect_key, random_private_ephemeral())
    }

    /// Fixed SRP6 private exponent, for reproducible handshakes.
    pub fn with_private_ephemeral(
        account: &str,
        password: &str,
        reconnect_key: Option<[u8; SESSION_KEY_LEN]>,
        private_ephemeral: BigInt,
    ) -> Self {
        Self {
            account: account.to_uppercase(),
            password: password.to_string(),
            reconnect_key,
            private_ephemeral,
            phase: Phase::Challenge,
        }
    }

    /// The opening packet: a reconnect challenge when a session key is cached.
    pub fn start(&self) -> Vec<u8> {
        let cmd = if self.reconnect_key.is_some() {
            AuthCmd::RECONNECT_CHALLENGE
        } else {
            AuthCmd::LOGON_CHALLENGE
        };
        packets::build_logon_challenge(cmd, &self.account)
    }

    pub fn is_done(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// Consumes at most one complete server packet from `buffer`.
    pub fn advance(&mut self, buffer: &mut AccumulationBuffer) -> Result<AuthStep> {
        let Some(&[cmd]) = buffer.peek(1) else {
            return Ok(AuthStep::Wait);
        };

        let phase = std::mem::replace(&mut self.phase, Phase::Done);
        match (phase, cmd) {
            (Phase::Challenge, AuthCmd::LOGON_CHALLENGE) => {
                let Some(reply) = take(buffer, packets::parse_logon_challenge(buffer.as_slice()))?
                else {
                    self.phase = Phase::Challenge;
                    return Ok(AuthStep::Wait);
                };
                let params = match reply {
                    Reply::Accepted(params) => params,
                    Reply::Rejected(status) => {
                        warn!(status, "auth.challenge_rejected");
                        return Err(ClientError::AuthChallengeFailed(status));
                    }
                };
                let srp = SrpClient::new(
                    &self.account,
                    &self.password,
                    &params,
                    &self.private_ephemeral,
                )?;
                info!(account = %self.account, "auth.stage proof");
                let proof = packets::build_logon_proof(&srp.public_ephemeral(), &srp.client_proof());
                self.phase = Phase::Proof(Box::new(srp));
                Ok(AuthStep::Send(proof))
            }
            (Phase::Challenge, AuthCmd::RECONNECT_CHALLENGE) => {
                let Some(session_key) = self.reconnect_key else {
                    warn!("auth.reconnect_without_key");
                    return Err(ClientError::ReconnectRequired);
                };
                let Some(reply) =
                    take(buffer, packets::parse_reconnect_challenge(buffer.as_slice()))?
                else {
                    self.phase = Phase::Challenge;
                    return Ok(AuthStep::Wait);
                };
                let challenge = match reply {
                    Reply::Accepted(challenge) => challenge,
                    Reply::Rejected(status) => {
                        return Err(ClientError::ReconnectChallengeFailed(status));
                    }
                };
                let client_data: [u8; 16] = rand::random();
                let proof = packets::reconnect_proof_digest(
                    &self.account,
                    &challenge.challenge_data,
                    &client_data,
                    &session_key,
                );
                info!(account = %self.account, "auth.stage reconnect_proof");
                self.phase = Phase::ReconnectProof;
                Ok(AuthStep::Send(packets::build_reconnect_proof(
                    &client_data,
                    &proof,
                )))
            }
            (Phase::Proof(srp), AuthCmd::LOGON_PROOF) => {
                let Some(reply) = take(buffer, packets::parse_logon_proof(buffer.as_slice()))?
                else {
                    self.phase = Phase::Proof(srp);
                    return Ok(AuthStep::Wait);
                };
                let server_proof = match reply {
                    Reply::Accepted(server_proof) => server_proof,
                    Reply::Rejected(status) => {
                        warn!(status, "auth.proof_rejected");
                        return Err(ClientError::AuthProofFailed(status));
                    }
                };
                if !srp.validate_proof(&server_proof) {
                    return Err(ClientError::ServerM2Mismatch);
                }
                info!("auth.stage realms");
                self.phase = Phase::Realms {
                    session_key: srp.session_key(),
                };
                Ok(AuthStep::Send(packets::build_realm_list_request()))
            }
            (Phase::ReconnectProof, AuthCmd::RECONNECT_PROOF) => {
                let Some(reply) = take(buffer, packets::parse_reconnect_proof(buffer.as_slice()))?
                else {
                    self.phase = Phase::ReconnectProof;
                    return Ok(AuthStep::Wait);
                };
                if let Reply::Rejected(status) = reply {
                    return Err(ClientError::ReconnectProofFailed(status));
                }
                let Some(session_key) = self.reconnect_key else {
                    return Err(ClientError::ReconnectRequired);
                };
                info!("auth.stage realms");
                self.phase = Phase::Realms { session_key };
                Ok(AuthStep::Send(packets::build_realm_list_request()))
            }
            (Phase::Realms { session_key }, AuthCmd::REALM_LIST) => {
                let Some(realms) = take(buffer, packets::parse_realm_list(buffer.as_slice()))?
                else {
                    self.phase = Phase::Realms { session_key };
                    return Ok(AuthStep::Wait);
                };
                debug!(count = realms.len(), "auth.realm_list");
                let realm = realms
                    .into_iter()
                    .next()
                    .ok_or(ClientError::NoRealmsAvailable)?;
                info!(realm = %realm.name, address = %realm.address(), "auth.stage done");
                Ok(AuthStep::Done(AuthResult { session_key, realm }))
            }
            (_, cmd) => Err(ClientError::UnexpectedAuthOpcode(cmd)),
        }
    }
}

/// Drains a complete packet from the buffer, or reports that more bytes are needed.
fn take<T>(buffer: &mut AccumulationBuffer, parsed: Parsed<T>) -> Result<Option<T>> {
    match parsed {
        Parsed::NeedMoreBytes => Ok(None),
        Parsed::Complete(value, used) => {
            buffer.drain(used);
            Ok(Some(value))
        }
        Parsed::Malformed(err) => Err(err),
    }
}

/// Runs the realm handshake over a fresh connection to `config.auth_address()`.
pub async fn authenticate(config: &SessionConfig) -> Result<AuthResult> {
    let reconnect_key = config.reconnect_key_bytes()?;
    let handshake = AuthHandshake::new(&config.account, &config.password, reconnect_key);
    authenticate_with(config, handshake).await
}

pub async fn authenticate_with(
    config: &SessionConfig,
    mut handshake: AuthHandshake,
) -> Result<AuthResult> {
    let address = config.auth_address();
    info!(%address, reconnect = handshake.reconnect_key.is_some(), "auth.connect");
    let mut stream = TcpStream::connect(&address).await?;
    stream.write_all(&handshake.start()).await?;

    let mut buffer = AccumulationBuffer::new();
    let mut chunk = [0u8; 4096];
    loop {
        loop {
            match handshake.advance(&mut buffer)? {
                AuthStep::Wait => break,
                AuthStep::Send(packet) => stream.write_all(&packet).await?,
                AuthStep::Done(result) => {
                    close_auth_stream(&mut stream).await;
                    return Ok(result);
                }
            }
        }

        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            return Err(ClientError::ConnectionClosedUnexpectedly);
        }
        debug!(bytes = read, "auth.rx");
        buffer.extend(&chunk[..read]);
    }
}

/// `authenticate`, retrying only `ReconnectRequired` with capped exponential backoff.
pub async fn authenticate_with_retry(
    config: &SessionConfig,
    policy: &RetryPolicy,
) -> Result<AuthResult> {
    let mut attempt = 1;
    loop {
        match authenticate(config).await {
            Err(err) if err.is_reconnect_required() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(attempt, delay_ms = delay.as_millis() as u64, "auth.retry");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            result => return result,
        }
    }
}

/// The handshake already settled, so a failed half-close is only worth a debug line.
async fn close_auth_stream(stream: &mut TcpStream) {
    if let Err(err) = stream.shutdown().await {
        debug!(error = %err, "auth.shutdown_error");
    }
}
