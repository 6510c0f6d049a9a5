use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClientError, Result};

pub const SESSION_KEY_LEN: usize = 40;

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub account: String,
    pub password: String,
    pub character: String,
    /// Hex of a session key from an earlier login, enabling the reconnect handshake.
    #[serde(default)]
    pub reconnect_key: Option<String>,
    #[serde(default = "default_language")]
    pub language: u32,
    /// Channels joined once in the world.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    #[serde(default = "default_expect_timeout_secs")]
    pub expect_timeout_secs: u64,
    #[serde(default)]
    pub report_unhandled_opcodes: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based): doubles each time, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(32);
        let ms = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(ms)
    }
}

fn default_port() -> u16 {
    3724
}

fn default_language() -> u32 {
    7
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_expect_timeout_secs() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8000
}

impl SessionConfig {
    pub fn new(host: &str, port: u16, account: &str, password: &str, character: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            account: account.to_string(),
            password: password.to_string(),
            character: character.to_string(),
            reconnect_key: None,
            language: default_language(),
            channels: Vec::new(),
            ping_interval_secs: default_ping_interval_secs(),
            expect_timeout_secs: default_expect_timeout_secs(),
            report_unhandled_opcodes: false,
        }
    }

    pub fn auth_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn expect_timeout(&self) -> Duration {
        Duration::from_secs(self.expect_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs.max(1))
    }

    pub fn reconnect_key_bytes(&self) -> Result<Option<[u8; SESSION_KEY_LEN]>> {
        let Some(hex) = self.reconnect_key.as_deref() else {
            return Ok(None);
        };
        let bytes = decode_hex(hex)?;
        let key: [u8; SESSION_KEY_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            ClientError::InvalidReconnectKey(format!(
                "expected {SESSION_KEY_LEN} bytes, got {}",
                b.len()
            ))
        })?;
        Ok(Some(key))
    }
}

pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let clean = input.trim();
    if !clean.len().is_multiple_of(2) {
        return Err(ClientError::InvalidReconnectKey(
            "hex length must be even".into(),
        ));
    }

    let bytes = clean.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    for pair in bytes.chunks(2) {
        out.push((hex_nibble(pair[0])? << 4) | hex_nibble(pair[1])?);
    }
    Ok(out)
}

pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_nibble(ch: u8) -> Result<u8> {
    match ch {
        b'0'..=b'9' => Ok(ch - b'0'),
        b'a'..=b'f' => Ok(ch - b'a' + 10),
        b'A'..=b'F' => Ok(ch - b'A' + 10),
        _ => Err(ClientError::InvalidReconnectKey(format!(
            "invalid hex character {}",
            ch as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_loader::ConfigLoader;

    #[test]
    fn defaults_fill_optional_fields() {
        let config: SessionConfig = ConfigLoader::parse_from_string(
            r#"
            host = "logon.example.org"
            account = "bot"
            password = "secret"
            character = "Botty"
            "#
            .to_string(),
        )
        .unwrap();
        assert_eq!(config.port, 3724);
        assert_eq!(config.language, 7);
        assert_eq!(config.ping_interval_secs, 30);
        assert_eq!(config.expect_timeout(), Duration::from_secs(10));
        assert!(config.channels.is_empty());
        assert!(config.reconnect_key_bytes().unwrap().is_none());
    }

    #[test]
    fn reconnect_key_must_be_forty_bytes_of_hex() {
        let mut config = SessionConfig::new("h", 1, "a", "p", "c");
        config.reconnect_key = Some(encode_hex(&[0xAB; SESSION_KEY_LEN]));
        assert_eq!(
            config.reconnect_key_bytes().unwrap(),
            Some([0xAB; SESSION_KEY_LEN])
        );

        config.reconnect_key = Some("abcd".into());
        assert!(matches!(
            config.reconnect_key_bytes(),
            Err(ClientError::InvalidReconnectKey(_))
        ));
        config.reconnect_key = Some("zz".into());
        assert!(config.reconnect_key_bytes().is_err());
    }

    #[test]
    fn retry_delay_doubles_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 1000,
        };
        let delays: Vec<u64> = (1..=6)
            .map(|n| policy.delay_for(n).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(policy.delay_for(200), Duration::from_millis(1000));
    }
}
