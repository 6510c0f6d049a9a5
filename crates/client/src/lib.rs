//! Headless WotLK (3.3.5a) client: realm authentication, world login and a session handle for
//! chat, group, friend and nearby-entity tracking.

pub mod auth;
pub mod codec;
pub mod config;
pub mod config_loader;
pub mod dispatch;
pub mod error;
pub mod framing;
pub mod session;
pub mod wotlk;

pub use auth::{AuthResult, authenticate, authenticate_with_retry};
pub use config::{RetryPolicy, SessionConfig};
pub use error::{ClientError, Result};
pub use session::{SessionEvent, SessionHandle, connect_world};
