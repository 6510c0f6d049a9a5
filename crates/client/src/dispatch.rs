//! Opcode routing: persistent handlers plus one-shot waiters.

use std::collections::HashMap;
use std::time::Duration;

use rusty_bot_core::packet::{PacketError, PacketResult};
use tokio::sync::oneshot;
use tracing::trace;

use crate::error::{ClientError, Result};

pub const DEFAULT_EXPECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Persistent handler. Runs against the connection's context with the frame body.
pub type Handler<C> = fn(&mut C, &[u8]) -> PacketResult<()>;

/// What happened to one frame.
#[derive(Debug, PartialEq)]
pub enum Dispatch {
    /// Delivered to a pending waiter; persistent handlers were skipped.
    Expected,
    Handled,
    Failed(PacketError),
    Unhandled,
}

pub struct Dispatcher<C> {
    handlers: HashMap<u16, Handler<C>>,
    waiters: HashMap<u16, oneshot::Sender<Vec<u8>>>,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> Dispatcher<C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            waiters: HashMap::new(),
        }
    }

    /// Registers (or replaces) the persistent handler for `opcode`.
    pub fn on(&mut self, opcode: u16, handler: Handler<C>) -> &mut Self {
        self.handlers.insert(opcode, handler);
        self
    }

    pub fn handles(&self, opcode: u16) -> bool {
        self.handlers.contains_key(&opcode)
    }

    /// One-shot wait for the next frame with `opcode`. A live waiter for the same opcode makes
    /// this fail; one whose receiver was dropped is replaced.
    pub fn expect(&mut self, opcode: u16) -> Result<oneshot::Receiver<Vec<u8>>> {
        if self
            .waiters
            .get(&opcode)
            .is_some_and(|waiter| !waiter.is_closed())
        {
            return Err(ClientError::ExpectAlreadyPending(opcode));
        }
        let (tx, rx) = oneshot::channel();
        self.waiters.insert(opcode, tx);
        Ok(rx)
    }

    pub fn dispatch(&mut self, context: &mut C, opcode: u16, body: &[u8]) -> Dispatch {
        if let Some(waiter) = self.waiters.remove(&opcode) {
            if waiter.send(body.to_vec()).is_ok() {
                trace!(opcode = format_args!("0x{opcode:04x}"), "dispatch.expected");
                return Dispatch::Expected;
            }
        }

        match self.handlers.get(&opcode) {
            Some(handler) => match handler(context, body) {
                Ok(()) => Dispatch::Handled,
                Err(err) => Dispatch::Failed(err),
            },
            None => Dispatch::Unhandled,
        }
    }
}

/// Awaits a waiter from [`Dispatcher::expect`], failing with `ExpectTimeout(opcode)`.
pub async fn wait_for(
    receiver: oneshot::Receiver<Vec<u8>>,
    opcode: u16,
    timeout: Duration,
) -> Result<Vec<u8>> {
    match tokio::time::timeout(timeout, receiver).await {
        Ok(Ok(body)) => Ok(body),
        Ok(Err(_)) => Err(ClientError::SessionClosed),
        Err(_) => Err(ClientError::ExpectTimeout(opcode)),
    }
}
