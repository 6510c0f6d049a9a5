//! Protocol-level building blocks shared by the client and any headless tooling: packet cursors,
//! the update-object codec and the stores that materialize it.
//!
//! Nothing in this crate performs I/O.

pub mod packet;
pub mod world;
