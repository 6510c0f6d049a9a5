//! Per-message world packet builders and parsers.

pub mod chat;
pub mod group;
pub mod login;
pub mod query;
pub mod social;
pub mod who;
