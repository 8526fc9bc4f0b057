//! Async implementation of the
//! [Source RCON protocol](https://developer.valvesoftware.com/wiki/Source_RCON_Protocol)
//! as spoken by Source engine and Minecraft servers.
//!
//! [Client] is the usual entry point: it opens one short-lived,
//! authenticated connection per command, which makes it safe to share
//! across tasks. [Connection] exposes the underlying dial / send / close /
//! reconnect lifecycle for callers that want a long-lived connection.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]

pub mod client;
pub mod connection;
pub mod errors;
pub mod packet;
mod socket;

#[cfg(test)]
mod test_server;

pub use client::Client;
pub use connection::Connection;
pub use errors::RconError;
