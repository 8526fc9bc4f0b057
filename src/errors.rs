//! All the errors defined by this crate.

use std::io;
use thiserror::Error;
use tokio::time::error::Elapsed;

/// An error from the RCON protocol or the connection carrying it.
#[derive(Error, Debug)]
pub enum RconError {
    /// The TCP connection to the server could not be established.
    #[error("cannot reach host")]
    Dial(#[source] io::Error),

    /// The configured deadline expired while connecting or while waiting
    /// for a command response.
    #[error("timed out waiting for the server")]
    Timeout(#[from] Elapsed),

    /// The authentication handshake did not complete within its packet and
    /// time bounds. The server kept sending packets that were not an
    /// AUTH_RESPONSE, or stopped sending anything at all.
    #[error("authentication handshake did not complete")]
    AuthTimeout,

    /// Authentication failed. The server answered with request ID -1,
    /// which means the password was rejected.
    #[error("server rejected the rcon password")]
    AuthFailed,

    /// A command was issued on a connection that is closed or was never
    /// successfully authenticated.
    #[error("connection is not authenticated")]
    NotAuthenticated,

    /// The packet violates the wire format: size field out of bounds,
    /// missing NUL terminators, or a body that is not valid UTF-8.
    #[error("malformed packet: {0}")]
    MalformedPacket(&'static str),

    /// The socket closed before a full packet could be read.
    #[error("stream closed mid-packet")]
    TruncatedStream(#[source] io::Error),

    /// The response carries a request ID that matches neither the
    /// outstanding command nor its terminator probe. The stream is
    /// desynchronized and no partial data is returned.
    #[error("response id {got} does not match request id {expected}")]
    UnexpectedResponse {
        /// The request ID we sent.
        expected: i32,
        /// The request ID the server echoed back.
        got: i32,
    },

    /// The stream was established, but writing a packet to it failed.
    #[error("cannot send request")]
    Send(#[source] io::Error),

    /// The stream was established, but reading a response from it failed.
    #[error("cannot receive response")]
    Receive(#[source] io::Error),

    /// Shutting down the socket failed. Reported separately from any
    /// command result so that it never masks one.
    #[error("cannot close connection")]
    Close(#[source] io::Error),

    /// Serverbound payloads are capped at 1446 bytes by the protocol.
    #[error("payload of {0} bytes exceeds the serverbound limit")]
    PayloadTooLong(usize),

    /// The payload contains a NUL byte, which the wire format reserves as
    /// the body terminator.
    #[error("payload contains an embedded nul byte")]
    EmbeddedNul,
}
