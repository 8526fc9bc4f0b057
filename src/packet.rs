//! The RCON wire format: `[size][id][type][body][0x00][0x00]`, all integers
//! 32-bit signed little-endian. `size` is the byte length of everything
//! after the size field itself.

use crate::errors::RconError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::mem::size_of;

/// Maximum clientbound payload length in bytes.
pub const MAX_LEN_CLIENTBOUND: usize = 4096;

/// Maximum serverbound payload length in bytes.
pub const MAX_LEN_SERVERBOUND: usize = 1446;

/// Size of a packet with an empty payload: two [i32]s plus two NUL bytes.
pub const MIN_PACKET_SIZE: i32 = 10;

/// Sanity ceiling for the size field when decoding. Anything larger than a
/// full clientbound payload plus framing means the stream is corrupt.
pub const MAX_PACKET_SIZE: i32 = MAX_LEN_CLIENTBOUND as i32 + MIN_PACKET_SIZE;

/// The type tag of an RCON packet.
///
/// The numeric values overlap: `2` is SERVERDATA_EXECCOMMAND when sent by a
/// client and SERVERDATA_AUTH_RESPONSE when sent by a server. The protocol
/// distinguishes them by direction only, so this enum maps both onto
/// [`RunCommand`](PacketType::RunCommand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    /// SERVERDATA_RESPONSE_VALUE (0): command output from the server.
    Response,
    /// SERVERDATA_EXECCOMMAND / SERVERDATA_AUTH_RESPONSE (2).
    RunCommand,
    /// SERVERDATA_AUTH (3): the password handshake packet.
    Auth,
}

impl From<PacketType> for i32 {
    fn from(packet_type: PacketType) -> Self {
        match packet_type {
            PacketType::Response => 0,
            PacketType::RunCommand => 2,
            PacketType::Auth => 3,
        }
    }
}

impl TryFrom<i32> for PacketType {
    type Error = RconError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Response),
            2 => Ok(PacketType::RunCommand),
            3 => Ok(PacketType::Auth),
            _ => Err(RconError::MalformedPacket("unknown packet type")),
        }
    }
}

/// One RCON packet, decoded. The size field is implied by the payload and
/// recomputed on encode.
#[derive(Debug)]
pub struct Packet {
    /// Caller-assigned correlation token, echoed back by the server.
    pub request_id: i32,
    /// The packet type tag.
    pub packet_type: PacketType,
    /// The packet body, without its NUL terminator.
    pub payload: String,
}

impl Packet {
    /// Construct a packet. The payload may not contain a NUL byte, since
    /// NUL terminates the body on the wire.
    pub fn new(
        request_id: i32,
        packet_type: PacketType,
        payload: impl Into<String>,
    ) -> Result<Self, RconError> {
        let payload = payload.into();
        if payload.as_bytes().contains(&0) {
            return Err(RconError::EmbeddedNul);
        }

        Ok(Self {
            request_id,
            packet_type,
            payload,
        })
    }

    /// Serialize into wire bytes.
    pub fn bytes(self) -> Bytes {
        Bytes::from(self)
    }
}

impl TryFrom<Bytes> for Packet {
    type Error = RconError;

    fn try_from(mut bytes: Bytes) -> Result<Self, Self::Error> {
        if bytes.remaining() < size_of::<i32>() {
            return Err(RconError::MalformedPacket("frame too short"));
        }

        let len = bytes.get_i32_le();
        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&len) {
            return Err(RconError::MalformedPacket("size field out of bounds"));
        }
        if bytes.remaining() != len as usize {
            return Err(RconError::MalformedPacket("size field does not match frame"));
        }

        let request_id = bytes.get_i32_le();
        let packet_type = bytes.get_i32_le();

        // everything up to the last two bytes is the body; the last two
        // must be the string terminator and the padding NUL
        let body = bytes.split_to(bytes.remaining() - 2);
        if bytes.get_u8() != 0 || bytes.get_u8() != 0 {
            return Err(RconError::MalformedPacket("missing nul terminators"));
        }
        if body.contains(&0) {
            return Err(RconError::MalformedPacket("embedded nul in body"));
        }

        let payload = String::from_utf8(body.to_vec())
            .map_err(|_| RconError::MalformedPacket("body is not valid utf-8"))?;

        Self::new(request_id, packet_type.try_into()?, payload)
    }
}

impl From<Packet> for Bytes {
    fn from(packet: Packet) -> Self {
        let len = remaining_length(&packet.payload);
        let packet_type: i32 = packet.packet_type.into();

        let mut bytes = BytesMut::with_capacity(size_of::<i32>() + len as usize);

        bytes.put_i32_le(len);
        bytes.put_i32_le(packet.request_id);
        bytes.put_i32_le(packet_type);
        bytes.put(packet.payload.as_bytes());
        bytes.put_u16(0x00_00);

        bytes.freeze()
    }
}

/// The value of the size field for a given payload: two [i32]s (request ID
/// and type) plus the payload plus two NUL bytes.
fn remaining_length(payload: &str) -> i32 {
    (payload.len() + size_of::<i32>() * 2 + 2) as i32
}
