use crate::errors::RconError;
use crate::packet::{Packet, MAX_PACKET_SIZE, MIN_PACKET_SIZE};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Trait to allow for reading whole RCON frames from the socket.
///
/// A frame is a 4-byte little-endian size field followed by exactly that
/// many bytes. The size field is sanity-checked before the body is read so
/// a corrupt stream fails fast instead of swallowing megabytes.
#[async_trait]
pub(crate) trait ReadRconPacket {
    /// Read one [Packet] from the socket.
    async fn read_rcon_packet(&mut self) -> Result<Packet, RconError>;
}

#[async_trait]
impl<T> ReadRconPacket for T
where
    T: AsyncRead + Unpin + Send,
{
    async fn read_rcon_packet(&mut self) -> Result<Packet, RconError> {
        let len = self.read_i32_le().await.map_err(read_error)?;

        if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&len) {
            return Err(RconError::MalformedPacket("size field out of bounds"));
        }

        let mut body = vec![0; len as usize];
        self.read_exact(&mut body).await.map_err(read_error)?;

        let mut bytes = BytesMut::with_capacity(4 + body.len());
        bytes.put_i32_le(len);
        bytes.put(body.as_slice());

        Packet::try_from(bytes.freeze())
    }
}

/// A socket that closes mid-frame is a protocol violation, not a plain IO
/// failure, and gets its own error.
fn read_error(err: std::io::Error) -> RconError {
    if err.kind() == ErrorKind::UnexpectedEof {
        RconError::TruncatedStream(err)
    } else {
        RconError::Receive(err)
    }
}
