//! In-process scripted RCON server for exercising the client against a
//! real socket.

use crate::errors::RconError;
use crate::packet::{Packet, PacketType};
use crate::socket::ReadRconPacket;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

/// How a [FakeServer] behaves once a client connects.
#[derive(Clone)]
pub(crate) enum Script {
    /// Authenticate against the password and answer every command with a
    /// canned reply, optionally fragmented.
    Answer {
        password: String,
        reply: String,
        fragment: Option<usize>,
        pre_auth_junk: bool,
    },
    /// Authenticate and echo each command back as its own response.
    Echo { password: String },
    /// Authenticate, then reply to commands with an unrelated request ID.
    MisdirectedReply { password: String },
    /// Authenticate, then drop the connection mid-frame on the first command.
    TruncateReply { password: String },
    /// Never answer the handshake.
    Mute,
}

impl Script {
    pub fn answer(password: &str, reply: &str) -> Self {
        Script::Answer {
            password: password.into(),
            reply: reply.into(),
            fragment: None,
            pre_auth_junk: false,
        }
    }

    /// Split command replies into fragments of at most `size` bytes.
    pub fn split_every(self, size: usize) -> Self {
        match self {
            Script::Answer {
                password,
                reply,
                pre_auth_junk,
                ..
            } => Script::Answer {
                password,
                reply,
                fragment: Some(size),
                pre_auth_junk,
            },
            other => other,
        }
    }

    /// Send an empty RESPONSE_VALUE before the AUTH_RESPONSE, as some
    /// servers do.
    pub fn with_pre_auth_junk(self) -> Self {
        match self {
            Script::Answer {
                password,
                reply,
                fragment,
                ..
            } => Script::Answer {
                password,
                reply,
                fragment,
                pre_auth_junk: true,
            },
            other => other,
        }
    }

    fn password(&self) -> Option<&str> {
        match self {
            Script::Answer { password, .. }
            | Script::Echo { password }
            | Script::MisdirectedReply { password }
            | Script::TruncateReply { password } => Some(password),
            Script::Mute => None,
        }
    }
}

pub(crate) struct FakeServer {
    addr: SocketAddr,
}

impl FakeServer {
    /// Bind an ephemeral port and serve `script` to every connection.
    pub async fn start(script: Script) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let script = script.clone();
                tokio::spawn(async move {
                    let _ = serve(stream, script).await;
                });
            }
        });

        Ok(Self { addr })
    }

    pub fn addr(&self) -> String {
        self.addr.to_string()
    }
}

async fn serve(mut stream: TcpStream, script: Script) -> Result<(), RconError> {
    let auth = stream.read_rcon_packet().await?;

    let Some(password) = script.password() else {
        std::future::pending::<()>().await;
        unreachable!()
    };

    if matches!(
        script,
        Script::Answer {
            pre_auth_junk: true,
            ..
        }
    ) {
        reply(&mut stream, auth.request_id, PacketType::Response, "").await?;
    }

    if auth.payload != password {
        return reply(&mut stream, -1, PacketType::RunCommand, "").await;
    }
    reply(&mut stream, auth.request_id, PacketType::RunCommand, "").await?;

    loop {
        let request = stream.read_rcon_packet().await?;

        // an empty command is the client's terminator probe
        if request.payload.is_empty() {
            reply(&mut stream, request.request_id, PacketType::Response, "").await?;
            continue;
        }

        match &script {
            Script::Answer {
                reply: text,
                fragment,
                ..
            } => match fragment {
                None => reply(&mut stream, request.request_id, PacketType::Response, text).await?,
                Some(size) => {
                    for chunk in text.as_bytes().chunks(*size) {
                        let chunk = std::str::from_utf8(chunk).unwrap();
                        reply(&mut stream, request.request_id, PacketType::Response, chunk)
                            .await?;
                    }
                }
            },
            Script::Echo { .. } => {
                reply(
                    &mut stream,
                    request.request_id,
                    PacketType::Response,
                    &request.payload,
                )
                .await?;
            }
            Script::MisdirectedReply { .. } => {
                reply(
                    &mut stream,
                    request.request_id.wrapping_add(7),
                    PacketType::Response,
                    "whoops",
                )
                .await?;
            }
            Script::TruncateReply { .. } => {
                let bytes = Packet::new(request.request_id, PacketType::Response, "cut off")
                    .unwrap()
                    .bytes();
                stream
                    .write_all(&bytes[..bytes.len() - 3])
                    .await
                    .map_err(RconError::Send)?;
                return Ok(());
            }
            Script::Mute => unreachable!(),
        }
    }
}

async fn reply(
    stream: &mut TcpStream,
    request_id: i32,
    packet_type: PacketType,
    payload: &str,
) -> Result<(), RconError> {
    let bytes = Packet::new(request_id, packet_type, payload)?.bytes();
    stream.write_all(&bytes).await.map_err(RconError::Send)
}
