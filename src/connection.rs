//! A single authenticated RCON connection over TCP.

use crate::errors::RconError;
use crate::packet::{Packet, PacketType, MAX_LEN_SERVERBOUND};
use crate::socket::ReadRconPacket;
use log::{debug, trace, warn};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Request ID used for the AUTH packet. Command IDs start above it so an
/// auth echo can never be mistaken for a command response.
const AUTH_REQUEST_ID: i32 = 0;

/// First request ID handed out for commands.
const FIRST_COMMAND_ID: i32 = 1;

/// How many non-AUTH_RESPONSE packets the handshake will discard before
/// giving up. Servers that echo junk send one or two packets, not ten.
const MAX_HANDSHAKE_PACKETS: usize = 10;

/// Deadline applied to connect, handshake, and each command unless the
/// caller overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// One TCP connection to an RCON server, authenticated at construction.
///
/// Reads and writes on a connection are strictly sequential: a command's
/// full response is consumed before the next command is written. RCON
/// servers do not reliably pipeline, so concurrent commands need one
/// connection each (see [`Client::send`](crate::Client::send)) or external
/// serialization.
///
/// # Examples
///
/// ```no_run
/// use mc_rcon::Connection;
///
/// #[tokio::main]
/// async fn main() -> Result<(), mc_rcon::RconError> {
///     let mut connection = Connection::dial("localhost:25575", "password").await?;
///
///     let output = connection.send_command("time set day").await?;
///     println!("{output}");
///
///     connection.close().await
/// }
/// ```
#[derive(Debug)]
pub struct Connection {
    socket: Option<TcpStream>,
    addr: String,
    password: String,
    timeout: Option<Duration>,
    authenticated: bool,
    closed: bool,
    next_request_id: i32,
}

impl Connection {
    /// Connect to `addr` (`host:port`) and authenticate with `password`,
    /// under [`DEFAULT_TIMEOUT`].
    ///
    /// # Errors
    /// Returns [`RconError::Dial`] if the TCP connection fails,
    /// [`RconError::AuthFailed`] if the server rejects the password, and
    /// [`RconError::AuthTimeout`] if the handshake exceeds its bounds.
    pub async fn dial(addr: &str, password: &str) -> Result<Self, RconError> {
        Self::dial_with_timeout(addr, password, Some(DEFAULT_TIMEOUT)).await
    }

    /// Like [`dial`](Self::dial) with an explicit deadline, or none at all.
    ///
    /// `None` waits arbitrarily long (maybe forever!) on a hung server;
    /// prefer a bounded value.
    ///
    /// # Errors
    /// As [`dial`](Self::dial), plus [`RconError::Timeout`] if the TCP
    /// connect itself exceeds the deadline.
    pub async fn dial_with_timeout(
        addr: &str,
        password: &str,
        deadline: Option<Duration>,
    ) -> Result<Self, RconError> {
        let connect = TcpStream::connect(addr);
        let socket = match deadline {
            None => connect.await,
            Some(d) => timeout(d, connect).await?,
        }
        .map_err(RconError::Dial)?;

        trace!("opened tcp stream to {addr}, attempting auth");

        let mut connection = Self {
            socket: Some(socket),
            addr: addr.to_string(),
            password: password.to_string(),
            timeout: deadline,
            authenticated: false,
            closed: false,
            next_request_id: FIRST_COMMAND_ID,
        };

        connection.handshake().await?;
        debug!("authenticated to {addr}");

        Ok(connection)
    }

    /// Change the deadline for future commands.
    pub fn set_timeout(&mut self, deadline: Option<Duration>) {
        self.timeout = deadline;
    }

    /// Whether the handshake succeeded and the connection is still open.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Whether the connection has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Run `command` on the server and return its full output, reassembled
    /// across however many response packets the server split it into.
    ///
    /// # Errors
    /// Returns [`RconError::NotAuthenticated`] on a closed or
    /// unauthenticated connection, [`RconError::PayloadTooLong`] for
    /// commands over the serverbound limit, [`RconError::UnexpectedResponse`]
    /// if the stream desynchronizes, and [`RconError::Timeout`] if the
    /// response does not arrive within the deadline.
    pub async fn send_command(&mut self, command: &str) -> Result<String, RconError> {
        if self.closed || !self.authenticated {
            return Err(RconError::NotAuthenticated);
        }
        if command.len() > MAX_LEN_SERVERBOUND {
            return Err(RconError::PayloadTooLong(command.len()));
        }

        let deadline = self.timeout;
        let fut = self.send_command_raw(command);

        match deadline {
            None => fut.await,
            Some(d) => timeout(d, fut).await?,
        }
    }

    /// Close the connection. Safe to call more than once: a second call
    /// returns `Ok` immediately and never touches the released socket.
    ///
    /// # Errors
    /// Returns [`RconError::Close`] if the socket shutdown fails. The
    /// connection still counts as closed in that case.
    pub async fn close(&mut self) -> Result<(), RconError> {
        if self.closed {
            return Ok(());
        }

        self.closed = true;
        self.authenticated = false;

        if let Some(mut socket) = self.socket.take() {
            socket.shutdown().await.map_err(RconError::Close)?;
        }
        Ok(())
    }

    /// Re-dial the stored address and password, replacing the socket and
    /// resetting the authentication state and ID counter.
    ///
    /// Must not be called while a command is in flight on this connection;
    /// `&mut self` enforces that within safe code.
    ///
    /// # Errors
    /// As [`dial`](Self::dial). On error the connection stays closed.
    pub async fn reconnect(&mut self) -> Result<(), RconError> {
        if let Err(err) = self.close().await {
            warn!("discarding stale socket during reconnect: {err}");
        }

        let addr = self.addr.clone();
        let password = self.password.clone();
        *self = Self::dial_with_timeout(&addr, &password, self.timeout).await?;
        Ok(())
    }

    async fn handshake(&mut self) -> Result<(), RconError> {
        let deadline = self.timeout;
        let fut = self.handshake_raw();

        let result = match deadline {
            None => fut.await,
            Some(d) => timeout(d, fut)
                .await
                .unwrap_or(Err(RconError::AuthTimeout)),
        };

        match result {
            Ok(()) => {
                self.authenticated = true;
                Ok(())
            }
            Err(err) => {
                // a connection that failed its handshake is unusable
                if let Err(close_err) = self.close().await {
                    warn!("closing after failed handshake: {close_err}");
                }
                Err(err)
            }
        }
    }

    async fn handshake_raw(&mut self) -> Result<(), RconError> {
        let auth = Packet::new(AUTH_REQUEST_ID, PacketType::Auth, self.password.clone())?;
        self.write_packet(auth).await?;

        // some servers echo an empty RESPONSE_VALUE before answering the
        // handshake; discard anything that is not an AUTH_RESPONSE, with a
        // bound so a chatty server cannot stall us forever
        for _ in 0..MAX_HANDSHAKE_PACKETS {
            let packet = self.read_packet().await?;

            // AUTH_RESPONSE shares its numeric tag with EXECCOMMAND
            if packet.packet_type != PacketType::RunCommand {
                trace!("discarding pre-auth packet of type {:?}", packet.packet_type);
                continue;
            }

            return match packet.request_id {
                -1 => Err(RconError::AuthFailed),
                AUTH_REQUEST_ID => Ok(()),
                got => Err(RconError::UnexpectedResponse {
                    expected: AUTH_REQUEST_ID,
                    got,
                }),
            };
        }

        Err(RconError::AuthTimeout)
    }

    async fn send_command_raw(&mut self, command: &str) -> Result<String, RconError> {
        let request_id = self.next_id();
        let packet = Packet::new(request_id, PacketType::RunCommand, command)?;

        trace!("sending request {request_id}: {command}");
        self.write_packet(packet).await?;

        let first = self.read_packet().await?;
        if first.request_id != request_id {
            return Err(RconError::UnexpectedResponse {
                expected: request_id,
                got: first.request_id,
            });
        }

        // an empty body means the command produced no output; nothing to
        // reassemble
        if first.payload.is_empty() {
            return Ok(first.payload);
        }

        self.reassemble(request_id, first.payload).await
    }

    /// Multi-packet reassembly via the terminator probe.
    ///
    /// The protocol has no end-of-message marker: a large response is
    /// split across several RESPONSE_VALUE packets and the last fragment
    /// looks like any other. The workaround is to send an empty follow-up
    /// command with a fresh ID as soon as the first fragment arrives.
    /// Servers answer requests in order, so once the probe's ID echoes
    /// back (with an empty body) every fragment of the original response
    /// has been received. Server implementations vary in their exact echo
    /// behavior, which makes this the most fragile part of the protocol;
    /// it stays contained in this one routine.
    async fn reassemble(
        &mut self,
        request_id: i32,
        mut payload: String,
    ) -> Result<String, RconError> {
        let probe_id = self.next_id();
        let probe = Packet::new(probe_id, PacketType::RunCommand, "")?;

        trace!("sending terminator probe {probe_id} for request {request_id}");
        self.write_packet(probe).await?;

        loop {
            let fragment = self.read_packet().await?;

            if fragment.request_id == probe_id {
                debug!("request {request_id} complete, {} bytes", payload.len());
                return Ok(payload);
            }
            if fragment.request_id != request_id {
                return Err(RconError::UnexpectedResponse {
                    expected: request_id,
                    got: fragment.request_id,
                });
            }

            payload.push_str(&fragment.payload);
        }
    }

    fn next_id(&mut self) -> i32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    async fn write_packet(&mut self, packet: Packet) -> Result<(), RconError> {
        let bytes = packet.bytes();
        self.socket_mut()?
            .write_all(&bytes)
            .await
            .map_err(RconError::Send)
    }

    async fn read_packet(&mut self) -> Result<Packet, RconError> {
        self.socket_mut()?.read_rcon_packet().await
    }

    fn socket_mut(&mut self) -> Result<&mut TcpStream, RconError> {
        self.socket.as_mut().ok_or(RconError::NotAuthenticated)
    }
}
