//! High-level facade over [Connection].

use crate::connection::{Connection, DEFAULT_TIMEOUT};
use crate::errors::RconError;
use log::warn;
use std::time::Duration;
use tokio::sync::Mutex;

type CloseErrorSink = Box<dyn Fn(RconError) + Send + Sync>;

/// Entry point for sending RCON commands to one server.
///
/// [`send`](Self::send) dials a fresh [Connection] for every call and
/// closes it before returning, so it is safe to call from any number of
/// tasks concurrently: no connection state is shared between calls. The
/// connection is closed on every exit path; if the task panics mid-command
/// the socket is released when the connection is dropped.
///
/// For workloads where a connection per command is too expensive there is
/// a separate persistent mode ([`send_persistent`](Self::send_persistent)
/// and [`auto_reconnect`](Self::auto_reconnect)) backed by one cached,
/// mutex-guarded connection. Callers that need finer control over a
/// long-lived connection should use [Connection] directly.
///
/// # Examples
///
/// ```no_run
/// use mc_rcon::Client;
///
/// #[tokio::main]
/// async fn main() -> Result<(), mc_rcon::RconError> {
///     let client = Client::new("localhost:25575", "password");
///
///     let output = client.send("list").await?;
///     println!("{output}");
///
///     Ok(())
/// }
/// ```
pub struct Client {
    addr: String,
    password: String,
    timeout: Option<Duration>,
    on_close_error: Option<CloseErrorSink>,
    connection: Mutex<Option<Connection>>,
}

impl Client {
    /// Configure a client for the server at `addr` (`host:port`). Performs
    /// no I/O; the first connection is made by the first send.
    pub fn new(addr: &str, password: &str) -> Self {
        Self {
            addr: addr.to_string(),
            password: password.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            on_close_error: None,
            connection: Mutex::new(None),
        }
    }

    /// Replace the default deadline applied to connects, handshakes, and
    /// command responses. `None` disables it.
    #[must_use]
    pub fn with_timeout(mut self, deadline: Option<Duration>) -> Self {
        self.timeout = deadline;
        self
    }

    /// Install a sink for close failures that occur while cleaning up
    /// after a completed command. Without one they are logged at warn
    /// level. They are never allowed to mask the command's result.
    #[must_use]
    pub fn on_close_error<F>(mut self, sink: F) -> Self
    where
        F: Fn(RconError) + Send + Sync + 'static,
    {
        self.on_close_error = Some(Box::new(sink));
        self
    }

    /// Run `command` over a fresh one-shot connection and return the
    /// server's full response.
    ///
    /// # Errors
    /// Returns any [RconError] from dialing, authenticating, or the
    /// command exchange. Close failures during cleanup go to the
    /// [`on_close_error`](Self::on_close_error) sink instead.
    pub async fn send(&self, command: &str) -> Result<String, RconError> {
        let mut connection =
            Connection::dial_with_timeout(&self.addr, &self.password, self.timeout).await?;

        let result = connection.send_command(command).await;

        // cleanup failure must not mask the command's result
        if let Err(close_err) = connection.close().await {
            self.report_close_error(close_err);
        }

        result
    }

    /// Run `command` over the cached persistent connection, dialing it on
    /// first use.
    ///
    /// Calls are serialized by the connection's mutex. If the connection
    /// has been closed, this fails with [`RconError::NotAuthenticated`];
    /// call [`auto_reconnect`](Self::auto_reconnect) to restore it.
    ///
    /// # Errors
    /// As [`send`](Self::send).
    pub async fn send_persistent(&self, command: &str) -> Result<String, RconError> {
        let mut guard = self.connection.lock().await;

        if guard.is_none() {
            *guard = Some(
                Connection::dial_with_timeout(&self.addr, &self.password, self.timeout).await?,
            );
        }

        let Some(connection) = guard.as_mut() else {
            return Err(RconError::NotAuthenticated);
        };
        connection.send_command(command).await
    }

    /// Re-establish the cached persistent connection if it is closed.
    /// Dials it if it does not exist yet; does nothing if it is live.
    ///
    /// # Errors
    /// As [`Connection::dial`].
    pub async fn auto_reconnect(&self) -> Result<(), RconError> {
        let mut guard = self.connection.lock().await;

        match guard.as_mut() {
            Some(connection) if connection.is_closed() => connection.reconnect().await,
            Some(_) => Ok(()),
            None => {
                *guard = Some(
                    Connection::dial_with_timeout(&self.addr, &self.password, self.timeout)
                        .await?,
                );
                Ok(())
            }
        }
    }

    /// Close the cached persistent connection, if any. One-shot
    /// [`send`](Self::send) is unaffected.
    ///
    /// # Errors
    /// Returns [`RconError::Close`] if the socket shutdown fails.
    pub async fn close(&self) -> Result<(), RconError> {
        match self.connection.lock().await.as_mut() {
            Some(connection) => connection.close().await,
            None => Ok(()),
        }
    }

    fn report_close_error(&self, err: RconError) {
        match &self.on_close_error {
            Some(sink) => sink(err),
            None => warn!("closing connection to {} failed: {err}", self.addr),
        }
    }
}
