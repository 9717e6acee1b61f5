//! TCP client connector.
//!
//! A [`TcpClient`] owns one outbound connection: connect with retry, send,
//! continuous receive and close. Results are reported through
//! [`ClientEvent`]s.
//!
//! # Example
//!
//! ```no_run
//! use tcp_helper::{ClientEvent, EventKind, TcpClient};
//!
//! # async fn example() -> tcp_helper::Result<()> {
//! let client = TcpClient::new("127.0.0.1", 6200)?;
//! client.subscribe(EventKind::DataReceived, |event| {
//!     if let ClientEvent::DataReceived { data, .. } = event {
//!         println!("received {} bytes", data.len());
//!     }
//! });
//!
//! client.connect(None).await?;
//! client.send_text("Hello world!", None).await?;
//! client.close();
//! # Ok(())
//! # }
//! ```
//!
//! # Failure Delivery
//!
//! When at least one [`EventKind::Error`] subscriber is registered,
//! `connect` and `send` failures are delivered as [`ClientEvent::Error`]
//! and the call returns `Ok(())`. Without one, the call returns the error.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::io::{Error as IoError, ErrorKind};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{Mutex as AsyncMutex, watch};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::events::{ClientEvent, EventHub, EventKind, Phase};
use crate::identifiers::{CorrelationId, SubscriptionId};
use crate::transport::connection::{LinkHandler, LinkOptions};
use crate::transport::{Connection, Link, ProbeOutcome, try_connect_test};

use super::builder::ClientBuilder;
use super::options::ClientOptions;
use super::retry::RetryDecision;

// ============================================================================
// ClientState
// ============================================================================

/// Lifecycle state of a [`TcpClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected. Initial state, and the state after the peer disconnects.
    Disconnected,
    /// A connect is in progress (including retry delays).
    Connecting,
    /// The connection is established.
    Connected,
    /// Closed by [`TcpClient::close`].
    Closed,
}

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// Server endpoint.
    remote: SocketAddr,
    /// Client options.
    options: ClientOptions,
    /// Event subscribers.
    events: EventHub<ClientEvent>,
    /// Lifecycle state; `send` waits on it.
    state: watch::Sender<ClientState>,
    /// The current connection, if any.
    connection: Mutex<Option<Connection>>,
    /// Retries performed by the running connect.
    retried: AtomicU32,
    /// Most recent failure.
    last_error: Mutex<Option<Error>>,
    /// Serializes concurrent `connect` calls.
    connect_gate: AsyncMutex<()>,
}

// ============================================================================
// TcpClient
// ============================================================================

/// Asynchronous TCP client with retrying connect.
///
/// Cloning is cheap; clones share the same connection and subscribers.
#[derive(Clone)]
pub struct TcpClient {
    /// Shared inner state.
    pub(crate) inner: Arc<ClientInner>,
}

// ============================================================================
// TcpClient - Display
// ============================================================================

impl fmt::Debug for TcpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpClient")
            .field("remote", &self.inner.remote)
            .field("state", &self.state())
            .field("retried", &self.retried_count())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TcpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TcpClient({}, {:?})", self.inner.remote, self.state())
    }
}

// ============================================================================
// TcpClient - Constructors
// ============================================================================

impl TcpClient {
    /// Creates a client for the server at `ip:port` with default options.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `ip` is not an IP address.
    pub fn new(ip: &str, port: u16) -> Result<Self> {
        Self::builder(ip, port).build()
    }

    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder(ip: impl Into<String>, port: u16) -> ClientBuilder {
        ClientBuilder::new(ip, port)
    }

    /// Creates a client from validated parts.
    pub(crate) fn with_options(remote: SocketAddr, options: ClientOptions) -> Self {
        let (state, _) = watch::channel(ClientState::Disconnected);

        Self {
            inner: Arc::new(ClientInner {
                remote,
                options,
                events: EventHub::new(),
                state,
                connection: Mutex::new(None),
                retried: AtomicU32::new(0),
                last_error: Mutex::new(None),
                connect_gate: AsyncMutex::new(()),
            }),
        }
    }

    /// Blocking reachability probe, see [`try_connect_test`].
    #[must_use]
    pub fn try_connect_test(ip: &str, port: u16, connect_timeout: Duration) -> ProbeOutcome {
        try_connect_test(ip, port, connect_timeout)
    }
}

// ============================================================================
// TcpClient - Accessors
// ============================================================================

impl TcpClient {
    /// Returns the server endpoint.
    #[inline]
    #[must_use]
    pub fn remote_endpoint(&self) -> SocketAddr {
        self.inner.remote
    }

    /// Returns the client options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// Returns the lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.inner.state.borrow()
    }

    /// Returns `true` while the connection is established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state() == ClientState::Connected && self.inner.live_connection().is_some()
    }

    /// Returns `true` after [`TcpClient::close`].
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() == ClientState::Closed
    }

    /// Returns the number of retries of the last connect.
    ///
    /// Reset to zero when a connection is established.
    #[inline]
    #[must_use]
    pub fn retried_count(&self) -> u32 {
        self.inner.retried.load(Ordering::Acquire)
    }

    /// Returns the most recent failure.
    #[must_use]
    pub fn last_error(&self) -> Option<Error> {
        self.inner.last_error.lock().clone()
    }
}

// ============================================================================
// TcpClient - Events
// ============================================================================

impl TcpClient {
    /// Registers a handler for one signal kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler)
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }
}

// ============================================================================
// TcpClient - Connect
// ============================================================================

impl TcpClient {
    /// Connects to the server.
    ///
    /// Does nothing if already connected. Failed attempts are retried per
    /// the [`RetryPolicy`](super::RetryPolicy); on success the receive loop
    /// starts and [`ClientEvent::Connected`] is emitted.
    ///
    /// # Errors
    ///
    /// Without an `Error` subscriber:
    /// - [`Error::ConnectFailed`] once retries are exhausted
    ///
    /// Always:
    /// - [`Error::ConnectionClosed`] if [`TcpClient::close`] interrupts the retries
    pub async fn connect(&self, correlation_id: Option<CorrelationId>) -> Result<()> {
        let _gate = self.inner.connect_gate.lock().await;

        if self.is_connected() {
            debug!(remote = %self.inner.remote, "Already connected");
            return Ok(());
        }

        self.inner.retried.store(0, Ordering::Release);
        self.inner.state.send_replace(ClientState::Connecting);

        loop {
            let error = match self.attempt().await {
                Ok(stream) if self.is_closed() => {
                    drop(stream);
                    debug!(remote = %self.inner.remote, "Connect completed after close");
                    return Err(Error::ConnectionClosed);
                }
                Ok(stream) => {
                    self.establish(stream, correlation_id);
                    return Ok(());
                }
                Err(error) => error,
            };

            let retried = self.retried_count();
            match self.inner.options.retry.decide(retried, error) {
                RetryDecision::Retry(delay) => {
                    let retried = self.inner.retried.fetch_add(1, Ordering::AcqRel) + 1;
                    warn!(
                        remote = %self.inner.remote,
                        retried,
                        max = self.inner.options.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Connect failed, retrying"
                    );
                    sleep(delay).await;

                    if self.is_closed() {
                        debug!(remote = %self.inner.remote, "Connect retries stopped by close");
                        return Err(Error::ConnectionClosed);
                    }
                }

                RetryDecision::GiveUp(error) => {
                    self.inner.state.send_if_modified(|state| {
                        let connecting = *state == ClientState::Connecting;
                        if connecting {
                            *state = ClientState::Disconnected;
                        }
                        connecting
                    });
                    warn!(remote = %self.inner.remote, error = %error, "Connect failed");
                    return self.inner.fail(correlation_id, Phase::Connect, error);
                }
            }
        }
    }

    /// Performs one connect attempt.
    async fn attempt(&self) -> Result<TcpStream> {
        let remote = self.inner.remote;
        let retries = self.retried_count();
        let connect_timeout = self.inner.options.connect_timeout;

        debug!(%remote, attempt = retries + 1, "Connecting");

        let stream = match timeout(connect_timeout, TcpStream::connect(remote)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(Error::connect_failed(remote, retries, e)),
            Err(_) => {
                let e = IoError::new(
                    ErrorKind::TimedOut,
                    format!("connect timed out after {}ms", connect_timeout.as_millis()),
                );
                return Err(Error::connect_failed(remote, retries, e));
            }
        };

        if self.inner.options.nodelay {
            stream
                .set_nodelay(true)
                .map_err(|e| Error::connect_failed(remote, retries, e))?;
        }

        Ok(stream)
    }

    /// Installs an established stream and starts its receive loop.
    fn establish(&self, stream: TcpStream, correlation_id: Option<CorrelationId>) {
        let inner = &self.inner;
        let options = LinkOptions {
            buffer_size: inner.options.receive_buffer_size,
            throttle: Duration::ZERO,
        };

        let (connection, pump) = Connection::open(stream, inner.remote, options, correlation_id);
        let local = connection.link().local();

        *inner.connection.lock() = Some(connection);
        inner.retried.store(0, Ordering::Release);
        inner.state.send_replace(ClientState::Connected);

        info!(remote = %inner.remote, %local, "Connected");

        inner.events.emit(&ClientEvent::Connected {
            peer: inner.remote,
            local,
        });

        pump.spawn(Arc::new(ClientLink {
            inner: Arc::downgrade(inner),
        }));
    }
}

// ============================================================================
// TcpClient - Send
// ============================================================================

impl TcpClient {
    /// Sends bytes to the server.
    ///
    /// If no connection is established yet, waits up to the send grace
    /// period for one. [`ClientEvent::DataSent`] is emitted once the write
    /// completes.
    ///
    /// # Errors
    ///
    /// Without an `Error` subscriber:
    /// - [`Error::NotConnected`] if no connection became available
    /// - [`Error::SendFailed`] if the socket write fails
    /// - [`Error::ConnectionClosed`] if the connection ended meanwhile
    ///
    /// Always:
    /// - [`Error::ConnectionClosed`] after [`TcpClient::close`]
    pub async fn send(
        &self,
        data: impl Into<Bytes>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<()> {
        if self.is_closed() {
            debug!(remote = %self.inner.remote, "Send on closed client");
            return Err(Error::ConnectionClosed);
        }
        let data = data.into();

        let Some(connection) = self.wait_for_connection().await else {
            return self
                .inner
                .fail(correlation_id, Phase::Send, Error::NotConnected);
        };

        match connection.send(data, correlation_id.clone()).await {
            Ok(_) => Ok(()),
            Err(error) if self.is_closed() => {
                debug!(remote = %self.inner.remote, "Send completion discarded after close");
                Err(error)
            }
            Err(error) => self.inner.fail(correlation_id, Phase::Send, error),
        }
    }

    /// Sends UTF-8 text to the server.
    ///
    /// # Errors
    ///
    /// Same as [`TcpClient::send`].
    pub async fn send_text(&self, text: &str, correlation_id: Option<CorrelationId>) -> Result<()> {
        self.send(Bytes::copy_from_slice(text.as_bytes()), correlation_id)
            .await
    }

    /// Returns the live connection, waiting up to the grace period for one.
    async fn wait_for_connection(&self) -> Option<Connection> {
        if let Some(connection) = self.inner.live_connection() {
            return Some(connection);
        }

        let grace = self.inner.options.send_grace;
        debug!(
            remote = %self.inner.remote,
            grace_ms = grace.as_millis() as u64,
            "Send waiting for connection"
        );

        let mut state_rx = self.inner.state.subscribe();
        let _ = timeout(
            grace,
            state_rx.wait_for(|s| matches!(s, ClientState::Connected | ClientState::Closed)),
        )
        .await;

        self.inner.live_connection()
    }
}

// ============================================================================
// TcpClient - Lifecycle
// ============================================================================

impl TcpClient {
    /// Closes the connection.
    ///
    /// Idempotent and infallible. Emits [`ClientEvent::Disconnected`] with
    /// [`Phase::Close`] if a connection was open; completions arriving
    /// afterwards are discarded.
    pub fn close(&self) {
        let inner = &self.inner;
        let previous = inner.state.send_replace(ClientState::Closed);
        let connection = inner.connection.lock().take();

        if let Some(connection) = connection
            && connection.close()
        {
            info!(remote = %inner.remote, "Connection closed");
            inner.events.emit(&ClientEvent::Disconnected {
                ip: inner.remote.ip(),
                port: inner.remote.port(),
                correlation_id: None,
                phase: Phase::Close,
            });
        } else {
            debug!(remote = %inner.remote, ?previous, "Close without open connection");
        }
    }
}

// ============================================================================
// ClientInner
// ============================================================================

impl ClientInner {
    /// Returns the current connection unless it has been closed.
    fn live_connection(&self) -> Option<Connection> {
        self.connection
            .lock()
            .as_ref()
            .filter(|c| !c.is_closed())
            .cloned()
    }

    /// Routes a caller-facing failure.
    ///
    /// Delivered to `Error` subscribers if there are any, returned otherwise.
    fn fail(
        &self,
        correlation_id: Option<CorrelationId>,
        phase: Phase,
        error: Error,
    ) -> Result<()> {
        *self.last_error.lock() = Some(error.clone());

        if !self.events.has_subscribers(EventKind::Error) {
            return Err(error);
        }

        self.events.emit(&ClientEvent::Error {
            correlation_id,
            phase,
            error,
        });
        Ok(())
    }

    /// Routes a failure from the receive loop, which has no caller.
    fn report(&self, correlation_id: Option<CorrelationId>, phase: Phase, error: Error) {
        if let Err(error) = self.fail(correlation_id, phase, error) {
            error!(remote = %self.remote, %phase, error = %error, "Unhandled client failure");
        }
    }
}

// ============================================================================
// ClientLink
// ============================================================================

/// Forwards connection completions to the client's subscribers.
struct ClientLink {
    inner: Weak<ClientInner>,
}

impl LinkHandler for ClientLink {
    fn on_data(&self, link: &Link, data: Bytes) {
        if let Some(inner) = self.inner.upgrade() {
            inner.events.emit(&ClientEvent::DataReceived {
                peer: link.peer(),
                data,
            });
        }
    }

    fn on_sent(&self, link: &Link, correlation_id: Option<CorrelationId>, len: usize) {
        if let Some(inner) = self.inner.upgrade() {
            inner.events.emit(&ClientEvent::DataSent {
                peer: link.peer(),
                correlation_id,
                len,
            });
        }
    }

    fn on_receive_failed(&self, _link: &Link, error: Error) {
        if let Some(inner) = self.inner.upgrade() {
            inner.report(None, Phase::Receive, error);
        }
    }

    fn on_disconnected(&self, link: &Link, correlation_id: Option<CorrelationId>, phase: Phase) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        let current = {
            let mut slot = inner.connection.lock();
            match slot.as_ref().map(|c| c.owns(link)) {
                Some(true) => {
                    *slot = None;
                    true
                }
                Some(false) => false,
                None => true,
            }
        };
        if !current {
            debug!(remote = %inner.remote, "Replaced connection ended");
            return;
        }

        inner.state.send_if_modified(|state| {
            let connected = *state == ClientState::Connected;
            if connected {
                *state = ClientState::Disconnected;
            }
            connected
        });

        info!(remote = %inner.remote, %phase, "Disconnected by remote");

        inner.events.emit(&ClientEvent::Disconnected {
            ip: link.peer().ip(),
            port: link.peer().port(),
            correlation_id,
            phase,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::TcpListener as StdTcpListener;
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const WAIT: Duration = Duration::from_secs(5);

    fn closed_port() -> u16 {
        let listener = StdTcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local addr").port()
    }

    async fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, port)
    }

    fn collect(client: &TcpClient, kind: EventKind) -> mpsc::UnboundedReceiver<ClientEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        client.subscribe(kind, move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
        timeout(WAIT, rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    fn small_client(port: u16) -> TcpClient {
        TcpClient::builder("127.0.0.1", port)
            .receive_buffer_size(64 * 1024)
            .build()
            .expect("valid client")
    }

    #[tokio::test]
    async fn test_connect_send_and_receive() {
        let (listener, port) = listener().await;
        let client = small_client(port);
        let mut connected = collect(&client, EventKind::Connected);
        let mut sent = collect(&client, EventKind::DataSent);
        let mut received = collect(&client, EventKind::DataReceived);

        client
            .connect(Some(CorrelationId::from("conn-1")))
            .await
            .expect("connect");
        assert!(client.is_connected());
        assert!(matches!(next(&mut connected).await, ClientEvent::Connected { .. }));

        let (mut server_side, _) = listener.accept().await.expect("accept");
        client
            .send_text("ping", Some(CorrelationId::from("tx-1")))
            .await
            .expect("send");

        match next(&mut sent).await {
            ClientEvent::DataSent {
                correlation_id,
                len,
                ..
            } => {
                assert_eq!(correlation_id, Some(CorrelationId::from("tx-1")));
                assert_eq!(len, 4);
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let mut buf = [0u8; 4];
        server_side.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"ping");

        server_side.write_all(b"pong").await.expect("write");
        let mut data = Vec::new();
        while data.len() < 4 {
            if let ClientEvent::DataReceived { data: chunk, .. } = next(&mut received).await {
                data.extend_from_slice(&chunk);
            }
        }
        assert_eq!(data, b"pong");

        client.close();
    }

    #[tokio::test]
    async fn test_retry_bound_without_error_subscriber() {
        let client = TcpClient::builder("127.0.0.1", closed_port())
            .retry(3, Duration::from_millis(200))
            .build()
            .expect("valid client");

        let started = Instant::now();
        let err = client.connect(None).await.unwrap_err();

        assert!(started.elapsed() >= Duration::from_millis(600));
        assert!(matches!(err, Error::ConnectFailed { retries: 3, .. }));
        assert_eq!(client.retried_count(), 3);
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(client.last_error().is_some());
    }

    #[tokio::test]
    async fn test_error_subscriber_suppresses_fault() {
        let client = small_client(closed_port());
        let mut errors = collect(&client, EventKind::Error);

        client
            .connect(Some(CorrelationId::from("c-7")))
            .await
            .expect("failure delivered as event");

        match next(&mut errors).await {
            ClientEvent::Error {
                correlation_id,
                phase,
                error,
            } => {
                assert_eq!(correlation_id, Some(CorrelationId::from("c-7")));
                assert_eq!(phase, Phase::Connect);
                assert!(matches!(error, Error::ConnectFailed { retries: 0, .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let (listener, port) = listener().await;
        let client = small_client(port);
        let mut disconnected = collect(&client, EventKind::Disconnected);

        client.connect(None).await.expect("connect");
        let (_server_side, _) = listener.accept().await.expect("accept");

        client.close();
        client.close();

        match next(&mut disconnected).await {
            ClientEvent::Disconnected { phase, port: p, .. } => {
                assert_eq!(phase, Phase::Close);
                assert_eq!(p, port);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(
            timeout(Duration::from_millis(200), disconnected.recv())
                .await
                .is_err()
        );
        assert_eq!(client.state(), ClientState::Closed);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_peer_close_is_graceful_disconnect() {
        let (listener, port) = listener().await;
        let client = small_client(port);
        let mut disconnected = collect(&client, EventKind::Disconnected);
        let mut errors = collect(&client, EventKind::Error);

        client.connect(None).await.expect("connect");
        let (server_side, _) = listener.accept().await.expect("accept");
        drop(server_side);

        match next(&mut disconnected).await {
            ClientEvent::Disconnected { phase, .. } => assert_eq!(phase, Phase::Receive),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(errors.try_recv().is_err());
        assert_eq!(client.state(), ClientState::Disconnected);
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn test_send_without_connection_after_grace() {
        let client = TcpClient::builder("127.0.0.1", closed_port())
            .send_grace(Duration::from_millis(200))
            .build()
            .expect("valid client");

        let started = Instant::now();
        let err = client.send_text("lost", None).await.unwrap_err();

        assert!(matches!(err, Error::NotConnected));
        assert!(started.elapsed() >= Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_send_waits_for_pending_connect() {
        let (listener, port) = listener().await;
        let client = small_client(port);

        let (connected, sent) = tokio::join!(client.connect(None), client.send_text("early", None));
        connected.expect("connect");
        sent.expect("send after connect");

        let (mut server_side, _) = listener.accept().await.expect("accept");
        let mut buf = [0u8; 5];
        server_side.read_exact(&mut buf).await.expect("read");
        assert_eq!(&buf, b"early");
    }

    #[tokio::test]
    async fn test_connect_when_connected_is_noop() {
        let (_listener, port) = listener().await;
        let client = small_client(port);
        let mut connected = collect(&client, EventKind::Connected);

        client.connect(None).await.expect("connect");
        client.connect(None).await.expect("second connect");

        next(&mut connected).await;
        assert!(connected.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_reconnect_after_close() {
        let (listener, port) = listener().await;
        let client = small_client(port);

        client.connect(None).await.expect("connect");
        client.close();
        assert!(client.is_closed());

        client.connect(None).await.expect("reconnect");
        assert!(client.is_connected());
        drop(listener);
    }

    #[tokio::test]
    #[allow(deprecated)]
    async fn test_peer_reset_reports_receive_failure() {
        let (listener, port) = listener().await;
        let client = small_client(port);
        let mut disconnected = collect(&client, EventKind::Disconnected);
        let mut errors = collect(&client, EventKind::Error);

        client.connect(None).await.expect("connect");
        let (server_side, _) = listener.accept().await.expect("accept");
        server_side.set_linger(Some(Duration::ZERO)).expect("linger");
        drop(server_side);

        match next(&mut errors).await {
            ClientEvent::Error { phase, error, .. } => {
                assert_eq!(phase, Phase::Receive);
                assert!(matches!(error, Error::ReceiveFailed { .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        match next(&mut disconnected).await {
            ClientEvent::Disconnected { phase, .. } => assert_eq!(phase, Phase::Receive),
            other => panic!("unexpected event: {other:?}"),
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(errors.try_recv().is_err());
        assert!(disconnected.try_recv().is_err());
        assert_eq!(client.state(), ClientState::Disconnected);
    }

    #[tokio::test]
    async fn test_close_during_retry_aborts() {
        let client = TcpClient::builder("127.0.0.1", closed_port())
            .retry(5, Duration::from_millis(500))
            .build()
            .expect("valid client");

        let closer = client.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(200)).await;
            closer.close();
        });

        let started = Instant::now();
        let err = client.connect(None).await.unwrap_err();

        assert!(matches!(err, Error::ConnectionClosed));
        assert!(started.elapsed() < Duration::from_millis(1500));
        assert_eq!(client.state(), ClientState::Closed);
    }

    #[tokio::test]
    async fn test_send_after_close_is_silent() {
        let (_listener, port) = listener().await;
        let client = small_client(port);
        let mut errors = collect(&client, EventKind::Error);

        client.connect(None).await.expect("connect");
        client.close();

        let err = client.send_text("late", None).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
        assert!(errors.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_replaced_connection_end_keeps_state() {
        let (listener, port) = listener().await;
        let client = small_client(port);
        let mut disconnected = collect(&client, EventKind::Disconnected);

        client.connect(None).await.expect("connect");

        // A connection that is not the client's current one.
        let stream = TcpStream::connect(("127.0.0.1", port))
            .await
            .expect("second connect");
        let options = LinkOptions {
            buffer_size: 16,
            throttle: Duration::ZERO,
        };
        let (old, _pump) = Connection::open(stream, client.remote_endpoint(), options, None);
        old.close();

        let handler = ClientLink {
            inner: Arc::downgrade(&client.inner),
        };
        handler.on_disconnected(old.link(), None, Phase::Receive);

        assert_eq!(client.state(), ClientState::Connected);
        assert!(client.is_connected());
        assert!(disconnected.try_recv().is_err());
        drop(listener);
    }

    #[test]
    fn test_try_connect_test_closed_port() {
        let outcome = TcpClient::try_connect_test("127.0.0.1", closed_port(), Duration::from_secs(1));
        assert!(!outcome.is_success());
    }
}
