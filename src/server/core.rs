//! TCP server listener.
//!
//! A [`TcpServer`] accepts client connections, records each one in its
//! [`ConnectionRegistry`] under the client's `ip:port` key, and runs a
//! receive loop per connection.
//!
//! # Example
//!
//! ```no_run
//! use tcp_helper::{EventKind, ServerEvent, TcpServer};
//!
//! # async fn example() -> tcp_helper::Result<()> {
//! let server = TcpServer::new();
//! server.subscribe(EventKind::Connected, |event| {
//!     if let ServerEvent::ClientConnected { key, .. } = event {
//!         println!("client {key} connected");
//!     }
//! });
//!
//! let local = server.start("127.0.0.1", 6200).await?;
//! println!("listening on {local}");
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::sleep;
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::events::{EventHub, EventKind, Phase, ServerEvent};
use crate::identifiers::{ConnectionKey, CorrelationId, SubscriptionId};
use crate::transport::connection::{LinkHandler, LinkOptions};
use crate::transport::{Connection, ConnectionRegistry, Link};

use super::options::ServerOptions;

// ============================================================================
// Constants
// ============================================================================

/// Pause after a failed accept before accepting again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the server.
pub(crate) struct ServerInner {
    /// Listener options.
    options: ServerOptions,
    /// Event subscribers.
    events: EventHub<ServerEvent>,
    /// Accepted connections by key.
    registry: ConnectionRegistry,
    /// Listener state.
    started: AtomicBool,
    /// Bound address while started.
    local_addr: Mutex<Option<SocketAddr>>,
    /// Stops the accept loop.
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

// ============================================================================
// TcpServer
// ============================================================================

/// Asynchronous TCP server.
///
/// Cloning is cheap; clones share the listener, registry and subscribers.
#[derive(Clone)]
pub struct TcpServer {
    /// Shared inner state.
    pub(crate) inner: Arc<ServerInner>,
}

impl fmt::Debug for TcpServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpServer")
            .field("local_addr", &self.local_addr())
            .field("started", &self.is_started())
            .field("connections", &self.connection_count())
            .finish_non_exhaustive()
    }
}

impl Default for TcpServer {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TcpServer - Constructors
// ============================================================================

impl TcpServer {
    /// Creates a stopped server with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::from_valid_options(ServerOptions::default())
    }

    /// Creates a stopped server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the options are invalid.
    pub fn with_options(options: ServerOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_valid_options(options))
    }

    fn from_valid_options(options: ServerOptions) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                options,
                events: EventHub::new(),
                registry: ConnectionRegistry::new(),
                started: AtomicBool::new(false),
                local_addr: Mutex::new(None),
                shutdown: Mutex::new(None),
            }),
        }
    }
}

// ============================================================================
// TcpServer - Accessors
// ============================================================================

impl TcpServer {
    /// Returns the listener options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.inner.options
    }

    /// Returns `true` while the listener is started.
    #[inline]
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.started.load(Ordering::Acquire)
    }

    /// Returns the bound address while started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock()
    }

    /// Returns a snapshot of the connected client keys.
    #[must_use]
    pub fn connection_keys(&self) -> Vec<ConnectionKey> {
        self.inner.registry.keys()
    }

    /// Returns the number of connected clients.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Returns `true` if a client with this key is connected.
    #[must_use]
    pub fn contains(&self, key: impl AsRef<str>) -> bool {
        self.inner.registry.contains(key.as_ref())
    }
}

// ============================================================================
// TcpServer - Events
// ============================================================================

impl TcpServer {
    /// Registers a handler for one signal kind.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(kind, handler)
    }

    /// Removes a handler. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.events.unsubscribe(id)
    }
}

// ============================================================================
// TcpServer - Lifecycle
// ============================================================================

impl TcpServer {
    /// Binds to `ip:port` and starts accepting clients.
    ///
    /// Port 0 selects a free port. Returns the bound address.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAddress`] if `ip` is not an IP address
    /// - [`Error::InvalidState`] if the server is already started
    /// - [`Error::ListenerFailed`] if binding fails
    pub async fn start(&self, ip: &str, port: u16) -> Result<SocketAddr> {
        let ip: IpAddr = ip.trim().parse().map_err(|_| Error::invalid_address(ip))?;

        if self
            .inner
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::invalid_state("server already started"));
        }

        let bound = match TcpListener::bind(SocketAddr::new(ip, port)).await {
            Ok(listener) => listener.local_addr().map(|local| (listener, local)),
            Err(e) => Err(e),
        };
        let (listener, local) = match bound {
            Ok(bound) => bound,
            Err(e) => {
                self.inner.started.store(false, Ordering::Release);
                warn!(%ip, port, error = %e, "Bind failed");
                return Err(Error::listener_failed(e));
            }
        };

        if !self.is_started() {
            return Err(Error::invalid_state("server closed while starting"));
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        *self.inner.shutdown.lock() = Some(shutdown_tx);
        *self.inner.local_addr.lock() = Some(local);

        info!(%local, "Server started");

        tokio::spawn(accept_loop(
            Arc::downgrade(&self.inner),
            listener,
            local,
            shutdown_rx,
        ));

        Ok(local)
    }

    /// Starts on `127.0.0.1:port`.
    ///
    /// # Errors
    ///
    /// Same as [`TcpServer::start`].
    pub async fn start_local(&self, port: u16) -> Result<SocketAddr> {
        self.start(&Ipv4Addr::LOCALHOST.to_string(), port).await
    }

    /// Stops listening and drops every client.
    ///
    /// Idempotent. Client sockets are shut down without
    /// [`ServerEvent::ClientDisconnected`] events.
    pub fn close(&self) {
        let was_started = self.inner.started.swap(false, Ordering::AcqRel);

        if let Some(shutdown_tx) = self.inner.shutdown.lock().take() {
            let _ = shutdown_tx.send(());
        }
        let local = self.inner.local_addr.lock().take();

        let drained = self.inner.registry.drain();
        for (_, connection) in &drained {
            connection.close();
        }

        if was_started {
            info!(?local, clients = drained.len(), "Server stopped");
        }
    }

    /// Disconnects one client.
    ///
    /// Returns `true` if a connection was closed, `false` if the key is
    /// unknown or the connection already ended.
    pub fn close_client(&self, key: impl AsRef<str>) -> bool {
        let Some(connection) = self.inner.registry.remove(key.as_ref()) else {
            return false;
        };

        if !connection.close() {
            return false;
        }

        let peer = connection.peer();
        info!(key = %connection.key(), "Client closed");
        self.inner.events.emit(&ServerEvent::ClientDisconnected {
            key: connection.key().clone(),
            ip: peer.ip(),
            port: peer.port(),
        });
        true
    }
}

// ============================================================================
// TcpServer - Send
// ============================================================================

impl TcpServer {
    /// Sends bytes to the client registered under `key`.
    ///
    /// # Errors
    ///
    /// Without an `Error` subscriber:
    /// - [`Error::ConnectionNotFound`] if no client has this key
    /// - [`Error::SendFailed`] if the socket write fails
    /// - [`Error::ConnectionClosed`] if the connection ended meanwhile
    pub async fn send(
        &self,
        key: impl AsRef<str>,
        data: impl Into<Bytes>,
        correlation_id: Option<CorrelationId>,
    ) -> Result<()> {
        let key = ConnectionKey::from(key.as_ref());

        let Some(connection) = self.inner.registry.get(&key) else {
            return self.inner.fail(
                Some(key.clone()),
                Phase::Send,
                Error::connection_not_found(key),
            );
        };

        match connection.send(data.into(), correlation_id).await {
            Ok(_) => Ok(()),
            Err(error) if !self.is_started() => {
                debug!(%key, "Send completion discarded after close");
                Err(error)
            }
            Err(error) => self.inner.fail(Some(key), Phase::Send, error),
        }
    }

    /// Sends UTF-8 text to the client registered under `key`.
    ///
    /// # Errors
    ///
    /// Same as [`TcpServer::send`].
    pub async fn send_text(
        &self,
        key: impl AsRef<str>,
        text: &str,
        correlation_id: Option<CorrelationId>,
    ) -> Result<()> {
        self.send(key, Bytes::copy_from_slice(text.as_bytes()), correlation_id)
            .await
    }
}

// ============================================================================
// Accept Loop
// ============================================================================

/// Accepts clients until shutdown or until the server is dropped.
async fn accept_loop(
    inner: Weak<ServerInner>,
    listener: TcpListener,
    local: SocketAddr,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    debug!(%local, "Accept loop started");

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,

            accepted = listener.accept() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                if !inner.started.load(Ordering::Acquire) {
                    break;
                }

                match accepted {
                    Ok((stream, peer)) => inner.on_accepted(stream, peer),
                    Err(e) => {
                        warn!(%local, error = %e, "Accept failed");
                        inner.report(None, Phase::Accept, Error::listener_failed(e));
                        drop(inner);
                        sleep(ACCEPT_BACKOFF).await;
                    }
                }
            }
        }
    }

    debug!(%local, "Accept loop terminated");
}

// ============================================================================
// ServerInner
// ============================================================================

impl ServerInner {
    /// Registers an accepted client and starts its receive loop.
    fn on_accepted(self: &Arc<Self>, stream: TcpStream, peer: SocketAddr) {
        if self.options.nodelay
            && let Err(e) = stream.set_nodelay(true)
        {
            debug!(%peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let options = LinkOptions {
            buffer_size: self.options.receive_buffer_size,
            throttle: self.options.receive_throttle,
        };
        let (connection, pump) = Connection::open(stream, peer, options, None);
        let key = connection.key().clone();

        if !self.registry.try_insert(key.clone(), connection.clone()) {
            warn!(%key, "Duplicate connection key, dropping socket");
            connection.close();
            drop(pump);
            return;
        }

        info!(%key, "Client connected");
        self.events
            .emit(&ServerEvent::ClientConnected { key, peer });

        pump.spawn(Arc::new(ServerLink {
            inner: Arc::downgrade(self),
        }));
    }

    /// Routes a caller-facing failure.
    ///
    /// Delivered to `Error` subscribers if there are any, returned otherwise.
    fn fail(&self, key: Option<ConnectionKey>, phase: Phase, error: Error) -> Result<()> {
        if !self.events.has_subscribers(EventKind::Error) {
            return Err(error);
        }

        let listener = *self.local_addr.lock();
        self.events.emit(&ServerEvent::Error {
            listener,
            key,
            phase,
            error,
        });
        Ok(())
    }

    /// Routes a failure from a background loop, which has no caller.
    fn report(&self, key: Option<ConnectionKey>, phase: Phase, error: Error) {
        if let Err(error) = self.fail(key, phase, error) {
            error!(%phase, error = %error, "Unhandled server failure");
        }
    }
}

// ============================================================================
// ServerLink
// ============================================================================

/// Forwards connection completions to the server's subscribers.
struct ServerLink {
    inner: Weak<ServerInner>,
}

impl LinkHandler for ServerLink {
    fn on_data(&self, link: &Link, data: Bytes) {
        if let Some(inner) = self.inner.upgrade() {
            trace!(key = %link.key(), len = data.len(), "Client data");
            inner.events.emit(&ServerEvent::DataReceived {
                key: link.key().clone(),
                data,
            });
        }
    }

    fn on_sent(&self, link: &Link, correlation_id: Option<CorrelationId>, len: usize) {
        if let Some(inner) = self.inner.upgrade() {
            inner.events.emit(&ServerEvent::DataSent {
                key: link.key().clone(),
                correlation_id,
                len,
            });
        }
    }

    fn on_receive_failed(&self, link: &Link, error: Error) {
        if let Some(inner) = self.inner.upgrade() {
            inner.report(Some(link.key().clone()), Phase::Receive, error);
        }
    }

    fn on_disconnected(&self, link: &Link, _correlation_id: Option<CorrelationId>, _phase: Phase) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };

        inner.registry.remove_if(link.key(), |c| c.owns(link));

        info!(key = %link.key(), "Client disconnected");
        inner.events.emit(&ServerEvent::ClientDisconnected {
            key: link.key().clone(),
            ip: link.peer().ip(),
            port: link.peer().port(),
        });
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use crate::client::TcpClient;
    use crate::events::ClientEvent;

    const WAIT: Duration = Duration::from_secs(5);

    fn collect(server: &TcpServer, kind: EventKind) -> mpsc::UnboundedReceiver<ServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        server.subscribe(kind, move |event| {
            let _ = tx.send(event.clone());
        });
        rx
    }

    async fn next<E>(rx: &mut mpsc::UnboundedReceiver<E>) -> E {
        timeout(WAIT, rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    async fn started_server() -> (TcpServer, SocketAddr) {
        let server = TcpServer::with_options(
            ServerOptions::new()
                .with_receive_throttle(Duration::ZERO)
                .with_receive_buffer_size(64 * 1024),
        )
        .expect("valid options");
        let local = server.start_local(0).await.expect("start");
        (server, local)
    }

    async fn connected_client(local: SocketAddr) -> TcpClient {
        let client = TcpClient::builder("127.0.0.1", local.port())
            .receive_buffer_size(64 * 1024)
            .build()
            .expect("valid client");
        client.connect(None).await.expect("connect");
        client
    }

    async fn accepted_key(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ConnectionKey {
        match next(rx).await {
            ServerEvent::ClientConnected { key, .. } => key,
            other => panic!("unexpected event: {other:?}"),
        }
    }

    async fn received_text(
        rx: &mut mpsc::UnboundedReceiver<ServerEvent>,
        expected_len: usize,
    ) -> String {
        let mut data = Vec::new();
        while data.len() < expected_len {
            if let ServerEvent::DataReceived { data: chunk, .. } = next(rx).await {
                data.extend_from_slice(&chunk);
            }
        }
        String::from_utf8(data).expect("utf-8")
    }

    #[tokio::test]
    async fn test_receives_hello_world() {
        let server = TcpServer::new();
        let local = server.start_local(0).await.expect("start");
        let mut received = collect(&server, EventKind::DataReceived);

        let client = connected_client(local).await;
        client.send_text("Hello world!", None).await.expect("send");

        assert_eq!(received_text(&mut received, 12).await, "Hello world!");
        client.close();
        server.close();
    }

    #[tokio::test]
    async fn test_sends_arrive_in_order() {
        let (server, local) = started_server().await;
        let mut received = collect(&server, EventKind::DataReceived);
        let client = connected_client(local).await;

        let mut expected = String::new();
        for i in 0..100 {
            let message = format!("msg-{i};");
            client.send_text(&message, None).await.expect("send");
            expected.push_str(&message);
        }

        assert_eq!(received_text(&mut received, expected.len()).await, expected);
        server.close();
    }

    #[tokio::test]
    async fn test_client_disconnect_removes_entry() {
        let (server, local) = started_server().await;
        let mut connected = collect(&server, EventKind::Connected);
        let mut disconnected = collect(&server, EventKind::Disconnected);

        let client = connected_client(local).await;
        let key = accepted_key(&mut connected).await;
        assert!(server.contains(&key));

        client.close();

        match next(&mut disconnected).await {
            ServerEvent::ClientDisconnected { key: k, port, .. } => {
                assert_eq!(k, key);
                assert_eq!(Some(port), key.socket_addr().map(|a| a.port()));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(!server.contains(&key));
        assert!(
            timeout(Duration::from_millis(200), disconnected.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_two_clients_are_isolated() {
        let (server, local) = started_server().await;
        let mut connected = collect(&server, EventKind::Connected);

        let first = connected_client(local).await;
        let first_key = accepted_key(&mut connected).await;
        let second = connected_client(local).await;
        let second_key = accepted_key(&mut connected).await;

        assert_ne!(first_key, second_key);
        assert_eq!(server.connection_count(), 2);

        let (first_tx, mut first_rx) = mpsc::unbounded_channel();
        first.subscribe(EventKind::DataReceived, move |event| {
            if let ClientEvent::DataReceived { data, .. } = event {
                let _ = first_tx.send(data.clone());
            }
        });
        let (second_tx, mut second_rx) = mpsc::unbounded_channel();
        second.subscribe(EventKind::DataReceived, move |event| {
            if let ClientEvent::DataReceived { data, .. } = event {
                let _ = second_tx.send(data.clone());
            }
        });

        server
            .send_text(&first_key, "only-first", None)
            .await
            .expect("send");

        let mut data = Vec::new();
        while data.len() < 10 {
            data.extend_from_slice(&next(&mut first_rx).await);
        }
        assert_eq!(data, b"only-first");
        assert!(
            timeout(Duration::from_millis(200), second_rx.recv())
                .await
                .is_err()
        );

        server.close();
    }

    #[tokio::test]
    async fn test_close_client_is_idempotent() {
        let (server, local) = started_server().await;
        let mut connected = collect(&server, EventKind::Connected);
        let mut disconnected = collect(&server, EventKind::Disconnected);

        let _client = connected_client(local).await;
        let key = accepted_key(&mut connected).await;

        assert!(server.close_client(&key));
        assert!(!server.close_client(&key));

        next(&mut disconnected).await;
        assert!(
            timeout(Duration::from_millis(200), disconnected.recv())
                .await
                .is_err()
        );
        assert_eq!(server.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_send_unknown_key() {
        let (server, _) = started_server().await;

        let err = server
            .send_text("10.0.0.1:1", "nobody", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ConnectionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_send_unknown_key_with_error_subscriber() {
        let (server, local) = started_server().await;
        let mut errors = collect(&server, EventKind::Error);

        server
            .send_text("10.0.0.1:1", "nobody", None)
            .await
            .expect("failure delivered as event");

        match next(&mut errors).await {
            ServerEvent::Error {
                listener,
                key,
                phase,
                error,
            } => {
                assert_eq!(listener, Some(local));
                assert_eq!(key, Some(ConnectionKey::from("10.0.0.1:1")));
                assert_eq!(phase, Phase::Send);
                assert!(matches!(error, Error::ConnectionNotFound { .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_handler_may_call_back_into_server() {
        let (server, local) = started_server().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = server.clone();
        server.subscribe(EventKind::Error, move |_| {
            let _ = tx.send((handle.local_addr(), format!("{handle:?}")));
        });

        timeout(WAIT, server.send_text("10.0.0.1:1", "x", None))
            .await
            .expect("send returns")
            .expect("failure delivered as event");

        let (seen_addr, debug) = next(&mut rx).await;
        assert_eq!(seen_addr, Some(local));
        assert!(debug.contains("TcpServer"));
        server.close();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_echo_large_payload_both_directions() {
        const LEN: usize = 8 * 1024 * 1024;

        let (server, local) = started_server().await;
        let (echo_tx, mut echo_rx) = mpsc::unbounded_channel();
        server.subscribe(EventKind::DataReceived, move |event| {
            if let ServerEvent::DataReceived { key, data } = event {
                let _ = echo_tx.send((key.clone(), data.clone()));
            }
        });
        let echo_server = server.clone();
        tokio::spawn(async move {
            while let Some((key, data)) = echo_rx.recv().await {
                if echo_server.send(&key, data, None).await.is_err() {
                    break;
                }
            }
        });

        let client = connected_client(local).await;
        let (back_tx, mut back_rx) = mpsc::unbounded_channel();
        client.subscribe(EventKind::DataReceived, move |event| {
            if let ClientEvent::DataReceived { data, .. } = event {
                let _ = back_tx.send(data.len());
            }
        });

        timeout(WAIT, client.send(vec![7u8; LEN], None))
            .await
            .expect("send completes while echoes arrive")
            .expect("send");

        let mut echoed = 0;
        while echoed < LEN {
            echoed += next(&mut back_rx).await;
        }
        assert_eq!(echoed, LEN);

        client.close();
        server.close();
    }

    #[tokio::test]
    async fn test_receive_throttle_spaces_reads() {
        const THROTTLE: Duration = Duration::from_millis(100);

        let server = TcpServer::with_options(
            ServerOptions::new()
                .with_receive_throttle(THROTTLE)
                .with_receive_buffer_size(4),
        )
        .expect("valid options");
        let local = server.start_local(0).await.expect("start");

        let (tx, mut rx) = mpsc::unbounded_channel();
        server.subscribe(EventKind::DataReceived, move |event| {
            if let ServerEvent::DataReceived { data, .. } = event {
                let _ = tx.send((std::time::Instant::now(), data.clone()));
            }
        });

        let client = connected_client(local).await;
        client.send_text("Hello world!", None).await.expect("send");

        let mut reads = Vec::new();
        let mut data = Vec::new();
        while data.len() < 12 {
            let (at, chunk) = next(&mut rx).await;
            assert!(chunk.len() <= 4);
            data.extend_from_slice(&chunk);
            reads.push(at);
        }

        assert_eq!(data, b"Hello world!");
        assert!(reads.len() >= 3);
        for pair in reads.windows(2) {
            assert!(pair[1] - pair[0] >= THROTTLE - Duration::from_millis(5));
        }
        server.close();
    }

    #[tokio::test]
    async fn test_close_drops_clients_silently() {
        let (server, local) = started_server().await;
        let mut connected = collect(&server, EventKind::Connected);
        let mut disconnected = collect(&server, EventKind::Disconnected);

        let client = connected_client(local).await;
        accepted_key(&mut connected).await;

        let mut client_disconnected = {
            let (tx, rx) = mpsc::unbounded_channel();
            client.subscribe(EventKind::Disconnected, move |event| {
                let _ = tx.send(event.clone());
            });
            rx
        };

        server.close();
        assert!(!server.is_started());
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.local_addr(), None);

        match next(&mut client_disconnected).await {
            ClientEvent::Disconnected { phase, .. } => assert_eq!(phase, Phase::Receive),
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(disconnected.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let (server, _) = started_server().await;

        let err = server.start_local(0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidState { .. }));
        assert!(server.is_started());
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_listener_failure() {
        let (_first, local) = started_server().await;
        let second = TcpServer::new();

        let err = second.start_local(local.port()).await.unwrap_err();
        assert!(matches!(err, Error::ListenerFailed { .. }));
        assert!(!second.is_started());
    }

    #[tokio::test]
    async fn test_invalid_ip() {
        let err = TcpServer::new().start("not-an-ip", 0).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAddress { .. }));
    }
}
