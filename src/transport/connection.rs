//! TCP connection and I/O tasks.
//!
//! This module drives one established socket for both the client and the
//! server side.
//!
//! # I/O Tasks
//!
//! Each connection runs two tokio tasks over the split socket:
//!
//! - The receive loop: read into the [`Session`] buffer, report the bytes,
//!   re-arm the next read (optionally after a throttle delay)
//! - The write loop: execute writes queued through [`Connection::send`]
//!   in order
//!
//! Reads never wait for a write and writes never wait for a read, so both
//! peers may stream at the same time. Completions are reported to the owner
//! through [`LinkHandler`].
//!
//! # Closing
//!
//! A receive completion and a local close may race. Both go through
//! [`Link::mark_closed`], and only the caller that flips the flag reports
//! the disconnect, so it is reported exactly once. Flipping the flag also
//! wakes both tasks, which then stop.

// ============================================================================
// Imports
// ============================================================================

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::events::Phase;
use crate::identifiers::{ConnectionKey, CorrelationId};

use super::session::Session;

// ============================================================================
// LinkHandler
// ============================================================================

/// Receives the completions of a connection's I/O tasks.
///
/// Called on the task that completed the operation.
pub(crate) trait LinkHandler: Send + Sync + 'static {
    /// A read returned `data`.
    fn on_data(&self, link: &Link, data: Bytes);

    /// A queued write completed.
    fn on_sent(&self, link: &Link, correlation_id: Option<CorrelationId>, len: usize);

    /// A read failed. Followed by [`LinkHandler::on_disconnected`].
    fn on_receive_failed(&self, link: &Link, error: Error);

    /// The peer ended the connection or a read failed.
    fn on_disconnected(&self, link: &Link, correlation_id: Option<CorrelationId>, phase: Phase);
}

// ============================================================================
// LinkOptions
// ============================================================================

/// Per-connection loop settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct LinkOptions {
    /// Receive buffer size of the session.
    pub buffer_size: usize,
    /// Pause between two reads.
    pub throttle: Duration,
}

// ============================================================================
// Link
// ============================================================================

/// Shared state of one established socket.
#[derive(Debug)]
pub struct Link {
    /// Key derived from the remote endpoint.
    key: ConnectionKey,
    /// Remote endpoint.
    peer: SocketAddr,
    /// Local endpoint.
    local: SocketAddr,
    /// Set once, by whichever side ends the connection first.
    closed: AtomicBool,
    /// Wakes the I/O tasks once `closed` is set.
    closed_tx: watch::Sender<bool>,
}

impl Link {
    /// Returns the connection key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ConnectionKey {
        &self.key
    }

    /// Returns the remote endpoint.
    #[inline]
    #[must_use]
    pub const fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns the local endpoint.
    #[inline]
    #[must_use]
    pub const fn local(&self) -> SocketAddr {
        self.local
    }

    /// Returns `true` once the connection has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flips the closed flag and wakes the I/O tasks.
    ///
    /// Returns `true` only for the first caller.
    pub(crate) fn mark_closed(&self) -> bool {
        let first = self
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if first {
            self.closed_tx.send_replace(true);
        }
        first
    }

    /// Resolves once the connection has been closed.
    async fn wait_closed(closed_rx: &mut watch::Receiver<bool>) {
        let _ = closed_rx.wait_for(|closed| *closed).await;
    }
}

// ============================================================================
// WriteRequest
// ============================================================================

/// A queued write.
struct WriteRequest {
    data: Bytes,
    correlation_id: Option<CorrelationId>,
    reply: oneshot::Sender<Result<usize>>,
}

// ============================================================================
// Connection
// ============================================================================

/// Handle to an established TCP connection.
///
/// Cloning is cheap; all clones drive the same I/O tasks. The tasks end
/// when the peer disconnects, when [`Connection::close`] is called, or when
/// every handle has been dropped.
#[derive(Clone)]
pub struct Connection {
    /// Shared socket state (also held by the I/O tasks).
    link: Arc<Link>,
    /// Channel for queueing writes.
    write_tx: mpsc::UnboundedSender<WriteRequest>,
}

impl Connection {
    /// Wraps an established stream.
    ///
    /// The returned [`ConnectionLoop`] must be spawned to start reading;
    /// until then writes are queued.
    pub(crate) fn open(
        stream: TcpStream,
        peer: SocketAddr,
        options: LinkOptions,
        correlation_id: Option<CorrelationId>,
    ) -> (Self, ConnectionLoop) {
        let local = stream
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)));

        let (closed_tx, _) = watch::channel(false);
        let link = Arc::new(Link {
            key: ConnectionKey::from_addr(peer),
            peer,
            local,
            closed: AtomicBool::new(false),
            closed_tx,
        });
        let (write_tx, write_rx) = mpsc::unbounded_channel();

        let pump = ConnectionLoop {
            stream,
            session: Session::new(peer, correlation_id, options.buffer_size),
            link: Arc::clone(&link),
            write_rx,
            throttle: options.throttle,
        };

        (Self { link, write_tx }, pump)
    }

    /// Returns the shared socket state.
    #[inline]
    #[must_use]
    pub fn link(&self) -> &Link {
        &self.link
    }

    /// Returns the connection key.
    #[inline]
    #[must_use]
    pub fn key(&self) -> &ConnectionKey {
        self.link.key()
    }

    /// Returns the remote endpoint.
    #[inline]
    #[must_use]
    pub fn peer(&self) -> SocketAddr {
        self.link.peer()
    }

    /// Returns `true` once the connection has been closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.link.is_closed()
    }

    /// Returns `true` if `link` belongs to this connection.
    #[inline]
    #[must_use]
    pub fn owns(&self, link: &Link) -> bool {
        std::ptr::eq(Arc::as_ptr(&self.link), link)
    }

    /// Writes `data` and waits for the write to complete.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the connection is closed
    /// - [`Error::SendFailed`] if the socket write fails
    pub async fn send(&self, data: Bytes, correlation_id: Option<CorrelationId>) -> Result<usize> {
        if self.link.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        let (reply, reply_rx) = oneshot::channel();
        self.write_tx
            .send(WriteRequest {
                data,
                correlation_id,
                reply,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        reply_rx.await.map_err(|_| Error::ConnectionClosed)?
    }

    /// Closes the connection.
    ///
    /// Returns `true` if this call closed it, `false` if it was already
    /// closed. No disconnect is reported for a connection closed this way,
    /// and a write blocked on a full socket is abandoned.
    pub fn close(&self) -> bool {
        if !self.link.mark_closed() {
            return false;
        }
        debug!(peer = %self.link.peer, "Connection closed locally");
        true
    }
}

// ============================================================================
// ConnectionLoop
// ============================================================================

/// The not yet started I/O tasks of a [`Connection`].
pub(crate) struct ConnectionLoop {
    stream: TcpStream,
    session: Session,
    link: Arc<Link>,
    write_rx: mpsc::UnboundedReceiver<WriteRequest>,
    throttle: Duration,
}

impl ConnectionLoop {
    /// Spawns the receive and write tasks on the tokio runtime.
    ///
    /// Returns the handle of the receive task.
    pub(crate) fn spawn(self, handler: Arc<dyn LinkHandler>) -> JoinHandle<()> {
        let Self {
            stream,
            session,
            link,
            write_rx,
            throttle,
        } = self;
        let (reader, writer) = stream.into_split();

        debug!(peer = %link.peer, "Connection tasks started");

        tokio::spawn(Self::write_loop(
            writer,
            Arc::clone(&link),
            write_rx,
            Arc::clone(&handler),
        ));
        tokio::spawn(Self::receive_loop(reader, session, link, throttle, handler))
    }

    /// Reads until EOF, a read error, or a local close.
    async fn receive_loop(
        mut reader: OwnedReadHalf,
        mut session: Session,
        link: Arc<Link>,
        throttle: Duration,
        handler: Arc<dyn LinkHandler>,
    ) {
        let mut closed_rx = link.closed_tx.subscribe();
        let mut next_read = Instant::now();

        loop {
            tokio::select! {
                () = Link::wait_closed(&mut closed_rx) => break,

                // Next read, re-armed after every completion
                read = async {
                    sleep_until(next_read).await;
                    reader.read(session.buffer_mut()).await
                } => {
                    if link.is_closed() {
                        trace!(peer = %link.peer, "Discarding read completion after close");
                        break;
                    }

                    match read {
                        Ok(0) => {
                            debug!(peer = %link.peer, "Connection closed by remote");
                            if link.mark_closed() {
                                handler.on_disconnected(
                                    &link,
                                    session.correlation_id().cloned(),
                                    Phase::Receive,
                                );
                            }
                            break;
                        }

                        Ok(count) => {
                            trace!(peer = %link.peer, count, "Data received");
                            handler.on_data(&link, session.take(count));
                            next_read = Instant::now() + throttle;
                        }

                        Err(e) => {
                            warn!(peer = %link.peer, error = %e, "Receive failed");
                            if link.mark_closed() {
                                handler.on_receive_failed(&link, Error::receive_failed(link.peer, e));
                                handler.on_disconnected(
                                    &link,
                                    session.correlation_id().cloned(),
                                    Phase::Receive,
                                );
                            }
                            break;
                        }
                    }
                }
            }
        }

        debug!(peer = %link.peer, "Receive loop terminated");
    }

    /// Executes queued writes in order until the connection closes.
    async fn write_loop(
        mut writer: OwnedWriteHalf,
        link: Arc<Link>,
        mut write_rx: mpsc::UnboundedReceiver<WriteRequest>,
        handler: Arc<dyn LinkHandler>,
    ) {
        let mut closed_rx = link.closed_tx.subscribe();

        loop {
            let request = tokio::select! {
                () = Link::wait_closed(&mut closed_rx) => break,
                request = write_rx.recv() => request,
            };

            let Some(WriteRequest {
                data,
                correlation_id,
                reply,
            }) = request
            else {
                debug!(peer = %link.peer, "All connection handles dropped");
                link.mark_closed();
                break;
            };

            let result = tokio::select! {
                () = Link::wait_closed(&mut closed_rx) => Err(Error::ConnectionClosed),
                result = Self::write(&mut writer, &link, &data) => result,
            };

            if result.is_ok() {
                handler.on_sent(&link, correlation_id, data.len());
            }
            let _ = reply.send(result.map(|()| data.len()));
        }

        if let Err(e) = writer.shutdown().await {
            trace!(peer = %link.peer, error = %e, "Socket shutdown failed");
        }

        debug!(peer = %link.peer, "Write loop terminated");
    }

    /// Writes one buffer to the socket.
    async fn write(writer: &mut OwnedWriteHalf, link: &Link, data: &[u8]) -> Result<()> {
        if link.is_closed() {
            return Err(Error::ConnectionClosed);
        }

        writer
            .write_all(data)
            .await
            .map_err(|e| Error::send_failed(link.peer, e))?;

        trace!(peer = %link.peer, len = data.len(), "Data sent");
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
