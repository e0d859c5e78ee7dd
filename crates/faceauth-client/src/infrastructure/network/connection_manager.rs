//! ConnectionManager: owns the TCP connection to the FaceAuth server.
//!
//! Architecture:
//! - The read half and the [`ReceiveBuffer`] live here and are polled by the
//!   client actor through [`ConnectionManager::next_inbound`].  Every read
//!   appends to the buffer and triggers one decode attempt.
//! - The write half is moved into a writer task fed by an `mpsc` channel.
//!   [`ConnectionManager::send_frame`] waits a bounded time for the task to
//!   acknowledge the write.  If that window passes, the task keeps writing;
//!   the frame is never cut off half-way.
//! - There is no reconnect loop.  The next submit connects again.

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use faceauth_core::{FrameCodec, JsonObject, ProtocolError, ReceiveBuffer};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
    sync::{mpsc, oneshot},
    task::JoinHandle,
    time,
};
use tracing::{debug, error, info, warn};

/// Bytes requested from the socket per read.
const READ_CHUNK_SIZE: usize = 4096;

/// Outbound frames queued ahead of the writer task.
const OUTBOUND_QUEUE_DEPTH: usize = 8;

/// Errors that can occur in the client network layer.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The connection attempt did not complete in time.
    #[error("timed out connecting to {endpoint} after {}ms", .timeout.as_millis())]
    ConnectTimeout { endpoint: String, timeout: Duration },

    /// The connection attempt was refused or failed.
    #[error("failed to connect to {endpoint}: {source}")]
    ConnectFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// A send was attempted without an open connection.
    #[error("not connected to server")]
    NotConnected,

    /// Writing or flushing the frame failed.
    #[error("write failed: {0}")]
    WriteFailed(#[source] io::Error),

    /// The writer task is gone (connection torn down mid-send).
    #[error("connection writer has stopped")]
    WriterClosed,
}

/// Lifecycle of the server connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Server address and port.
///
/// The address may be a hostname or an IP literal; it is resolved on every
/// connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// How a frame write ended within its drain window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// The writer flushed the whole frame.
    Complete,
    /// The window elapsed; the writer is still draining in the background.
    TimedOut,
}

/// Result of one read from the socket.
#[derive(Debug)]
pub enum Inbound {
    /// A complete response frame was decoded.
    Frame(JsonObject),
    /// Bytes were buffered but no frame is complete yet.
    Pending,
    /// The buffered bytes are not a valid frame; the buffer was discarded.
    Violation(ProtocolError),
    /// The server closed the connection.
    Closed,
    /// The read failed.  The connection has been torn down.
    Failed(io::Error),
}

struct Outbound {
    bytes: Vec<u8>,
    done: oneshot::Sender<io::Result<()>>,
}

struct Link {
    peer: SocketAddr,
    reader: OwnedReadHalf,
    outbound: mpsc::Sender<Outbound>,
    writer: JoinHandle<()>,
}

/// Owns the socket, the receive buffer, and the connection state.
pub struct ConnectionManager {
    endpoint: Endpoint,
    codec: FrameCodec,
    state: ConnectionState,
    link: Option<Link>,
    buffer: ReceiveBuffer,
}

impl ConnectionManager {
    /// Creates a disconnected manager for `endpoint`.
    pub fn new(endpoint: Endpoint, codec: FrameCodec) -> Self {
        Self {
            endpoint,
            codec,
            state: ConnectionState::Disconnected,
            link: None,
            buffer: ReceiveBuffer::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn codec(&self) -> FrameCodec {
        self.codec
    }

    /// Remote address of the open connection.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.link.as_ref().map(|l| l.peer)
    }

    /// Number of bytes waiting in the receive buffer.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Replaces the framing strategy for subsequent frames.
    pub fn set_codec(&mut self, codec: FrameCodec) {
        self.codec = codec;
    }

    /// Points the manager at a new server.
    ///
    /// If the endpoint changes while connected, the connection is closed
    /// first.  Returns `true` if that forced a disconnect.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) -> bool {
        if endpoint == self.endpoint {
            return false;
        }
        info!("server endpoint changed from {} to {}", self.endpoint, endpoint);
        let dropped = self.disconnect();
        self.endpoint = endpoint;
        dropped
    }

    /// Connects to the configured endpoint, waiting at most `timeout`.
    ///
    /// A no-op when already connected.
    ///
    /// # Errors
    ///
    /// [`NetworkError::ConnectTimeout`] or [`NetworkError::ConnectFailed`];
    /// the manager is left `Disconnected` in both cases.
    pub async fn connect(&mut self, timeout: Duration) -> Result<(), NetworkError> {
        if self.is_connected() {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;
        let endpoint = self.endpoint.to_string();
        debug!("connecting to {endpoint} (timeout {timeout:?})");

        let addr = (self.endpoint.address.as_str(), self.endpoint.port);
        let stream = match time::timeout(timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                self.state = ConnectionState::Disconnected;
                warn!("could not connect to {endpoint}: {source}");
                return Err(NetworkError::ConnectFailed { endpoint, source });
            }
            Err(_) => {
                self.state = ConnectionState::Disconnected;
                warn!("connection to {endpoint} timed out after {timeout:?}");
                return Err(NetworkError::ConnectTimeout { endpoint, timeout });
            }
        };

        if let Err(e) = stream.set_nodelay(true) {
            debug!("could not set TCP_NODELAY: {e}");
        }
        let peer = match stream.peer_addr() {
            Ok(peer) => peer,
            Err(source) => {
                self.state = ConnectionState::Disconnected;
                return Err(NetworkError::ConnectFailed { endpoint, source });
            }
        };

        let (reader, writer) = stream.into_split();
        let (outbound, rx) = mpsc::channel(OUTBOUND_QUEUE_DEPTH);
        let writer = tokio::spawn(run_writer(writer, rx));

        self.buffer.clear();
        self.link = Some(Link {
            peer,
            reader,
            outbound,
            writer,
        });
        self.state = ConnectionState::Connected;
        info!("connected to server at {peer}");
        Ok(())
    }

    /// Drops any partially received frame while keeping the connection open.
    ///
    /// Returns the number of bytes discarded.
    pub fn reset_buffer(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 {
            warn!("discarding {dropped} buffered bytes of an abandoned response");
        }
        self.buffer.clear();
        dropped
    }

    /// Closes the connection and drops any buffered bytes.
    ///
    /// Returns `true` if a connection was open.
    pub fn disconnect(&mut self) -> bool {
        let was_open = self.link.is_some();
        if let Some(link) = self.link.take() {
            link.writer.abort();
            info!("disconnected from server at {}", link.peer);
        }
        self.buffer.clear();
        self.state = ConnectionState::Disconnected;
        was_open
    }

    /// Hands `frame` to the writer task and waits up to `drain_timeout` for
    /// it to be written and flushed.
    ///
    /// A timed-out drain is reported as [`Drain::TimedOut`], not an error.
    ///
    /// # Errors
    ///
    /// - [`NetworkError::NotConnected`] when there is no open connection.
    /// - [`NetworkError::WriteFailed`] or [`NetworkError::WriterClosed`];
    ///   the connection is torn down in both cases.
    pub async fn send_frame(
        &mut self,
        frame: Vec<u8>,
        drain_timeout: Duration,
    ) -> Result<Drain, NetworkError> {
        let Some(link) = self.link.as_ref() else {
            return Err(NetworkError::NotConnected);
        };

        let len = frame.len();
        let (done, ack) = oneshot::channel();
        if link.outbound.send(Outbound { bytes: frame, done }).await.is_err() {
            self.disconnect();
            return Err(NetworkError::WriterClosed);
        }

        match time::timeout(drain_timeout, ack).await {
            Ok(Ok(Ok(()))) => {
                debug!("wrote {len} bytes");
                Ok(Drain::Complete)
            }
            Ok(Ok(Err(e))) => {
                self.disconnect();
                Err(NetworkError::WriteFailed(e))
            }
            Ok(Err(_)) => {
                self.disconnect();
                Err(NetworkError::WriterClosed)
            }
            Err(_) => {
                warn!("{len}-byte frame not drained within {drain_timeout:?}; still writing in background");
                Ok(Drain::TimedOut)
            }
        }
    }

    /// Reads once from the socket and runs one decode attempt.
    ///
    /// Cancel-safe: dropping the future before it completes loses no bytes.
    /// Pending forever when disconnected, so callers guard it with
    /// [`ConnectionManager::is_connected`].
    pub async fn next_inbound(&mut self) -> Inbound {
        let Some(link) = self.link.as_mut() else {
            return std::future::pending().await;
        };

        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let read = link.reader.read(&mut chunk).await;
        match read {
            Ok(0) => {
                info!("server closed the connection");
                self.disconnect();
                Inbound::Closed
            }
            Ok(n) => {
                debug!("received {n} bytes ({} buffered before)", self.buffer.len());
                self.buffer.extend(&chunk[..n]);
                match self.buffer.try_decode(&self.codec) {
                    Ok(Some(obj)) => Inbound::Frame(obj),
                    Ok(None) => Inbound::Pending,
                    Err(e) => {
                        warn!("discarding receive buffer: {e}");
                        Inbound::Violation(e)
                    }
                }
            }
            Err(e) => {
                error!("read error on server connection: {e}");
                self.disconnect();
                Inbound::Failed(e)
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.writer.abort();
        }
    }
}

/// Writes queued frames in order until the channel closes or a write fails.
async fn run_writer(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Outbound>) {
    while let Some(Outbound { bytes, done }) = rx.recv().await {
        let result = match writer.write_all(&bytes).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };
        let failed = result.is_err();
        if let Err(ref e) = result {
            error!("failed to write {}-byte frame: {e}", bytes.len());
        }
        // The sender may have stopped waiting after its drain window.
        let _ = done.send(result);
        if failed {
            break;
        }
    }
    let _ = writer.shutdown().await;
}

// ── Tests ─────────────────────────────────────────────────────────────────────
