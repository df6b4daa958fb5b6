//! Byte transports to a rosbridge server.
//!
//! | Transport | Server side |
//! |---|---|
//! | [`TcpTransport`] | `rosbridge_tcp` – frames written back to back on a raw socket |
//! | [`WsTransport`] | `rosbridge_websocket` – one WebSocket message per frame |
//! | [`MemoryTransport`] | nothing; frames are recorded in a shared [`FrameLog`] |

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures_util::SinkExt;
use rbcam_types::RbError;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

/// A connected, write-only byte channel to a rosbridge server.
#[async_trait]
pub trait Transport: Send {
    /// Human-readable peer address, used in logs.
    fn peer(&self) -> &str;

    /// Send one encoded frame.
    ///
    /// # Errors
    ///
    /// Returns [`RbError::Transport`] when the peer is gone or the write fails.
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), RbError>;

    /// Shut the connection down.  Calling `close` twice is harmless.
    async fn close(&mut self) -> Result<(), RbError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw TCP
// ─────────────────────────────────────────────────────────────────────────────

pub struct TcpTransport {
    stream: Option<TcpStream>,
    peer: String,
}

impl TcpTransport {
    /// Connect to `host:port`.
    pub async fn connect(host: &str, port: u16) -> Result<Self, RbError> {
        let peer = format!("{host}:{port}");
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| RbError::Transport(format!("connect to {peer}: {e}")))?;
        stream
            .set_nodelay(true)
            .map_err(|e| RbError::Transport(format!("set TCP_NODELAY on {peer}: {e}")))?;
        debug!(peer = %peer, "tcp connected");
        Ok(Self {
            stream: Some(stream),
            peer,
        })
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), RbError> {
        let stream = self.stream.as_mut().ok_or(RbError::NotConnected)?;
        stream
            .write_all(&frame)
            .await
            .map_err(|e| RbError::Transport(format!("write to {}: {e}", self.peer)))
    }

    async fn close(&mut self) -> Result<(), RbError> {
        if let Some(mut stream) = self.stream.take() {
            stream
                .shutdown()
                .await
                .map_err(|e| RbError::Transport(format!("shutdown {}: {e}", self.peer)))?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// WebSocket
// ─────────────────────────────────────────────────────────────────────────────

pub struct WsTransport {
    ws: Option<WebSocketStream<MaybeTlsStream<TcpStream>>>,
    peer: String,
    text_frames: bool,
}

impl WsTransport {
    /// Perform the WebSocket handshake with `url` (e.g. `ws://localhost:9090`).
    ///
    /// With `text_frames` every frame is sent as a text message (JSON codec);
    /// otherwise as a binary message (BSON codec).
    pub async fn connect(url: &str, text_frames: bool) -> Result<Self, RbError> {
        let (ws, _response) = connect_async(url)
            .await
            .map_err(|e| RbError::Transport(format!("ws handshake with {url}: {e}")))?;
        debug!(peer = %url, "websocket connected");
        Ok(Self {
            ws: Some(ws),
            peer: url.to_string(),
            text_frames,
        })
    }
}

#[async_trait]
impl Transport for WsTransport {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), RbError> {
        let ws = self.ws.as_mut().ok_or(RbError::NotConnected)?;
        let message = if self.text_frames {
            let text = String::from_utf8(frame)
                .map_err(|e| RbError::Encoding(format!("text frame is not UTF-8: {e}")))?;
            Message::Text(text.into())
        } else {
            Message::Binary(frame.into())
        };
        ws.send(message)
            .await
            .map_err(|e| RbError::Transport(format!("ws send to {}: {e}", self.peer)))
    }

    async fn close(&mut self) -> Result<(), RbError> {
        if let Some(mut ws) = self.ws.take() {
            ws.close(None)
                .await
                .map_err(|e| RbError::Transport(format!("ws close {}: {e}", self.peer)))?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-memory
// ─────────────────────────────────────────────────────────────────────────────

/// Shared record of every frame a [`MemoryTransport`] accepted.
///
/// Cloning is cheap; all clones see the same frames.
#[derive(Clone, Default, Debug)]
pub struct FrameLog {
    inner: Arc<Mutex<FrameLogInner>>,
}

#[derive(Default, Debug)]
struct FrameLogInner {
    frames: Vec<Vec<u8>>,
    closed: bool,
}

impl FrameLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded frames, oldest first.
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.lock().frames.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `true` once the owning transport was closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrameLogInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Transport that keeps frames in memory.
///
/// Used in tests.  [`MemoryTransport::fail_after`] simulates a connection
/// that drops mid-session; [`MemoryTransport::failing_close`] one that resets
/// during shutdown.
pub struct MemoryTransport {
    log: FrameLog,
    peer: String,
    fail_after: Option<usize>,
    fail_close: bool,
}

impl MemoryTransport {
    pub fn new(log: FrameLog) -> Self {
        Self {
            log,
            peer: "memory".to_string(),
            fail_after: None,
            fail_close: false,
        }
    }

    /// Accept `frames` frames, then fail every further send.
    pub fn fail_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Make [`Transport::close`] fail after marking the log closed.
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn peer(&self) -> &str {
        &self.peer
    }

    async fn send(&mut self, frame: Vec<u8>) -> Result<(), RbError> {
        let mut inner = self.log.lock();
        if inner.closed {
            return Err(RbError::NotConnected);
        }
        if self.fail_after.is_some_and(|limit| inner.frames.len() >= limit) {
            return Err(RbError::Transport("memory transport: connection reset".to_string()));
        }
        inner.frames.push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RbError> {
        self.log.lock().closed = true;
        if self.fail_close {
            return Err(RbError::Transport("memory transport: reset during close".to_string()));
        }
        Ok(())
    }
}
