//! TCP transport: stream reassembly and a queued writer per connection.
//!
//! TCP is a byte stream, not a message stream. One `read` may return half
//! a frame, or two and a bit. [`FrameReader`] turns the stream back into
//! whole frames using the `FullMsgLen` field of the 7-byte prefix.
//!
//! ## Reassembly rules
//!
//! Reads go into a fixed-size chunk buffer (`read_buffer`, 4086 bytes by
//! default) and are appended to an accumulation buffer.
//!
//! - A frame that fits in the chunk buffer but arrived split is topped up
//!   with further reads.
//! - A frame that declares more than the chunk buffer triggers
//!   *continuation reads*. Each one is expected to fill the whole chunk
//!   until the frame is complete; a short continuation read while more
//!   bytes are still owed means the stream is corrupt, and the reader
//!   fails with [`TransportError::ShortContinuation`].
//! - Bytes past the end of a frame are kept for the next frame.
//!
//! ## Writes
//!
//! The write half lives in its own task fed by an `mpsc` channel. Any
//! worker holding a [`TcpSender`] can queue frames for this client without
//! touching the socket, and writes to one client never block another.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use lobbyforge_protocol::{HEADER_LEN, declared_len};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Transport, TransportError};

/// Default size of the per-connection read chunk.
pub const DEFAULT_READ_BUFFER: usize = 4086;

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

// ---------------------------------------------------------------------------
// TcpConfig
// ---------------------------------------------------------------------------

/// Per-connection buffer and queue sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpConfig {
    /// Size of a single socket read. Frames larger than this are read with
    /// continuation reads.
    pub read_buffer: usize,

    /// Frames declaring more than this many bytes are refused outright,
    /// so a bogus length can't make the server allocate gigabytes.
    pub max_frame_len: usize,

    /// How many outgoing frames can be queued before senders wait.
    pub write_queue: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            read_buffer: DEFAULT_READ_BUFFER,
            max_frame_len: 1 << 20,
            write_queue: 256,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameReader
// ---------------------------------------------------------------------------

/// Reassembles whole frames from any async byte stream.
///
/// Generic over the reader so it can be tested against in-memory slices;
/// in the server it wraps the read half of a `TcpStream`.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
    chunk: Vec<u8>,
    max_frame_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, read_buffer: usize, max_frame_len: usize) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(read_buffer),
            chunk: vec![0; read_buffer.max(HEADER_LEN)],
            max_frame_len,
        }
    }

    /// Reads until one whole frame is buffered and returns it.
    ///
    /// Returns `Ok(None)` on a clean EOF between frames.
    ///
    /// A frame whose declared length is below the 7-byte prefix can't be
    /// delimited. Only that prefix is returned, so the decoder reports it as
    /// corrupt, and reading resumes at the byte after it. Frames already
    /// buffered behind it survive.
    ///
    /// # Errors
    /// - [`TransportError::ReceiveFailed`] on an I/O error.
    /// - [`TransportError::ConnectionClosed`] if the stream ends mid-frame.
    /// - [`TransportError::ShortContinuation`] if a large frame's
    ///   continuation read comes back short.
    /// - [`TransportError::FrameTooLarge`] if the declared length exceeds
    ///   `max_frame_len`.
    pub async fn next_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            if let Some(declared) = declared_len(&self.buf) {
                if declared < HEADER_LEN {
                    return Ok(Some(self.buf.split_to(HEADER_LEN).freeze()));
                }
                if declared > self.max_frame_len {
                    return Err(TransportError::FrameTooLarge {
                        declared,
                        max: self.max_frame_len,
                    });
                }
                if self.buf.len() >= declared {
                    return Ok(Some(self.buf.split_to(declared).freeze()));
                }
                if declared > self.chunk.len() {
                    self.read_continuation(declared).await?;
                    continue;
                }
            }

            if self.fill().await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Err(TransportError::ConnectionClosed(format!(
                    "stream ended {} bytes into a frame",
                    self.buf.len()
                )));
            }
        }
    }

    /// Performs one socket read and appends it to the buffer.
    async fn fill(&mut self) -> Result<usize, TransportError> {
        let n = self
            .inner
            .read(&mut self.chunk)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        self.buf.extend_from_slice(&self.chunk[..n]);
        Ok(n)
    }

    async fn read_continuation(&mut self, declared: usize) -> Result<(), TransportError> {
        while self.buf.len() < declared {
            let n = self.fill().await?;
            if n == 0 {
                return Err(TransportError::ConnectionClosed(format!(
                    "stream ended {} bytes into a {declared}-byte frame",
                    self.buf.len()
                )));
            }
            if n < self.chunk.len() && self.buf.len() < declared {
                return Err(TransportError::ShortContinuation {
                    expected: declared,
                    received: self.buf.len(),
                });
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TcpSender: the queued write half
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum WriteOp {
    Frame(Bytes),
    Close,
}

/// A cloneable handle that queues frames for one connection.
///
/// The session registry stores one of these per client; the fan-out
/// consumer uses it to deliver TCP traffic.
#[derive(Debug, Clone)]
pub struct TcpSender {
    id: ConnectionId,
    tx: mpsc::Sender<WriteOp>,
}

impl TcpSender {
    /// Spawns a writer task that owns `writer` and returns its handle.
    ///
    /// Accepted connections pass their TCP write half; anything else that
    /// implements `AsyncWrite` works too (an in-memory duplex in tests).
    pub fn spawn<W>(id: ConnectionId, writer: W, queue: usize) -> Self
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(queue);
        tokio::spawn(write_loop(id, writer, rx));
        Self { id, tx }
    }

    /// Queues an encoded frame. Waits if the queue is full.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the writer task has
    /// already exited.
    pub async fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        self.tx
            .send(WriteOp::Frame(frame))
            .await
            .map_err(|_| TransportError::ConnectionClosed(format!("{} writer gone", self.id)))
    }

    /// Queues an encoded frame without waiting.
    ///
    /// # Errors
    /// - [`TransportError::QueueFull`] if the peer isn't draining its queue.
    /// - [`TransportError::ConnectionClosed`] if the writer task has
    ///   already exited.
    pub fn try_send(&self, frame: Bytes) -> Result<(), TransportError> {
        self.tx.try_send(WriteOp::Frame(frame)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::QueueFull(self.id.to_string()),
            mpsc::error::TrySendError::Closed(_) => {
                TransportError::ConnectionClosed(format!("{} writer gone", self.id))
            }
        })
    }

    /// Asks the writer to flush what's queued and shut the socket down.
    ///
    /// # Errors
    /// Returns [`TransportError::ConnectionClosed`] if the writer task has
    /// already exited.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.tx
            .send(WriteOp::Close)
            .await
            .map_err(|_| TransportError::ConnectionClosed(format!("{} writer gone", self.id)))
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

async fn write_loop<W>(id: ConnectionId, mut half: W, mut rx: mpsc::Receiver<WriteOp>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Frame(frame) => {
                if let Err(e) = half.write_all(&frame).await {
                    tracing::debug!(%id, error = %e, "write failed, stopping writer");
                    break;
                }
            }
            WriteOp::Close => break,
        }
    }
    if let Err(e) = half.shutdown().await {
        tracing::trace!(%id, error = %e, "shutdown after close failed");
    }
}

// ---------------------------------------------------------------------------
// TcpTransport
// ---------------------------------------------------------------------------

/// A TCP [`Transport`] that listens for game clients.
pub struct TcpTransport {
    listener: TcpListener,
    config: TcpConfig,
}

impl TcpTransport {
    /// Binds with the default [`TcpConfig`].
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the address can't be bound.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, TcpConfig::default()).await
    }

    /// Binds with explicit buffer sizes.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the address can't be bound.
    pub async fn bind_with(addr: &str, config: TcpConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, read_buffer = config.read_buffer, "TCP transport listening");
        Ok(Self { listener, config })
    }

    /// The address actually bound (useful after binding port 0).
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the OS can't report it.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.listener
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }
}

impl Transport for TcpTransport {
    type Connection = TcpConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Connection, Self::Error> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        // Small frames (transform updates) shouldn't wait for Nagle.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::trace!(%peer, error = %e, "set_nodelay failed");
        }

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        let (read_half, write_half) = stream.into_split();

        let sender = TcpSender::spawn(id, write_half, self.config.write_queue);

        tracing::debug!(%id, %peer, "accepted TCP connection");

        Ok(TcpConnection {
            id,
            peer,
            reader: Mutex::new(FrameReader::new(
                read_half,
                self.config.read_buffer,
                self.config.max_frame_len,
            )),
            sender,
        })
    }

    async fn shutdown(&self) -> Result<(), Self::Error> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TcpConnection
// ---------------------------------------------------------------------------

/// One accepted client stream.
pub struct TcpConnection {
    id: ConnectionId,
    peer: SocketAddr,
    reader: Mutex<FrameReader<OwnedReadHalf>>,
    sender: TcpSender,
}

impl TcpConnection {
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// A handle other workers can use to write to this client.
    pub fn sender(&self) -> TcpSender {
        self.sender.clone()
    }
}

impl Connection for TcpConnection {
    type Error = TransportError;

    async fn send(&self, frame: Bytes) -> Result<(), Self::Error> {
        self.sender.send(frame).await
    }

    async fn recv(&self) -> Result<Option<Bytes>, Self::Error> {
        self.reader.lock().await.next_frame().await
    }

    async fn close(&self) -> Result<(), Self::Error> {
        self.sender.close().await
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! `&[u8]` implements `AsyncRead`, and `chain` makes the first slice's
    //! end a read boundary, which lets these tests control exactly how the
    //! stream is split across reads.

    use super::*;
    use lobbyforge_protocol::{Flag, Header, Packet};

    fn frame(payload_len: usize) -> Vec<u8> {
        Packet::new(Header::Data, Flag(0x11), vec![0xAB; payload_len])
            .encode()
            .unwrap()
            .to_vec()
    }

    // =====================================================================
    // Whole and split frames
    // =====================================================================

    #[tokio::test]
    async fn test_next_frame_two_frames_in_one_read() {
        let mut bytes = frame(3);
        bytes.extend(frame(5));
        let mut reader = FrameReader::new(&bytes[..], 64, 1024);

        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 10);
        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 12);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_frame_tops_up_split_frame() {
        let bytes = frame(10);
        let stream = (&bytes[..5]).chain(&bytes[5..]);
        let mut reader = FrameReader::new(stream, 64, 1024);

        let got = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(&got[..], &bytes[..]);
    }

    #[tokio::test]
    async fn test_next_frame_waits_for_partial_prefix() {
        let bytes = frame(2);
        let stream = (&bytes[..2]).chain(&bytes[2..]);
        let mut reader = FrameReader::new(stream, 64, 1024);

        let got = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(Packet::decode(&got).unwrap().payload.len(), 2);
    }

    // =====================================================================
    // Continuation reads
    // =====================================================================

    #[tokio::test]
    async fn test_next_frame_reassembles_frame_larger_than_buffer() {
        // 7 + 33 = 40 bytes through an 8-byte buffer: 8, 8, 8, 8, 8.
        let bytes = frame(33);
        let mut reader = FrameReader::new(&bytes[..], 8, 1024);

        let got = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(&got[..], &bytes[..]);
    }

    #[tokio::test]
    async fn test_next_frame_final_continuation_may_be_short() {
        // 7 + 13 = 20 bytes through an 8-byte buffer: 8, 8, then 4.
        let bytes = frame(13);
        let mut reader = FrameReader::new(&bytes[..], 8, 1024);

        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_next_frame_short_continuation_is_error() {
        let bytes = frame(23); // 30 bytes
        let stream = (&bytes[..8]).chain((&bytes[8..12]).chain(&bytes[12..]));
        let mut reader = FrameReader::new(stream, 8, 1024);

        let result = reader.next_frame().await;
        assert!(matches!(
            result,
            Err(TransportError::ShortContinuation {
                expected: 30,
                received: 12
            })
        ));
    }

    #[tokio::test]
    async fn test_next_frame_keeps_leftover_after_large_frame() {
        let mut bytes = frame(17); // 24 bytes
        bytes.extend(frame(1)); // 8 bytes
        let mut reader = FrameReader::new(&bytes[..], 8, 1024);

        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 24);
        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 8);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    // =====================================================================
    // Bad streams
    // =====================================================================

    #[tokio::test]
    async fn test_next_frame_undersized_length_is_handed_to_decoder() {
        let bytes = [0x03, 0x00, 0x11, 3, 0, 0, 0];
        let mut reader = FrameReader::new(&bytes[..], 64, 1024);

        let got = reader.next_frame().await.unwrap().unwrap();
        assert_eq!(got.len(), HEADER_LEN);
        assert!(Packet::decode(&got).is_err());
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_frame_undersized_length_keeps_frames_behind_it() {
        let mut bytes = vec![0x03, 0x00, 0x11, 3, 0, 0, 0];
        let valid = frame(4);
        bytes.extend(&valid);
        bytes.extend(frame(2));
        // All three arrive in a single read.
        let mut reader = FrameReader::new(&bytes[..], 64, 1024);

        let bad = reader.next_frame().await.unwrap().unwrap();
        assert!(Packet::decode(&bad).is_err());
        assert_eq!(&reader.next_frame().await.unwrap().unwrap()[..], &valid[..]);
        assert_eq!(reader.next_frame().await.unwrap().unwrap().len(), 9);
        assert!(reader.next_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_frame_eof_mid_frame_is_error() {
        let bytes = frame(10);
        let mut reader = FrameReader::new(&bytes[..12], 64, 1024);

        let result = reader.next_frame().await;
        assert!(matches!(result, Err(TransportError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_next_frame_over_max_is_error() {
        let bytes = frame(100);
        let mut reader = FrameReader::new(&bytes[..], 64, 50);

        let result = reader.next_frame().await;
        assert!(matches!(
            result,
            Err(TransportError::FrameTooLarge {
                declared: 107,
                max: 50
            })
        ));
    }

    // =====================================================================
    // TcpSender
    // =====================================================================

    #[tokio::test]
    async fn test_try_send_reports_full_queue_without_waiting() {
        // Nobody reads the other end, so the writer blocks on its first frame.
        let (_peer, stuck) = tokio::io::duplex(1);
        let sender = TcpSender::spawn(ConnectionId::new(3), stuck, 1);

        let mut outcomes = Vec::new();
        for _ in 0..3 {
            outcomes.push(sender.try_send(Bytes::from(frame(16))));
        }

        assert!(outcomes[0].is_ok());
        assert!(matches!(
            outcomes.last(),
            Some(Err(TransportError::QueueFull(id))) if id == "tcp#3"
        ));
    }
}
