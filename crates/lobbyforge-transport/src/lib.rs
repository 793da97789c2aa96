//! Transport layer for Lobbyforge.
//!
//! Provides the [`Transport`] and [`Connection`] traits plus the two
//! concrete sockets the game uses:
//!
//! - [`TcpTransport`] / [`TcpConnection`]: one stream per client. Bytes are
//!   reassembled into whole frames by a [`FrameReader`], and writes go
//!   through a per-connection writer task so any worker can queue frames
//!   for a client through a cloned [`TcpSender`].
//! - [`UdpEndpoint`]: one socket shared by every client.
//!
//! The transport knows where frames start and end (it reads the length
//! field) but never decodes them. That's the protocol crate's job.

#![allow(async_fn_in_trait)]

mod error;
mod tcp;
mod udp;

pub use error::TransportError;
pub use tcp::{
    DEFAULT_READ_BUFFER, FrameReader, TcpConfig, TcpConnection, TcpSender, TcpTransport,
};
pub use udp::{DEFAULT_UDP_BUFFER, HOLEPUNCH, UdpEndpoint, is_holepunch};

use std::fmt;

use bytes::Bytes;

/// Per-process connection number, assigned by [`TcpTransport::accept`].
///
/// Only used for logs and for telling write tasks apart. Players are
/// identified by `PlayerId`, which the session registry hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tcp#{}", self.0)
    }
}

/// A listener that yields framed connections.
///
/// The server's accept loop is written against this trait so tests can
/// drive it with any stream source.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;
    type Error: std::error::Error + Send + Sync;

    /// Next accepted client, already wrapped for framing.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops listening. Connections already accepted keep running.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// One client's reliable stream, seen as a sequence of frames.
pub trait Connection: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync;

    /// Hands a finished frame to the write task. Returns once it's queued,
    /// not once it's on the wire.
    async fn send(&self, frame: Bytes) -> Result<(), Self::Error>;

    /// Waits for the next whole frame. `Ok(None)` means the peer hung up
    /// between frames.
    async fn recv(&self) -> Result<Option<Bytes>, Self::Error>;

    /// Lets the write task drain what's queued, then shuts the stream.
    async fn close(&self) -> Result<(), Self::Error>;

    fn id(&self) -> ConnectionId;
}
