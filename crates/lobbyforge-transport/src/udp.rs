//! The shared UDP endpoint.
//!
//! Every client talks to the same UDP socket, so there's no per-client
//! connection object. Datagrams are told apart by their source address,
//! which the server learns from ImHere packets.
//!
//! Clients behind NAT also send a bare `holepunch` datagram now and then
//! to keep their NAT mapping alive. Those carry no frame and are filtered
//! out with [`is_holepunch`] before any decoding happens.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;

use crate::TransportError;

/// Default receive buffer for one datagram.
pub const DEFAULT_UDP_BUFFER: usize = 2048;

/// Keepalive sentinel sent by clients to hold their NAT mapping open.
pub const HOLEPUNCH: &[u8] = b"holepunch";

/// Returns `true` if the datagram is a NAT keepalive rather than a frame.
pub fn is_holepunch(datagram: &[u8]) -> bool {
    datagram.starts_with(HOLEPUNCH)
}

/// A UDP socket shared between the receive worker and the fan-out.
///
/// Cloning is cheap (`Arc`): `UdpSocket::send_to` and `recv_from` take
/// `&self`, so one socket can be read by one task and written by another.
#[derive(Debug, Clone)]
pub struct UdpEndpoint {
    socket: Arc<UdpSocket>,
    buffer_size: usize,
}

impl UdpEndpoint {
    /// Binds the shared socket.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the address can't be bound.
    pub async fn bind(addr: &str, buffer_size: usize) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "UDP endpoint listening");
        Ok(Self {
            socket: Arc::new(socket),
            buffer_size,
        })
    }

    /// The address actually bound.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the OS can't report it.
    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.socket
            .local_addr()
            .map_err(TransportError::AcceptFailed)
    }

    /// Receives one datagram and its source.
    ///
    /// Datagrams longer than the buffer are truncated by the OS.
    ///
    /// # Errors
    /// Returns [`TransportError::ReceiveFailed`] on an I/O error.
    pub async fn recv_from(&self) -> Result<(Bytes, SocketAddr), TransportError> {
        let mut buf = vec![0u8; self.buffer_size];
        let (n, from) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(TransportError::ReceiveFailed)?;
        buf.truncate(n);
        Ok((Bytes::from(buf), from))
    }

    /// Sends one datagram.
    ///
    /// # Errors
    /// Returns [`TransportError::SendFailed`] on an I/O error.
    pub async fn send_to(&self, datagram: &[u8], to: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .send_to(datagram, to)
            .await
            .map_err(TransportError::SendFailed)?;
        Ok(())
    }
}
