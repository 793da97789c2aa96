//! The UDP worker: one task reading the shared [`UdpEndpoint`].
//!
//! Datagrams go through three filters in order:
//!
//! 1. `holepunch` keepalives are dropped before framing.
//! 2. ImHere packets bind their source address to the player they name.
//! 3. Everything else is matched to a player by source address and then
//!    dispatched like a TCP frame, tagged [`Channel::Udp`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lobbyforge_protocol::{Channel, Header, ImHere, Inbound, Packet, PlayerId};
use lobbyforge_session::UdpBinding;
use lobbyforge_transport::{UdpEndpoint, is_holepunch};

use crate::handler::dispatch_inbound;
use crate::server::ServerState;

/// Counters for what the UDP worker has seen. Shared with the server so
/// operators (and tests) can read them.
#[derive(Debug, Default)]
pub struct UdpStats {
    received: AtomicU64,
    holepunch: AtomicU64,
    bound: AtomicU64,
    malformed: AtomicU64,
    unmapped: AtomicU64,
    dispatched: AtomicU64,
}

impl UdpStats {
    /// Every datagram read, including the ones later dropped.
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn holepunch(&self) -> u64 {
        self.holepunch.load(Ordering::Relaxed)
    }

    /// ImHere packets that created a new binding.
    pub fn bound(&self) -> u64 {
        self.bound.load(Ordering::Relaxed)
    }

    /// Datagrams that weren't a valid frame or ImHere payload.
    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Datagrams from an address no player has claimed.
    pub fn unmapped(&self) -> u64 {
        self.unmapped.load(Ordering::Relaxed)
    }

    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Reads datagrams until the process exits.
///
/// Receive errors are logged and skipped: one bad datagram (or an ICMP
/// "port unreachable" surfacing as an error) must not stop UDP for everyone.
pub(crate) async fn run_udp(endpoint: UdpEndpoint, state: Arc<ServerState>, stats: Arc<UdpStats>) {
    tracing::info!("UDP worker running");
    loop {
        match endpoint.recv_from().await {
            Ok((datagram, from)) => handle_datagram(&state, &stats, &datagram, from).await,
            Err(e) => tracing::warn!(error = %e, "UDP receive failed"),
        }
    }
}

async fn handle_datagram(state: &ServerState, stats: &UdpStats, datagram: &[u8], from: SocketAddr) {
    UdpStats::bump(&stats.received);

    if is_holepunch(datagram) {
        UdpStats::bump(&stats.holepunch);
        tracing::trace!(%from, "holepunch");
        return;
    }

    let packet = match Packet::decode(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            UdpStats::bump(&stats.malformed);
            tracing::trace!(%from, error = %e, "discarding malformed datagram");
            return;
        }
    };

    if packet.kind().ok() == Some(Header::ImHere) {
        bind_endpoint(state, stats, &packet, from).await;
        return;
    }

    let player_id = match state.context.sessions.resolve_udp(from).await {
        Ok(Some(player_id)) => player_id,
        Ok(None) => {
            UdpStats::bump(&stats.unmapped);
            tracing::trace!(%from, "datagram from unmapped endpoint");
            return;
        }
        Err(e) => {
            tracing::warn!(%from, error = %e, "could not resolve UDP endpoint");
            return;
        }
    };

    UdpStats::bump(&stats.dispatched);
    let inbound = Inbound {
        player_id,
        channel: Channel::Udp,
        packet,
    };
    dispatch_inbound(state, inbound).await;
}

/// ImHere: "the address this came from belongs to player N".
async fn bind_endpoint(state: &ServerState, stats: &UdpStats, packet: &Packet, from: SocketAddr) {
    let im_here: ImHere = match packet.body() {
        Ok(body) => body,
        Err(e) => {
            UdpStats::bump(&stats.malformed);
            tracing::debug!(%from, error = %e, "failed to read ImHere");
            return;
        }
    };
    let player_id = PlayerId(im_here.player_id);

    match state.context.sessions.bind_udp(player_id, from).await {
        Ok(UdpBinding::Bound) => {
            UdpStats::bump(&stats.bound);
            tracing::info!(%player_id, %from, "UDP endpoint bound");
        }
        Ok(UdpBinding::AlreadyBound) => {
            tracing::trace!(%player_id, %from, "player already has a UDP endpoint");
        }
        Ok(UdpBinding::EndpointTaken(owner)) => {
            tracing::debug!(%player_id, %owner, %from, "UDP endpoint already claimed");
        }
        Ok(UdpBinding::UnknownPlayer) => {
            tracing::debug!(%player_id, %from, "ImHere for unknown player");
        }
        Err(e) => tracing::warn!(%player_id, error = %e, "could not bind UDP endpoint"),
    }
}
