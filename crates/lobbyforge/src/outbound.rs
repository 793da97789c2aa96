//! The outbound fan-out: the single consumer of the process-wide queue.
//!
//! Producers (route handlers, lobby actors) address packets to a player ID
//! and a channel. This task turns that into a socket: the client's
//! [`TcpSender`](lobbyforge_transport::TcpSender) for TCP, or its bound
//! address on the shared [`UdpEndpoint`] for UDP. A packet whose target is
//! gone, or who never sent ImHere, is dropped here. Producers never see it.
//!
//! TCP frames are queued with `try_send`. A client whose write queue is
//! full loses the frame instead of stalling delivery to everyone else.

use lobbyforge_protocol::{Channel, Outbound};
use lobbyforge_session::SessionHandle;
use lobbyforge_transport::{TransportError, UdpEndpoint};
use tokio::sync::mpsc;

/// Drains `rx` until every sender is dropped.
pub(crate) async fn run_fanout(
    mut rx: mpsc::Receiver<Outbound>,
    sessions: SessionHandle,
    udp: UdpEndpoint,
) {
    tracing::debug!("outbound fan-out running");
    while let Some(outbound) = rx.recv().await {
        deliver(&sessions, &udp, outbound).await;
    }
    tracing::debug!("outbound fan-out stopped");
}

async fn deliver(sessions: &SessionHandle, udp: &UdpEndpoint, outbound: Outbound) {
    let target = outbound.target;
    let flag = outbound.packet.flag;

    let route = match sessions.route(target).await {
        Ok(Some(route)) => route,
        Ok(None) => {
            tracing::debug!(%target, %flag, "dropping packet for disconnected player");
            return;
        }
        Err(e) => {
            tracing::debug!(%target, %flag, error = %e, "dropping packet, registry unavailable");
            return;
        }
    };

    let frame = match outbound.packet.encode() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(%target, %flag, error = %e, "failed to encode outbound packet");
            return;
        }
    };

    match outbound.channel {
        Channel::Tcp => {
            match route.tcp.try_send(frame) {
                Ok(()) => {}
                Err(TransportError::QueueFull(_)) => {
                    tracing::warn!(%target, %flag, "client not draining its queue, dropping packet");
                }
                Err(e) => tracing::debug!(%target, %flag, error = %e, "TCP write queue closed"),
            }
        }
        Channel::Udp => {
            let Some(addr) = route.udp else {
                tracing::debug!(%target, %flag, "dropping UDP packet, no endpoint bound");
                return;
            };
            if let Err(e) = udp.send_to(&frame, addr).await {
                tracing::warn!(%target, %addr, error = %e, "UDP send failed");
            }
        }
    }
}
