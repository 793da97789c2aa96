//! Per-connection handler: handshake, message loop and teardown.
//!
//! Each accepted TCP connection gets its own Tokio task running this
//! handler. The flow is:
//!   1. Receive Hello → check header, payload and game version
//!   2. Register the client → reply Data/IDAssign
//!   3. Loop: receive frames → dispatch by header (and by flag for Data)
//!   4. On EOF, error or Disconnecting → leave the lobby, unregister
//!
//! [`dispatch_inbound`] is shared with the UDP worker: once a datagram has
//! been matched to a player, it is handled exactly like a TCP frame.

use std::sync::Arc;

use lobbyforge_protocol::catalog::response;
use lobbyforge_protocol::{
    AppError, Channel, Header, Hello, IdAssign, Inbound, Outbound, Packet, PlayerId,
};
use lobbyforge_session::NewClient;
use lobbyforge_transport::{Connection, TcpConnection, TransportError};

use crate::error::HandshakeError;
use crate::server::ServerState;
use crate::LobbyforgeError;

// ---------------------------------------------------------------------------
// ConnectionState
// ---------------------------------------------------------------------------

/// Where a TCP connection is in its lifecycle.
///
/// ```text
/// Connecting → Authenticating → Active → Closed
///                    │                     ▲
///                    └─────────────────────┘  (handshake refused)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted, nothing read yet.
    Connecting,
    /// Waiting for the Hello frame.
    Authenticating,
    /// Player ID assigned; frames are dispatched.
    Active,
    Closed,
}

impl ConnectionState {
    /// The state a successful step leads to. `Closed` stays `Closed`.
    pub fn next(self) -> Self {
        match self {
            Self::Connecting => Self::Authenticating,
            Self::Authenticating => Self::Active,
            Self::Active | Self::Closed => Self::Closed,
        }
    }

    /// Whether moving from `self` to `target` is legal.
    ///
    /// Any live state may close; otherwise only the single forward step.
    pub fn can_transition_to(self, target: Self) -> bool {
        match (self, target) {
            (Self::Closed, _) => false,
            (_, Self::Closed) => true,
            (from, to) => from.next() == to,
        }
    }
}

/// Whether the connection should keep reading after a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Close,
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// Handles a single connection from accept to close.
///
/// Teardown (leaving the lobby, unregistering) is awaited before this
/// returns, so by the time the task ends the player is gone everywhere.
pub(crate) async fn handle_connection(
    conn: TcpConnection,
    state: Arc<ServerState>,
) -> Result<(), LobbyforgeError> {
    let conn_id = conn.id();
    let mut lifecycle = ConnectionState::Connecting.next();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), state = ?lifecycle, "handling new connection");

    // --- Step 1: Handshake ---
    let player_id = match perform_handshake(&conn, &state).await {
        Ok(player_id) => player_id,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };
    lifecycle = lifecycle.next();
    tracing::info!(%conn_id, %player_id, state = ?lifecycle, "player connected");

    // --- Step 2: Message loop ---
    let result = message_loop(&conn, &state, player_id).await;

    // --- Step 3: Teardown ---
    teardown(&state, player_id).await;
    lifecycle = lifecycle.next();
    let _ = conn.close().await;
    tracing::info!(%conn_id, %player_id, state = ?lifecycle, "player disconnected");

    result
}

/// Reads the Hello frame, checks it and registers the client.
async fn perform_handshake(
    conn: &TcpConnection,
    state: &ServerState,
) -> Result<PlayerId, LobbyforgeError> {
    let Some(frame) = conn.recv().await? else {
        return Err(TransportError::ConnectionClosed("closed before hello".into()).into());
    };

    let packet = match Packet::decode(&frame) {
        Ok(packet) => packet,
        Err(_) => return refuse(conn, AppError::InvalidPacket("HELLO".into())).await,
    };
    if packet.kind().ok() != Some(Header::Hello) {
        return refuse(conn, AppError::ExpectedPacket("HELLO".into())).await;
    }
    let hello: Hello = match packet.body() {
        Ok(hello) => hello,
        Err(_) => return refuse(conn, AppError::InvalidPacket("HELLO".into())).await,
    };
    if hello.version != state.game_version {
        tracing::debug!(
            conn_id = %conn.id(),
            client = %hello.version,
            server = %state.game_version,
            "game version mismatch"
        );
        return refuse(conn, AppError::DataMismatch("VERSION".into())).await;
    }

    let player_id = state
        .context
        .sessions
        .register(NewClient {
            name: hello.name,
            identity: hello.identity,
            ip: conn.peer_addr().ip(),
            tcp: conn.sender(),
        })
        .await?;

    let ack = Packet::data(response::ID_ASSIGN, &IdAssign { id: player_id.0 })?;
    conn.send(ack.encode()?).await?;
    Ok(player_id)
}

/// Sends a Disconnecting packet and fails the handshake.
async fn refuse(conn: &TcpConnection, err: AppError) -> Result<PlayerId, LobbyforgeError> {
    tracing::debug!(conn_id = %conn.id(), code = err.code(), description = err.description(), "handshake refused");
    let notice = err.to_disconnect()?.encode()?;
    conn.send(notice).await?;
    Err(HandshakeError::ProtocolViolation(err).into())
}

async fn message_loop(
    conn: &TcpConnection,
    state: &ServerState,
    player_id: PlayerId,
) -> Result<(), LobbyforgeError> {
    loop {
        let frame = match conn.recv().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%player_id, "connection closed by peer");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let packet = match Packet::decode(&frame) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "discarding malformed frame");
                continue;
            }
        };

        let inbound = Inbound {
            player_id,
            channel: Channel::Tcp,
            packet,
        };
        if dispatch_inbound(state, inbound).await == Flow::Close {
            tracing::debug!(%player_id, "client sent Disconnecting");
            return Ok(());
        }
    }
}

/// Removes the player from its lobby, then from the registry.
async fn teardown(state: &ServerState, player_id: PlayerId) {
    let ctx = &state.context;
    match ctx.sessions.lobby_of(player_id).await {
        Ok(Some(lobby_id)) => {
            if let Some(lobby) = ctx.lobbies.get(lobby_id).await {
                if let Err(e) = lobby.leave(player_id).await {
                    tracing::debug!(%player_id, %lobby_id, error = %e, "leave on disconnect failed");
                }
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(%player_id, error = %e, "could not look up lobby on disconnect"),
    }

    if let Err(e) = ctx.sessions.unregister(player_id).await {
        tracing::warn!(%player_id, error = %e, "could not unregister client");
    }
}

// ---------------------------------------------------------------------------
// Header dispatch
// ---------------------------------------------------------------------------

/// Handles one packet from an identified player.
///
/// - `Data` goes through the router. Refusals become Rejected packets.
/// - `Echo` is sent straight back on the channel it came from.
/// - `Ack` is ignored.
/// - `Disconnecting` over TCP closes the connection.
/// - Anything else is refused with `HEADER_NOT_RECOGNIZED`.
pub(crate) async fn dispatch_inbound(state: &ServerState, inbound: Inbound) -> Flow {
    let ctx = &state.context;
    let player_id = inbound.player_id;

    match inbound.packet.kind() {
        Ok(Header::Data) => {
            let flag = inbound.packet.flag;
            if let Err(e) = state.router.dispatch(ctx, inbound).await {
                tracing::debug!(%player_id, %flag, error = %e, "request refused");
                ctx.reject(player_id, &e.to_app_error()).await;
            }
        }
        Ok(Header::Echo) => {
            let echo = match inbound.channel {
                Channel::Tcp => Outbound::tcp(player_id, inbound.packet),
                Channel::Udp => Outbound::udp(player_id, inbound.packet),
            };
            ctx.send(echo).await;
        }
        Ok(Header::Ack) => {}
        Ok(Header::Disconnecting) if inbound.channel == Channel::Tcp => return Flow::Close,
        _ => {
            tracing::debug!(%player_id, header = inbound.packet.header, channel = %inbound.channel, "header not recognized");
            ctx.reject(player_id, &AppError::HeaderNotRecognized).await;
        }
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // ConnectionState
    // =====================================================================

    #[test]
    fn test_connection_state_walks_forward() {
        let mut state = ConnectionState::Connecting;
        state = state.next();
        assert_eq!(state, ConnectionState::Authenticating);
        state = state.next();
        assert_eq!(state, ConnectionState::Active);
        state = state.next();
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(state.next(), ConnectionState::Closed);
    }

    #[test]
    fn test_can_transition_to_forward_only() {
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Authenticating));
        assert!(ConnectionState::Authenticating.can_transition_to(ConnectionState::Active));
        assert!(!ConnectionState::Connecting.can_transition_to(ConnectionState::Active));
        assert!(!ConnectionState::Active.can_transition_to(ConnectionState::Authenticating));
    }

    #[test]
    fn test_can_transition_to_closed_from_any_live_state() {
        assert!(ConnectionState::Connecting.can_transition_to(ConnectionState::Closed));
        assert!(ConnectionState::Authenticating.can_transition_to(ConnectionState::Closed));
        assert!(ConnectionState::Active.can_transition_to(ConnectionState::Closed));
        assert!(!ConnectionState::Closed.can_transition_to(ConnectionState::Closed));
    }
}
