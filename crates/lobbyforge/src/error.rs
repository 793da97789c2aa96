//! Unified error type for the Lobbyforge server.

use lobbyforge_lobby::LobbyError;
use lobbyforge_protocol::{AppError, ProtocolError};
use lobbyforge_session::SessionError;
use lobbyforge_transport::TransportError;

use crate::config::ConfigError;
use crate::router::RouterError;

/// Why a handshake ended the connection.
///
/// The client has already been sent a Disconnecting packet carrying the
/// wrapped [`AppError`] by the time this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake refused: {0}")]
    ProtocolViolation(AppError),
}

/// Top-level error that wraps all crate-specific errors.
///
/// Server setup and connection tasks deal with this single type instead
/// of importing errors from each sub-crate. The `#[from]` attribute on each
/// variant lets `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum LobbyforgeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame or payload failed to encode or decode.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session registry refused or is gone.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A lobby operation failed.
    #[error(transparent)]
    Lobby(#[from] LobbyError),

    /// Route table construction failed.
    #[error(transparent)]
    Router(#[from] RouterError),

    /// The client broke the handshake rules.
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    /// The configuration file couldn't be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
