//! Error types for the session layer.

use lobbyforge_protocol::PlayerId;

/// Errors that can occur while looking up or updating a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No client is registered under this player ID.
    /// Usually the player disconnected while a request about them was
    /// still in flight.
    #[error("no client registered for player {0}")]
    NotFound(PlayerId),

    /// The registry actor has stopped (server shutting down).
    #[error("session registry unavailable")]
    Unavailable,
}
