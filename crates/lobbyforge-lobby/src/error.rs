//! Error types for the lobby layer.

use lobbyforge_protocol::{AppError, LobbyId, PlayerId};

/// Errors that can occur during lobby operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    /// The lobby does not exist, or is shutting down.
    #[error("lobby {0} not found")]
    NotFound(LobbyId),

    /// The roster already holds `max_players` members.
    #[error("lobby {0} is full")]
    Full(LobbyId),

    /// The lobby is password protected and the password didn't match.
    #[error("wrong password for lobby {0}")]
    InvalidPassword(LobbyId),

    /// The player is already a member of some lobby.
    #[error("player {0} is already in a lobby")]
    AlreadyInLobby(PlayerId),

    /// The player is not a member of this lobby.
    #[error("player {0} not in lobby {1}")]
    NotInLobby(PlayerId, LobbyId),

    /// Lobbies need room for at least three players.
    #[error("max players must be at least 3, got {0}")]
    MaxPlayersTooLow(i32),

    /// The lobby's channels are closed (the actor has stopped).
    #[error("lobby {0} is unavailable")]
    Unavailable(LobbyId),
}

/// How a lobby failure is reported to the client.
///
/// A lobby that stopped between lookup and request looks the same to the
/// client as one that never existed.
impl From<LobbyError> for AppError {
    fn from(err: LobbyError) -> Self {
        match err {
            LobbyError::NotFound(_) | LobbyError::Unavailable(_) => AppError::LobbyNotFound,
            LobbyError::Full(_) => AppError::LobbyFull,
            LobbyError::InvalidPassword(_) => AppError::InvalidPassword,
            LobbyError::AlreadyInLobby(_) => AppError::AlreadyInLobby,
            LobbyError::NotInLobby(..) => AppError::Unauthorized("NOT_IN_LOBBY".into()),
            LobbyError::MaxPlayersTooLow(_) => {
                AppError::InvalidData("MAX_PLAYERS_LESS_THAN_THREE".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lobby_error_maps_to_client_codes() {
        let cases = [
            (LobbyError::NotFound(LobbyId(1)), "LOBBY_NOT_FOUND"),
            (LobbyError::Unavailable(LobbyId(1)), "LOBBY_NOT_FOUND"),
            (LobbyError::Full(LobbyId(1)), "LOBBY_FULL"),
            (LobbyError::InvalidPassword(LobbyId(1)), "INVALID_PASSWORD"),
            (LobbyError::AlreadyInLobby(PlayerId(2)), "ALREADY_IN_LOBBY"),
            (LobbyError::NotInLobby(PlayerId(2), LobbyId(1)), "UNAUTHORIZED"),
            (LobbyError::MaxPlayersTooLow(2), "INVALID_DATA"),
        ];
        for (err, code) in cases {
            assert_eq!(AppError::from(err).code(), code);
        }
    }

    #[test]
    fn test_max_players_description() {
        let app = AppError::from(LobbyError::MaxPlayersTooLow(2));
        assert_eq!(app.description(), "MAX_PLAYERS_LESS_THAN_THREE");
    }
}
