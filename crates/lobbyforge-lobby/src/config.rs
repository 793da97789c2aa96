//! Lobby settings, actor configuration and lifecycle state.

use lobbyforge_tick::TickConfig;

use crate::LobbyError;

// ---------------------------------------------------------------------------
// LobbySettings
// ---------------------------------------------------------------------------

/// What the creator asked for in CreateLobby.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySettings {
    /// Display name shown in the lobby list.
    pub name: String,

    /// Roster capacity. Must be at least [`Self::MIN_PLAYERS`].
    pub max_players: i32,

    /// Plaintext password, compared case-sensitively. `None` means open.
    pub password: Option<String>,

    /// Map announced in LobbyInfo. Empty until a map is chosen.
    pub map_name: String,
}

impl LobbySettings {
    /// Smallest roster capacity a lobby may be created with.
    pub const MIN_PLAYERS: i32 = 3;

    /// Builds settings for an open lobby on no particular map.
    pub fn new(name: impl Into<String>, max_players: i32) -> Self {
        Self {
            name: name.into(),
            max_players,
            password: None,
            map_name: String::new(),
        }
    }

    /// Protects the lobby with a password.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn is_password_protected(&self) -> bool {
        self.password.is_some()
    }

    /// Checks `password` against the lobby's. Open lobbies accept anything.
    pub fn password_matches(&self, password: &str) -> bool {
        match &self.password {
            Some(expected) => expected == password,
            None => true,
        }
    }

    /// Rejects settings a lobby can't be created with.
    ///
    /// # Errors
    /// Returns [`LobbyError::MaxPlayersTooLow`] below three players.
    pub fn validate(&self) -> Result<(), LobbyError> {
        if self.max_players < Self::MIN_PLAYERS {
            return Err(LobbyError::MaxPlayersTooLow(self.max_players));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LobbyConfig
// ---------------------------------------------------------------------------

/// Server-wide knobs applied to every lobby actor.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Tick scheduler settings (20 ms interval by default).
    pub tick: TickConfig,

    /// Capacity of the join/leave/info/chat command channel.
    pub command_capacity: usize,

    /// Capacity of the gameplay channel (transforms, item events).
    pub gameplay_capacity: usize,

    /// Capacity of the control channel (shutdown).
    pub control_capacity: usize,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            command_capacity: 64,
            gameplay_capacity: 100,
            control_capacity: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyState
// ---------------------------------------------------------------------------

/// The lifecycle state of a lobby.
///
/// ```text
/// Open → Closing
/// ```
///
/// - **Open**: accepting joins, ticking.
/// - **Closing**: the last member left and a Shutdown is queued on the
///   control channel. Joins are refused as if the lobby were already gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyState {
    Open,
    Closing,
}

impl LobbyState {
    /// Returns `true` if the lobby accepts new members.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for LobbyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "Open"),
            Self::Closing => write!(f, "Closing"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_fewer_than_three() {
        assert_eq!(
            LobbySettings::new("x", 2).validate(),
            Err(LobbyError::MaxPlayersTooLow(2))
        );
        assert!(LobbySettings::new("x", 3).validate().is_ok());
    }

    #[test]
    fn test_password_is_case_sensitive() {
        let settings = LobbySettings::new("x", 4).with_password("Secret");
        assert!(settings.is_password_protected());
        assert!(settings.password_matches("Secret"));
        assert!(!settings.password_matches("secret"));
    }

    #[test]
    fn test_open_lobby_accepts_any_password() {
        let settings = LobbySettings::new("x", 4);
        assert!(!settings.is_password_protected());
        assert!(settings.password_matches("whatever"));
    }

    #[test]
    fn test_lobby_state_is_joinable() {
        assert!(LobbyState::Open.is_joinable());
        assert!(!LobbyState::Closing.is_joinable());
        assert_eq!(LobbyState::Closing.to_string(), "Closing");
    }

    #[test]
    fn test_lobby_config_default_capacities() {
        let config = LobbyConfig::default();
        assert_eq!(config.gameplay_capacity, 100);
        assert_eq!(config.control_capacity, 30);
    }
}
