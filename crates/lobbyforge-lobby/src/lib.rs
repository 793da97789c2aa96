//! Lobbies for Lobbyforge.
//!
//! Each lobby runs as an isolated Tokio task (actor model) with its own
//! roster, channels and 20 ms tick loop. Nothing outside the actor can
//! touch the roster. Everyone else holds a [`LobbyHandle`].
//!
//! # Key types
//!
//! - [`LobbyDirectory`]: opens lobbies, looks them up, lists them
//! - [`LobbyHandle`]: send commands and gameplay to a running lobby
//! - [`LobbySettings`]: what the creator asked for (name, size, password)
//! - [`LobbyConfig`]: server-wide actor settings (tick, channel sizes)
//! - [`Roster`] / [`MotionModel`]: who is in the lobby and how they move

mod config;
mod directory;
mod error;
mod lobby;
mod roster;

pub use config::{LobbyConfig, LobbySettings, LobbyState};
pub use directory::LobbyDirectory;
pub use error::LobbyError;
pub use lobby::{LobbyHandle, LobbySummary};
pub use roster::{AcceptPending, Member, MotionModel, NewMember, Roster};
