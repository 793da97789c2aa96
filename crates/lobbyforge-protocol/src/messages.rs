//! Payload shapes for every message the server reads or writes.
//!
//! Field ORDER is the schema (see [`crate::wire`]). Reordering fields in
//! any of these structs breaks compatibility with deployed clients even
//! though it still compiles, so treat the declaration order as frozen.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Spatial data
// ---------------------------------------------------------------------------

/// A 3-component vector of 32-bit floats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Where a player is and how it is moving.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vector3,
    pub rotation: Vector3,
    pub real_velocity: Vector3,
    pub real_angular_velocity: Vector3,
}

/// The player's input state at the time of a transform update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Inputs {
    pub is_sprinting: bool,
    pub is_moving: bool,
    pub is_crouching: bool,
    pub move_direction: Vector3,
}

/// `{ID, Transforms, Inputs}`: sent by clients as `post::PLAYER_TRANSFORM_DATA`
/// and batched by the server into [`PlayerTransforms`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerData {
    pub id: i32,
    pub transforms: Transform,
    pub inputs: Inputs,
}

/// The per-tick movement broadcast: only the players that changed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerTransforms {
    pub players: Vec<PlayerData>,
}

// ---------------------------------------------------------------------------
// Handshake and session
// ---------------------------------------------------------------------------

/// The first frame every client sends over TCP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    pub name: String,
    pub identity: String,
    pub version: String,
}

/// The server's reply to a valid [`Hello`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdAssign {
    pub id: i32,
}

/// UDP discovery: "the datagram you're reading came from player `id`".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImHere {
    pub player_id: i32,
}

/// `{Message, Description}`: carried by Rejected and Disconnecting packets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub message: String,
    pub description: String,
}

// ---------------------------------------------------------------------------
// Lobby management
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateLobby {
    pub name: String,
    pub max_players: i32,
    pub is_password_protected: bool,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinLobby {
    pub lobby_id: i32,
    pub password: String,
}

/// One row of the lobby browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyListEntry {
    pub id: i32,
    pub name: String,
    pub player_count: i32,
    pub max_players: i32,
    pub is_password_protected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyList {
    pub lobbies: Vec<LobbyListEntry>,
}

/// A lobby member as shown in the lobby screen.
///
/// Cosmetics and skin are catalog data the server doesn't own; they are
/// always sent empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPlayerInfo {
    pub id: i32,
    pub name: String,
    pub cosmetics: Vec<String>,
    pub skin: String,
    pub is_monster: bool,
    pub is_host: bool,
}

/// Broadcast to all members whenever the roster changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLobbyInfo {
    pub lobby_name: String,
    pub map_name: String,
    pub time: i32,
    pub players: Vec<NetworkPlayerInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerList {
    pub players: Vec<NetworkPlayerInfo>,
}

/// A chat line, both as posted and as relayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chat {
    pub message: String,
}
