//! Wire protocol for Lobbyforge.
//!
//! This crate defines the "language" game clients and the server speak:
//!
//! - **Frames** ([`Packet`], [`Header`]): the 7-byte prefix plus payload
//!   that every TCP message and UDP datagram uses.
//! - **Catalog** ([`Flag`], [`catalog::request`], [`catalog::post`],
//!   [`catalog::response`]): the sub-type codes inside `Data` packets.
//! - **Payload codec** ([`Codec`], [`WireCodec`], [`wire`]): a serde data
//!   format for the tagless, field-order-driven payload encoding.
//! - **Messages** ([`Hello`], [`CreateLobby`], [`PlayerTransforms`], ...):
//!   the payload shapes.
//! - **Errors** ([`ProtocolError`] for bytes that don't parse, [`AppError`]
//!   for requests the server refuses).
//!
//! # Architecture
//!
//! The protocol layer sits between the transport (raw bytes) and the
//! server's handlers. It doesn't know about sockets or lobbies, only how
//! to turn bytes into packets and packets into typed messages.
//!
//! ```text
//! Transport (bytes) → Packet (header, flag, payload) → message struct
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

pub mod catalog;
mod codec;
mod error;
mod frame;
mod messages;
mod reject;
mod types;
pub mod wire;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use catalog::Flag;
pub use codec::{Codec, WireCodec};
pub use error::ProtocolError;
pub use frame::{HEADER_LEN, Header, Packet, declared_len};
pub use messages::{
    Chat, CreateLobby, ErrorPayload, Hello, IdAssign, ImHere, Inputs, JoinLobby,
    LobbyList, LobbyListEntry, NetworkLobbyInfo, NetworkPlayerInfo, PlayerData,
    PlayerList, PlayerTransforms, Transform, Vector3,
};
pub use reject::AppError;
pub use types::{Channel, Inbound, LobbyId, Outbound, PlayerId};
pub use wire::WireBytes;
