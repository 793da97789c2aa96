//! The message catalog: every flag code both ends of the protocol agree on.
//!
//! A flag is a single byte whose meaning depends on who sends it. Three
//! parallel namespaces exist for `Data` packets:
//!
//! - [`request`]: the client asks the server for data.
//! - [`post`]: the client submits an action or event.
//! - [`response`]: the server answers or broadcasts.
//!
//! The same byte can mean different things in different namespaces
//! (`0xA1` is `post::LOBBY_INFO` but also `response::ITEM_LIST`), so flags
//! are plain constants rather than one big enum.

use std::fmt;

/// A one-byte message sub-type, meaningful only within its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Flag(pub u8);

impl Flag {
    /// The "no sub-type" flag, used with Hello, ImHere, Rejected and
    /// Disconnecting packets.
    pub const NONE: Flag = Flag(0x00);
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

/// Client → server: "give me this data".
pub mod request {
    use super::Flag;

    pub const PLAYER_LIST: Flag = Flag(0x04);
    pub const LOBBY_LIST: Flag = Flag(0x07);
    pub const WORLD_STATE: Flag = Flag(0xD0);
    pub const ITEM_LIST: Flag = Flag(0x1A);
    pub const NETWORK_VARIABLES: Flag = Flag(0xEB);
}

/// Client → server: "this happened".
pub mod post {
    use super::Flag;

    pub const JOIN_LOBBY: Flag = Flag(0x08);
    pub const UPDATE_LOBBY_INFO: Flag = Flag(0x10);
    pub const CREATE_LOBBY: Flag = Flag(0x11);
    pub const PLAYER_TRANSFORM_DATA: Flag = Flag(0xA0);
    pub const LOBBY_INFO: Flag = Flag(0xA1);
    pub const WORLD_STATE: Flag = Flag(0xA2);
    pub const ITEM_INT_INF: Flag = Flag(0xA4);
    pub const ITEM_PICKUP: Flag = Flag(0xA5);
    pub const ITEM_DROP: Flag = Flag(0xA6);
    pub const INVENTORY_SWITCH: Flag = Flag(0xA7);
    pub const START_MAP: Flag = Flag(0xA8);
    pub const VOICE: Flag = Flag(0xAC);
    pub const INTERACTABLE_MESSAGE: Flag = Flag(0xAD);
    pub const CODE_INTERACTION_MESSAGE: Flag = Flag(0xAE);
    pub const TRANSFORM: Flag = Flag(0xAF);
    pub const NETWORK_VAR_SYNC: Flag = Flag(0xBE);
    pub const CHAT_MESSAGE: Flag = Flag(0xE1);
}

/// Server → client answers and broadcasts.
pub mod response {
    use super::Flag;

    pub const ID_ASSIGN: Flag = Flag(0x03);
    pub const PLAYER_LIST: Flag = Flag(0x05);
    pub const LOBBY_LIST: Flag = Flag(0x06);
    pub const LOBBY_INFO: Flag = Flag(0x09);
    pub const LOBBY_LIST_CHANGED: Flag = Flag(0x0A);
    pub const VOICE: Flag = Flag(0x0C);
    pub const INTERACTABLE_MESSAGE: Flag = Flag(0x0D);
    pub const CODE_INTERACTION_MESSAGE: Flag = Flag(0x0E);
    pub const TRANSFORM: Flag = Flag(0x0F);
    pub const ITEM_LIST: Flag = Flag(0xA1);
    pub const PLAYER_TRANSFORMS: Flag = Flag(0xB0);
    pub const WORLD_STATE: Flag = Flag(0xC2);
    pub const PLAYER_DATA: Flag = Flag(0xC4);
    pub const ITEM_INT_INF: Flag = Flag(0xC5);
    pub const ITEM_PICKUP: Flag = Flag(0xC6);
    pub const ITEM_DROP: Flag = Flag(0xC7);
    pub const INVENTORY_SWITCH: Flag = Flag(0xC8);
    pub const START_MAP: Flag = Flag(0xC9);
    pub const FRAGMENT_RECEIVED: Flag = Flag(0xDF);
    pub const CHAT_MESSAGE: Flag = Flag(0xE0);
    pub const NETWORK_VAR_SYNC: Flag = Flag(0xEE);
    pub const CLOSING_CON: Flag = Flag(0xF0);
    pub const LOBBY_CLOSING: Flag = Flag(0xF1);
    pub const ERROR: Flag = Flag(0xFF);
}

/// Maps a client item flag to the flag the server relays it with.
///
/// Returns `None` for flags that are not item events.
pub fn item_relay_flag(post_flag: Flag) -> Option<Flag> {
    match post_flag {
        post::ITEM_PICKUP => Some(response::ITEM_PICKUP),
        post::ITEM_DROP => Some(response::ITEM_DROP),
        post::INVENTORY_SWITCH => Some(response::INVENTORY_SWITCH),
        _ => None,
    }
}
