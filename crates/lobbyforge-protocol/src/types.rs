//! Identity and routing types shared by every crate in Lobbyforge.
//!
//! These never travel on the wire as-is. They are the vocabulary the
//! server's workers use to talk to each other about players, lobbies and
//! packets.

use std::fmt;

use crate::Packet;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A player's server-wide identity.
///
/// A "newtype wrapper" around the `i32` the wire format uses, so a
/// [`LobbyId`] can't be passed where a `PlayerId` is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub i32);

impl PlayerId {
    /// Sentinel for "no ID assigned yet". Never handed out.
    pub const UNASSIGNED: PlayerId = PlayerId(-1);

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A lobby's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LobbyId(pub i32);

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Channel: which socket a packet uses
// ---------------------------------------------------------------------------

/// The transport a packet arrived on, or should leave on.
///
/// TCP carries everything reliable (handshake, lobby management, chat).
/// UDP is best-effort and only usable once the player's endpoint has been
/// discovered through an ImHere datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Channel {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound / Outbound
// ---------------------------------------------------------------------------

/// A decoded packet, tagged with who sent it and how.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inbound {
    pub player_id: PlayerId,
    pub channel: Channel,
    pub packet: Packet,
}

/// A packet addressed to a logical player.
///
/// Game logic only knows player IDs. The fan-out consumer turns `target`
/// into an actual socket, so producers never hold connection handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub packet: Packet,
    pub target: PlayerId,
    pub channel: Channel,
}

impl Outbound {
    pub fn tcp(target: PlayerId, packet: Packet) -> Self {
        Self {
            packet,
            target,
            channel: Channel::Tcp,
        }
    }

    pub fn udp(target: PlayerId, packet: Packet) -> Self {
        Self {
            packet,
            target,
            channel: Channel::Udp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Flag, Header};

    #[test]
    fn test_player_id_display() {
        assert_eq!(PlayerId(7).to_string(), "P-7");
    }

    #[test]
    fn test_lobby_id_display() {
        assert_eq!(LobbyId(3).to_string(), "L-3");
    }

    #[test]
    fn test_unassigned_player_id() {
        assert!(!PlayerId::UNASSIGNED.is_assigned());
        assert!(PlayerId(0).is_assigned());
    }

    #[test]
    fn test_channel_default_is_tcp() {
        assert_eq!(Channel::default(), Channel::Tcp);
    }

    #[test]
    fn test_outbound_constructors_set_channel() {
        let packet = Packet::new(Header::Ack, Flag::NONE, Vec::new());
        assert_eq!(Outbound::tcp(PlayerId(1), packet.clone()).channel, Channel::Tcp);
        assert_eq!(Outbound::udp(PlayerId(1), packet).channel, Channel::Udp);
    }
}
