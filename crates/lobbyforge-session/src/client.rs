//! Client records: the server's view of one connected player.
//!
//! A client is created when the Hello handshake succeeds and destroyed
//! when its TCP connection closes. It knows:
//! - WHO the player is (ID, display name, identity token)
//! - WHERE to send packets (TCP writer handle, UDP endpoint once known)
//! - WHICH lobby the player is in, by ID only. The lobby itself is owned
//!   by its actor; this is a routing hint, not a reference.

use std::net::{IpAddr, SocketAddr};

use lobbyforge_protocol::{LobbyId, PlayerId};
use lobbyforge_transport::TcpSender;

/// A connected player.
#[derive(Debug, Clone)]
pub struct Client {
    pub player_id: PlayerId,
    pub name: String,
    pub identity: String,

    /// Remote IP of the TCP connection.
    pub ip: IpAddr,

    /// Queue into this client's TCP writer task.
    pub tcp: TcpSender,

    /// The NAT-observed UDP endpoint, learned from an ImHere datagram.
    /// `None` until then.
    pub udp: Option<SocketAddr>,

    /// The lobby the player is currently in, if any.
    pub lobby: Option<LobbyId>,
}

/// Details supplied by the handshake when registering a client.
#[derive(Debug, Clone)]
pub struct NewClient {
    pub name: String,
    pub identity: String,
    pub ip: IpAddr,
    pub tcp: TcpSender,
}

/// What the fan-out needs to deliver a packet to a player.
#[derive(Debug, Clone)]
pub struct Route {
    pub tcp: TcpSender,
    pub udp: Option<SocketAddr>,
}

/// Outcome of an ImHere binding attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdpBinding {
    /// The endpoint is now bound to the player.
    Bound,
    /// The player already has an endpoint; the first one wins.
    AlreadyBound,
    /// The endpoint is already bound to a different player.
    EndpointTaken(PlayerId),
    /// No client with that ID is connected.
    UnknownPlayer,
}
