//! The session manager: every connected client and every UDP binding.
//!
//! This is the central piece of the session layer. It's responsible for:
//! - Allocating random, unique player IDs at handshake time
//! - Tracking which clients are connected and which lobby each is in
//! - Binding NAT-observed UDP endpoints to players (ImHere)
//! - Resolving a player ID to a deliverable route for the fan-out
//!
//! # Concurrency note
//!
//! `SessionManager` is NOT thread-safe by itself. It uses plain
//! `HashMap`s and is owned by exactly one task, the registry actor in
//! [`crate::registry`]. Every other worker talks to it through a
//! [`SessionHandle`](crate::SessionHandle).

use std::collections::HashMap;
use std::net::SocketAddr;

use lobbyforge_protocol::{LobbyId, PlayerId};
use rand::Rng;

use crate::{Client, NewClient, Route, SessionError, UdpBinding};

/// Tracks all connected clients.
///
/// ## Lifecycle
///
/// ```text
/// register() ──→ [in lobby?] set_lobby() ──→ unregister()
///     │                                          │
///     └── bind_udp() (ImHere) ───────────────────┘  (binding dropped too)
/// ```
#[derive(Debug, Default)]
pub struct SessionManager {
    /// All connected clients, keyed by player ID.
    clients: HashMap<PlayerId, Client>,

    /// NAT-observed UDP endpoint → player. Kept in sync with
    /// `Client::udp`, so an incoming datagram resolves in one lookup.
    endpoints: HashMap<SocketAddr, PlayerId>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a client that just completed the handshake and returns
    /// its freshly allocated player ID.
    pub fn register(&mut self, new: NewClient) -> PlayerId {
        let mut rng = rand::rng();
        let player_id = self.allocate_id(|| rng.random_range(0..=i32::MAX));

        tracing::info!(%player_id, name = %new.name, ip = %new.ip, "client registered");

        self.clients.insert(
            player_id,
            Client {
                player_id,
                name: new.name,
                identity: new.identity,
                ip: new.ip,
                tcp: new.tcp,
                udp: None,
                lobby: None,
            },
        );
        player_id
    }

    /// Draws IDs until one is neither the unassigned sentinel nor already
    /// in use.
    ///
    /// IDs are random rather than sequential so they can't be guessed.
    fn allocate_id(&self, mut draw: impl FnMut() -> i32) -> PlayerId {
        loop {
            let candidate = PlayerId(draw());
            if candidate.is_assigned() && !self.clients.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Removes a client and its UDP binding.
    ///
    /// Returns the removed record so the caller can still act on its
    /// lobby membership.
    pub fn unregister(&mut self, player_id: PlayerId) -> Option<Client> {
        let client = self.clients.remove(&player_id)?;
        if let Some(addr) = client.udp {
            self.endpoints.remove(&addr);
        }
        tracing::info!(%player_id, "client unregistered");
        Some(client)
    }

    /// Looks up a client by player ID.
    pub fn get(&self, player_id: PlayerId) -> Option<&Client> {
        self.clients.get(&player_id)
    }

    /// Records which lobby a player is in (`None` when they leave).
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the player isn't connected.
    pub fn set_lobby(
        &mut self,
        player_id: PlayerId,
        lobby: Option<LobbyId>,
    ) -> Result<(), SessionError> {
        let client = self
            .clients
            .get_mut(&player_id)
            .ok_or(SessionError::NotFound(player_id))?;
        client.lobby = lobby;
        Ok(())
    }

    /// Binds a UDP source endpoint to a player, as claimed by ImHere.
    ///
    /// Only the first binding counts: a client that already has an
    /// endpoint keeps it, and an endpoint already owned by someone else
    /// is not stolen.
    pub fn bind_udp(&mut self, player_id: PlayerId, addr: SocketAddr) -> UdpBinding {
        if let Some(&owner) = self.endpoints.get(&addr) {
            if owner == player_id {
                return UdpBinding::AlreadyBound;
            }
            return UdpBinding::EndpointTaken(owner);
        }
        let Some(client) = self.clients.get_mut(&player_id) else {
            return UdpBinding::UnknownPlayer;
        };
        if client.udp.is_some() {
            return UdpBinding::AlreadyBound;
        }

        client.udp = Some(addr);
        self.endpoints.insert(addr, player_id);
        tracing::info!(%player_id, %addr, "UDP endpoint bound");
        UdpBinding::Bound
    }

    /// Finds the player a UDP datagram came from.
    pub fn resolve_udp(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.endpoints.get(&addr).copied()
    }

    /// How to reach a player, if they're still connected.
    pub fn route(&self, player_id: PlayerId) -> Option<Route> {
        self.clients.get(&player_id).map(|c| Route {
            tcp: c.tcp.clone(),
            udp: c.udp,
        })
    }

    /// Every connected player not currently in a lobby (the audience for
    /// "lobby list changed" notifications).
    pub fn idle_players(&self) -> Vec<PlayerId> {
        self.clients
            .values()
            .filter(|c| c.lobby.is_none())
            .map(|c| c.player_id)
            .collect()
    }

    /// Returns the number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no clients are connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `SessionManager`.
    //!
    //! Clients need a real `TcpSender`, which spawns a writer task, so
    //! these run under `#[tokio::test]` even though the manager is sync.
    //! The writer is pointed at `tokio::io::sink()`.

    use super::*;
    use lobbyforge_transport::{ConnectionId, TcpSender};
    use std::net::{IpAddr, Ipv4Addr};

    // -- Helpers ----------------------------------------------------------

    fn new_client(name: &str) -> NewClient {
        NewClient {
            name: name.into(),
            identity: format!("id-{name}"),
            ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            tcp: TcpSender::spawn(ConnectionId::new(1), tokio::io::sink(), 8),
        }
    }

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    // =====================================================================
    // register() / allocate_id()
    // =====================================================================

    #[tokio::test]
    async fn test_register_assigns_valid_unique_ids() {
        let mut mgr = SessionManager::new();

        let a = mgr.register(new_client("alice"));
        let b = mgr.register(new_client("bob"));

        assert!(a.is_assigned());
        assert!(a.0 >= 0);
        assert_ne!(a, b);
        assert_eq!(mgr.len(), 2);
        assert_eq!(mgr.get(a).unwrap().name, "alice");
    }

    #[tokio::test]
    async fn test_allocate_id_skips_sentinel_and_collisions() {
        let mut mgr = SessionManager::new();
        let taken = mgr.register(new_client("alice"));

        let mut script = vec![taken.0, -1, taken.0, 77].into_iter();
        let id = mgr.allocate_id(|| script.next().unwrap_or(0));

        assert_eq!(id, PlayerId(77));
    }

    #[tokio::test]
    async fn test_register_new_client_has_no_lobby_or_udp() {
        let mut mgr = SessionManager::new();
        let id = mgr.register(new_client("alice"));

        let client = mgr.get(id).unwrap();
        assert!(client.lobby.is_none());
        assert!(client.udp.is_none());
    }

    // =====================================================================
    // unregister()
    // =====================================================================

    #[tokio::test]
    async fn test_unregister_removes_client_and_udp_binding() {
        let mut mgr = SessionManager::new();
        let id = mgr.register(new_client("alice"));
        mgr.bind_udp(id, addr(5000));

        let removed = mgr.unregister(id).expect("should remove");

        assert_eq!(removed.player_id, id);
        assert!(mgr.get(id).is_none());
        assert!(mgr.resolve_udp(addr(5000)).is_none());
        assert!(mgr.is_empty());
    }

    #[tokio::test]
    async fn test_unregister_unknown_returns_none() {
        let mut mgr = SessionManager::new();
        assert!(mgr.unregister(PlayerId(5)).is_none());
    }

    // =====================================================================
    // set_lobby() / idle_players()
    // =====================================================================

    #[tokio::test]
    async fn test_set_lobby_updates_idle_players() {
        let mut mgr = SessionManager::new();
        let a = mgr.register(new_client("alice"));
        let b = mgr.register(new_client("bob"));

        mgr.set_lobby(a, Some(LobbyId(1))).unwrap();

        assert_eq!(mgr.idle_players(), vec![b]);
        assert_eq!(mgr.get(a).unwrap().lobby, Some(LobbyId(1)));

        mgr.set_lobby(a, None).unwrap();
        assert_eq!(mgr.idle_players().len(), 2);
    }

    #[tokio::test]
    async fn test_set_lobby_unknown_player_returns_not_found() {
        let mut mgr = SessionManager::new();
        let result = mgr.set_lobby(PlayerId(9), Some(LobbyId(1)));
        assert_eq!(result, Err(SessionError::NotFound(PlayerId(9))));
    }

    // =====================================================================
    // bind_udp() / resolve_udp()
    // =====================================================================

    #[tokio::test]
    async fn test_bind_udp_first_binding_wins() {
        let mut mgr = SessionManager::new();
        let id = mgr.register(new_client("alice"));

        assert_eq!(mgr.bind_udp(id, addr(5000)), UdpBinding::Bound);
        assert_eq!(mgr.bind_udp(id, addr(6000)), UdpBinding::AlreadyBound);
        assert_eq!(mgr.bind_udp(id, addr(5000)), UdpBinding::AlreadyBound);

        assert_eq!(mgr.resolve_udp(addr(5000)), Some(id));
        assert_eq!(mgr.resolve_udp(addr(6000)), None);
        assert_eq!(mgr.route(id).unwrap().udp, Some(addr(5000)));
    }

    #[tokio::test]
    async fn test_bind_udp_endpoint_of_other_player_is_taken() {
        let mut mgr = SessionManager::new();
        let a = mgr.register(new_client("alice"));
        let b = mgr.register(new_client("bob"));
        mgr.bind_udp(a, addr(5000));

        assert_eq!(mgr.bind_udp(b, addr(5000)), UdpBinding::EndpointTaken(a));
        assert!(mgr.get(b).unwrap().udp.is_none());
    }

    #[tokio::test]
    async fn test_bind_udp_unknown_player() {
        let mut mgr = SessionManager::new();
        assert_eq!(
            mgr.bind_udp(PlayerId(3), addr(5000)),
            UdpBinding::UnknownPlayer
        );
    }

    // =====================================================================
    // route()
    // =====================================================================

    #[tokio::test]
    async fn test_route_missing_player_is_none() {
        let mgr = SessionManager::new();
        assert!(mgr.route(PlayerId(1)).is_none());
    }
}
