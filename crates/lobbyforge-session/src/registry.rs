//! Registry actor: a Tokio task that owns the [`SessionManager`].
//!
//! TCP workers register and unregister concurrently, the UDP worker binds
//! endpoints, and the fan-out resolves routes, all at the same time. Rather
//! than putting the manager behind a lock, exactly one task owns it and
//! everyone else sends it commands. This is the "actor model": no shared
//! mutable state, just message passing.

use std::net::SocketAddr;

use lobbyforge_protocol::{LobbyId, PlayerId};
use tokio::sync::{mpsc, oneshot};

use crate::{Client, NewClient, Route, SessionError, SessionManager, UdpBinding};

/// Commands sent to the registry actor.
///
/// The `oneshot::Sender` in each variant is a "reply channel": the caller
/// sends a command and awaits the answer on it.
enum RegistryCommand {
    Register {
        client: NewClient,
        reply: oneshot::Sender<PlayerId>,
    },
    Unregister {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<Client>>,
    },
    Get {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<Client>>,
    },
    SetLobby {
        player_id: PlayerId,
        lobby: Option<LobbyId>,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    BindUdp {
        player_id: PlayerId,
        addr: SocketAddr,
        reply: oneshot::Sender<UdpBinding>,
    },
    ResolveUdp {
        addr: SocketAddr,
        reply: oneshot::Sender<Option<PlayerId>>,
    },
    Route {
        player_id: PlayerId,
        reply: oneshot::Sender<Option<Route>>,
    },
    IdlePlayers {
        reply: oneshot::Sender<Vec<PlayerId>>,
    },
    Len {
        reply: oneshot::Sender<usize>,
    },
}

/// Handle to the running registry actor.
///
/// Cheap to clone: it's just an `mpsc::Sender` wrapper. Every TCP worker,
/// the UDP worker, the fan-out and the route handlers each hold one.
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<RegistryCommand>,
}

impl SessionHandle {
    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| SessionError::Unavailable)?;
        reply_rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Registers a client after a successful handshake.
    pub async fn register(&self, client: NewClient) -> Result<PlayerId, SessionError> {
        self.request(|reply| RegistryCommand::Register { client, reply })
            .await
    }

    /// Removes a client and its UDP binding, returning the removed record.
    pub async fn unregister(&self, player_id: PlayerId) -> Result<Option<Client>, SessionError> {
        self.request(|reply| RegistryCommand::Unregister { player_id, reply })
            .await
    }

    /// Returns a snapshot of a client record.
    pub async fn get(&self, player_id: PlayerId) -> Result<Option<Client>, SessionError> {
        self.request(|reply| RegistryCommand::Get { player_id, reply })
            .await
    }

    /// Returns the lobby a player is in, or `None` if they are idle or
    /// no longer connected.
    pub async fn lobby_of(&self, player_id: PlayerId) -> Result<Option<LobbyId>, SessionError> {
        Ok(self.get(player_id).await?.and_then(|c| c.lobby))
    }

    /// Records a player's lobby membership.
    pub async fn set_lobby(
        &self,
        player_id: PlayerId,
        lobby: Option<LobbyId>,
    ) -> Result<(), SessionError> {
        self.request(|reply| RegistryCommand::SetLobby {
            player_id,
            lobby,
            reply,
        })
        .await?
    }

    /// Binds a UDP endpoint to a player (ImHere).
    pub async fn bind_udp(
        &self,
        player_id: PlayerId,
        addr: SocketAddr,
    ) -> Result<UdpBinding, SessionError> {
        self.request(|reply| RegistryCommand::BindUdp {
            player_id,
            addr,
            reply,
        })
        .await
    }

    /// Finds the player bound to a UDP endpoint.
    pub async fn resolve_udp(&self, addr: SocketAddr) -> Result<Option<PlayerId>, SessionError> {
        self.request(|reply| RegistryCommand::ResolveUdp { addr, reply })
            .await
    }

    /// How to reach a player, if they're still connected.
    pub async fn route(&self, player_id: PlayerId) -> Result<Option<Route>, SessionError> {
        self.request(|reply| RegistryCommand::Route { player_id, reply })
            .await
    }

    /// Every connected player not in a lobby.
    pub async fn idle_players(&self) -> Result<Vec<PlayerId>, SessionError> {
        self.request(|reply| RegistryCommand::IdlePlayers { reply })
            .await
    }

    /// Number of connected clients.
    pub async fn len(&self) -> Result<usize, SessionError> {
        self.request(|reply| RegistryCommand::Len { reply }).await
    }
}

/// The actor itself. Lives inside a Tokio task until every handle is gone.
struct RegistryActor {
    manager: SessionManager,
    receiver: mpsc::Receiver<RegistryCommand>,
}

impl RegistryActor {
    async fn run(mut self) {
        tracing::debug!("session registry started");

        // Replies are fire-and-forget: if the caller gave up waiting,
        // there's nobody to tell.
        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RegistryCommand::Register { client, reply } => {
                    let _ = reply.send(self.manager.register(client));
                }
                RegistryCommand::Unregister { player_id, reply } => {
                    let _ = reply.send(self.manager.unregister(player_id));
                }
                RegistryCommand::Get { player_id, reply } => {
                    let _ = reply.send(self.manager.get(player_id).cloned());
                }
                RegistryCommand::SetLobby {
                    player_id,
                    lobby,
                    reply,
                } => {
                    let _ = reply.send(self.manager.set_lobby(player_id, lobby));
                }
                RegistryCommand::BindUdp {
                    player_id,
                    addr,
                    reply,
                } => {
                    let _ = reply.send(self.manager.bind_udp(player_id, addr));
                }
                RegistryCommand::ResolveUdp { addr, reply } => {
                    let _ = reply.send(self.manager.resolve_udp(addr));
                }
                RegistryCommand::Route { player_id, reply } => {
                    let _ = reply.send(self.manager.route(player_id));
                }
                RegistryCommand::IdlePlayers { reply } => {
                    let _ = reply.send(self.manager.idle_players());
                }
                RegistryCommand::Len { reply } => {
                    let _ = reply.send(self.manager.len());
                }
            }
        }

        tracing::debug!("session registry stopped");
    }
}

/// Spawns the registry actor and returns a handle to it.
///
/// `channel_size` bounds the command queue; callers wait when it's full.
pub fn spawn_registry(channel_size: usize) -> SessionHandle {
    let (tx, rx) = mpsc::channel(channel_size);
    let actor = RegistryActor {
        manager: SessionManager::new(),
        receiver: rx,
    };
    tokio::spawn(actor.run());
    SessionHandle { sender: tx }
}
