//! The lobby directory: every live lobby, by ID.
//!
//! Unlike the session registry this is a synchronized map, not an actor.
//! Lookups happen on every lobby request, and the lobby actors remove
//! themselves on shutdown, so a shared `RwLock` is the simpler fit.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use lobbyforge_protocol::{LobbyId, Outbound};
use tokio::sync::{RwLock, broadcast, mpsc};

use crate::lobby::{LobbySummary, spawn_lobby};
use crate::roster::{AcceptPending, MotionModel, NewMember};
use crate::{LobbyConfig, LobbyError, LobbyHandle, LobbySettings};

/// Closure notices buffered per subscriber before it starts lagging.
const CLOSED_CAPACITY: usize = 64;

/// Creates lobbies and tracks the live ones.
///
/// Cheap to clone: every clone shares the same map and ID counter.
#[derive(Clone)]
pub struct LobbyDirectory {
    lobbies: Arc<RwLock<HashMap<LobbyId, LobbyHandle>>>,
    next_id: Arc<AtomicI32>,
    config: Arc<LobbyConfig>,
    outbound: mpsc::Sender<Outbound>,
    closed: broadcast::Sender<LobbyId>,
}

impl LobbyDirectory {
    /// Creates an empty directory. Lobbies it opens send through `outbound`.
    pub fn new(config: LobbyConfig, outbound: mpsc::Sender<Outbound>) -> Self {
        Self {
            lobbies: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicI32::new(1)),
            config: Arc::new(config),
            outbound,
            closed: broadcast::channel(CLOSED_CAPACITY).0,
        }
    }

    /// Yields the ID of every lobby removed from the directory after this
    /// call, so the server can tell idle players the list changed.
    pub fn subscribe_closed(&self) -> broadcast::Receiver<LobbyId> {
        self.closed.subscribe()
    }

    /// Opens a lobby with `owner` as host and first member, using the
    /// default motion model.
    ///
    /// # Errors
    /// Returns [`LobbyError::MaxPlayersTooLow`] if the settings are invalid.
    pub async fn open(
        &self,
        settings: LobbySettings,
        owner: NewMember,
    ) -> Result<LobbyHandle, LobbyError> {
        self.open_with(settings, owner, AcceptPending).await
    }

    /// Like [`open`](Self::open) with a custom [`MotionModel`].
    pub async fn open_with<M: MotionModel + Sync>(
        &self,
        settings: LobbySettings,
        owner: NewMember,
        model: M,
    ) -> Result<LobbyHandle, LobbyError> {
        settings.validate()?;

        let lobby_id = LobbyId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let owner_id = owner.player_id;
        let name = settings.name.clone();

        // Hold the write lock across the spawn so the new actor can't
        // deregister before it has been registered.
        let mut lobbies = self.lobbies.write().await;
        let handle = spawn_lobby(
            lobby_id,
            settings,
            owner,
            model,
            &self.config,
            self.outbound.clone(),
            self.clone(),
        );
        lobbies.insert(lobby_id, handle.clone());
        drop(lobbies);

        tracing::info!(%lobby_id, %name, owner = %owner_id, "lobby created");
        Ok(handle)
    }

    /// Looks up a live lobby.
    pub async fn get(&self, lobby_id: LobbyId) -> Option<LobbyHandle> {
        self.lobbies.read().await.get(&lobby_id).cloned()
    }

    /// Deregisters a lobby. Called by the lobby actor on shutdown.
    pub(crate) async fn remove(&self, lobby_id: LobbyId) -> Option<LobbyHandle> {
        let removed = self.lobbies.write().await.remove(&lobby_id);
        if removed.is_some() {
            tracing::info!(%lobby_id, "lobby removed from directory");
            // No subscribers is fine.
            let _ = self.closed.send(lobby_id);
        }
        removed
    }

    /// Summaries of every open lobby, ordered by ID.
    ///
    /// Handles are cloned out first so no lock is held while querying the
    /// actors. Lobbies that are closing or fail to answer are skipped.
    pub async fn list(&self) -> Vec<LobbySummary> {
        let handles: Vec<LobbyHandle> = self.lobbies.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            if let Ok(summary) = handle.info().await {
                if summary.state.is_joinable() {
                    summaries.push(summary);
                }
            }
        }
        summaries.sort_by_key(|s| s.lobby_id.0);
        summaries
    }

    /// Number of registered lobbies.
    pub async fn len(&self) -> usize {
        self.lobbies.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.lobbies.read().await.is_empty()
    }

    /// Shuts down every lobby. Each one deregisters itself.
    pub async fn shutdown_all(&self) {
        let handles: Vec<LobbyHandle> = self.lobbies.read().await.values().cloned().collect();
        for handle in handles {
            let _ = handle.shutdown().await;
        }
    }
}
