//! The server's route table: what happens for each `Data` flag.
//!
//! | Flag | Handler |
//! |---|---|
//! | Post `0x11` CreateLobby | [`create_lobby`] |
//! | Post `0x08` JoinLobby | [`join_lobby`] |
//! | Request `0x07` LobbyList | [`lobby_list`] |
//! | Request `0x04` PlayerList | [`player_list`] |
//! | Post `0xE1` ChatMessage | [`chat`] |
//! | Post `0xA0`, `0xA5`, `0xA6`, `0xA7` | [`forward_gameplay`] |
//!
//! Handlers never write to sockets. Replies and broadcasts are queued on
//! the outbound fan-out, addressed by player ID.

use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use lobbyforge_lobby::{LobbyDirectory, LobbyHandle, LobbySettings, NewMember};
use lobbyforge_protocol::catalog::{post, request, response};
use lobbyforge_protocol::{
    AppError, Chat, CreateLobby, Header, Inbound, JoinLobby, LobbyId, LobbyList,
    Outbound, Packet, PlayerId, PlayerList,
};
use lobbyforge_session::{Client, SessionError, SessionHandle};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

use crate::router::{HandlerResult, Router, RouterError};

// ---------------------------------------------------------------------------
// ServerContext
// ---------------------------------------------------------------------------

/// Everything a handler can reach. Cheap to clone: three handles.
#[derive(Clone)]
pub struct ServerContext {
    pub sessions: SessionHandle,
    pub lobbies: LobbyDirectory,
    pub outbound: mpsc::Sender<Outbound>,
}

impl ServerContext {
    /// Queues a packet on the fan-out.
    ///
    /// Only fails if the fan-out consumer is gone, which means the server is
    /// shutting down. That is logged and otherwise ignored.
    pub async fn send(&self, outbound: Outbound) {
        let target = outbound.target;
        if self.outbound.send(outbound).await.is_err() {
            tracing::debug!(%target, "outbound queue closed, dropping packet");
        }
    }

    /// Queues a Rejected packet for `player_id` over TCP.
    pub async fn reject(&self, player_id: PlayerId, err: &AppError) {
        tracing::debug!(%player_id, code = err.code(), description = err.description(), "rejecting request");
        match err.to_rejection() {
            Ok(packet) => self.send(Outbound::tcp(player_id, packet)).await,
            Err(e) => tracing::warn!(%player_id, error = %e, "failed to encode rejection"),
        }
    }

    /// The connected client, or `Unauthorized` if they're gone.
    async fn client(&self, player_id: PlayerId) -> Result<Client, AppError> {
        self.sessions
            .get(player_id)
            .await
            .map_err(session_lost)?
            .ok_or_else(|| AppError::Unauthorized("NOT_CONNECTED".into()))
    }

    /// The live lobby a client is in.
    ///
    /// A lobby ID pointing at a lobby that has since shut down is cleared
    /// from the registry and treated as "not in a lobby".
    async fn current_lobby(&self, client: &Client) -> Result<Option<LobbyHandle>, AppError> {
        let Some(lobby_id) = client.lobby else {
            return Ok(None);
        };
        if let Some(handle) = self.lobbies.get(lobby_id).await {
            return Ok(Some(handle));
        }
        tracing::debug!(player_id = %client.player_id, %lobby_id, "clearing stale lobby membership");
        self.sessions
            .set_lobby(client.player_id, None)
            .await
            .map_err(session_lost)?;
        Ok(None)
    }

    /// The lobby handle for a player who must be in one.
    async fn member_lobby(&self, player_id: PlayerId) -> Result<LobbyHandle, AppError> {
        let client = self.client(player_id).await?;
        self.current_lobby(&client)
            .await?
            .ok_or_else(not_in_lobby)
    }

    /// Points the player's session at the lobby they were just admitted to.
    ///
    /// If the player disconnected in the meantime, teardown has already
    /// run and won't look at this lobby again, so they're taken back out
    /// here. A lobby whose only member was the creator closes.
    async fn commit_membership(&self, handle: &LobbyHandle, player_id: PlayerId) -> Result<(), AppError> {
        let lobby_id = handle.lobby_id();
        let Err(err) = self.sessions.set_lobby(player_id, Some(lobby_id)).await else {
            return Ok(());
        };
        tracing::debug!(%player_id, %lobby_id, error = %err, "player gone before joining, undoing");
        if let Err(e) = handle.leave(player_id).await {
            tracing::debug!(%player_id, %lobby_id, error = %e, "undo leave failed");
        }
        Err(session_lost(err))
    }

    /// Tells every player outside a lobby that the lobby list changed.
    pub(crate) async fn notify_lobby_list_changed(&self) {
        let idle = match self.sessions.idle_players().await {
            Ok(idle) => idle,
            Err(e) => {
                tracing::warn!(error = %e, "could not list idle players");
                return;
            }
        };
        let packet = Packet::new(Header::Data, response::LOBBY_LIST_CHANGED, Bytes::new());
        for player_id in idle {
            self.send(Outbound::tcp(player_id, packet.clone())).await;
        }
    }
}

/// Tells idle players whenever a lobby leaves the directory. Runs until
/// the directory is dropped.
pub(crate) async fn relay_lobby_closures(ctx: ServerContext, mut closed: broadcast::Receiver<LobbyId>) {
    loop {
        match closed.recv().await {
            Ok(lobby_id) => {
                tracing::debug!(%lobby_id, "lobby closed, notifying idle players");
                ctx.notify_lobby_list_changed().await;
            }
            Err(RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "closure notices lagged");
                ctx.notify_lobby_list_changed().await;
            }
            Err(RecvError::Closed) => return,
        }
    }
}

fn session_lost(err: SessionError) -> AppError {
    tracing::warn!(error = %err, "session registry request failed");
    AppError::Unauthorized("NOT_CONNECTED".into())
}

fn not_in_lobby() -> AppError {
    AppError::Unauthorized("NOT_IN_LOBBY".into())
}

// ---------------------------------------------------------------------------
// Route table
// ---------------------------------------------------------------------------

/// Flags whose packets belong to the sender's lobby actor.
pub const GAMEPLAY_FLAGS: [lobbyforge_protocol::Flag; 4] = [
    post::PLAYER_TRANSFORM_DATA,
    post::ITEM_PICKUP,
    post::ITEM_DROP,
    post::INVENTORY_SWITCH,
];

/// Builds the server's route table.
///
/// # Errors
/// Returns [`RouterError::DuplicateFlag`] if two routes claim one flag.
pub fn build_router() -> Result<Router<ServerContext>, RouterError> {
    let mut router = Router::new();
    router.register(post::CREATE_LOBBY, create_lobby)?;
    router.register(post::JOIN_LOBBY, join_lobby)?;
    router.register(request::LOBBY_LIST, lobby_list)?;
    router.register(request::PLAYER_LIST, player_list)?;
    router.register(post::CHAT_MESSAGE, chat)?;
    for flag in GAMEPLAY_FLAGS {
        router.register(flag, forward_gameplay)?;
    }
    Ok(router)
}

// ---------------------------------------------------------------------------
// Lobby management
// ---------------------------------------------------------------------------

/// CreateLobby: validate, spawn the lobby with the creator as host, then
/// tell idle players the list changed.
pub fn create_lobby(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
    async move {
        let player_id = inbound.player_id;
        let req: CreateLobby = inbound.packet.body()?;

        let mut settings = LobbySettings::new(req.name, req.max_players);
        if req.is_password_protected {
            settings = settings.with_password(req.password);
        }
        settings.validate()?;

        let client = ctx.client(player_id).await?;
        if ctx.current_lobby(&client).await?.is_some() {
            return Err(AppError::AlreadyInLobby);
        }

        let owner = NewMember {
            player_id,
            name: client.name,
        };
        let handle = ctx.lobbies.open(settings, owner).await?;
        ctx.commit_membership(&handle, player_id).await?;

        ctx.notify_lobby_list_changed().await;
        Ok(())
    }
    .boxed()
}

/// JoinLobby: the lobby actor checks capacity, password and membership.
pub fn join_lobby(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
    async move {
        let player_id = inbound.player_id;
        let req: JoinLobby = inbound.packet.body()?;

        let handle = ctx
            .lobbies
            .get(LobbyId(req.lobby_id))
            .await
            .ok_or(AppError::LobbyNotFound)?;

        let client = ctx.client(player_id).await?;
        let current = ctx.current_lobby(&client).await?.map(|h| h.lobby_id());
        let member = NewMember {
            player_id,
            name: client.name,
        };
        handle.join(member, req.password, current).await?;
        ctx.commit_membership(&handle, player_id).await?;
        tracing::info!(%player_id, lobby_id = %handle.lobby_id(), "player joined lobby");
        Ok(())
    }
    .boxed()
}

/// LobbyList: every open lobby, by ID.
pub fn lobby_list(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
    async move {
        let lobbies = ctx
            .lobbies
            .list()
            .await
            .iter()
            .map(|summary| summary.to_entry())
            .collect();
        let packet = Packet::data(response::LOBBY_LIST, &LobbyList { lobbies })?;
        ctx.send(Outbound::tcp(inbound.player_id, packet)).await;
        Ok(())
    }
    .boxed()
}

/// PlayerList: the requester's lobby roster.
pub fn player_list(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
    async move {
        let player_id = inbound.player_id;
        let handle = ctx.member_lobby(player_id).await?;
        let players = handle.players(player_id).await?;
        let packet = Packet::data(response::PLAYER_LIST, &PlayerList { players })?;
        ctx.send(Outbound::tcp(player_id, packet)).await;
        Ok(())
    }
    .boxed()
}

// ---------------------------------------------------------------------------
// In-lobby traffic
// ---------------------------------------------------------------------------

/// ChatMessage: relayed verbatim to every member of the sender's lobby.
pub fn chat(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
    async move {
        let player_id = inbound.player_id;
        let line: Chat = inbound.packet.body()?;
        let handle = ctx.member_lobby(player_id).await?;
        handle.chat(player_id, line.message).await?;
        Ok(())
    }
    .boxed()
}

/// Transforms and item events: handed to the lobby actor untouched.
pub fn forward_gameplay(ctx: &ServerContext, inbound: Inbound) -> BoxFuture<'_, HandlerResult> {
    async move {
        let handle = ctx.member_lobby(inbound.player_id).await?;
        handle.forward(inbound).await?;
        Ok(())
    }
    .boxed()
}
