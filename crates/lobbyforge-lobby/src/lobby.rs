//! Lobby actor: an isolated Tokio task that owns one lobby.
//!
//! Each lobby runs in its own task and talks to the outside world through
//! three bounded channels:
//!
//! - **control**: Shutdown. Checked first, always.
//! - **commands**: join, leave, info, player list, chat. Each carries a
//!   `oneshot` reply channel.
//! - **gameplay**: raw `Data` packets from members (transforms, item
//!   events), fire-and-forget.
//!
//! On top of that a [`TickScheduler`] fires every 20 ms. On each tick the
//! actor commits every member that moved and sends one PlayerTransforms
//! batch to the whole lobby.
//!
//! The actor never touches sockets. Everything it sends goes through the
//! process-wide outbound queue as an [`Outbound`] addressed by player ID.

use lobbyforge_protocol::catalog::{self, post, response};
use lobbyforge_protocol::{
    AppError, Chat, Header, Inbound, LobbyId, LobbyListEntry, NetworkLobbyInfo,
    NetworkPlayerInfo, Outbound, Packet, PlayerData, PlayerId, PlayerTransforms,
};
use lobbyforge_tick::TickScheduler;
use tokio::sync::{mpsc, oneshot};

use crate::roster::{MotionModel, NewMember, Roster};
use crate::{LobbyConfig, LobbyDirectory, LobbyError, LobbySettings, LobbyState};

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Requests sent to a lobby actor on its command channel.
enum LobbyCommand {
    Join {
        member: NewMember,
        password: String,
        /// The lobby the player is already in, according to the session
        /// registry.
        current_lobby: Option<LobbyId>,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    Leave {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
    Info {
        reply: oneshot::Sender<LobbySummary>,
    },
    Players {
        player_id: PlayerId,
        reply: oneshot::Sender<Result<Vec<NetworkPlayerInfo>, LobbyError>>,
    },
    Chat {
        player_id: PlayerId,
        message: String,
        reply: oneshot::Sender<Result<(), LobbyError>>,
    },
}

/// Messages on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Shutdown,
}

/// A snapshot of lobby metadata, as shown in the lobby list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySummary {
    pub lobby_id: LobbyId,
    pub name: String,
    pub player_count: usize,
    pub max_players: i32,
    pub is_password_protected: bool,
    pub state: LobbyState,
}

impl LobbySummary {
    /// The wire form used in Response.LobbyList.
    pub fn to_entry(&self) -> LobbyListEntry {
        LobbyListEntry {
            id: self.lobby_id.0,
            name: self.name.clone(),
            player_count: i32::try_from(self.player_count).unwrap_or(i32::MAX),
            max_players: self.max_players,
            is_password_protected: self.is_password_protected,
        }
    }
}

// ---------------------------------------------------------------------------
// LobbyHandle
// ---------------------------------------------------------------------------

/// Handle to a running lobby actor.
///
/// Cheap to clone: three `mpsc::Sender`s. The [`LobbyDirectory`] holds one
/// per lobby; route handlers clone it out of the directory per request.
#[derive(Clone)]
pub struct LobbyHandle {
    lobby_id: LobbyId,
    commands: mpsc::Sender<LobbyCommand>,
    gameplay: mpsc::Sender<Inbound>,
    control: mpsc::Sender<Control>,
}

impl LobbyHandle {
    pub fn lobby_id(&self) -> LobbyId {
        self.lobby_id
    }

    /// Sends a command and waits for its reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> LobbyCommand,
    ) -> Result<T, LobbyError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(make(reply_tx))
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))?;
        reply_rx
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    /// Asks the lobby to admit a player.
    ///
    /// `current_lobby` is the player's lobby according to the session
    /// registry. Checks run in this order: closing lobby, full, password,
    /// already in a lobby.
    pub async fn join(
        &self,
        member: NewMember,
        password: impl Into<String>,
        current_lobby: Option<LobbyId>,
    ) -> Result<(), LobbyError> {
        let password = password.into();
        self.request(|reply| LobbyCommand::Join {
            member,
            password,
            current_lobby,
            reply,
        })
        .await?
    }

    /// Removes a player. The last member leaving closes the lobby.
    pub async fn leave(&self, player_id: PlayerId) -> Result<(), LobbyError> {
        self.request(|reply| LobbyCommand::Leave { player_id, reply })
            .await?
    }

    /// Requests the current lobby summary.
    pub async fn info(&self) -> Result<LobbySummary, LobbyError> {
        self.request(|reply| LobbyCommand::Info { reply }).await
    }

    /// The roster as `player_id` is allowed to see it.
    pub async fn players(&self, player_id: PlayerId) -> Result<Vec<NetworkPlayerInfo>, LobbyError> {
        self.request(|reply| LobbyCommand::Players { player_id, reply })
            .await?
    }

    /// Relays a chat line to every member.
    pub async fn chat(&self, player_id: PlayerId, message: String) -> Result<(), LobbyError> {
        self.request(|reply| LobbyCommand::Chat {
            player_id,
            message,
            reply,
        })
        .await?
    }

    /// Queues a gameplay packet (fire-and-forget).
    pub async fn forward(&self, inbound: Inbound) -> Result<(), LobbyError> {
        self.gameplay
            .send(inbound)
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }

    /// Tells the lobby to shut down.
    pub async fn shutdown(&self) -> Result<(), LobbyError> {
        self.control
            .send(Control::Shutdown)
            .await
            .map_err(|_| LobbyError::Unavailable(self.lobby_id))
    }
}

// ---------------------------------------------------------------------------
// LobbyActor
// ---------------------------------------------------------------------------

struct LobbyActor<M: MotionModel> {
    lobby_id: LobbyId,
    settings: LobbySettings,
    state: LobbyState,
    host: PlayerId,
    roster: Roster,
    model: M,
    scheduler: TickScheduler,
    commands: mpsc::Receiver<LobbyCommand>,
    gameplay: mpsc::Receiver<Inbound>,
    control: mpsc::Receiver<Control>,
    /// Our own control sender, so the last member leaving can queue a
    /// Shutdown behind whatever is already there.
    control_tx: mpsc::Sender<Control>,
    outbound: mpsc::Sender<Outbound>,
    directory: LobbyDirectory,
}

impl<M: MotionModel> LobbyActor<M> {
    /// Runs the actor loop until Shutdown or until every handle is gone.
    async fn run(mut self) {
        tracing::info!(
            lobby_id = %self.lobby_id,
            name = %self.settings.name,
            max_players = self.settings.max_players,
            "lobby actor started"
        );

        // The creator is already in the roster.
        self.broadcast_info().await;

        loop {
            tokio::select! {
                biased;

                Some(ctl) = self.control.recv() => match ctl {
                    Control::Shutdown => {
                        self.close().await;
                        break;
                    }
                },

                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },

                Some(msg) = self.gameplay.recv() => self.handle_gameplay(msg).await,

                _ = self.scheduler.wait_for_tick() => self.on_tick().await,
            }
        }

        tracing::info!(lobby_id = %self.lobby_id, "lobby actor stopped");
    }

    async fn handle_command(&mut self, cmd: LobbyCommand) {
        match cmd {
            LobbyCommand::Join {
                member,
                password,
                current_lobby,
                reply,
            } => {
                let result = self.handle_join(member, &password, current_lobby).await;
                let _ = reply.send(result);
            }
            LobbyCommand::Leave { player_id, reply } => {
                let result = self.handle_leave(player_id).await;
                let _ = reply.send(result);
            }
            LobbyCommand::Info { reply } => {
                let _ = reply.send(self.summary());
            }
            LobbyCommand::Players { player_id, reply } => {
                let result = if self.roster.contains(player_id) {
                    Ok(self.roster.to_network(self.host))
                } else {
                    Err(LobbyError::NotInLobby(player_id, self.lobby_id))
                };
                let _ = reply.send(result);
            }
            LobbyCommand::Chat {
                player_id,
                message,
                reply,
            } => {
                let result = self.handle_chat(player_id, message).await;
                let _ = reply.send(result);
            }
        }
    }

    async fn handle_join(
        &mut self,
        member: NewMember,
        password: &str,
        current_lobby: Option<LobbyId>,
    ) -> Result<(), LobbyError> {
        if !self.state.is_joinable() {
            return Err(LobbyError::NotFound(self.lobby_id));
        }
        if self.roster.len() >= self.capacity() {
            return Err(LobbyError::Full(self.lobby_id));
        }
        if !self.settings.password_matches(password) {
            return Err(LobbyError::InvalidPassword(self.lobby_id));
        }
        if current_lobby.is_some() || self.roster.contains(member.player_id) {
            return Err(LobbyError::AlreadyInLobby(member.player_id));
        }

        let player_id = member.player_id;
        self.roster.push(member);
        tracing::info!(
            lobby_id = %self.lobby_id,
            %player_id,
            players = self.roster.len(),
            "player joined lobby"
        );

        self.broadcast_info().await;
        Ok(())
    }

    async fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), LobbyError> {
        if !self.roster.contains(player_id) {
            return Err(LobbyError::NotInLobby(player_id, self.lobby_id));
        }

        if self.roster.len() == 1 {
            // Last one out: close behind anything already on the control
            // channel. The roster stays as it is.
            tracing::info!(lobby_id = %self.lobby_id, %player_id, "last player left lobby");
            self.state = LobbyState::Closing;
            if self.control_tx.try_send(Control::Shutdown).is_err() {
                tracing::debug!(lobby_id = %self.lobby_id, "shutdown already queued");
            }
            return Ok(());
        }

        self.roster.remove(player_id);
        if player_id == self.host {
            if let Some(next) = self.roster.first() {
                self.host = next;
                tracing::info!(lobby_id = %self.lobby_id, host = %next, "lobby host changed");
            }
        }
        tracing::info!(
            lobby_id = %self.lobby_id,
            %player_id,
            players = self.roster.len(),
            "player left lobby"
        );

        self.broadcast_info().await;
        Ok(())
    }

    async fn handle_chat(&mut self, player_id: PlayerId, message: String) -> Result<(), LobbyError> {
        if !self.roster.contains(player_id) {
            return Err(LobbyError::NotInLobby(player_id, self.lobby_id));
        }
        match Packet::data(response::CHAT_MESSAGE, &Chat { message }) {
            Ok(packet) => self.broadcast(packet, None).await,
            Err(err) => tracing::warn!(lobby_id = %self.lobby_id, %err, "failed to encode chat"),
        }
        Ok(())
    }

    /// Applies one gameplay packet from a member.
    async fn handle_gameplay(&mut self, msg: Inbound) {
        let sender = msg.player_id;
        if !self.roster.contains(sender) {
            tracing::debug!(lobby_id = %self.lobby_id, %sender, "gameplay from non-member, ignoring");
            return;
        }

        let flag = msg.packet.flag;
        if flag == post::PLAYER_TRANSFORM_DATA {
            match msg.packet.body::<PlayerData>() {
                Ok(data) => {
                    // The sender is whoever the connection says it is,
                    // whatever ID the payload claims.
                    self.roster.set_pending(sender, data.transforms, data.inputs);
                }
                Err(err) => {
                    tracing::debug!(lobby_id = %self.lobby_id, %sender, %err, "invalid transform packet");
                    self.reject(sender, AppError::from(err)).await;
                }
            }
            return;
        }

        match catalog::item_relay_flag(flag) {
            Some(relay) => {
                let packet = Packet::new(Header::Data, relay, msg.packet.payload);
                self.broadcast(packet, Some(sender)).await;
            }
            None => {
                tracing::debug!(lobby_id = %self.lobby_id, %sender, %flag, "unhandled gameplay flag");
            }
        }
    }

    /// One tick: apply what's queued, commit movement, broadcast the diff.
    async fn on_tick(&mut self) {
        // Everything that arrived before this tick belongs to it. Bounded
        // by the queue length now, so a flood can't starve the tick.
        for _ in 0..self.gameplay.len() {
            match self.gameplay.try_recv() {
                Ok(msg) => self.handle_gameplay(msg).await,
                Err(_) => break,
            }
        }

        let changes = self.roster.collect_changes(&self.model);

        // Nobody needs to hear about their own movement.
        if !changes.is_empty() && self.roster.len() > 1 {
            match Packet::data(response::PLAYER_TRANSFORMS, &PlayerTransforms { players: changes }) {
                Ok(packet) => self.broadcast(packet, None).await,
                Err(err) => tracing::warn!(lobby_id = %self.lobby_id, %err, "failed to encode transforms"),
            }
        }

        self.scheduler.record_tick_end();
    }

    /// Deregisters and stops ticking. Members still in an open lobby are
    /// told it's closing.
    async fn close(&mut self) {
        tracing::info!(lobby_id = %self.lobby_id, state = %self.state, "lobby shutting down");
        self.scheduler.stop();
        self.directory.remove(self.lobby_id).await;

        if self.state.is_joinable() {
            self.broadcast(Packet::new(Header::Data, response::LOBBY_CLOSING, Vec::<u8>::new()), None)
                .await;
        }
        self.state = LobbyState::Closing;
    }

    // -- Outbound helpers ---------------------------------------------------

    async fn broadcast_info(&mut self) {
        let info = NetworkLobbyInfo {
            lobby_name: self.settings.name.clone(),
            map_name: self.settings.map_name.clone(),
            time: 0,
            players: self.roster.to_network(self.host),
        };
        match Packet::data(response::LOBBY_INFO, &info) {
            Ok(packet) => self.broadcast(packet, None).await,
            Err(err) => tracing::warn!(lobby_id = %self.lobby_id, %err, "failed to encode lobby info"),
        }
    }

    /// Sends `packet` over TCP to every member except `skip`.
    async fn broadcast(&self, packet: Packet, skip: Option<PlayerId>) {
        for player_id in self.roster.player_ids() {
            if Some(player_id) == skip {
                continue;
            }
            if self
                .outbound
                .send(Outbound::tcp(player_id, packet.clone()))
                .await
                .is_err()
            {
                tracing::debug!(lobby_id = %self.lobby_id, "outbound queue closed");
                return;
            }
        }
    }

    async fn reject(&self, player_id: PlayerId, err: AppError) {
        match err.to_rejection() {
            Ok(packet) => {
                let _ = self.outbound.send(Outbound::tcp(player_id, packet)).await;
            }
            Err(encode) => {
                tracing::warn!(lobby_id = %self.lobby_id, err = %encode, "failed to encode rejection");
            }
        }
    }

    fn capacity(&self) -> usize {
        usize::try_from(self.settings.max_players).unwrap_or(0)
    }

    fn summary(&self) -> LobbySummary {
        LobbySummary {
            lobby_id: self.lobby_id,
            name: self.settings.name.clone(),
            player_count: self.roster.len(),
            max_players: self.settings.max_players,
            is_password_protected: self.settings.is_password_protected(),
            state: self.state,
        }
    }
}

/// Spawns a lobby actor with `owner` as host and first member.
///
/// Channel capacities and tick settings come from `config`. Backpressure
/// applies on every channel: senders wait when it's full.
pub(crate) fn spawn_lobby<M: MotionModel + Sync>(
    lobby_id: LobbyId,
    settings: LobbySettings,
    owner: NewMember,
    model: M,
    config: &LobbyConfig,
    outbound: mpsc::Sender<Outbound>,
    directory: LobbyDirectory,
) -> LobbyHandle {
    let (command_tx, command_rx) = mpsc::channel(config.command_capacity);
    let (gameplay_tx, gameplay_rx) = mpsc::channel(config.gameplay_capacity);
    let (control_tx, control_rx) = mpsc::channel(config.control_capacity);

    let host = owner.player_id;
    let mut roster = Roster::new();
    roster.push(owner);

    let actor = LobbyActor {
        lobby_id,
        settings,
        state: LobbyState::Open,
        host,
        roster,
        model,
        scheduler: TickScheduler::new(config.tick.clone()),
        commands: command_rx,
        gameplay: gameplay_rx,
        control: control_rx,
        control_tx: control_tx.clone(),
        outbound,
        directory,
    };

    tokio::spawn(actor.run());

    LobbyHandle {
        lobby_id,
        commands: command_tx,
        gameplay: gameplay_tx,
        control: control_tx,
    }
}
