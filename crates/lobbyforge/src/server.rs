//! `LobbyforgeServer` builder and server loop.
//!
//! This is the entry point for running a Lobbyforge game server. It ties
//! together all the layers: transport → protocol → router → session/lobby,
//! and the fan-out back out to the sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use lobbyforge_lobby::LobbyDirectory;
use lobbyforge_protocol::Outbound;
use lobbyforge_session::spawn_registry;
use lobbyforge_transport::{Transport, TcpTransport, UdpEndpoint};
use tokio::sync::mpsc;

use crate::LobbyforgeError;
use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::outbound::run_fanout;
use crate::router::Router;
use crate::routes::{ServerContext, build_router, relay_lobby_closures};
use crate::udp::{UdpStats, run_udp};

/// Queue depth of the session registry actor.
const SESSION_CHANNEL_CAPACITY: usize = 256;

/// Shared server state passed to each connection handler task and to the
/// UDP worker.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Nothing in it
/// needs a lock: the registry and lobbies are actors, and the router is
/// read-only once built.
pub(crate) struct ServerState {
    pub(crate) context: ServerContext,
    pub(crate) router: Router<ServerContext>,
    pub(crate) game_version: String,
}

/// Builder for configuring and starting a Lobbyforge server.
///
/// # Example
///
/// ```rust,ignore
/// use lobbyforge::LobbyforgeServer;
///
/// let server = LobbyforgeServer::builder()
///     .bind("0.0.0.0:1338")
///     .game_version("0.1.1")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct LobbyforgeServerBuilder {
    config: ServerConfig,
    tcp_addr: Option<String>,
    udp_addr: Option<String>,
}

impl LobbyforgeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            tcp_addr: None,
            udp_addr: None,
        }
    }

    /// Replaces every setting with a loaded configuration.
    ///
    /// Addresses set with [`bind`](Self::bind) / [`udp_bind`](Self::udp_bind)
    /// still take precedence.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the TCP address, overriding `bind_ip`/`port`.
    pub fn bind(mut self, addr: &str) -> Self {
        self.tcp_addr = Some(addr.to_string());
        self
    }

    /// Sets the UDP address. Without it, UDP binds the same IP and port
    /// TCP actually got (or `udp_port` from the config).
    pub fn udp_bind(mut self, addr: &str) -> Self {
        self.udp_addr = Some(addr.to_string());
        self
    }

    /// Sets the version string clients must send in their Hello.
    pub fn game_version(mut self, version: impl Into<String>) -> Self {
        self.config.game_version = version.into();
        self
    }

    /// Sets the lobby tick interval.
    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval_ms = interval.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Binds both sockets and wires up the shared state.
    ///
    /// Background tasks (fan-out, UDP worker) start in
    /// [`run()`](LobbyforgeServer::run).
    ///
    /// # Errors
    /// - [`LobbyforgeError::Transport`] if either socket can't be bound
    /// - [`LobbyforgeError::Router`] if the route table is inconsistent
    pub async fn build(self) -> Result<LobbyforgeServer, LobbyforgeError> {
        let config = self.config;
        let router = build_router()?;

        let tcp_addr = self.tcp_addr.unwrap_or_else(|| config.tcp_addr());
        let transport = TcpTransport::bind_with(&tcp_addr, config.tcp_config()).await?;
        let tcp_local = transport.local_addr()?;

        let udp_addr = match (self.udp_addr, config.udp_port) {
            (Some(addr), _) => addr,
            (None, Some(_)) => config.udp_addr(),
            (None, None) => tcp_local.to_string(),
        };
        let udp = UdpEndpoint::bind(&udp_addr, config.udp_buffer_size).await?;

        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_capacity);
        let context = ServerContext {
            sessions: spawn_registry(SESSION_CHANNEL_CAPACITY),
            lobbies: LobbyDirectory::new(config.lobby_config(), outbound_tx.clone()),
            outbound: outbound_tx,
        };

        let state = Arc::new(ServerState {
            context,
            router,
            game_version: config.game_version.clone(),
        });

        Ok(LobbyforgeServer {
            transport,
            udp,
            outbound_rx,
            udp_stats: Arc::new(UdpStats::default()),
            state,
        })
    }
}

impl Default for LobbyforgeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Lobbyforge game server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct LobbyforgeServer {
    transport: TcpTransport,
    udp: UdpEndpoint,
    outbound_rx: mpsc::Receiver<Outbound>,
    udp_stats: Arc<UdpStats>,
    state: Arc<ServerState>,
}

impl LobbyforgeServer {
    /// Creates a new builder.
    pub fn builder() -> LobbyforgeServerBuilder {
        LobbyforgeServerBuilder::new()
    }

    /// Returns the TCP address the server is bound to.
    ///
    /// # Errors
    /// Returns [`LobbyforgeError::Transport`] if the OS can't report it.
    pub fn local_addr(&self) -> Result<SocketAddr, LobbyforgeError> {
        Ok(self.transport.local_addr()?)
    }

    /// Returns the UDP address the server is bound to.
    ///
    /// # Errors
    /// Returns [`LobbyforgeError::Transport`] if the OS can't report it.
    pub fn udp_local_addr(&self) -> Result<SocketAddr, LobbyforgeError> {
        Ok(self.udp.local_addr()?)
    }

    pub fn game_version(&self) -> &str {
        &self.state.game_version
    }

    /// The UDP worker's counters.
    pub fn udp_stats(&self) -> Arc<UdpStats> {
        Arc::clone(&self.udp_stats)
    }

    /// The lobby directory, e.g. to shut every lobby down on exit.
    pub fn lobbies(&self) -> LobbyDirectory {
        self.state.context.lobbies.clone()
    }

    /// Runs the server.
    ///
    /// Starts the fan-out, the lobby-closure relay and the UDP worker, then
    /// accepts TCP connections and spawns a handler task for each. Runs
    /// until the process is terminated.
    pub async fn run(mut self) -> Result<(), LobbyforgeError> {
        tracing::info!(
            tcp = %self.transport.local_addr()?,
            udp = %self.udp.local_addr()?,
            game_version = %self.state.game_version,
            "Lobbyforge server running"
        );

        tokio::spawn(run_fanout(
            self.outbound_rx,
            self.state.context.sessions.clone(),
            self.udp.clone(),
        ));
        tokio::spawn(relay_lobby_closures(
            self.state.context.clone(),
            self.state.context.lobbies.subscribe_closed(),
        ));
        tokio::spawn(run_udp(
            self.udp.clone(),
            Arc::clone(&self.state),
            Arc::clone(&self.udp_stats),
        ));

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
