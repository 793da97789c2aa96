//! # Lobbyforge
//!
//! Authoritative backend for a lobby-based real-time multiplayer game.
//!
//! Clients connect over TCP, say Hello, and get a player ID. From there
//! they browse, create and join lobbies; each lobby runs its own tick loop
//! that diffs player movement and broadcasts it. UDP carries NAT discovery
//! (ImHere) and optional gameplay traffic.
//!
//! ## Layers
//!
//! ```text
//! TcpTransport / UdpEndpoint     bytes ↔ frames
//!   → handler / udp worker       handshake, header dispatch
//!     → Router<ServerContext>    flag → route handler
//!       → SessionHandle          who is connected, where to reach them
//!       → LobbyDirectory         lobby actors and their tick loops
//!         → outbound fan-out     player ID → socket
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lobbyforge::{LobbyforgeServer, ServerConfig};
//!
//! # async fn start() -> Result<(), lobbyforge::LobbyforgeError> {
//! let config = ServerConfig::load("lobbyforge.toml")?;
//! let server = LobbyforgeServer::builder().config(config).build().await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod outbound;
mod router;
mod routes;
mod server;
mod udp;

pub use config::{ConfigError, ServerConfig, TickPolicySetting};
pub use error::{HandshakeError, LobbyforgeError};
pub use handler::ConnectionState;
pub use router::{DispatchError, HandlerResult, Router, RouterError};
pub use routes::{GAMEPLAY_FLAGS, ServerContext, build_router};
pub use server::{LobbyforgeServer, LobbyforgeServerBuilder};
pub use udp::UdpStats;

/// Common imports for running a server or writing a test client.
pub mod prelude {
    pub use crate::{LobbyforgeError, LobbyforgeServer, LobbyforgeServerBuilder, ServerConfig};
    pub use lobbyforge_protocol::catalog::{post, request, response};
    pub use lobbyforge_protocol::{
        AppError, Chat, CreateLobby, ErrorPayload, Flag, Header, Hello, IdAssign, ImHere,
        JoinLobby, LobbyId, LobbyList, Packet, PlayerId,
    };
}
