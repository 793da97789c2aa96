//! Connected-client registry for Lobbyforge.
//!
//! This crate answers three questions for the rest of the server:
//!
//! 1. **Who is connected?** Clients are registered after the Hello
//!    handshake and get a random, unique [`PlayerId`](lobbyforge_protocol::PlayerId).
//! 2. **Where are they?** Each [`Client`] records its lobby by ID.
//! 3. **How do I reach them?** A [`Route`] holds the TCP writer handle
//!    and, once an ImHere datagram arrived, the NAT-observed UDP endpoint.
//!
//! # How it fits in the stack
//!
//! ```text
//! Lobby actors / route handlers  ← ask "which lobby?", "who's idle?"
//!     ↕
//! Session registry (this crate)  ← one actor owning all client records
//!     ↕
//! Transport (below)              ← provides TcpSender handles
//! ```

mod client;
mod error;
mod manager;
mod registry;

pub use client::{Client, NewClient, Route, UdpBinding};
pub use error::SessionError;
pub use manager::SessionManager;
pub use registry::{SessionHandle, spawn_registry};
