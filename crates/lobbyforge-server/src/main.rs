//! Lobbyforge game server.
//!
//! Usage: `lobbyforge [CONFIG]`. The config path can also come from
//! `LOBBYFORGE_CONFIG`; it defaults to `lobbyforge.toml`. `RUST_LOG`
//! overrides the configured `log_level`.

use std::time::Duration;

use lobbyforge::{LobbyforgeServer, ServerConfig};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "lobbyforge.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("LOBBYFORGE_CONFIG").ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = ServerConfig::load(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path,
        tcp = %config.tcp_addr(),
        udp = %config.udp_addr(),
        game_version = %config.game_version,
        tick_ms = config.tick_interval_ms,
        "starting Lobbyforge"
    );

    let server = LobbyforgeServer::builder().config(config).build().await?;
    let lobbies = server.lobbies();

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!(lobbies = lobbies.len().await, "shutting down");
            lobbies.shutdown_all().await;
            // Let the fan-out flush the LobbyClosing notices.
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
    Ok(())
}
