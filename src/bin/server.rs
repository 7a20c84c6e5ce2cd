//! Relay server binary.
//!
//! Listens on `BATTLE_TETRIS_HOST:BATTLE_TETRIS_PORT` (default
//! `127.0.0.1:9001`); `RUST_LOG` controls log output on stderr.

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use battle_tetris::adapter::{run_server, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    tokio::select! {
        result = run_server(config, None) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
            Ok(())
        }
    }
}
