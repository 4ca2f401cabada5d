//! fingerd: an RFC 1288 finger server
//!
//! Answers finger queries from a static user directory loaded from the
//! config file. Relay (`user@host`) queries are refused.
//!
//! Features:
//! - Per-connection read/write deadlines
//! - Query size cap
//! - Configuration via CLI arguments or TOML file

mod config;
mod directory;

use config::Config;
use directory::Directory;
use fingerd::Server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        read_timeout_secs = config.read_timeout.as_secs(),
        write_timeout_secs = config.write_timeout.as_secs(),
        max_query_bytes = config.max_query_bytes,
        users = config.users.len(),
        "Starting fingerd"
    );

    let listener = fingerd::listen(&config.listen).await?;

    let server = Server::builder()
        .handler(Directory::new(config.users))
        .read_timeout(config.read_timeout)
        .write_timeout(config.write_timeout)
        .max_query_bytes(config.max_query_bytes)
        .build();

    server
        .serve_with_shutdown(listener, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
