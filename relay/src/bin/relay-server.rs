//! Standalone relay server binary.
//!
//! ```text
//! relay-server [bind_addr]
//! ```
//!
//! Defaults to 127.0.0.1:9090. Log level via RUST_LOG.

use codesync_relay::{RelayServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    let mut config = ServerConfig::default();
    if let Some(addr) = std::env::args().nth(1) {
        config.bind_addr = addr;
    }

    let server = RelayServer::new(config);
    log::info!("Starting relay server on {}", server.bind_addr());
    server.run().await
}
