//! WebSocket transport adapter for the relay.
//!
//! Architecture:
//! ```text
//! Client A ──┐                      ┌── outbound queue ── Client A
//! Client B ──┼── RelayEvent queue ──┤
//! Client C ──┘    (RelayEngine)     └── outbound queue ── Client C
//! ```
//!
//! Each accepted connection gets one task that shuttles frames both ways:
//! inbound frames are decoded and forwarded into the relay's event queue;
//! events the relay addresses to this connection arrive on a bounded
//! per-connection queue and are written back out. The task itself holds
//! no room state.

use std::net::SocketAddr;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::protocol::ClientEvent;
use crate::registry::ConnId;
use crate::relay::{RelayEngine, RelayHandle};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Outbound queue capacity per connection
    pub outbound_capacity: usize,
    /// Relay event queue capacity
    pub relay_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:9090".to_string(),
            outbound_capacity: 256,
            relay_queue_capacity: 1024,
        }
    }
}

/// The relay server: accept loop plus the relay engine it feeds.
pub struct RelayServer {
    config: ServerConfig,
    handle: RelayHandle,
    engine: Option<RelayEngine>,
}

impl RelayServer {
    /// Create a new relay server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        let (handle, engine) = RelayEngine::new(config.relay_queue_capacity);
        Self {
            config,
            handle,
            engine: Some(engine),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Handle into the relay, e.g. for stats queries.
    pub fn handle(&self) -> RelayHandle {
        self.handle.clone()
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Start the relay engine and listen for WebSocket connections.
    ///
    /// Runs the accept loop. Call from an async runtime.
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Some(engine) = self.engine.take() {
            tokio::spawn(engine.run());
        }

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Relay server listening on {}", self.config.bind_addr);

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let relay = self.handle.clone();
            let capacity = self.config.outbound_capacity;

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, relay, capacity).await {
                    log::error!("Connection error from {addr}: {e}");
                }
            });
        }
    }
}

/// Handle a single WebSocket connection.
///
/// The disconnect event is always delivered to the relay, whatever way
/// the connection ends, so membership can never leak.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    relay: RelayHandle,
    outbound_capacity: usize,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let id = ConnId::new();
    let (out_tx, mut out_rx) = mpsc::channel(outbound_capacity);
    relay.connected(id, out_tx).await;

    log::info!("WebSocket connection established from {addr}");

    let result = loop {
        tokio::select! {
            // Inbound WebSocket frame
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        let bytes: Vec<u8> = data.into();
                        match ClientEvent::decode(&bytes) {
                            Ok(event) => relay.inbound(id, event).await,
                            Err(e) => {
                                // Malformed frames are dropped; they must
                                // not affect this or any other connection.
                                log::warn!("Failed to decode frame from {addr}: {e}");
                            }
                        }
                    }

                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("Connection closed from {addr}");
                        break Ok(());
                    }

                    Some(Ok(Message::Ping(data))) => {
                        if ws_sender.send(Message::Pong(data)).await.is_err() {
                            break Ok(());
                        }
                    }

                    Some(Err(e)) => {
                        log::error!("WebSocket error from {addr}: {e}");
                        break Ok(());
                    }

                    _ => {}
                }
            }

            // Outbound event addressed to this connection
            event = out_rx.recv() => {
                match event {
                    Some(event) => {
                        match event.encode() {
                            Ok(encoded) => {
                                if ws_sender.send(Message::Binary(encoded.into())).await.is_err() {
                                    break Ok(());
                                }
                            }
                            Err(e) => break Err(e.into()),
                        }
                    }
                    // Relay dropped our queue: it is gone, so are we.
                    None => break Ok(()),
                }
            }
        }
    };

    relay.disconnected(id).await;
    result
}
