//! Client-side connection to the relay.
//!
//! `RelayClient` is an explicitly constructed, explicitly owned value:
//! the component that needs collaboration holds it, calls [`connect`]
//! on acquisition and [`disconnect`] (or drops it) on release. There is
//! no process-wide singleton.
//!
//! [`connect`]: RelayClient::connect
//! [`disconnect`]: RelayClient::disconnect

use std::sync::Arc;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, RwLock};

use crate::protocol::{ClientEvent, ServerEvent, WireError};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Events surfaced to the owner of a [`RelayClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientSideEvent {
    /// Connection established
    Connected,
    /// Connection lost or closed
    Disconnected,
    /// Initial buffer snapshot after a join
    Synced(String),
    /// A peer replaced the room buffer
    RemoteUpdate(String),
    /// Membership changed in our room
    UserCount(usize),
}

/// A connection to the relay server.
pub struct RelayClient {
    server_url: String,
    state: Arc<RwLock<ConnectionState>>,
    /// Channel to the WebSocket writer task
    outgoing_tx: Option<mpsc::Sender<Vec<u8>>>,
    /// Event receiver handed to the owning component
    event_rx: Option<mpsc::Receiver<ClientSideEvent>>,
    /// Event sender (held by the reader task)
    event_tx: mpsc::Sender<ClientSideEvent>,
}

impl RelayClient {
    /// Create a disconnected client for the given server URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        let (event_tx, event_rx) = mpsc::channel(256);
        Self {
            server_url: server_url.into(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            outgoing_tx: None,
            event_rx: Some(event_rx),
            event_tx,
        }
    }

    /// Take the event receiver (can only be called once).
    pub fn take_event_rx(&mut self) -> Option<mpsc::Receiver<ClientSideEvent>> {
        self.event_rx.take()
    }

    /// Connect to the server.
    ///
    /// Spawns background tasks for reading and writing WebSocket frames.
    pub async fn connect(&mut self) -> Result<(), WireError> {
        *self.state.write().await = ConnectionState::Connecting;

        let ws_result = tokio_tungstenite::connect_async(&self.server_url).await;

        let (ws_writer, mut ws_reader) = match ws_result {
            Ok((ws_stream, _)) => ws_stream.split(),
            Err(_) => {
                *self.state.write().await = ConnectionState::Disconnected;
                return Err(WireError::ConnectionClosed);
            }
        };

        // Writer task: forward the outgoing channel to the WebSocket.
        let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(256);
        self.outgoing_tx = Some(out_tx);
        let mut writer = ws_writer;
        tokio::spawn(async move {
            while let Some(data) = out_rx.recv().await {
                if writer
                    .send(tokio_tungstenite::tungstenite::Message::Binary(data.into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            let _ = writer.close().await;
        });

        *self.state.write().await = ConnectionState::Connected;
        let _ = self.event_tx.send(ClientSideEvent::Connected).await;

        // Reader task: decode incoming frames into client-side events.
        let event_tx = self.event_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_reader.next().await {
                match msg {
                    Ok(tokio_tungstenite::tungstenite::Message::Binary(data)) => {
                        let bytes: Vec<u8> = data.into();
                        match ServerEvent::decode(&bytes) {
                            Ok(event) => {
                                let event = match event {
                                    ServerEvent::SyncCode { code } => {
                                        ClientSideEvent::Synced(code)
                                    }
                                    ServerEvent::CodeUpdate { code } => {
                                        ClientSideEvent::RemoteUpdate(code)
                                    }
                                    ServerEvent::UserCount { count } => {
                                        ClientSideEvent::UserCount(count)
                                    }
                                };
                                let _ = event_tx.send(event).await;
                            }
                            Err(e) => {
                                log::warn!("Failed to decode server frame: {e}");
                            }
                        }
                    }
                    Ok(tokio_tungstenite::tungstenite::Message::Close(_)) | Err(_) => {
                        break;
                    }
                    _ => {}
                }
            }

            // Connection lost
            *state.write().await = ConnectionState::Disconnected;
            let _ = event_tx.send(ClientSideEvent::Disconnected).await;
        });

        Ok(())
    }

    /// Join (or switch to) a room. The server answers with `Synced` and a
    /// `UserCount` for the whole room.
    pub async fn join(&self, room_id: impl Into<String>) -> Result<(), WireError> {
        self.send(ClientEvent::JoinRoom {
            room_id: room_id.into(),
        })
        .await
    }

    /// Send a buffer update for the room. Last write wins on the server.
    pub async fn send_update(
        &self,
        room_id: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<(), WireError> {
        self.send(ClientEvent::CodeUpdate {
            room_id: room_id.into(),
            code: code.into(),
        })
        .await
    }

    async fn send(&self, event: ClientEvent) -> Result<(), WireError> {
        if *self.state.read().await != ConnectionState::Connected {
            return Err(WireError::ConnectionClosed);
        }
        let encoded = event.encode()?;
        match &self.outgoing_tx {
            Some(tx) => tx
                .send(encoded)
                .await
                .map_err(|_| WireError::ConnectionClosed),
            None => Err(WireError::ConnectionClosed),
        }
    }

    /// Close the connection. The server observes a normal disconnect and
    /// recomputes room presence.
    pub async fn disconnect(&mut self) {
        // Dropping the writer channel closes the sink, which ends the
        // connection on the server side.
        self.outgoing_tx = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }

    /// Get the current connection state.
    pub async fn connection_state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Get the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }
}
