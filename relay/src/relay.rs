//! The relay engine: a single task that owns all room and connection
//! state and applies events one at a time.
//!
//! Every mutation — join, buffer update, disconnect — arrives on one mpsc
//! queue and is applied in full before the next event is touched. That
//! total order is what "last write wins" means here: two updates for the
//! same room never interleave, and a disconnect can never be reordered
//! ahead of an update from the same connection.
//!
//! Fan-out is fire-and-forget: each connection has a bounded outbound
//! queue and a full queue drops the message for that connection rather
//! than stalling the dispatcher.

use tokio::sync::{mpsc, oneshot};

use crate::protocol::{ClientEvent, ServerEvent};
use crate::registry::{ConnId, ConnectionRegistry};
use crate::rooms::RoomStore;

/// Events delivered to the relay's serialized loop.
#[derive(Debug)]
pub enum RelayEvent {
    /// Transport established a connection; `outbound` is its send queue.
    Connected {
        id: ConnId,
        outbound: mpsc::Sender<ServerEvent>,
    },
    /// A decoded wire event from a connection.
    Inbound { id: ConnId, event: ClientEvent },
    /// Transport-level disconnect (or explicit leave).
    Disconnected { id: ConnId },
    /// Snapshot request, answered on the reply channel.
    Stats { reply: oneshot::Sender<RelayStats> },
}

/// Relay counters, snapshotted through the event queue so reads observe a
/// consistent state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub total_connections: u64,
    pub active_connections: usize,
    pub events_processed: u64,
    pub broadcasts_sent: u64,
    pub messages_dropped: u64,
    pub active_rooms: usize,
}

/// Cloneable handle for feeding events into the relay.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayEvent>,
}

impl RelayHandle {
    /// Announce a new connection with its outbound queue.
    pub async fn connected(&self, id: ConnId, outbound: mpsc::Sender<ServerEvent>) {
        let _ = self.tx.send(RelayEvent::Connected { id, outbound }).await;
    }

    /// Forward a decoded client event.
    pub async fn inbound(&self, id: ConnId, event: ClientEvent) {
        let _ = self.tx.send(RelayEvent::Inbound { id, event }).await;
    }

    /// Announce a disconnect. Queued behind any events the connection
    /// already sent, so it cannot overtake them.
    pub async fn disconnected(&self, id: ConnId) {
        let _ = self.tx.send(RelayEvent::Disconnected { id }).await;
    }

    /// Fetch a consistent stats snapshot.
    pub async fn stats(&self) -> RelayStats {
        let (reply, rx) = oneshot::channel();
        if self.tx.send(RelayEvent::Stats { reply }).await.is_err() {
            return RelayStats::default();
        }
        rx.await.unwrap_or_default()
    }
}

/// Owns the room store and connection registry; drains the event queue.
pub struct RelayEngine {
    events: mpsc::Receiver<RelayEvent>,
    registry: ConnectionRegistry,
    rooms: RoomStore,
    total_connections: u64,
    events_processed: u64,
    broadcasts_sent: u64,
    messages_dropped: u64,
}

impl RelayEngine {
    /// Create an engine and the handle that feeds it.
    pub fn new(queue_capacity: usize) -> (RelayHandle, Self) {
        let (tx, events) = mpsc::channel(queue_capacity);
        let engine = Self {
            events,
            registry: ConnectionRegistry::new(),
            rooms: RoomStore::new(),
            total_connections: 0,
            events_processed: 0,
            broadcasts_sent: 0,
            messages_dropped: 0,
        };
        (RelayHandle { tx }, engine)
    }

    /// Run the dispatch loop until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle(event);
        }
        log::debug!("Relay loop stopped: all handles dropped");
    }

    fn handle(&mut self, event: RelayEvent) {
        self.events_processed += 1;
        match event {
            RelayEvent::Connected { id, outbound } => {
                self.registry.register(id, outbound);
                self.total_connections += 1;
                log::info!("Client connected: {id}");
            }
            RelayEvent::Inbound { id, event } => match event {
                ClientEvent::JoinRoom { room_id } => self.handle_join(id, &room_id),
                ClientEvent::CodeUpdate { room_id, code } => {
                    self.handle_update(id, &room_id, code)
                }
            },
            RelayEvent::Disconnected { id } => self.handle_disconnect(id),
            RelayEvent::Stats { reply } => {
                let _ = reply.send(RelayStats {
                    total_connections: self.total_connections,
                    active_connections: self.registry.len(),
                    events_processed: self.events_processed,
                    broadcasts_sent: self.broadcasts_sent,
                    messages_dropped: self.messages_dropped,
                    active_rooms: self.rooms.room_count(),
                });
            }
        }
    }

    fn handle_join(&mut self, id: ConnId, room_id: &str) {
        if room_id.is_empty() {
            log::debug!("Dropping join with empty room id from {id}");
            return;
        }
        if self.registry.sender(id).is_none() {
            log::debug!("Dropping join from unknown connection {id}");
            return;
        }

        // Leaving the old room and joining the new one happen inside this
        // one event turn, so no observer ever sees the connection counted
        // in two rooms.
        let prior = self.registry.set_room(id, room_id);
        if let Some(old) = prior.filter(|old| old != room_id) {
            let remaining = self.rooms.leave(&old, id);
            if remaining > 0 {
                self.broadcast(&old, ServerEvent::UserCount { count: remaining }, None);
            }
        }

        let (buffer, count) = self.rooms.join(room_id, id);
        self.send_to(id, ServerEvent::SyncCode { code: buffer });
        self.broadcast(room_id, ServerEvent::UserCount { count }, None);
        log::info!("Client {id} joined room {room_id} ({count} present)");
    }

    fn handle_update(&mut self, id: ConnId, room_id: &str, code: String) {
        // Updates from non-members are stale or malicious; drop them
        // without touching any room.
        if !self.rooms.is_member(room_id, id) {
            log::debug!("Dropping update for {room_id} from non-member {id}");
            return;
        }
        self.rooms.update_buffer(room_id, code.clone());
        self.broadcast(room_id, ServerEvent::CodeUpdate { code }, Some(id));
        log::debug!("Buffer update in room {room_id}");
    }

    fn handle_disconnect(&mut self, id: ConnId) {
        let prior = self.registry.unregister(id);
        log::info!("Client disconnected: {id}");
        if let Some(room_id) = prior {
            let remaining = self.rooms.leave(&room_id, id);
            if remaining > 0 {
                self.broadcast(
                    &room_id,
                    ServerEvent::UserCount { count: remaining },
                    None,
                );
            } else {
                log::info!("Room {room_id} removed (empty)");
            }
        }
    }

    /// Queue an event for one connection. A full or closed queue drops the
    /// event; the slow consumer is the transport task's problem.
    fn send_to(&mut self, id: ConnId, event: ServerEvent) {
        let Some(sender) = self.registry.sender(id) else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.messages_dropped += 1;
                log::warn!("Outbound queue full for {id}: dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.messages_dropped += 1;
            }
        }
    }

    /// Fan an event out to every member of a room, optionally excluding
    /// one connection (the originator of a buffer update).
    fn broadcast(&mut self, room_id: &str, event: ServerEvent, exclude: Option<ConnId>) {
        let members = self.rooms.members(room_id);
        for member in members {
            if Some(member) == exclude {
                continue;
            }
            self.send_to(member, event.clone());
        }
        self.broadcasts_sent += 1;
    }
}
