//! # codesync-relay — Real-time collaboration relay
//!
//! A WebSocket relay that lets multiple clients join a named room, share
//! one mutable text buffer, and watch how many peers are present.
//! Consistency is last-write-wins: updates are totally ordered by a
//! single dispatcher and the most recent one is retained, with no merging.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     WebSocket      ┌─────────────┐
//! │ RelayClient │ ◄─────────────────► │ RelayServer │
//! │ (per user)  │    Binary frames    │ (transport) │
//! └─────────────┘                     └──────┬──────┘
//!                                            │ RelayEvent queue
//!                                            ▼
//!                                     ┌─────────────┐
//!                                     │ RelayEngine │  single task owns:
//!                                     │ (dispatch)  │  RoomStore
//!                                     └──────┬──────┘  ConnectionRegistry
//!                                            │
//!                                    ┌───────┴───────┐
//!                                    │ per-connection│
//!                                    │outbound queues│
//!                                    └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — Binary wire events (bincode-encoded)
//! - [`registry`] — Live connections and their room membership
//! - [`rooms`] — Room buffers and member sets
//! - [`relay`] — The serialized event dispatcher
//! - [`server`] — WebSocket transport adapter
//! - [`client`] — Owned client-side connection

pub mod protocol;
pub mod registry;
pub mod rooms;
pub mod relay;
pub mod server;
pub mod client;

// Re-exports for convenience
pub use protocol::{ClientEvent, ServerEvent, WireError};
pub use registry::{ConnId, ConnectionRegistry};
pub use rooms::RoomStore;
pub use relay::{RelayEngine, RelayEvent, RelayHandle, RelayStats};
pub use server::{RelayServer, ServerConfig};
pub use client::{ClientSideEvent, ConnectionState, RelayClient};
