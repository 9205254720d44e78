//! # Parlor Client
//!
//! Transport-agnostic async Rust client for the Parlor multiplayer chat
//! protocol.
//!
//! The client talks to a Parlor server with named JSON events over any
//! bidirectional transport and exposes the protocol as typed operations:
//! authentication, room search/create/join, chat, character updates and
//! debounced account synchronization. Server pushes arrive as typed
//! [`ParlorEvent`]s through subscription handlers, and the client keeps
//! immutable snapshots of the player and room state.
//!
//! ## Features
//!
//! - **Transport-agnostic** — implement the [`Transport`] trait for any backend
//! - **WebSocket built-in** — the default `transport-websocket` feature
//!   provides [`WebSocketTransport`](transports::WebSocketTransport)
//! - **Event-driven** — subscribe to [`ParlorEvent`]s by kind or wildcard
//! - **Server-friendly** — outbound messages are rate limited and account
//!   writes are batched the way the server expects
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use parlor_client::{EventKind, ParlorClient, ParlorConfig};
//!
//! # async fn example() -> Result<(), parlor_client::ParlorError> {
//! let client = ParlorClient::builder()
//!     .config(ParlorConfig::new().with_server_url("wss://chat.example.test"))
//!     .on(EventKind::ChatMessage, |event| println!("{event:?}"))
//!     .build()?;
//!
//! client.connect()?;
//! client.login("alice", "hunter2").await?;
//! client.join_room("Lobby").await?;
//! client.send_chat("hello")?;
//! # Ok(())
//! # }
//! ```

pub mod account;
pub mod bus;
pub mod client;
pub mod error;
pub mod event;
pub mod protocol;
pub mod state;
pub mod transport;
pub mod transports;

mod pending;
mod rate_limit;
mod router;

// Re-export primary types for ergonomic imports.
pub use account::AccountPatch;
pub use bus::Subscription;
pub use client::{ParlorClient, ParlorClientBuilder, ParlorConfig};
pub use error::{ParlorError, Result};
pub use event::{EventKind, ParlorEvent};
pub use state::{CharacterState, ConnectionState, PlayerState, RoomState};
pub use transport::{ConnectionProperties, Transport, TransportSignal};

#[cfg(feature = "transport-websocket")]
pub use transports::WebSocketTransport;
