//! Transport implementations.
//!
//! Concrete [`Transport`](crate::Transport) implementations live here behind
//! feature gates. Enable the corresponding Cargo feature to pull one in:
//!
//! | Feature                | Transport              |
//! |------------------------|------------------------|
//! | `transport-websocket`  | [`WebSocketTransport`] |

#[cfg(feature = "transport-websocket")]
pub mod websocket;

#[cfg(feature = "transport-websocket")]
pub use websocket::WebSocketTransport;
