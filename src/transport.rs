//! Transport abstraction.
//!
//! The protocol rides on named events with JSON payloads; anything that can
//! carry those (WebSocket, an in-memory pair in tests) can back the client.
//! The worker task owns the transport exclusively, so implementations never
//! need internal locking.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::Result;

/// Something the transport observed, delivered through [`Transport::recv`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportSignal {
    /// The connection is established and events can flow.
    Connected,
    /// The connection dropped, with the close reason when one was given.
    Disconnected { reason: Option<String> },
    /// The transport is about to retry the connection.
    Reconnecting { attempt: u32 },
    /// A named protocol event arrived.
    Event { name: String, payload: Value },
}

/// A bidirectional event stream to the server.
///
/// The client calls every method from a single task; implementations can
/// assume exclusive access.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Establish the connection. `properties` carries transport options
    /// such as extra headers or reconnection tuning.
    async fn connect(&mut self, url: &str, properties: &ConnectionProperties) -> Result<()>;

    /// Send one named event with a JSON payload.
    async fn emit(&mut self, event: &str, payload: Value) -> Result<()>;

    /// Wait for the next signal.
    ///
    /// This future must be cancel-safe: the client polls it inside a
    /// `select!` loop and may drop it between signals without losing data.
    /// After a disconnect it should stay pending rather than spin; return
    /// `None` only when the transport can never produce another signal, at
    /// which point the client worker stops.
    async fn recv(&mut self) -> Option<TransportSignal>;

    /// Close the connection. Must be idempotent.
    async fn close(&mut self) -> Result<()>;

    /// Whether a connection is currently established.
    fn is_connected(&self) -> bool;
}

/// String-keyed transport options.
///
/// Keys use dotted prefixes (`header.*`, `proxy.*`, `reconnection*`); the
/// fluent helpers cover the common ones and [`set`](Self::set) takes
/// anything a custom transport understands.
#[derive(Debug, Clone, Default)]
pub struct ConnectionProperties {
    entries: BTreeMap<String, String>,
}

impl ConnectionProperties {
    /// Empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an extra request header for the connection handshake.
    #[must_use]
    pub fn header(self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        let key = format!("header.{}", name.as_ref());
        self.with(key, value.into())
    }

    /// Route the connection through a proxy.
    #[must_use]
    pub fn proxy(self, host: impl Into<String>, port: u16) -> Self {
        self.with("proxy.host", host.into())
            .with("proxy.port", port.to_string())
    }

    /// Authenticate against the proxy.
    #[must_use]
    pub fn proxy_auth(self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.with("proxy.username", username.into())
            .with("proxy.password", password.into())
    }

    /// Enable or disable automatic reconnection.
    #[must_use]
    pub fn reconnection(self, enabled: bool) -> Self {
        self.with("reconnection", enabled.to_string())
    }

    /// Cap the number of reconnection attempts.
    #[must_use]
    pub fn reconnection_attempts(self, attempts: u32) -> Self {
        self.with("reconnectionAttempts", attempts.to_string())
    }

    /// Initial reconnection backoff in milliseconds.
    #[must_use]
    pub fn reconnection_delay(self, millis: u64) -> Self {
        self.with("reconnectionDelay", millis.to_string())
    }

    /// Maximum reconnection backoff in milliseconds.
    #[must_use]
    pub fn reconnection_delay_max(self, millis: u64) -> Self {
        self.with("reconnectionDelayMax", millis.to_string())
    }

    /// Set an arbitrary property.
    #[must_use]
    pub fn set(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.with(key.into(), value.into())
    }

    /// Look up a property by exact key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Iterate over properties whose key starts with `prefix`, yielding the
    /// remainder of the key and the value.
    pub fn with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.entries.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix).map(|rest| (rest, value.as_str()))
        })
    }

    fn with(mut self, key: impl Into<String>, value: String) -> Self {
        self.entries.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn fluent_helpers_use_dotted_keys() {
        let properties = ConnectionProperties::new()
            .header("Origin", "https://example.test")
            .proxy("127.0.0.1", 9050)
            .reconnection(false);

        assert_eq!(
            properties.get("header.Origin"),
            Some("https://example.test")
        );
        assert_eq!(properties.get("proxy.host"), Some("127.0.0.1"));
        assert_eq!(properties.get("proxy.port"), Some("9050"));
        assert_eq!(properties.get("reconnection"), Some("false"));
    }

    #[test]
    fn prefix_iteration_strips_the_prefix() {
        let properties = ConnectionProperties::new()
            .header("A", "1")
            .header("B", "2")
            .set("proxy.host", "h");

        let headers: Vec<(&str, &str)> = properties.with_prefix("header.").collect();
        assert_eq!(headers, vec![("A", "1"), ("B", "2")]);
    }
}
