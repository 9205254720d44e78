//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! This module provides [`WebSocketTransport`], a [`Transport`]
//! implementation that carries protocol events as WebSocket text frames.
//! Each frame is a two-element JSON array, `["EventName", payload]`. Both
//! `ws://` and `wss://` URLs are supported (TLS is handled transparently via
//! [`MaybeTlsStream`](tokio_tungstenite::MaybeTlsStream)); `http://` and
//! `https://` URLs are rewritten to the matching WebSocket scheme.
//!
//! # Reconnection
//!
//! When the connection drops the transport yields a
//! [`TransportSignal::Disconnected`], then retries with exponential backoff,
//! announcing each attempt as [`TransportSignal::Reconnecting`] and a
//! successful retry as [`TransportSignal::Connected`]. Behaviour is tuned
//! through [`ConnectionProperties`]: `reconnection` (default `true`),
//! `reconnectionAttempts` (default unlimited), `reconnectionDelay` (default
//! 1000 ms) and `reconnectionDelayMax` (default 5000 ms).
//!
//! # Feature gate
//!
//! This module is only available when the `transport-websocket` feature is
//! enabled (it is enabled by default).

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::protocol::Message;

use crate::error::{ParlorError, Result};
use crate::transport::{ConnectionProperties, Transport, TransportSignal};

/// Type alias for the underlying WebSocket stream.
pub type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Clone)]
struct ReconnectPolicy {
    enabled: bool,
    max_attempts: Option<u32>,
    delay: Duration,
    delay_max: Duration,
}

impl ReconnectPolicy {
    fn from_properties(properties: &ConnectionProperties) -> Self {
        let enabled = properties
            .get("reconnection")
            .map_or(true, |value| value != "false");
        let max_attempts = properties
            .get("reconnectionAttempts")
            .and_then(|value| value.parse().ok());
        let delay = properties
            .get("reconnectionDelay")
            .and_then(|value| value.parse().ok())
            .map_or(Duration::from_millis(1000), Duration::from_millis);
        let delay_max = properties
            .get("reconnectionDelayMax")
            .and_then(|value| value.parse().ok())
            .map_or(Duration::from_millis(5000), Duration::from_millis);
        Self {
            enabled,
            max_attempts,
            delay,
            delay_max,
        }
    }

    /// Exponential backoff for the given 1-based attempt, capped at
    /// `delay_max`.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.delay.saturating_mul(factor).min(self.delay_max)
    }
}

/// A [`Transport`] implementation backed by a WebSocket connection.
///
/// # Cancel Safety
///
/// The [`recv`](Transport::recv) method is cancel-safe. Dropping the future
/// returned by `recv` before it completes will not lose signals, making it
/// safe to use inside `tokio::select!`. A reconnection attempt interrupted
/// mid-handshake is simply retried on the next call.
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    stream: Option<WsStream>,
    queued: VecDeque<TransportSignal>,
    url: Option<String>,
    headers: Vec<(String, String)>,
    policy: Option<ReconnectPolicy>,
    attempt: u32,
    attempt_announced: bool,
    closed: bool,
}

impl WebSocketTransport {
    /// A transport with no connection yet; [`Transport::connect`] does the
    /// actual handshake.
    pub fn new() -> Self {
        Self::default()
    }

    async fn handshake(url: &str, headers: &[(String, String)]) -> Result<WsStream> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ParlorError::TransportConnect(e.to_string()))?;
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ParlorError::TransportConnect(format!("bad header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ParlorError::TransportConnect(format!("bad header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ParlorError::TransportConnect(e.to_string()))?;
        Ok(stream)
    }

    fn parse_frame(text: &str) -> Option<(String, Value)> {
        let frame: Value = serde_json::from_str(text).ok()?;
        let parts = frame.as_array()?;
        let name = parts.first()?.as_str()?.to_owned();
        let payload = parts.get(1).cloned().unwrap_or(Value::Null);
        Some((name, payload))
    }
}

/// Rewrite `http(s)://` URLs to the matching WebSocket scheme.
fn websocket_url(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else if let Some(rest) = url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else {
        url.to_owned()
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&mut self, url: &str, properties: &ConnectionProperties) -> Result<()> {
        if properties.get("proxy.host").is_some() {
            tracing::warn!("proxy settings are not supported by the WebSocket transport");
        }

        let url = websocket_url(url);
        tracing::debug!(url = %url, "connecting to WebSocket server");

        let headers: Vec<(String, String)> = properties
            .with_prefix("header.")
            .map(|(name, value)| (name.to_owned(), value.to_owned()))
            .collect();
        let stream = Self::handshake(&url, &headers).await?;

        tracing::info!(url = %url, "WebSocket connection established");

        self.stream = Some(stream);
        self.url = Some(url);
        self.headers = headers;
        self.policy = Some(ReconnectPolicy::from_properties(properties));
        self.attempt = 0;
        self.attempt_announced = false;
        self.closed = false;
        self.queued.clear();
        self.queued.push_back(TransportSignal::Connected);
        Ok(())
    }

    async fn emit(&mut self, event: &str, payload: Value) -> Result<()> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(ParlorError::TransportClosed);
        };
        let frame = json!([event, payload]).to_string();
        stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| ParlorError::TransportSend(e.to_string()))
    }

    async fn recv(&mut self) -> Option<TransportSignal> {
        loop {
            if let Some(signal) = self.queued.pop_front() {
                return Some(signal);
            }

            let Some(stream) = self.stream.as_mut() else {
                if self.closed {
                    // Deliberately closed; nothing more will ever arrive
                    // unless `connect` is called again.
                    std::future::pending::<()>().await;
                    continue;
                }
                let Some(policy) = self.policy.clone().filter(|p| p.enabled) else {
                    return None;
                };
                if policy
                    .max_attempts
                    .is_some_and(|max| self.attempt >= max)
                {
                    tracing::warn!("giving up after {} reconnection attempts", self.attempt);
                    return None;
                }

                if !self.attempt_announced {
                    self.attempt += 1;
                    self.attempt_announced = true;
                    return Some(TransportSignal::Reconnecting {
                        attempt: self.attempt,
                    });
                }

                tokio::time::sleep(policy.backoff(self.attempt)).await;
                let url = self.url.clone()?;
                match Self::handshake(&url, &self.headers).await {
                    Ok(stream) => {
                        tracing::info!(url = %url, attempt = self.attempt, "reconnected");
                        self.stream = Some(stream);
                        self.attempt = 0;
                        self.attempt_announced = false;
                        return Some(TransportSignal::Connected);
                    }
                    Err(error) => {
                        tracing::debug!(%error, attempt = self.attempt, "reconnection attempt failed");
                        self.attempt_announced = false;
                        continue;
                    }
                }
            };

            let message = match stream.next().await {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    self.stream = None;
                    return Some(TransportSignal::Disconnected {
                        reason: Some(e.to_string()),
                    });
                }
                None => {
                    self.stream = None;
                    return Some(TransportSignal::Disconnected { reason: None });
                }
            };

            match message {
                Message::Text(text) => match Self::parse_frame(&text) {
                    Some((name, payload)) => {
                        return Some(TransportSignal::Event { name, payload });
                    }
                    None => {
                        tracing::warn!("skipping malformed frame: {text}");
                    }
                },
                Message::Close(frame) => {
                    tracing::debug!(?frame, "received WebSocket close frame");
                    self.stream = None;
                    let reason = frame
                        .filter(|f| !f.reason.is_empty())
                        .map(|f| f.reason.to_string());
                    return Some(TransportSignal::Disconnected { reason });
                }
                Message::Ping(_) | Message::Pong(_) => {
                    // tungstenite auto-queues the Pong reply.
                }
                Message::Binary(_) => {
                    tracing::warn!("received unexpected binary WebSocket frame, skipping");
                }
                Message::Frame(_) => {
                    // Never produced by the read half; the arm exists for
                    // exhaustiveness.
                }
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        self.queued.clear();
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        stream
            .close(None)
            .await
            .map_err(|e| ParlorError::TransportSend(e.to_string()))
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn websocket_transport_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<WebSocketTransport>();
    }

    #[test]
    fn http_urls_are_rewritten() {
        assert_eq!(websocket_url("http://localhost:4288"), "ws://localhost:4288");
        assert_eq!(websocket_url("https://chat.example.test"), "wss://chat.example.test");
        assert_eq!(websocket_url("ws://already"), "ws://already");
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = ReconnectPolicy {
            enabled: true,
            max_attempts: None,
            delay: Duration::from_millis(1000),
            delay_max: Duration::from_millis(5000),
        };
        assert_eq!(policy.backoff(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff(3), Duration::from_millis(4000));
        assert_eq!(policy.backoff(4), Duration::from_millis(5000));
        assert_eq!(policy.backoff(40), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn connect_fails_with_invalid_url() {
        let mut transport = WebSocketTransport::new();
        let err = transport
            .connect("not-a-valid-url", &ConnectionProperties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ParlorError::TransportConnect(_)));
    }

    #[tokio::test]
    async fn connect_fails_with_unreachable_host() {
        let mut transport = WebSocketTransport::new();
        let err = transport
            .connect("ws://127.0.0.1:1", &ConnectionProperties::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ParlorError::TransportConnect(_)));
    }

    // ── Mock-server helpers ──────────────────────────────────────────

    /// Start a local WebSocket server that runs `handler` on the accepted
    /// connection and returns the address to connect to.
    async fn start_mock_server<F, Fut>(handler: F) -> String
    where
        F: FnOnce(tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>) -> Fut
            + Send
            + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            handler(ws).await;
        });

        format!("ws://{addr}")
    }

    fn no_reconnect() -> ConnectionProperties {
        ConnectionProperties::new().reconnection(false)
    }

    async fn connected(url: &str, properties: &ConnectionProperties) -> WebSocketTransport {
        let mut transport = WebSocketTransport::new();
        transport.connect(url, properties).await.unwrap();
        assert_eq!(transport.recv().await, Some(TransportSignal::Connected));
        transport
    }

    // ── Mock-server tests ────────────────────────────────────────────

    #[tokio::test]
    async fn recv_decodes_event_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"["ServerInfo",{"OnlinePlayers":3}]"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Event {
                name: "ServerInfo".to_owned(),
                payload: json!({ "OnlinePlayers": 3 }),
            })
        );
    }

    #[tokio::test]
    async fn recv_skips_malformed_frames() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text("not json".into())).await.unwrap();
            ws.send(Message::Text(r#"{"Name":"wrong shape"}"#.into()))
                .await
                .unwrap();
            ws.send(Message::Binary(vec![0xDE, 0xAD].into()))
                .await
                .unwrap();
            ws.send(Message::Text(r#"["AfterJunk",null]"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Event {
                name: "AfterJunk".to_owned(),
                payload: Value::Null,
            })
        );
    }

    #[tokio::test]
    async fn event_without_payload_defaults_to_null() {
        let url = start_mock_server(|mut ws| async move {
            ws.send(Message::Text(r#"["ChatRoomLeave"]"#.into()))
                .await
                .unwrap();
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Event {
                name: "ChatRoomLeave".to_owned(),
                payload: Value::Null,
            })
        );
    }

    #[tokio::test]
    async fn emit_sends_array_frames() {
        let url = start_mock_server(|mut ws| async move {
            if let Some(Ok(Message::Text(text))) = ws.next().await {
                // Echo the raw frame back for the client to inspect.
                ws.send(Message::Text(text)).await.unwrap();
            }
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        transport
            .emit("AccountLogin", json!({ "AccountName": "A" }))
            .await
            .unwrap();

        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Event {
                name: "AccountLogin".to_owned(),
                payload: json!({ "AccountName": "A" }),
            })
        );
    }

    #[tokio::test]
    async fn server_close_yields_disconnected() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        assert!(matches!(
            transport.recv().await,
            Some(TransportSignal::Disconnected { .. })
        ));
        assert!(!transport.is_connected());
        // Reconnection disabled: the transport is permanently dead.
        assert_eq!(transport.recv().await, None);
    }

    #[tokio::test]
    async fn reconnection_is_announced_after_a_drop() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        let mut transport = connected(&url, &ConnectionProperties::new()).await;
        assert!(matches!(
            transport.recv().await,
            Some(TransportSignal::Disconnected { .. })
        ));
        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Reconnecting { attempt: 1 })
        );
    }

    #[tokio::test]
    async fn reconnection_gives_up_after_the_attempt_cap() {
        let url = start_mock_server(|mut ws| async move {
            ws.close(None).await.unwrap();
        })
        .await;

        // The mock server accepts a single connection, so every retry fails.
        let properties = ConnectionProperties::new()
            .reconnection_attempts(2)
            .reconnection_delay(1)
            .reconnection_delay_max(1);
        let mut transport = connected(&url, &properties).await;
        assert!(matches!(
            transport.recv().await,
            Some(TransportSignal::Disconnected { .. })
        ));
        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Reconnecting { attempt: 1 })
        );
        assert_eq!(
            transport.recv().await,
            Some(TransportSignal::Reconnecting { attempt: 2 })
        );
        assert_eq!(transport.recv().await, None);
    }

    #[tokio::test]
    async fn emit_after_close_returns_transport_closed() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        transport.close().await.unwrap();

        let err = transport.emit("Ping", Value::Null).await.unwrap_err();
        assert!(matches!(err, ParlorError::TransportClosed));
    }

    #[tokio::test]
    async fn double_close_is_idempotent() {
        let url =
            start_mock_server(|mut ws| async move { while let Some(Ok(_)) = ws.next().await {} })
                .await;

        let mut transport = connected(&url, &no_reconnect()).await;
        transport.close().await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn extra_headers_reach_the_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (header_tx, header_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let (tcp, _) = listener.accept().await.unwrap();
            let callback = |request: &tokio_tungstenite::tungstenite::handshake::server::Request,
                            response| {
                let origin = request
                    .headers()
                    .get("Origin")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let _ = header_tx.send(origin);
                Ok(response)
            };
            let _ws = tokio_tungstenite::accept_hdr_async(tcp, callback)
                .await
                .unwrap();
        });

        let properties = no_reconnect().header("Origin", "https://example.test");
        let mut transport = WebSocketTransport::new();
        transport
            .connect(&format!("ws://{addr}"), &properties)
            .await
            .unwrap();

        assert_eq!(
            header_rx.await.unwrap(),
            Some("https://example.test".to_owned())
        );
    }
}
