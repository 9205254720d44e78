#![allow(
    dead_code,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Shared test utilities for Parlor Client integration tests.
//!
//! Provides a scripted [`MockTransport`] plus helpers for building common
//! server payload JSON.
//!
//! The mock releases its scripted replies only when the client emits the
//! matching outbound event, so request/response ordering is deterministic:
//! a `LoginResponse` cannot arrive before the client actually sent
//! `AccountLogin`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use parlor_client::{ConnectionProperties, ParlorError, Transport, TransportSignal};

/// Install a process-wide subscriber so `RUST_LOG` controls test output.
/// Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ── MockTransport ───────────────────────────────────────────────────

type SentLog = Arc<StdMutex<Vec<(String, Value)>>>;

/// One scripted exchange: when the client emits `trigger`, the mock feeds
/// `replies` back through `recv`.
pub struct Reply {
    trigger: String,
    replies: Vec<TransportSignal>,
}

/// Build a scripted reply released by an outgoing event.
pub fn on_emit(trigger: &str, replies: Vec<TransportSignal>) -> Reply {
    Reply {
        trigger: trigger.to_owned(),
        replies,
    }
}

/// Shorthand for an inbound protocol event signal.
pub fn event(name: &str, payload: Value) -> TransportSignal {
    TransportSignal::Event {
        name: name.to_owned(),
        payload,
    }
}

/// A scripted mock transport for integration testing.
///
/// `connect` immediately reports [`TransportSignal::Connected`]. Everything
/// the client emits is recorded and may release a scripted [`Reply`];
/// unsolicited signals can be injected at any point through the
/// [`ScriptHandle`].
pub struct MockTransport {
    incoming: VecDeque<TransportSignal>,
    script: Vec<Reply>,
    inject_rx: tokio::sync::mpsc::UnboundedReceiver<TransportSignal>,
    sent: SentLog,
    closed: Arc<AtomicBool>,
    connected: bool,
}

/// Test-side handle to a [`MockTransport`].
#[derive(Clone)]
pub struct ScriptHandle {
    inject_tx: tokio::sync::mpsc::UnboundedSender<TransportSignal>,
    sent: SentLog,
    closed: Arc<AtomicBool>,
}

impl ScriptHandle {
    /// Push an unsolicited signal to the client.
    pub fn push(&self, signal: TransportSignal) {
        self.inject_tx.send(signal).unwrap();
    }

    /// Everything the client has emitted so far.
    pub fn sent(&self) -> Vec<(String, Value)> {
        self.sent.lock().unwrap().clone()
    }

    /// Payloads of every emitted event with the given name.
    pub fn sent_payloads(&self, name: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(event, _)| event == name)
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    /// Whether `close()` has been called on the transport.
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }
}

impl MockTransport {
    pub fn new(script: Vec<Reply>) -> (Self, ScriptHandle) {
        let (inject_tx, inject_rx) = tokio::sync::mpsc::unbounded_channel();
        let sent: SentLog = Arc::new(StdMutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let handle = ScriptHandle {
            inject_tx,
            sent: Arc::clone(&sent),
            closed: Arc::clone(&closed),
        };
        let transport = Self {
            incoming: VecDeque::new(),
            script,
            inject_rx,
            sent,
            closed,
            connected: false,
        };
        (transport, handle)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self, _url: &str, _properties: &ConnectionProperties) -> Result<(), ParlorError> {
        self.connected = true;
        self.incoming.push_back(TransportSignal::Connected);
        Ok(())
    }

    async fn emit(&mut self, event: &str, payload: Value) -> Result<(), ParlorError> {
        self.sent.lock().unwrap().push((event.to_owned(), payload));
        if let Some(index) = self.script.iter().position(|r| r.trigger == event) {
            let reply = self.script.remove(index);
            self.incoming.extend(reply.replies);
        }
        Ok(())
    }

    async fn recv(&mut self) -> Option<TransportSignal> {
        if let Some(signal) = self.incoming.pop_front() {
            return Some(signal);
        }
        // A sender clone lives in the ScriptHandle, so this only resolves
        // when the test injects a signal; otherwise it parks like a real
        // idle connection.
        self.inject_rx.recv().await
    }

    async fn close(&mut self) -> Result<(), ParlorError> {
        self.closed.store(true, Ordering::Relaxed);
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// A transport whose `close` never completes; used to exercise the
/// shutdown timeout path.
pub struct HangingCloseTransport;

#[async_trait]
impl Transport for HangingCloseTransport {
    async fn connect(&mut self, _url: &str, _properties: &ConnectionProperties) -> Result<(), ParlorError> {
        Ok(())
    }

    async fn emit(&mut self, _event: &str, _payload: Value) -> Result<(), ParlorError> {
        Ok(())
    }

    async fn recv(&mut self) -> Option<TransportSignal> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<(), ParlorError> {
        std::future::pending().await
    }

    fn is_connected(&self) -> bool {
        true
    }
}

// ── Payload helpers ─────────────────────────────────────────────────

/// Minimal successful `LoginResponse` payload.
pub fn login_payload(member_number: u32, name: &str) -> Value {
    json!({
        "ID": "session-1",
        "MemberNumber": member_number,
        "Name": name,
        "AccountName": name.to_uppercase(),
        "Money": 100,
    })
}

/// Minimal character bundle for sync payloads.
pub fn character_payload(member_number: u32, name: &str) -> Value {
    json!({
        "MemberNumber": member_number,
        "Name": name,
    })
}

/// `ChatRoomSync` payload for a room with the given members.
pub fn room_sync_payload(name: &str, members: &[(u32, &str)]) -> Value {
    let characters: Vec<Value> = members
        .iter()
        .map(|(number, name)| character_payload(*number, name))
        .collect();
    json!({
        "Name": name,
        "Description": "test room",
        "Admin": [members.first().map_or(0, |(n, _)| *n)],
        "Background": "MainHall",
        "Limit": 10,
        "Character": characters,
    })
}

/// `ChatRoomSyncMemberJoin` payload.
pub fn member_join_payload(member_number: u32, name: &str) -> Value {
    json!({
        "SourceMemberNumber": member_number,
        "Character": character_payload(member_number, name),
    })
}

/// `ChatRoomSyncMemberLeave` payload.
pub fn member_leave_payload(member_number: u32) -> Value {
    json!({ "SourceMemberNumber": member_number })
}
