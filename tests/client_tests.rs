//! Integration-style client tests.
//!
//! Uses the scripted `MockTransport` from `tests/common` to drive the full
//! client: connection lifecycle, request/response operations, room state
//! tracking and event delivery.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]

mod common;

use std::time::Duration;

use serde_json::json;

use parlor_client::protocol::{ChatRoomSearchRequest, ForceDisconnectReason, LoginResult, RoomJoinResult};
use parlor_client::{
    AccountPatch, ConnectionState, EventKind, ParlorClient, ParlorConfig, ParlorError, ParlorEvent,
    TransportSignal,
};

use common::{
    event, login_payload, member_join_payload, member_leave_payload, on_emit, room_sync_payload,
    HangingCloseTransport, MockTransport, Reply, ScriptHandle,
};

// ── Harness ─────────────────────────────────────────────────────────

fn start_client(
    script: Vec<Reply>,
) -> (
    ParlorClient,
    tokio::sync::mpsc::UnboundedReceiver<ParlorEvent>,
    ScriptHandle,
) {
    start_client_with(script, ParlorConfig::new())
}

fn start_client_with(
    script: Vec<Reply>,
    config: ParlorConfig,
) -> (
    ParlorClient,
    tokio::sync::mpsc::UnboundedReceiver<ParlorEvent>,
    ScriptHandle,
) {
    common::init_tracing();
    let (transport, handle) = MockTransport::new(script);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let client = ParlorClient::builder()
        .transport(transport)
        .config(config)
        .on_any(move |event| {
            let _ = tx.send(event.clone());
        })
        .build()
        .expect("build client");
    (client, rx, handle)
}

async fn next_event(rx: &mut tokio::sync::mpsc::UnboundedReceiver<ParlorEvent>) -> ParlorEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

/// Standard script for a successful login.
fn login_script() -> Reply {
    on_emit(
        "AccountLogin",
        vec![event("LoginResponse", login_payload(1234, "Alice"))],
    )
}

/// Standard script for a successful join into a two-member room.
fn join_script() -> Reply {
    on_emit(
        "ChatRoomJoin",
        vec![
            event("ChatRoomSearchResponse", json!("JoinedRoom")),
            event(
                "ChatRoomSync",
                room_sync_payload("Lobby", &[(1234, "Alice"), (55, "Bob")]),
            ),
        ],
    )
}

/// Reply that resolves a `query_allow_item(55)` call; used as an ordering
/// fence because the outbound queue drains strictly in order.
fn allow_item_fence() -> Reply {
    on_emit(
        "ChatRoomAllowItem",
        vec![event(
            "ChatRoomAllowItem",
            json!({ "MemberNumber": 55, "AllowItem": true }),
        )],
    )
}

async fn connect_and_login(
    client: &ParlorClient,
    rx: &mut tokio::sync::mpsc::UnboundedReceiver<ParlorEvent>,
) {
    client.connect().expect("connect");
    let login = client.login("Alice", "hunter2").await.expect("login");
    assert!(matches!(login, LoginResult::Success(_)));
    // Drain the Connected event emitted during the handshake.
    assert!(matches!(next_event(rx).await, ParlorEvent::Connected));
}

// ── Connection and auth ─────────────────────────────────────────────

#[tokio::test]
async fn connect_then_login_success() {
    let (client, mut rx, handle) = start_client(vec![login_script()]);

    client.connect().expect("connect");
    let result = client.login("Alice", "hunter2").await.expect("login");

    let LoginResult::Success(account) = result else {
        panic!("expected login success");
    };
    assert_eq!(account.member_number, 1234);

    assert!(matches!(next_event(&mut rx).await, ParlorEvent::Connected));
    assert_eq!(client.connection_state(), ConnectionState::LoggedIn);

    let player = client.player().expect("player snapshot");
    assert_eq!(player.member_number, 1234);
    assert_eq!(player.name, "Alice");

    let sent = handle.sent_payloads("AccountLogin");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["AccountName"], "Alice");
    assert_eq!(sent[0]["Password"], "hunter2");
}

#[tokio::test]
async fn rejected_login_is_an_error_result() {
    let (client, _rx, _handle) = start_client(vec![on_emit(
        "AccountLogin",
        vec![event("LoginResponse", json!("InvalidNamePassword"))],
    )]);

    client.connect().expect("connect");
    let result = client.login("Alice", "wrong").await.expect("login call");

    assert_eq!(result, LoginResult::Error("InvalidNamePassword".to_owned()));
    assert!(client.player().is_none());
    assert_eq!(client.connection_state(), ConnectionState::Connected);
}

#[tokio::test]
async fn force_disconnect_is_published() {
    let (client, mut rx, handle) = start_client(vec![]);
    client.connect().expect("connect");
    assert!(matches!(next_event(&mut rx).await, ParlorEvent::Connected));

    handle.push(event("ForceDisconnect", json!("ErrorDuplicatedLogin")));
    let ParlorEvent::ForceDisconnect { reason } = next_event(&mut rx).await else {
        panic!("expected ForceDisconnect");
    };
    assert_eq!(reason, ForceDisconnectReason::DuplicatedLogin);
}

#[tokio::test]
async fn oversized_login_queue_positions_are_dropped() {
    let (client, mut rx, handle) = start_client(vec![]);
    client.connect().expect("connect");

    // A position that does not fit in u32 is dropped, not truncated.
    handle.push(event("LoginQueue", json!(5_000_000_000u64)));
    handle.push(event("LoginQueue", json!(7)));

    loop {
        if let ParlorEvent::LoginQueue { position } = next_event(&mut rx).await {
            assert_eq!(position, 7);
            break;
        }
    }
}

#[tokio::test]
async fn repeated_disconnect_signals_publish_one_event() {
    let (client, mut rx, handle) = start_client(vec![]);
    client.connect().expect("connect");
    assert!(matches!(next_event(&mut rx).await, ParlorEvent::Connected));

    handle.push(TransportSignal::Disconnected {
        reason: Some("server restart".to_owned()),
    });
    handle.push(TransportSignal::Disconnected { reason: None });
    handle.push(event("ServerInfo", json!({ "Time": 1, "OnlinePlayers": 2 })));

    let ParlorEvent::Disconnected { reason } = next_event(&mut rx).await else {
        panic!("expected Disconnected");
    };
    assert_eq!(reason.as_deref(), Some("server restart"));

    // The second disconnect signal was swallowed; the next event through
    // is the server info push.
    assert!(matches!(
        next_event(&mut rx).await,
        ParlorEvent::ServerInfo { online_players: 2, .. }
    ));
}

#[tokio::test]
async fn disconnect_clears_room_and_player() {
    let (client, mut rx, handle) = start_client(vec![login_script(), join_script()]);
    connect_and_login(&client, &mut rx).await;
    client.join_room("Lobby").await.expect("join");

    handle.push(TransportSignal::Disconnected { reason: None });
    loop {
        if let ParlorEvent::Disconnected { .. } = next_event(&mut rx).await {
            break;
        }
    }

    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert!(client.room().is_none());
    assert!(client.player().is_none());
}

// ── Rooms ───────────────────────────────────────────────────────────

#[tokio::test]
async fn join_room_populates_the_snapshot() {
    let (client, mut rx, _handle) = start_client(vec![login_script(), join_script()]);
    connect_and_login(&client, &mut rx).await;

    let result = client.join_room("Lobby").await.expect("join");
    assert_eq!(result, RoomJoinResult::Success);
    assert_eq!(client.connection_state(), ConnectionState::InRoom);

    let room = client.room().expect("room snapshot");
    assert_eq!(room.name, "Lobby");
    assert_eq!(room.characters.len(), 2);
    assert!(room.find_character(55).is_some());

    loop {
        if let ParlorEvent::RoomJoined { room } = next_event(&mut rx).await {
            assert_eq!(room.name, "Lobby");
            break;
        }
    }
}

#[tokio::test]
async fn member_join_and_leave_update_the_room() {
    let (client, mut rx, handle) = start_client(vec![login_script(), join_script()]);
    connect_and_login(&client, &mut rx).await;
    client.join_room("Lobby").await.expect("join");

    handle.push(event("ChatRoomSyncMemberJoin", member_join_payload(77, "Carol")));
    loop {
        if let ParlorEvent::MemberJoined { character } = next_event(&mut rx).await {
            assert_eq!(character.name, "Carol");
            break;
        }
    }
    assert_eq!(client.room().unwrap().characters.len(), 3);

    handle.push(event("ChatRoomSyncMemberLeave", member_leave_payload(55)));
    loop {
        if let ParlorEvent::MemberLeft { member_number } = next_event(&mut rx).await {
            assert_eq!(member_number, 55);
            break;
        }
    }
    let room = client.room().unwrap();
    assert_eq!(room.characters.len(), 2);
    assert!(room.find_character(55).is_none());
}

#[tokio::test]
async fn leaving_clears_state_without_waiting_for_the_server() {
    let (client, mut rx, handle) = start_client(vec![login_script(), join_script()]);
    connect_and_login(&client, &mut rx).await;
    client.join_room("Lobby").await.expect("join");

    client.leave_room().expect("leave");
    loop {
        if let ParlorEvent::RoomLeft = next_event(&mut rx).await {
            break;
        }
    }
    assert!(client.room().is_none());
    assert_eq!(client.connection_state(), ConnectionState::LoggedIn);

    let leaves = handle.sent_payloads("ChatRoomLeave");
    assert_eq!(leaves, vec![json!("")]);

    // The server still echoes our departure as a member-leave sync; with
    // the room already gone it must not produce a second RoomLeft.
    handle.push(event("ChatRoomSyncMemberLeave", member_leave_payload(1234)));
    handle.push(event("ServerInfo", json!({ "Time": 1, "OnlinePlayers": 9 })));
    assert!(matches!(
        next_event(&mut rx).await,
        ParlorEvent::ServerInfo { online_players: 9, .. }
    ));
}

#[tokio::test]
async fn leave_without_a_room_is_a_no_op() {
    let (client, mut rx, handle) = start_client(vec![login_script(), allow_item_fence()]);
    connect_and_login(&client, &mut rx).await;

    client.leave_room().expect("leave");
    // Commands are handled in order, so once this request resolves the
    // leave has been processed.
    client.query_allow_item(55).await.expect("fence");

    assert!(handle.sent_payloads("ChatRoomLeave").is_empty());
    assert_eq!(client.connection_state(), ConnectionState::LoggedIn);
    while let Ok(seen) = rx.try_recv() {
        assert!(!matches!(seen, ParlorEvent::RoomLeft));
    }
}

#[tokio::test]
async fn search_uppercases_and_trims_the_query() {
    let (client, _rx, handle) = start_client(vec![on_emit(
        "ChatRoomSearch",
        vec![event(
            "ChatRoomSearchResult",
            json!([{ "Name": "LOBBY", "MemberCount": 3 }]),
        )],
    )]);
    client.connect().expect("connect");

    let results = client
        .search_rooms(ChatRoomSearchRequest {
            query: "  lobby ".to_owned(),
            ..ChatRoomSearchRequest::default()
        })
        .await
        .expect("search");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "LOBBY");
    assert_eq!(handle.sent_payloads("ChatRoomSearch")[0]["Query"], "LOBBY");
}

// ── Requests ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn unanswered_requests_time_out() {
    let (client, _rx, _handle) = start_client_with(
        vec![],
        ParlorConfig::new().with_request_timeout(Duration::from_secs(3)),
    );
    client.connect().expect("connect");

    let before = tokio::time::Instant::now();
    let err = client.login("Alice", "hunter2").await.unwrap_err();

    assert!(matches!(err, ParlorError::RequestTimeout { .. }));
    assert!(before.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn a_repeated_request_cancels_the_first() {
    let (client, _rx, handle) = start_client(vec![]);
    client.connect().expect("connect");

    let client = std::sync::Arc::new(client);
    let first = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.login("Alice", "hunter2").await })
    };
    // Make sure the first request is registered before the second fires.
    tokio::time::sleep(Duration::from_millis(50)).await;

    handle.push(event("LoginQueue", json!(3)));
    let second = {
        let client = std::sync::Arc::clone(&client);
        tokio::spawn(async move { client.login("Alice", "hunter2").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.push(event("LoginResponse", login_payload(1, "Alice")));

    let first = first.await.expect("join first");
    assert!(matches!(first, Err(ParlorError::RequestCancelled)));
    let second = second.await.expect("join second");
    assert!(matches!(second, Ok(LoginResult::Success(_))));
}

// ── Outbound messages ───────────────────────────────────────────────

#[tokio::test]
async fn chat_messages_carry_type_and_msg_id() {
    let (client, mut rx, handle) = start_client(vec![login_script(), allow_item_fence()]);
    connect_and_login(&client, &mut rx).await;

    client.send_chat("hello").expect("chat");
    client.whisper(55, "psst").expect("whisper");
    client.emote("waves").expect("emote");

    // The send queue drains in order, so once this request resolves the
    // chat messages are guaranteed to have gone out.
    client.query_allow_item(55).await.expect("fence");

    let sent = handle.sent_payloads("ChatRoomChat");
    assert_eq!(sent.len(), 3);
    assert_eq!(sent[0]["Content"], "hello");
    assert_eq!(sent[0]["Type"], "Chat");
    assert_eq!(sent[0]["Dictionary"][0]["Tag"], "MsgId");
    assert_eq!(sent[1]["Type"], "Whisper");
    assert_eq!(sent[1]["Target"], 55);
    assert_eq!(sent[2]["Type"], "Emote");
}

#[tokio::test]
async fn outbound_messages_queue_while_disconnected() {
    let (client, _rx, handle) = start_client(vec![]);

    client.send_chat("one").expect("chat");
    client.send_chat("two").expect("chat");

    // Not connected yet: nothing was emitted, everything queued.
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(handle.sent().is_empty());
    assert_eq!(client.queued_messages(), 2);
}

#[tokio::test]
async fn admin_verbs_use_the_admin_envelope() {
    let (client, mut rx, handle) =
        start_client(vec![login_script(), join_script(), allow_item_fence()]);
    connect_and_login(&client, &mut rx).await;
    client.join_room("Lobby").await.expect("join");

    client.kick(55).expect("kick");
    client.swap(55, 77).expect("swap");
    client.query_allow_item(55).await.expect("fence");

    let sent = handle.sent_payloads("ChatRoomAdmin");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0]["Action"], "Kick");
    assert_eq!(sent[0]["MemberNumber"], 55);
    assert_eq!(sent[1]["Action"], "Swap");
    assert_eq!(sent[1]["TargetMemberNumber"], 55);
    assert_eq!(sent[1]["DestinationMemberNumber"], 77);
}

// ── Account updates ─────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn account_updates_flush_after_the_debounce() {
    let (client, mut rx, handle) = start_client(vec![
        login_script(),
        on_emit(
            "AccountUpdate",
            vec![event("ServerInfo", json!({ "Time": 1, "OnlinePlayers": 1 }))],
        ),
    ]);
    connect_and_login(&client, &mut rx).await;

    let before = tokio::time::Instant::now();
    client
        .queue_account_update(AccountPatch::new().set("LabelColor", "#FF0000"))
        .expect("queue");

    loop {
        if let ParlorEvent::ServerInfo { .. } = next_event(&mut rx).await {
            break;
        }
    }

    assert!(before.elapsed() >= Duration::from_secs(2));
    let sent = handle.sent_payloads("AccountUpdate");
    assert_eq!(sent, vec![json!({ "LabelColor": "#FF0000" })]);
}

#[tokio::test]
async fn forced_account_updates_flush_immediately() {
    let (client, mut rx, handle) = start_client(vec![
        login_script(),
        on_emit(
            "AccountUpdate",
            vec![event("ServerInfo", json!({ "Time": 1, "OnlinePlayers": 1 }))],
        ),
    ]);
    connect_and_login(&client, &mut rx).await;

    client
        .queue_account_update(AccountPatch::new().set("LabelColor", "#FF0000"))
        .expect("queue");
    client
        .update_account_now(AccountPatch::new().set("Title", "None"))
        .expect("update now");

    loop {
        if let ParlorEvent::ServerInfo { .. } = next_event(&mut rx).await {
            break;
        }
    }

    // Both writes went out in a single merged batch.
    let sent = handle.sent_payloads("AccountUpdate");
    assert_eq!(
        sent,
        vec![json!({ "LabelColor": "#FF0000", "Title": "None" })]
    );
}

// ── Shutdown ────────────────────────────────────────────────────────

#[tokio::test]
async fn shutdown_closes_the_transport() {
    let (mut client, mut rx, handle) = start_client(vec![]);
    client.connect().expect("connect");
    assert!(matches!(next_event(&mut rx).await, ParlorEvent::Connected));

    client.shutdown().await;
    assert!(handle.closed());
    assert!(matches!(
        client.send_chat("too late"),
        Err(ParlorError::ClientClosed)
    ));
}

#[tokio::test]
async fn shutdown_aborts_a_hanging_transport() {
    let (transport_tx, rx) = tokio::sync::mpsc::unbounded_channel::<ParlorEvent>();
    drop(rx);
    let mut client = ParlorClient::builder()
        .transport(HangingCloseTransport)
        .config(ParlorConfig::new().with_shutdown_timeout(Duration::from_millis(50)))
        .on_any(move |event| {
            let _ = transport_tx.send(event.clone());
        })
        .build()
        .expect("build client");

    // Must return despite close() hanging forever.
    tokio::time::timeout(Duration::from_secs(2), client.shutdown())
        .await
        .expect("shutdown did not complete");
}

#[tokio::test]
async fn subscriptions_registered_on_the_builder_see_early_events() {
    let (transport, _handle) = MockTransport::new(vec![]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let client = ParlorClient::builder()
        .transport(transport)
        .on(EventKind::Connected, move |event| {
            let _ = tx.send(event.clone());
        })
        .build()
        .expect("build client");

    client.connect().expect("connect");
    let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out")
        .expect("channel closed");
    assert!(matches!(event, ParlorEvent::Connected));
}
