//! Events emitted by the client.
//!
//! Everything observable about a connection arrives here as a single tagged
//! union, [`ParlorEvent`]. Handlers subscribe either to one [`EventKind`] or
//! to the wildcard stream via the client's `on`/`on_any` methods.

use std::sync::Arc;

use crate::protocol::{
    AccountQueryResult, ArousalSyncMessage, BeepMessage, ForceDisconnectReason, GameResponseData,
    ItemSyncMessage, ReceivedChatMessage,
};
use crate::state::{CharacterState, RoomState};

/// One event dispatched to subscribers.
///
/// State snapshots (`room`, `character`) are shared immutable values; a
/// handler can hold on to them without blocking further updates.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ParlorEvent {
    /// The transport established a connection.
    Connected,
    /// The connection dropped or was closed. Emitted at most once per
    /// connection, with the transport's reason when it gave one.
    Disconnected { reason: Option<String> },
    /// The transport is retrying the connection.
    Reconnecting { attempt: u32 },
    /// The server ordered this connection closed.
    ForceDisconnect { reason: ForceDisconnectReason },

    /// Periodic server heartbeat.
    ServerInfo { online_players: u32, server_time: u64 },
    /// Position in the login queue while the server is saturated.
    LoginQueue { position: u32 },

    /// The client entered a room (also emitted on a full room resync).
    RoomJoined { room: Arc<RoomState> },
    /// The client left its room.
    RoomLeft,
    /// Room properties changed while inside it.
    RoomUpdated { room: Arc<RoomState> },
    /// Another member entered the current room.
    MemberJoined { character: Arc<CharacterState> },
    /// Another member left the current room.
    MemberLeft { member_number: u32 },

    /// A chat-room message arrived.
    ChatMessage { message: ReceivedChatMessage },
    /// A minigame response arrived.
    GameResponse { response: GameResponseData },

    /// A member's full character data was replaced.
    CharacterUpdated {
        member_number: u32,
        character: Arc<CharacterState>,
    },
    /// A member changed a facial expression. `name: None` clears it.
    ExpressionChanged {
        member_number: u32,
        name: Option<String>,
        group: String,
    },
    /// A member changed their pose set.
    PoseChanged {
        member_number: u32,
        poses: Vec<String>,
    },
    /// A member's arousal meter changed.
    ArousalChanged {
        member_number: u32,
        arousal: ArousalSyncMessage,
    },
    /// An item was applied to or removed from a member.
    ItemChanged {
        source: Option<u32>,
        item: ItemSyncMessage,
    },
    /// A member moved on the room map.
    MapDataChanged { member_number: u32 },
    /// The room's member order changed.
    PlayersReordered { order: Vec<u32> },

    /// A beep (out-of-room direct message) arrived.
    BeepReceived { beep: BeepMessage },
    /// An account query answer arrived. Also completes the matching
    /// request future when one is waiting.
    AccountQueryResult {
        query: String,
        result: AccountQueryResult,
    },
}

impl ParlorEvent {
    /// The kind tag used for subscription routing.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::Disconnected { .. } => EventKind::Disconnected,
            Self::Reconnecting { .. } => EventKind::Reconnecting,
            Self::ForceDisconnect { .. } => EventKind::ForceDisconnect,
            Self::ServerInfo { .. } => EventKind::ServerInfo,
            Self::LoginQueue { .. } => EventKind::LoginQueue,
            Self::RoomJoined { .. } => EventKind::RoomJoined,
            Self::RoomLeft => EventKind::RoomLeft,
            Self::RoomUpdated { .. } => EventKind::RoomUpdated,
            Self::MemberJoined { .. } => EventKind::MemberJoined,
            Self::MemberLeft { .. } => EventKind::MemberLeft,
            Self::ChatMessage { .. } => EventKind::ChatMessage,
            Self::GameResponse { .. } => EventKind::GameResponse,
            Self::CharacterUpdated { .. } => EventKind::CharacterUpdated,
            Self::ExpressionChanged { .. } => EventKind::ExpressionChanged,
            Self::PoseChanged { .. } => EventKind::PoseChanged,
            Self::ArousalChanged { .. } => EventKind::ArousalChanged,
            Self::ItemChanged { .. } => EventKind::ItemChanged,
            Self::MapDataChanged { .. } => EventKind::MapDataChanged,
            Self::PlayersReordered { .. } => EventKind::PlayersReordered,
            Self::BeepReceived { .. } => EventKind::BeepReceived,
            Self::AccountQueryResult { .. } => EventKind::AccountQueryResult,
        }
    }
}

/// Discriminant of [`ParlorEvent`], used as a subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EventKind {
    Connected,
    Disconnected,
    Reconnecting,
    ForceDisconnect,
    ServerInfo,
    LoginQueue,
    RoomJoined,
    RoomLeft,
    RoomUpdated,
    MemberJoined,
    MemberLeft,
    ChatMessage,
    GameResponse,
    CharacterUpdated,
    ExpressionChanged,
    PoseChanged,
    ArousalChanged,
    ItemChanged,
    MapDataChanged,
    PlayersReordered,
    BeepReceived,
    AccountQueryResult,
}
