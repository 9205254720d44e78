//! Wire types for the Parlor chat protocol.
//!
//! Every type in this module produces the exact JSON the server speaks:
//! PascalCase field names (`MemberNumber`, `SourceMemberNumber`, …) and
//! short-code enum values. Inbound enum values that the client does not
//! recognize decode to a documented fallback variant instead of failing the
//! whole payload — the server adds values faster than clients update.
//!
//! Request payloads only ever serialize fields that are actually set:
//! `Option` fields carry `skip_serializing_if` so that "omitted" and
//! "explicit null" stay distinguishable on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Wire enums ──────────────────────────────────────────────────────

/// Space a room lives in. The wire value is a short code (`""` is the
/// default space).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatRoomSpace {
    #[default]
    FemaleOnly,
    Mixed,
    MaleOnly,
    Asylum,
}

impl ChatRoomSpace {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::FemaleOnly => "",
            Self::Mixed => "X",
            Self::MaleOnly => "M",
            Self::Asylum => "Asylum",
        }
    }

    /// Parse a wire value; unknown values fall back to the default space.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "X" => Self::Mixed,
            "M" => Self::MaleOnly,
            "Asylum" => Self::Asylum,
            _ => Self::FemaleOnly,
        }
    }
}

impl From<String> for ChatRoomSpace {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatRoomSpace> for String {
    fn from(value: ChatRoomSpace) -> Self {
        value.as_wire().to_owned()
    }
}

/// Room language filter. `Any` is the empty wire value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatRoomLanguage {
    En,
    De,
    Fr,
    Es,
    Cn,
    Ru,
    Ua,
    #[default]
    Any,
}

impl ChatRoomLanguage {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::En => "EN",
            Self::De => "DE",
            Self::Fr => "FR",
            Self::Es => "ES",
            Self::Cn => "CN",
            Self::Ru => "RU",
            Self::Ua => "UA",
            Self::Any => "",
        }
    }

    /// Parse a wire value; unknown values fall back to `Any`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "EN" => Self::En,
            "DE" => Self::De,
            "FR" => Self::Fr,
            "ES" => Self::Es,
            "CN" => Self::Cn,
            "RU" => Self::Ru,
            "UA" => Self::Ua,
            _ => Self::Any,
        }
    }
}

impl From<String> for ChatRoomLanguage {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatRoomLanguage> for String {
    fn from(value: ChatRoomLanguage) -> Self {
        value.as_wire().to_owned()
    }
}

/// Optional minigame attached to a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatRoomGame {
    #[default]
    None,
    ClubCard,
    Larp,
    MagicBattle,
    Ggts,
    Prison,
}

impl ChatRoomGame {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::None => "",
            Self::ClubCard => "ClubCard",
            Self::Larp => "LARP",
            Self::MagicBattle => "MagicBattle",
            Self::Ggts => "GGTS",
            Self::Prison => "Prison",
        }
    }

    /// Parse a wire value; unknown values fall back to `None`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "ClubCard" => Self::ClubCard,
            "LARP" => Self::Larp,
            "MagicBattle" => Self::MagicBattle,
            "GGTS" => Self::Ggts,
            "Prison" => Self::Prison,
            _ => Self::None,
        }
    }
}

impl From<String> for ChatRoomGame {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatRoomGame> for String {
    fn from(value: ChatRoomGame) -> Self {
        value.as_wire().to_owned()
    }
}

/// Role filter used by room visibility and access lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatRoomAccessRole {
    #[default]
    All,
    Admin,
    Whitelist,
}

impl ChatRoomAccessRole {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Admin => "Admin",
            Self::Whitelist => "Whitelist",
        }
    }

    /// Parse a wire value; unknown values fall back to `All`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Admin" => Self::Admin,
            "Whitelist" => Self::Whitelist,
            _ => Self::All,
        }
    }
}

impl From<String> for ChatRoomAccessRole {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatRoomAccessRole> for String {
    fn from(value: ChatRoomAccessRole) -> Self {
        value.as_wire().to_owned()
    }
}

/// Content category a room can block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatRoomBlockCategory {
    Medical,
    Extreme,
    Pony,
    SciFi,
    Abdl,
    Fantasy,
    Smoking,
    Leashing,
    Photos,
    Arousal,
    /// Category the client does not recognize. Never serialized by the
    /// client; maps to an empty wire value if it ever is.
    Other,
}

impl ChatRoomBlockCategory {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Medical => "Medical",
            Self::Extreme => "Extreme",
            Self::Pony => "Pony",
            Self::SciFi => "SciFi",
            Self::Abdl => "ABDL",
            Self::Fantasy => "Fantasy",
            Self::Smoking => "Smoking",
            Self::Leashing => "Leashing",
            Self::Photos => "Photos",
            Self::Arousal => "Arousal",
            Self::Other => "",
        }
    }

    /// Parse a wire value; unknown values fall back to `Other`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Medical" => Self::Medical,
            "Extreme" => Self::Extreme,
            "Pony" => Self::Pony,
            "SciFi" => Self::SciFi,
            "ABDL" => Self::Abdl,
            "Fantasy" => Self::Fantasy,
            "Smoking" => Self::Smoking,
            "Leashing" => Self::Leashing,
            "Photos" => Self::Photos,
            "Arousal" => Self::Arousal,
            _ => Self::Other,
        }
    }
}

impl From<String> for ChatRoomBlockCategory {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatRoomBlockCategory> for String {
    fn from(value: ChatRoomBlockCategory) -> Self {
        value.as_wire().to_owned()
    }
}

/// Moderation verb carried by a `ChatRoomAdmin` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatRoomAdminAction {
    #[default]
    Update,
    MoveLeft,
    MoveRight,
    Kick,
    Ban,
    Unban,
    Promote,
    Demote,
    Shuffle,
    Swap,
}

impl ChatRoomAdminAction {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Update => "Update",
            Self::MoveLeft => "MoveLeft",
            Self::MoveRight => "MoveRight",
            Self::Kick => "Kick",
            Self::Ban => "Ban",
            Self::Unban => "Unban",
            Self::Promote => "Promote",
            Self::Demote => "Demote",
            Self::Shuffle => "Shuffle",
            Self::Swap => "Swap",
        }
    }

    /// Parse a wire value; unknown values fall back to `Update`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "MoveLeft" => Self::MoveLeft,
            "MoveRight" => Self::MoveRight,
            "Kick" => Self::Kick,
            "Ban" => Self::Ban,
            "Unban" => Self::Unban,
            "Promote" => Self::Promote,
            "Demote" => Self::Demote,
            "Shuffle" => Self::Shuffle,
            "Swap" => Self::Swap,
            _ => Self::Update,
        }
    }
}

impl From<String> for ChatRoomAdminAction {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatRoomAdminAction> for String {
    fn from(value: ChatRoomAdminAction) -> Self {
        value.as_wire().to_owned()
    }
}

/// Kind of a chat-room message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatMessageType {
    #[default]
    Chat,
    Whisper,
    Emote,
    Action,
    Activity,
    Hidden,
    ServerMessage,
    Status,
    LocalMessage,
}

impl ChatMessageType {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Whisper => "Whisper",
            Self::Emote => "Emote",
            Self::Action => "Action",
            Self::Activity => "Activity",
            Self::Hidden => "Hidden",
            Self::ServerMessage => "ServerMessage",
            Self::Status => "Status",
            Self::LocalMessage => "LocalMessage",
        }
    }

    /// Parse a wire value; unknown values fall back to `Chat`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "Whisper" => Self::Whisper,
            "Emote" => Self::Emote,
            "Action" => Self::Action,
            "Activity" => Self::Activity,
            "Hidden" => Self::Hidden,
            "ServerMessage" => Self::ServerMessage,
            "Status" => Self::Status,
            "LocalMessage" => Self::LocalMessage,
            _ => Self::Chat,
        }
    }
}

impl From<String> for ChatMessageType {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ChatMessageType> for String {
    fn from(value: ChatMessageType) -> Self {
        value.as_wire().to_owned()
    }
}

/// Reason carried by a server-initiated `ForceDisconnect`.
///
/// Both known reasons are terminal: a higher layer should suppress automatic
/// reconnection when it sees one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ForceDisconnectReason {
    /// The account logged in from somewhere else.
    DuplicatedLogin,
    /// The server kicked this connection for sending too fast.
    RateLimited,
    #[default]
    Unknown,
}

impl ForceDisconnectReason {
    /// Wire representation of this variant.
    pub fn as_wire(self) -> &'static str {
        match self {
            Self::DuplicatedLogin => "ErrorDuplicatedLogin",
            Self::RateLimited => "ErrorRateLimited",
            Self::Unknown => "",
        }
    }

    /// Parse a wire value; unknown values fall back to `Unknown`.
    pub fn from_wire(value: &str) -> Self {
        match value {
            "ErrorDuplicatedLogin" => Self::DuplicatedLogin,
            "ErrorRateLimited" => Self::RateLimited,
            _ => Self::Unknown,
        }
    }
}

impl From<String> for ForceDisconnectReason {
    fn from(value: String) -> Self {
        Self::from_wire(&value)
    }
}

impl From<ForceDisconnectReason> for String {
    fn from(value: ForceDisconnectReason) -> Self {
        value.as_wire().to_owned()
    }
}

// ── Shared wire structs ─────────────────────────────────────────────

/// One worn item, keyed by its body `Group`. A character's appearance holds
/// at most one bundle per group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemBundle {
    pub group: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub craft: Option<Value>,
}

impl ItemBundle {
    /// Create a bare bundle with just a group and asset name.
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
            color: None,
            difficulty: None,
            property: None,
            craft: None,
        }
    }
}

/// Ownership record between two members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ownership {
    pub member_number: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Lovership record between two members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Lovership {
    pub member_number: u32,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<u64>,
}

/// One learned skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Skill {
    #[serde(rename = "Type")]
    pub kind: String,
    pub level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

/// One reputation axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Reputation {
    #[serde(rename = "Type")]
    pub kind: String,
    pub value: i32,
}

/// Account difficulty setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Difficulty {
    pub level: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_change: Option<u64>,
}

/// Custom room decoration (image / music URLs).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatRoomCustomData {
    #[serde(rename = "ImageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "MusicURL", skip_serializing_if = "Option::is_none")]
    pub music_url: Option<String>,
}

/// Map layout attached to a room at creation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomMapData {
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tiles: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Value>,
}

// ── Auth ────────────────────────────────────────────────────────────

/// Payload of an outbound `AccountLogin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginRequest {
    pub account_name: String,
    pub password: String,
}

/// Payload of an outbound `AccountCreate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateAccountRequest {
    pub name: String,
    pub account_name: String,
    pub password: String,
    pub email: String,
}

/// Payload of an outbound `PasswordResetProcess`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordResetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

/// Typed outcome of a login request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginResult {
    /// Authenticated; carries the full server account snapshot.
    Success(Box<ServerAccountData>),
    /// The server rejected the credentials with a reason string.
    Error(String),
}

/// Typed outcome of an account-creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateAccountResult {
    Success,
    Error(String),
}

/// Typed outcome of a password-reset request (either step).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordResetResult {
    /// Step one succeeded; a reset number was mailed out.
    EmailSent,
    /// Step two succeeded; the password has been changed.
    PasswordResetSuccessful,
    Error(String),
}

// ── Account data ────────────────────────────────────────────────────

/// Full account snapshot sent by the server in a successful `LoginResponse`.
///
/// Only the fields the client interprets are typed; everything else the
/// server includes lands in `extra` and is preserved verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerAccountData {
    #[serde(rename = "ID")]
    pub id: String,
    pub member_number: u32,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub money: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lovership: Option<Vec<Lovership>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Vec<ItemBundle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_pose: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friend_list: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_list: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_list: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ghost_list: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skill: Option<Vec<Skill>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation: Option<Vec<Reputation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Uninterpreted account fields (settings blobs, inventory, …).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of an outbound `AccountQuery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountQueryRequest {
    pub query: String,
}

/// Payload of an inbound `AccountQueryResult`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountQueryResult {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// Payload of an outbound `AccountBeep`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BeepRequest {
    pub member_number: u32,
    #[serde(default)]
    pub beep_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_secret: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Payload of an inbound `AccountBeep`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BeepMessage {
    pub member_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_room_space: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beep_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ── Rooms ───────────────────────────────────────────────────────────

/// Payload of an outbound `ChatRoomSearch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomSearchRequest {
    pub query: String,
    pub space: ChatRoomSpace,
    pub game: ChatRoomGame,
    pub full_rooms: bool,
    pub language: ChatRoomLanguage,
    pub show_locked: bool,
    pub search_descs: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
}

impl Default for ChatRoomSearchRequest {
    fn default() -> Self {
        Self {
            query: String::new(),
            space: ChatRoomSpace::default(),
            game: ChatRoomGame::default(),
            full_rooms: false,
            language: ChatRoomLanguage::default(),
            show_locked: true,
            search_descs: false,
            map_types: None,
            ignore: None,
        }
    }
}

/// One entry of an inbound `ChatRoomSearchResult` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomSearchResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member_limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_member_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<ChatRoomGame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friends: Option<Vec<FriendEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_category: Option<Vec<ChatRoomBlockCategory>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<ChatRoomLanguage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<ChatRoomSpace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<f64>,
}

/// Friend-in-room entry inside a search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FriendEntry {
    pub member_name: String,
    pub member_number: u32,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// Payload of an outbound `ChatRoomCreate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomCreateRequest {
    pub name: String,
    pub description: String,
    pub background: String,
    pub limit: u32,
    pub admin: Vec<u32>,
    pub ban: Vec<u32>,
    pub whitelist: Vec<u32>,
    pub game: ChatRoomGame,
    pub visibility: Vec<ChatRoomAccessRole>,
    pub access: Vec<ChatRoomAccessRole>,
    pub block_category: Vec<ChatRoomBlockCategory>,
    pub language: ChatRoomLanguage,
    pub space: ChatRoomSpace,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_data: Option<ChatRoomMapData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<ChatRoomCustomData>,
}

impl ChatRoomCreateRequest {
    /// Create room settings with the required fields and server defaults for
    /// everything else. `admin` should normally contain the creator.
    pub fn new(name: impl Into<String>, admin: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            background: "MainHall".to_owned(),
            limit: 10,
            admin,
            ban: Vec::new(),
            whitelist: Vec::new(),
            game: ChatRoomGame::None,
            visibility: vec![ChatRoomAccessRole::All],
            access: vec![ChatRoomAccessRole::All],
            block_category: Vec::new(),
            language: ChatRoomLanguage::Any,
            space: ChatRoomSpace::default(),
            map_data: None,
            custom: None,
        }
    }

    /// Set the room description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the background name.
    #[must_use]
    pub fn with_background(mut self, background: impl Into<String>) -> Self {
        self.background = background.into();
        self
    }

    /// Set the member limit.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set the room space.
    #[must_use]
    pub fn with_space(mut self, space: ChatRoomSpace) -> Self {
        self.space = space;
        self
    }

    /// Set the room language.
    #[must_use]
    pub fn with_language(mut self, language: ChatRoomLanguage) -> Self {
        self.language = language;
        self
    }

    /// Set the attached minigame.
    #[must_use]
    pub fn with_game(mut self, game: ChatRoomGame) -> Self {
        self.game = game;
        self
    }
}

/// Payload of an outbound `ChatRoomAdmin`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomAdminRequest {
    pub action: ChatRoomAdminAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_member_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination_member_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<Value>,
}

impl ChatRoomAdminRequest {
    /// Build an admin request that only carries the action verb.
    pub fn action(action: ChatRoomAdminAction) -> Self {
        Self {
            action,
            member_number: None,
            target_member_number: None,
            destination_member_number: None,
            publish: None,
            room: None,
        }
    }

    /// Build an admin request targeting one member.
    pub fn member(action: ChatRoomAdminAction, member_number: u32) -> Self {
        Self {
            member_number: Some(member_number),
            ..Self::action(action)
        }
    }
}

/// Updatable room settings, as sent with a `ChatRoomAdmin` `Update` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomSettings {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<ChatRoomGame>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<ChatRoomAccessRole>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Vec<ChatRoomAccessRole>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_category: Option<Vec<ChatRoomBlockCategory>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<ChatRoomLanguage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub space: Option<ChatRoomSpace>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom: Option<ChatRoomCustomData>,
}

/// Typed outcome of a room join request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomJoinResult {
    Success,
    Error(String),
}

/// Typed outcome of a room creation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomCreateResult {
    Success,
    Error(String),
}

// ── Chat ────────────────────────────────────────────────────────────

/// Payload of an outbound `ChatRoomChat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutgoingChatMessage {
    pub content: String,
    #[serde(rename = "Type")]
    pub kind: ChatMessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Vec<Value>>,
}

/// Payload of an inbound `ChatRoomMessage`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReceivedChatMessage {
    pub sender: u32,
    pub content: String,
    #[serde(rename = "Type")]
    pub kind: ChatMessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Value>,
}

/// Payload of an inbound `ChatRoomGameResponse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameResponseData {
    pub sender: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Constructors for the tagged objects carried in a chat message
/// `Dictionary` array.
pub mod dictionary {
    use serde_json::{json, Value};

    /// Reference the character a message originates from.
    pub fn source_character(member_number: u32) -> Value {
        json!({ "SourceCharacter": member_number })
    }

    /// Reference the character a message targets.
    pub fn target_character(member_number: u32) -> Value {
        json!({ "TargetCharacter": member_number })
    }

    /// Reference a focused body group.
    pub fn focus_group(group_name: &str) -> Value {
        json!({ "FocusGroupName": group_name })
    }

    /// Substitute `text` for `tag` in the rendered message.
    pub fn text(tag: &str, text: &str) -> Value {
        json!({ "Tag": tag, "Text": text })
    }

    /// Attach a unique message id (used for replies and deduplication).
    pub fn msg_id(id: &str) -> Value {
        json!({ "Tag": "MsgId", "MsgId": id })
    }

    /// Mark a message as a reply to an earlier message id.
    pub fn reply_id(id: &str) -> Value {
        json!({ "Tag": "ReplyId", "ReplyId": id })
    }
}

// ── Character updates (outbound) ────────────────────────────────────

/// Payload of an outbound `ChatRoomCharacterExpressionUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionUpdate {
    pub name: String,
    pub group: String,
    pub appearance: Vec<ItemBundle>,
}

/// Payload of an outbound `ChatRoomCharacterPoseUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoseUpdate {
    pub pose: Vec<String>,
}

/// Payload of an outbound `ChatRoomCharacterItemUpdate`.
///
/// `name: None` asks the server to remove whatever occupies `group` on the
/// target character.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUpdate {
    pub target: u32,
    pub group: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub craft: Option<Value>,
}

impl ItemUpdate {
    /// Update that removes whatever occupies `group` on the target.
    pub fn remove(target: u32, group: impl Into<String>) -> Self {
        Self {
            target,
            group: group.into(),
            name: None,
            color: None,
            difficulty: None,
            property: None,
            craft: None,
        }
    }

    /// Update that puts `name` into `group` on the target.
    pub fn apply(target: u32, group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::remove(target, group)
        }
    }

    /// Set the item color payload.
    #[must_use]
    pub fn with_color(mut self, color: Value) -> Self {
        self.color = Some(color);
        self
    }

    /// Set the item property payload.
    #[must_use]
    pub fn with_property(mut self, property: Value) -> Self {
        self.property = Some(property);
        self
    }
}

/// Payload of an outbound `ChatRoomCharacterArousalUpdate`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArousalUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orgasm_timer: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orgasm_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_timer: Option<u64>,
}

/// Payload of an outbound `ChatRoomCharacterMapDataUpdate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapDataUpdate {
    pub pos: MapPosition,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_state: Option<Value>,
}

/// Tile position on a room map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapPosition {
    pub x: i32,
    pub y: i32,
}

/// Payload of an outbound `ChatRoomCharacterUpdate` (full appearance push).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CharacterUpdate {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_pose: Option<Vec<String>>,
    pub appearance: Vec<ItemBundle>,
}

// ── Inbound sync messages ───────────────────────────────────────────

/// Payload of an inbound `ServerInfo` heartbeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    pub time: u64,
    pub online_players: u32,
}

/// Wire shape of one character inside sync payloads.
///
/// `member_number` and `name` are mandatory; everything else defaults, and
/// any field the client does not interpret is preserved in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CharacterBundle {
    pub member_number: u32,
    pub name: String,
    #[serde(rename = "ID", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Vec<ItemBundle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_pose: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ownership: Option<Ownership>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lovership: Option<Vec<Lovership>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reputation: Option<Vec<Reputation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_list: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_list: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    /// Uninterpreted character fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Payload of an inbound `ChatRoomSync` (full room replace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomSyncMessage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<ChatRoomGame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<ChatRoomAccessRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Vec<ChatRoomAccessRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_category: Option<Vec<ChatRoomBlockCategory>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<ChatRoomLanguage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<ChatRoomSpace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<ChatRoomCustomData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_member_number: Option<u32>,
}

/// Payload of an inbound `ChatRoomSyncRoomProperties` (partial merge).
///
/// An absent field means "unchanged", not "clear". Identical shape to
/// [`RoomSyncMessage`] minus the character list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoomPropertiesSyncMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ban: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locked: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<ChatRoomGame>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Vec<ChatRoomAccessRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access: Option<Vec<ChatRoomAccessRole>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_category: Option<Vec<ChatRoomBlockCategory>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<ChatRoomLanguage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<ChatRoomSpace>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<ChatRoomCustomData>,
}

/// Payload of an inbound `ChatRoomSyncMemberJoin`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberJoinMessage {
    pub source_member_number: u32,
    pub character: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub white_listed_by: Option<Vec<u32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub black_listed_by: Option<Vec<u32>>,
}

/// Payload of an inbound `ChatRoomSyncMemberLeave`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberLeaveMessage {
    pub source_member_number: u32,
}

/// Payload of an inbound `ChatRoomSyncCharacter` / `ChatRoomSyncSingle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CharacterSyncMessage {
    pub source_member_number: u32,
    pub character: Value,
}

/// Payload of an inbound `ChatRoomSyncExpression`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExpressionSyncMessage {
    pub member_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub group: String,
}

/// Payload of an inbound `ChatRoomSyncPose`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PoseSyncMessage {
    pub member_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<Vec<String>>,
}

/// Payload of an inbound `ChatRoomSyncArousal`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ArousalSyncMessage {
    pub member_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orgasm_timer: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orgasm_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress_timer: Option<f64>,
}

/// Payload of an inbound `ChatRoomSyncItem`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemSyncMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<u32>,
    pub item: ItemSyncEntry,
}

/// The item delta inside an `ChatRoomSyncItem`. A missing or empty `Name`
/// means "remove whatever occupies `Group`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemSyncEntry {
    pub target: u32,
    pub group: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub property: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub craft: Option<Value>,
}

/// Payload of an inbound `ChatRoomSyncMapData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MapDataSyncMessage {
    pub member_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_data: Option<Value>,
}

/// Payload of an inbound `ChatRoomSyncReorderPlayers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReorderPlayersSyncMessage {
    pub player_order: Vec<u32>,
}

/// Payload of an inbound `ChatRoomAllowItem` answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllowItemMessage {
    pub member_number: u32,
    pub allow_item: bool,
}
