//! Async client for the Parlor chat protocol.
//!
//! [`ParlorClient`] is a thin handle in front of a background worker task.
//! The worker owns the transport exclusively and is the only place state
//! snapshots are mutated and events dispatched; handle methods either queue
//! outbound messages (fire-and-forget) or additionally await a correlated
//! response (request-style, the `async` methods).
//!
//! # Example
//!
//! ```rust,ignore
//! let client = ParlorClient::builder()
//!     .config(ParlorConfig::new().with_server_url("wss://chat.example.test"))
//!     .on(EventKind::ChatMessage, |event| println!("{event:?}"))
//!     .build()?;
//!
//! client.connect()?;
//! let login = client.login("alice", "hunter2").await?;
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use crate::account::{AccountPatch, AccountUpdater};
use crate::bus::{EventBus, Subscription};
use crate::error::{ParlorError, Result};
use crate::event::{EventKind, ParlorEvent};
use crate::pending::{PendingRequests, ResponseValue, Waiter};
use crate::protocol::{
    AccountQueryRequest, AccountQueryResult, ArousalUpdate, BeepRequest, CharacterUpdate,
    ChatMessageType, ChatRoomAdminAction, ChatRoomAdminRequest, ChatRoomCreateRequest,
    ChatRoomSearchRequest, ChatRoomSearchResult, ChatRoomSettings, CreateAccountRequest,
    CreateAccountResult, ExpressionUpdate, ItemUpdate, LoginRequest, LoginResult, MapDataUpdate,
    MapPosition, OutgoingChatMessage, PasswordResetRequest, PasswordResetResult, PoseUpdate,
    RoomCreateResult, RoomJoinResult, dictionary,
};
use crate::rate_limit::RateLimiter;
use crate::router::EventRouter;
use crate::state::{ConnectionState, PlayerState, RoomState, StateHandle};
use crate::transport::{ConnectionProperties, Transport, TransportSignal};

/// How often the worker drains the rate limiter and checks deadlines.
const PUMP_INTERVAL: Duration = Duration::from_millis(100);

/// Default timeout for the graceful shutdown.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

// ── Configuration ───────────────────────────────────────────────────

/// Configuration for a [`ParlorClient`].
///
/// Every field has a working default; [`ParlorConfig::new`] connects to a
/// local server with the server's stock rate limit.
///
/// ```
/// use std::time::Duration;
/// use parlor_client::client::ParlorConfig;
///
/// let config = ParlorConfig::new()
///     .with_server_url("wss://chat.example.test")
///     .with_request_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ParlorConfig {
    /// Server URL handed to the transport on connect.
    pub server_url: String,
    /// Messages allowed per rate-limit window.
    pub rate_limit_messages: usize,
    /// Length of the rate-limit window.
    pub rate_limit_window: Duration,
    /// Quiet time before a batched account update flushes.
    pub account_debounce: Duration,
    /// Upper bound on how long an account update batch may age before it
    /// flushes regardless of ongoing writes.
    pub account_max_wait: Duration,
    /// How long a request-style call waits for its response.
    pub request_timeout: Duration,
    /// How long [`ParlorClient::shutdown`] waits for the worker before
    /// aborting it.
    pub shutdown_timeout: Duration,
}

impl ParlorConfig {
    /// Configuration with defaults matching the stock server.
    pub fn new() -> Self {
        Self {
            server_url: "http://localhost:4288".to_owned(),
            rate_limit_messages: 14,
            rate_limit_window: Duration::from_millis(1200),
            account_debounce: Duration::from_millis(2000),
            account_max_wait: Duration::from_millis(8000),
            request_timeout: Duration::from_secs(30),
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    /// Set the server URL.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    /// Set the rate limit (messages per window).
    #[must_use]
    pub fn with_rate_limit(mut self, messages: usize, window: Duration) -> Self {
        self.rate_limit_messages = messages.max(1);
        self.rate_limit_window = window;
        self
    }

    /// Set the account update debounce interval.
    #[must_use]
    pub fn with_account_debounce(mut self, debounce: Duration) -> Self {
        self.account_debounce = debounce;
        self
    }

    /// Set the account update maximum batching age.
    #[must_use]
    pub fn with_account_max_wait(mut self, max_wait: Duration) -> Self {
        self.account_max_wait = max_wait;
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the graceful shutdown timeout. Zero aborts the worker
    /// immediately on shutdown.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

impl Default for ParlorConfig {
    fn default() -> Self {
        Self::new()
    }
}

// ── Commands ────────────────────────────────────────────────────────

/// Instruction from the handle to the worker. Outbound protocol messages do
/// not travel through here; they go into the rate limiter queue, and a
/// `Pump` nudges the worker to drain it.
enum Cmd {
    Connect { url: String },
    Disconnect,
    Pump,
    FlushAccount,
    LeaveRoom,
}

// ── Builder ─────────────────────────────────────────────────────────

type DeferredHandler = Box<dyn Fn(&ParlorEvent) + Send + Sync>;

/// Builder for [`ParlorClient`].
///
/// Subscriptions registered here are installed before the worker starts, so
/// no event can slip past them.
#[derive(Default)]
pub struct ParlorClientBuilder {
    config: Option<ParlorConfig>,
    transport: Option<Box<dyn Transport>>,
    properties: ConnectionProperties,
    handlers: Vec<(Option<EventKind>, DeferredHandler)>,
}

impl ParlorClientBuilder {
    /// Set the configuration. Defaults to [`ParlorConfig::new`].
    #[must_use]
    pub fn config(mut self, config: ParlorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom transport instead of the default WebSocket transport.
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Set the transport connection properties (headers, proxy, …).
    #[must_use]
    pub fn connection_properties(mut self, properties: ConnectionProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Register a handler for one event kind.
    #[must_use]
    pub fn on<F>(mut self, kind: EventKind, handler: F) -> Self
    where
        F: Fn(&ParlorEvent) + Send + Sync + 'static,
    {
        self.handlers.push((Some(kind), Box::new(handler)));
        self
    }

    /// Register a handler for every event.
    #[must_use]
    pub fn on_any<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ParlorEvent) + Send + Sync + 'static,
    {
        self.handlers.push((None, Box::new(handler)));
        self
    }

    /// Build the client and spawn its worker task.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::NoTransport`] when no transport was supplied
    /// and the `transport-websocket` feature is disabled.
    pub fn build(self) -> Result<ParlorClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };
        let config = self.config.unwrap_or_default();

        let bus = EventBus::new();
        for (kind, handler) in self.handlers {
            match kind {
                Some(kind) => {
                    bus.subscribe(kind, handler);
                }
                None => {
                    bus.subscribe_any(handler);
                }
            }
        }

        Ok(ParlorClient::start_with(
            transport,
            config,
            self.properties,
            bus,
        ))
    }
}

#[cfg(feature = "transport-websocket")]
fn default_transport() -> Result<Box<dyn Transport>> {
    Ok(Box::new(crate::transports::WebSocketTransport::new()))
}

#[cfg(not(feature = "transport-websocket"))]
fn default_transport() -> Result<Box<dyn Transport>> {
    Err(ParlorError::NoTransport)
}

// ── Client handle ───────────────────────────────────────────────────

/// Handle to a running Parlor client.
///
/// Cheap to share behind an `Arc`; every method takes `&self` except
/// [`shutdown`](Self::shutdown). Dropping the handle aborts the worker.
pub struct ParlorClient {
    cmd_tx: mpsc::UnboundedSender<Cmd>,
    state: Arc<StateHandle>,
    bus: EventBus,
    pending: Arc<PendingRequests>,
    limiter: Arc<RateLimiter>,
    account: Arc<AccountUpdater>,
    config: ParlorConfig,
    task: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl ParlorClient {
    /// Start building a client.
    pub fn builder() -> ParlorClientBuilder {
        ParlorClientBuilder::default()
    }

    /// Start a client over the given transport with default properties.
    pub fn start(transport: impl Transport, config: ParlorConfig) -> Self {
        Self::start_with(
            Box::new(transport),
            config,
            ConnectionProperties::new(),
            EventBus::new(),
        )
    }

    fn start_with(
        transport: Box<dyn Transport>,
        config: ParlorConfig,
        properties: ConnectionProperties,
        bus: EventBus,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let state = Arc::new(StateHandle::default());
        let pending = Arc::new(PendingRequests::new(config.request_timeout));
        let limiter = Arc::new(RateLimiter::new(
            config.rate_limit_messages,
            config.rate_limit_window,
        ));
        let account = Arc::new(AccountUpdater::new(
            config.account_debounce,
            config.account_max_wait,
        ));

        let worker = Worker {
            transport,
            properties,
            state: Arc::clone(&state),
            bus: bus.clone(),
            pending: Arc::clone(&pending),
            limiter: Arc::clone(&limiter),
            account: Arc::clone(&account),
            router: EventRouter::new(bus.clone(), Arc::clone(&pending), Arc::clone(&state)),
        };
        let task = tokio::spawn(worker.run(cmd_rx, shutdown_rx));

        Self {
            cmd_tx,
            state,
            bus,
            pending,
            limiter,
            account,
            config,
            task: Some(task),
            shutdown_tx: Some(shutdown_tx),
        }
    }

    // ── Connection ──────────────────────────────────────────────────

    /// Connect to the configured server URL.
    ///
    /// Connection progress arrives as events ([`ParlorEvent::Connected`],
    /// [`ParlorEvent::Reconnecting`], …).
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn connect(&self) -> Result<()> {
        self.connect_to(self.config.server_url.clone())
    }

    /// Connect to an explicit URL, overriding the configured one.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn connect_to(&self, url: impl Into<String>) -> Result<()> {
        self.command(Cmd::Connect { url: url.into() })
    }

    /// Disconnect from the server. Flushes any batched account update
    /// first. The client can connect again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn disconnect(&self) -> Result<()> {
        self.command(Cmd::Disconnect)
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// Register a handler for one event kind.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> Subscription
    where
        F: Fn(&ParlorEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Register a handler for every event.
    pub fn on_any<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ParlorEvent) + Send + Sync + 'static,
    {
        self.bus.subscribe_any(handler)
    }

    // ── State accessors ─────────────────────────────────────────────

    /// Current connection lifecycle state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection_state()
    }

    /// Snapshot of the logged-in account, if authenticated.
    pub fn player(&self) -> Option<Arc<PlayerState>> {
        self.state.player()
    }

    /// Snapshot of the current room, if inside one.
    pub fn room(&self) -> Option<Arc<RoomState>> {
        self.state.room()
    }

    /// Number of outbound messages still waiting on the rate limiter.
    pub fn queued_messages(&self) -> usize {
        self.limiter.pending_count()
    }

    // ── Auth ────────────────────────────────────────────────────────

    /// Log in. On success the [`player`](Self::player) snapshot is
    /// populated before this returns.
    ///
    /// # Errors
    ///
    /// Fails with [`ParlorError::RequestTimeout`] when no response arrives
    /// in time, or [`ParlorError::RequestCancelled`] if the connection
    /// drops first. A rejected login is `Ok(LoginResult::Error(_))`.
    pub async fn login(
        &self,
        account_name: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<LoginResult> {
        let request = LoginRequest {
            account_name: account_name.into(),
            password: password.into(),
        };
        let response = self
            .request("LoginResponse", "AccountLogin", serde_json::to_value(request)?)
            .await?;
        match response {
            ResponseValue::Login(result) => Ok(result),
            _ => Err(unexpected("LoginResponse")),
        }
    }

    /// Create a new account.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn create_account(&self, request: CreateAccountRequest) -> Result<CreateAccountResult> {
        let response = self
            .request("CreationResponse", "AccountCreate", serde_json::to_value(request)?)
            .await?;
        match response {
            ResponseValue::Creation(result) => Ok(result),
            _ => Err(unexpected("CreationResponse")),
        }
    }

    /// Start a password reset; the server mails a reset number.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn reset_password(&self, email: impl Into<String>) -> Result<PasswordResetResult> {
        let response = self
            .request(
                "PasswordResetResponse",
                "PasswordReset",
                Value::String(email.into()),
            )
            .await?;
        match response {
            ResponseValue::PasswordReset(result) => Ok(result),
            _ => Err(unexpected("PasswordResetResponse")),
        }
    }

    /// Complete a password reset with the mailed reset number.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn reset_password_process(
        &self,
        account_name: impl Into<String>,
        reset_number: impl Into<String>,
        new_password: impl Into<String>,
    ) -> Result<PasswordResetResult> {
        let request = PasswordResetRequest {
            account_name: Some(account_name.into()),
            reset_number: Some(reset_number.into()),
            new_password: Some(new_password.into()),
        };
        let response = self
            .request(
                "PasswordResetResponse",
                "PasswordResetProcess",
                serde_json::to_value(request)?,
            )
            .await?;
        match response {
            ResponseValue::PasswordReset(result) => Ok(result),
            _ => Err(unexpected("PasswordResetResponse")),
        }
    }

    // ── Rooms ───────────────────────────────────────────────────────

    /// Search for rooms. The query string is matched case-insensitively by
    /// the server against uppercased names, so it is uppercased and trimmed
    /// before sending.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn search_rooms(
        &self,
        mut query: ChatRoomSearchRequest,
    ) -> Result<Vec<ChatRoomSearchResult>> {
        query.query = query.query.trim().to_uppercase();
        let response = self
            .request(
                "ChatRoomSearchResult",
                "ChatRoomSearch",
                serde_json::to_value(query)?,
            )
            .await?;
        match response {
            ResponseValue::Search(results) => Ok(results),
            _ => Err(unexpected("ChatRoomSearchResult")),
        }
    }

    /// Create a room. On success the server also moves the client into it,
    /// which arrives as [`ParlorEvent::RoomJoined`].
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn create_room(&self, settings: ChatRoomCreateRequest) -> Result<RoomCreateResult> {
        let response = self
            .request(
                "ChatRoomCreateResponse",
                "ChatRoomCreate",
                serde_json::to_value(settings)?,
            )
            .await?;
        match response {
            ResponseValue::RoomCreate(result) => Ok(result),
            _ => Err(unexpected("ChatRoomCreateResponse")),
        }
    }

    /// Join a room by name.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn join_room(&self, name: impl Into<String>) -> Result<RoomJoinResult> {
        let response = self
            .request(
                "ChatRoomSearchResponse",
                "ChatRoomJoin",
                json!({ "Name": name.into() }),
            )
            .await?;
        match response {
            ResponseValue::RoomJoin(result) => Ok(result),
            _ => Err(unexpected("ChatRoomSearchResponse")),
        }
    }

    /// Leave the current room.
    ///
    /// The server does not acknowledge a leave, so local state is cleared
    /// and [`ParlorEvent::RoomLeft`] fires right away; any batched account
    /// update flushes first.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn leave_room(&self) -> Result<()> {
        self.command(Cmd::LeaveRoom)
    }

    /// Push new settings for the current room and return the server's
    /// response string (`"Updated"` on success).
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn update_room_settings(&self, settings: ChatRoomSettings) -> Result<String> {
        let request = ChatRoomAdminRequest {
            room: Some(serde_json::to_value(settings)?),
            ..ChatRoomAdminRequest::action(ChatRoomAdminAction::Update)
        };
        let response = self
            .request(
                "ChatRoomUpdateResponse",
                "ChatRoomAdmin",
                serde_json::to_value(request)?,
            )
            .await?;
        match response {
            ResponseValue::RoomUpdate(result) => Ok(result),
            _ => Err(unexpected("ChatRoomUpdateResponse")),
        }
    }

    /// Kick a member from the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn kick(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::Kick, member_number)
    }

    /// Ban a member from the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn ban(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::Ban, member_number)
    }

    /// Lift a ban.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn unban(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::Unban, member_number)
    }

    /// Promote a member to room admin.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn promote(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::Promote, member_number)
    }

    /// Demote a member from room admin.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn demote(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::Demote, member_number)
    }

    /// Move a member one position left in the room order.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn move_left(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::MoveLeft, member_number)
    }

    /// Move a member one position right in the room order.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn move_right(&self, member_number: u32) -> Result<()> {
        self.admin(ChatRoomAdminAction::MoveRight, member_number)
    }

    /// Shuffle the room's member order.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn shuffle(&self) -> Result<()> {
        let request = ChatRoomAdminRequest::action(ChatRoomAdminAction::Shuffle);
        self.enqueue("ChatRoomAdmin", serde_json::to_value(request)?)
    }

    /// Swap two members' positions in the room order.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn swap(&self, target: u32, destination: u32) -> Result<()> {
        let request = ChatRoomAdminRequest {
            target_member_number: Some(target),
            destination_member_number: Some(destination),
            ..ChatRoomAdminRequest::action(ChatRoomAdminAction::Swap)
        };
        self.enqueue("ChatRoomAdmin", serde_json::to_value(request)?)
    }

    fn admin(&self, action: ChatRoomAdminAction, member_number: u32) -> Result<()> {
        let request = ChatRoomAdminRequest::member(action, member_number);
        self.enqueue("ChatRoomAdmin", serde_json::to_value(request)?)
    }

    // ── Chat ────────────────────────────────────────────────────────

    /// Send a normal chat message to the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn send_chat(&self, content: impl Into<String>) -> Result<()> {
        self.send_message(tagged_message(content.into(), ChatMessageType::Chat, None))
    }

    /// Whisper to one member of the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn whisper(&self, target: u32, content: impl Into<String>) -> Result<()> {
        self.send_message(tagged_message(
            content.into(),
            ChatMessageType::Whisper,
            Some(target),
        ))
    }

    /// Send an emote to the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn emote(&self, content: impl Into<String>) -> Result<()> {
        self.send_message(tagged_message(content.into(), ChatMessageType::Emote, None))
    }

    /// Send a fully custom chat message.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn send_message(&self, message: OutgoingChatMessage) -> Result<()> {
        let payload = serde_json::to_value(message)?;
        self.enqueue("ChatRoomChat", payload)
    }

    /// Send raw minigame data to the current room.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn send_game(&self, data: Value) -> Result<()> {
        self.enqueue("ChatRoomGame", data)
    }

    // ── Character ───────────────────────────────────────────────────

    /// Publish an expression change.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_expression(&self, update: ExpressionUpdate) -> Result<()> {
        self.enqueue(
            "ChatRoomCharacterExpressionUpdate",
            serde_json::to_value(update)?,
        )
    }

    /// Publish a pose change.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_pose(&self, poses: Vec<String>) -> Result<()> {
        self.enqueue(
            "ChatRoomCharacterPoseUpdate",
            serde_json::to_value(PoseUpdate { pose: poses })?,
        )
    }

    /// Apply or remove one item on a member.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_item(&self, update: ItemUpdate) -> Result<()> {
        self.enqueue("ChatRoomCharacterItemUpdate", serde_json::to_value(update)?)
    }

    /// Publish an arousal change.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_arousal(&self, update: ArousalUpdate) -> Result<()> {
        self.enqueue(
            "ChatRoomCharacterArousalUpdate",
            serde_json::to_value(update)?,
        )
    }

    /// Publish a map position change.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_map_data(&self, pos: MapPosition, private_state: Option<Value>) -> Result<()> {
        self.enqueue(
            "ChatRoomCharacterMapDataUpdate",
            serde_json::to_value(MapDataUpdate { pos, private_state })?,
        )
    }

    /// Publish a full appearance replacement.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_appearance(&self, update: CharacterUpdate) -> Result<()> {
        self.enqueue("ChatRoomCharacterUpdate", serde_json::to_value(update)?)
    }

    // ── Social ──────────────────────────────────────────────────────

    /// Send a beep to another member.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn beep(&self, request: BeepRequest) -> Result<()> {
        self.enqueue("AccountBeep", serde_json::to_value(request)?)
    }

    /// Query which friends are online.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn query_online_friends(&self) -> Result<AccountQueryResult> {
        let request = AccountQueryRequest {
            query: "OnlineFriends".to_owned(),
        };
        let response = self
            .request(
                "AccountQueryResult_OnlineFriends",
                "AccountQuery",
                serde_json::to_value(request)?,
            )
            .await?;
        match response {
            ResponseValue::AccountQuery(result) => Ok(result),
            _ => Err(unexpected("AccountQueryResult_OnlineFriends")),
        }
    }

    /// Ask whether a member permits item interactions from us.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`login`](Self::login).
    pub async fn query_allow_item(&self, member_number: u32) -> Result<bool> {
        let key = format!("ChatRoomAllowItem_{member_number}");
        let response = self
            .request(
                &key,
                "ChatRoomAllowItem",
                json!({ "MemberNumber": member_number }),
            )
            .await?;
        match response {
            ResponseValue::AllowItem(allowed) => Ok(allowed),
            _ => Err(unexpected(&key)),
        }
    }

    // ── Account updates ─────────────────────────────────────────────

    /// Queue account field writes for a debounced flush.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn queue_account_update(&self, patch: AccountPatch) -> Result<()> {
        self.queue_account(patch, false)
    }

    /// Queue account field writes and flush the whole batch immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn update_account_now(&self, patch: AccountPatch) -> Result<()> {
        self.queue_account(patch, true)
    }

    /// Flush any batched account update right away.
    ///
    /// # Errors
    ///
    /// Returns [`ParlorError::ClientClosed`] if the worker has stopped.
    pub fn flush_account_updates(&self) -> Result<()> {
        self.command(Cmd::FlushAccount)
    }

    fn queue_account(&self, patch: AccountPatch, force: bool) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let flush_now = self
            .account
            .queue(patch.into_fields(), force, Instant::now());
        if flush_now {
            self.command(Cmd::FlushAccount)
        } else {
            self.command(Cmd::Pump)
        }
    }

    // ── Shutdown ────────────────────────────────────────────────────

    /// Shut down the client: close the transport, stop the worker, and
    /// drop all subscriptions. Outstanding requests fail with
    /// [`ParlorError::RequestCancelled`].
    pub async fn shutdown(&mut self) {
        debug!("shutdown requested");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(self.config.shutdown_timeout, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    warn!("worker terminated with join error: {join_err}");
                }
                Err(_) => {
                    warn!("worker did not exit within timeout; aborting task");
                    task.abort();
                    if let Err(join_err) = task.await {
                        debug!("worker aborted: {join_err}");
                    }
                }
            }
        }
        self.pending.cancel_all();
        self.bus.clear();
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn command(&self, cmd: Cmd) -> Result<()> {
        self.cmd_tx.send(cmd).map_err(|_| ParlorError::ClientClosed)
    }

    /// Queue an outbound message and nudge the worker.
    fn enqueue(&self, event: &str, payload: Value) -> Result<()> {
        self.limiter.enqueue(event, payload);
        self.command(Cmd::Pump)
    }

    /// Queue an outbound message and await the correlated response.
    async fn request(&self, key: &str, event: &str, payload: Value) -> Result<ResponseValue> {
        let waiter: Waiter = self.pending.create(key);
        self.enqueue(event, payload)?;
        match waiter.await {
            Ok(result) => result,
            // Sender dropped without resolving; treat like a cancellation.
            Err(_) => Err(ParlorError::RequestCancelled),
        }
    }
}

fn unexpected(key: &str) -> ParlorError {
    ParlorError::UnexpectedResponse { key: key.to_owned() }
}

fn tagged_message(
    content: String,
    kind: ChatMessageType,
    target: Option<u32>,
) -> OutgoingChatMessage {
    let id = uuid::Uuid::new_v4().to_string();
    OutgoingChatMessage {
        content,
        kind,
        target,
        dictionary: Some(vec![dictionary::msg_id(&id)]),
    }
}

impl std::fmt::Debug for ParlorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParlorClient")
            .field("connection_state", &self.connection_state())
            .field("queued_messages", &self.queued_messages())
            .field("has_task", &self.task.is_some())
            .finish()
    }
}

impl Drop for ParlorClient {
    fn drop(&mut self) {
        // `Drop` is synchronous, so a graceful shutdown (which awaits
        // `transport.close()`) is not possible here. Abort the worker so
        // it cannot outlive the handle.
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

// ── Worker ──────────────────────────────────────────────────────────

/// The background task that owns the transport and all state mutation.
struct Worker {
    transport: Box<dyn Transport>,
    properties: ConnectionProperties,
    state: Arc<StateHandle>,
    bus: EventBus,
    pending: Arc<PendingRequests>,
    limiter: Arc<RateLimiter>,
    account: Arc<AccountUpdater>,
    router: EventRouter,
}

impl Worker {
    async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<Cmd>, mut shutdown_rx: oneshot::Receiver<()>) {
        debug!("worker started");
        let mut tick = interval(PUMP_INTERVAL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_cmd(cmd).await,
                    // Handle dropped; nothing can reach us any more.
                    None => {
                        debug!("command channel closed, stopping worker");
                        let _ = self.transport.close().await;
                        self.handle_disconnect(Some("client shut down".to_owned()));
                        break;
                    }
                },

                _ = &mut shutdown_rx => {
                    debug!("shutdown signal received");
                    self.flush_account().await;
                    let _ = self.transport.close().await;
                    self.handle_disconnect(Some("client shut down".to_owned()));
                    break;
                }

                signal = self.transport.recv() => match signal {
                    Some(TransportSignal::Connected) => {
                        self.state.set_connection_state(ConnectionState::Connected);
                        self.bus.dispatch(&ParlorEvent::Connected);
                    }
                    Some(TransportSignal::Disconnected { reason }) => {
                        self.handle_disconnect(reason);
                    }
                    Some(TransportSignal::Reconnecting { attempt }) => {
                        self.bus.dispatch(&ParlorEvent::Reconnecting { attempt });
                    }
                    Some(TransportSignal::Event { name, payload }) => {
                        self.router.route(&name, payload);
                    }
                    None => {
                        debug!("transport permanently closed");
                        self.handle_disconnect(None);
                        break;
                    }
                },

                _ = tick.tick() => {
                    let now = Instant::now();
                    self.pending.expire_due(now);
                    if let Some(batch) = self.account.take_due(now) {
                        self.limiter.enqueue("AccountUpdate", Value::Object(batch));
                    }
                    self.pump().await;
                }
            }
        }
        debug!("worker exited");
    }

    async fn handle_cmd(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Connect { url } => {
                if let Err(error) = self.transport.connect(&url, &self.properties).await {
                    warn!(%error, url, "connect failed");
                }
            }
            Cmd::Disconnect => {
                self.flush_account().await;
                if let Err(error) = self.transport.close().await {
                    debug!(%error, "transport close error");
                }
                self.handle_disconnect(None);
            }
            Cmd::Pump => self.pump().await,
            Cmd::FlushAccount => {
                self.flush_account().await;
            }
            Cmd::LeaveRoom => {
                // Leaving while not in a room is a no-op.
                if self.state.room().is_none() {
                    return;
                }
                // No server acknowledgement exists for a leave; clear local
                // state up front and let any stale sync for the old room be
                // ignored.
                self.flush_account().await;
                self.state.set_room(None);
                if self.state.connection_state() == ConnectionState::InRoom {
                    self.state.set_connection_state(ConnectionState::LoggedIn);
                }
                self.limiter.enqueue("ChatRoomLeave", Value::String(String::new()));
                self.pump().await;
                self.bus.dispatch(&ParlorEvent::RoomLeft);
            }
        }
    }

    /// Queue any batched account update and push it out with the rest of
    /// the send queue.
    async fn flush_account(&mut self) {
        if let Some(batch) = self.account.take_batch() {
            self.limiter.enqueue("AccountUpdate", Value::Object(batch));
        }
        self.pump().await;
    }

    /// Drain whatever the rate limiter allows right now.
    async fn pump(&mut self) {
        if !self.transport.is_connected() {
            return;
        }
        for message in self.limiter.drain(Instant::now()) {
            if let Err(error) = self.transport.emit(&message.event, message.payload).await {
                warn!(%error, event = message.event, "transport send failed");
                self.handle_disconnect(Some(format!("transport send error: {error}")));
                return;
            }
        }
    }

    /// Reset per-connection state. Publishes `Disconnected` only on the
    /// transition out of a live connection, so repeated disconnect signals
    /// collapse into one event.
    fn handle_disconnect(&mut self, reason: Option<String>) {
        let previous = self.state.set_connection_state(ConnectionState::Disconnected);
        self.state.set_room(None);
        self.state.set_player(None);
        self.limiter.clear();
        self.account.clear();
        self.pending.cancel_all();
        if previous != ConnectionState::Disconnected {
            self.bus.dispatch(&ParlorEvent::Disconnected { reason });
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

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
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ParlorConfig::new();
        assert_eq!(config.server_url, "http://localhost:4288");
        assert_eq!(config.rate_limit_messages, 14);
        assert_eq!(config.rate_limit_window, Duration::from_millis(1200));
        assert_eq!(config.account_debounce, Duration::from_millis(2000));
        assert_eq!(config.account_max_wait, Duration::from_millis(8000));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(1));
    }

    #[test]
    fn config_builder_methods() {
        let config = ParlorConfig::new()
            .with_server_url("wss://example.test")
            .with_rate_limit(5, Duration::from_secs(1))
            .with_request_timeout(Duration::from_secs(5))
            .with_shutdown_timeout(Duration::from_millis(200));
        assert_eq!(config.server_url, "wss://example.test");
        assert_eq!(config.rate_limit_messages, 5);
        assert_eq!(config.rate_limit_window, Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(config.shutdown_timeout, Duration::from_millis(200));
    }

    #[test]
    fn rate_limit_is_clamped_to_one() {
        let config = ParlorConfig::new().with_rate_limit(0, Duration::from_secs(1));
        assert_eq!(config.rate_limit_messages, 1);
    }

    #[test]
    fn chat_messages_carry_a_msg_id_tag() {
        let message = tagged_message("hi".to_owned(), ChatMessageType::Chat, None);
        let dictionary = message.dictionary.unwrap();
        assert_eq!(dictionary.len(), 1);
        assert_eq!(dictionary[0]["Tag"], "MsgId");
        assert!(dictionary[0]["MsgId"].is_string());
    }
}
