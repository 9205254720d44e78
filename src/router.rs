//! Dispatch of inbound protocol events.
//!
//! One handler per server event name: decode the payload into its wire
//! type, fold it into the state snapshots, complete any pending request
//! listening for it, and publish the public event. Runs entirely on the
//! worker task; a handler that fails to decode logs a warning and leaves
//! the state untouched.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::error::Result;
use crate::event::ParlorEvent;
use crate::pending::{PendingRequests, ResponseValue};
use crate::protocol::{
    AccountQueryResult, AllowItemMessage, ArousalSyncMessage, BeepMessage, CharacterBundle,
    CharacterSyncMessage, ChatRoomSearchResult, CreateAccountResult, ExpressionSyncMessage,
    ForceDisconnectReason, GameResponseData, ItemSyncMessage, LoginResult, MapDataSyncMessage,
    MemberJoinMessage, MemberLeaveMessage, PasswordResetResult, PoseSyncMessage,
    ReceivedChatMessage, ReorderPlayersSyncMessage, RoomCreateResult, RoomJoinResult,
    RoomPropertiesSyncMessage, RoomSyncMessage, ServerAccountData, ServerInfo,
};
use crate::state::{ArousalState, CharacterState, ConnectionState, PlayerState, RoomState, StateHandle};

pub(crate) struct EventRouter {
    bus: EventBus,
    pending: Arc<PendingRequests>,
    state: Arc<StateHandle>,
}

impl EventRouter {
    pub(crate) fn new(
        bus: EventBus,
        pending: Arc<PendingRequests>,
        state: Arc<StateHandle>,
    ) -> Self {
        Self { bus, pending, state }
    }

    /// Handle one inbound event. Decode failures are contained here; they
    /// never take down the worker.
    pub(crate) fn route(&self, event: &str, payload: Value) {
        let outcome = match event {
            "ServerInfo" => self.handle_server_info(payload),
            "LoginResponse" => self.handle_login_response(payload),
            "LoginQueue" => self.handle_login_queue(payload),
            "CreationResponse" => self.handle_creation_response(payload),
            "PasswordResetResponse" => self.handle_password_reset_response(payload),
            "ForceDisconnect" => self.handle_force_disconnect(payload),
            "AccountQueryResult" => self.handle_account_query_result(payload),
            "AccountBeep" => self.handle_account_beep(payload),
            "ChatRoomSearchResult" => self.handle_search_result(payload),
            "ChatRoomSearchResponse" => self.handle_search_response(payload),
            "ChatRoomCreateResponse" => self.handle_create_response(payload),
            "ChatRoomSync" => self.handle_room_sync(payload),
            "ChatRoomSyncMemberJoin" => self.handle_member_join(payload),
            "ChatRoomSyncMemberLeave" => self.handle_member_leave(payload),
            "ChatRoomSyncRoomProperties" => self.handle_room_properties(payload),
            "ChatRoomSyncCharacter" | "ChatRoomSyncSingle" => self.handle_character_sync(payload),
            "ChatRoomSyncExpression" => self.handle_expression_sync(payload),
            "ChatRoomSyncPose" => self.handle_pose_sync(payload),
            "ChatRoomSyncArousal" => self.handle_arousal_sync(payload),
            "ChatRoomSyncItem" => self.handle_item_sync(payload),
            "ChatRoomSyncMapData" => self.handle_map_data_sync(payload),
            "ChatRoomSyncReorderPlayers" => self.handle_reorder_players(payload),
            "ChatRoomMessage" => self.handle_chat_message(payload),
            "ChatRoomGameResponse" => self.handle_game_response(payload),
            "ChatRoomAllowItem" => self.handle_allow_item(payload),
            "ChatRoomUpdateResponse" => self.handle_update_response(payload),
            other => {
                debug!(event = other, "unhandled event");
                Ok(())
            }
        };
        if let Err(error) = outcome {
            warn!(event, %error, "failed to handle event");
        }
    }

    fn handle_server_info(&self, payload: Value) -> Result<()> {
        let info: ServerInfo = serde_json::from_value(payload)?;
        self.bus.dispatch(&ParlorEvent::ServerInfo {
            online_players: info.online_players,
            server_time: info.time,
        });
        Ok(())
    }

    // A plain string payload is a rejection; an object is the account data.
    fn handle_login_response(&self, payload: Value) -> Result<()> {
        if let Value::String(message) = payload {
            self.pending
                .complete("LoginResponse", ResponseValue::Login(LoginResult::Error(message)));
            return Ok(());
        }
        let data: ServerAccountData = serde_json::from_value(payload)?;
        self.state
            .set_player(Some(Arc::new(PlayerState::from_account_data(data.clone()))));
        self.state.set_connection_state(ConnectionState::LoggedIn);
        self.pending.complete(
            "LoginResponse",
            ResponseValue::Login(LoginResult::Success(Box::new(data))),
        );
        Ok(())
    }

    fn handle_login_queue(&self, payload: Value) -> Result<()> {
        let position = match &payload {
            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        match position {
            Some(position) => self.bus.dispatch(&ParlorEvent::LoginQueue { position }),
            None => warn!(%payload, "unusable login queue position"),
        }
        Ok(())
    }

    fn handle_creation_response(&self, payload: Value) -> Result<()> {
        let message: String = serde_json::from_value(payload)?;
        let result = if message == "AccountCreated" {
            CreateAccountResult::Success
        } else {
            CreateAccountResult::Error(message)
        };
        self.pending
            .complete("CreationResponse", ResponseValue::Creation(result));
        Ok(())
    }

    fn handle_password_reset_response(&self, payload: Value) -> Result<()> {
        let message: String = serde_json::from_value(payload)?;
        let result = match message.as_str() {
            "EmailSent" => PasswordResetResult::EmailSent,
            "PasswordResetSuccessful" => PasswordResetResult::PasswordResetSuccessful,
            _ => PasswordResetResult::Error(message),
        };
        self.pending
            .complete("PasswordResetResponse", ResponseValue::PasswordReset(result));
        Ok(())
    }

    fn handle_force_disconnect(&self, payload: Value) -> Result<()> {
        let reason: String = serde_json::from_value(payload)?;
        self.bus.dispatch(&ParlorEvent::ForceDisconnect {
            reason: ForceDisconnectReason::from_wire(&reason),
        });
        Ok(())
    }

    fn handle_account_query_result(&self, payload: Value) -> Result<()> {
        let result: AccountQueryResult = serde_json::from_value(payload)?;
        self.pending.complete(
            &format!("AccountQueryResult_{}", result.query),
            ResponseValue::AccountQuery(result.clone()),
        );
        self.bus.dispatch(&ParlorEvent::AccountQueryResult {
            query: result.query.clone(),
            result,
        });
        Ok(())
    }

    fn handle_account_beep(&self, payload: Value) -> Result<()> {
        let beep: BeepMessage = serde_json::from_value(payload)?;
        self.bus.dispatch(&ParlorEvent::BeepReceived { beep });
        Ok(())
    }

    fn handle_search_result(&self, payload: Value) -> Result<()> {
        let results: Vec<ChatRoomSearchResult> = serde_json::from_value(payload)?;
        self.pending
            .complete("ChatRoomSearchResult", ResponseValue::Search(results));
        Ok(())
    }

    fn handle_search_response(&self, payload: Value) -> Result<()> {
        let response: String = serde_json::from_value(payload)?;
        let result = if response == "JoinedRoom" {
            RoomJoinResult::Success
        } else {
            RoomJoinResult::Error(response)
        };
        self.pending
            .complete("ChatRoomSearchResponse", ResponseValue::RoomJoin(result));
        Ok(())
    }

    fn handle_create_response(&self, payload: Value) -> Result<()> {
        let response: String = serde_json::from_value(payload)?;
        let result = if response == "ChatRoomCreated" {
            RoomCreateResult::Success
        } else {
            RoomCreateResult::Error(response)
        };
        self.pending
            .complete("ChatRoomCreateResponse", ResponseValue::RoomCreate(result));
        Ok(())
    }

    fn handle_room_sync(&self, payload: Value) -> Result<()> {
        let msg: RoomSyncMessage = serde_json::from_value(payload)?;
        let mut room = RoomState::from_sync(&msg);
        for raw in msg.character.iter().flatten() {
            match decode_character(raw.clone()) {
                Ok(character) => room.characters.push(Arc::new(character)),
                Err(error) => warn!(%error, "skipping malformed room member"),
            }
        }
        let room = Arc::new(room);
        self.state.set_room(Some(Arc::clone(&room)));
        self.state.set_connection_state(ConnectionState::InRoom);
        self.bus.dispatch(&ParlorEvent::RoomJoined { room });
        Ok(())
    }

    fn handle_member_join(&self, payload: Value) -> Result<()> {
        let msg: MemberJoinMessage = serde_json::from_value(payload)?;
        let character = Arc::new(decode_character(msg.character)?);
        let Some(room) = self.state.room() else {
            return Ok(());
        };
        self.state.set_room(Some(Arc::new(
            room.with_character_replaced_or_added(Arc::clone(&character)),
        )));
        self.bus.dispatch(&ParlorEvent::MemberJoined { character });
        Ok(())
    }

    fn handle_member_leave(&self, payload: Value) -> Result<()> {
        let msg: MemberLeaveMessage = serde_json::from_value(payload)?;
        let Some(room) = self.state.room() else {
            return Ok(());
        };
        let member_number = msg.source_member_number;
        self.state
            .set_room(Some(Arc::new(room.with_character_removed(member_number))));

        // The server does not echo our own leave with a dedicated response,
        // so seeing ourselves leave also closes out a pending leave call.
        let own_number = self.state.player().map(|p| p.member_number);
        if own_number == Some(member_number) {
            self.state.set_room(None);
            self.state.set_connection_state(ConnectionState::LoggedIn);
            self.pending.complete("ChatRoomLeave", ResponseValue::LeaveAck);
            self.bus.dispatch(&ParlorEvent::RoomLeft);
        } else {
            self.bus.dispatch(&ParlorEvent::MemberLeft { member_number });
        }
        Ok(())
    }

    fn handle_room_properties(&self, payload: Value) -> Result<()> {
        let msg: RoomPropertiesSyncMessage = serde_json::from_value(payload)?;
        let Some(room) = self.state.room() else {
            return Ok(());
        };
        let updated = Arc::new(room.apply_properties(&msg));
        self.state.set_room(Some(Arc::clone(&updated)));
        self.bus.dispatch(&ParlorEvent::RoomUpdated { room: updated });
        Ok(())
    }

    fn handle_character_sync(&self, payload: Value) -> Result<()> {
        let msg: CharacterSyncMessage = serde_json::from_value(payload)?;
        let character = Arc::new(decode_character(msg.character)?);
        let Some(room) = self.state.room() else {
            return Ok(());
        };
        self.state.set_room(Some(Arc::new(
            room.with_character_replaced_or_added(Arc::clone(&character)),
        )));
        self.bus.dispatch(&ParlorEvent::CharacterUpdated {
            member_number: character.member_number,
            character,
        });
        Ok(())
    }

    fn handle_expression_sync(&self, payload: Value) -> Result<()> {
        let msg: ExpressionSyncMessage = serde_json::from_value(payload)?;
        if let Some(room) = self.state.room() {
            self.state.set_room(Some(Arc::new(room.with_character_updated(
                msg.member_number,
                |c| c.with_expression(&msg.group, msg.name.as_deref()),
            ))));
        }
        self.bus.dispatch(&ParlorEvent::ExpressionChanged {
            member_number: msg.member_number,
            name: msg.name,
            group: msg.group,
        });
        Ok(())
    }

    fn handle_pose_sync(&self, payload: Value) -> Result<()> {
        let msg: PoseSyncMessage = serde_json::from_value(payload)?;
        let poses = msg.pose.unwrap_or_default();
        if let Some(room) = self.state.room() {
            let poses = poses.clone();
            self.state.set_room(Some(Arc::new(
                room.with_character_updated(msg.member_number, move |c| c.with_pose(poses)),
            )));
        }
        self.bus.dispatch(&ParlorEvent::PoseChanged {
            member_number: msg.member_number,
            poses,
        });
        Ok(())
    }

    fn handle_arousal_sync(&self, payload: Value) -> Result<()> {
        let msg: ArousalSyncMessage = serde_json::from_value(payload)?;
        if let Some(room) = self.state.room() {
            let arousal = ArousalState {
                orgasm_timer: msg.orgasm_timer,
                orgasm_count: msg.orgasm_count,
                progress: msg.progress,
                progress_timer: msg.progress_timer,
            };
            self.state.set_room(Some(Arc::new(
                room.with_character_updated(msg.member_number, move |c| c.with_arousal(arousal)),
            )));
        }
        self.bus.dispatch(&ParlorEvent::ArousalChanged {
            member_number: msg.member_number,
            arousal: msg,
        });
        Ok(())
    }

    fn handle_item_sync(&self, payload: Value) -> Result<()> {
        let msg: ItemSyncMessage = serde_json::from_value(payload)?;
        if let Some(room) = self.state.room() {
            self.state.set_room(Some(Arc::new(
                room.with_character_updated(msg.item.target, |c| c.with_item(&msg.item)),
            )));
        }
        self.bus.dispatch(&ParlorEvent::ItemChanged {
            source: msg.source,
            item: msg,
        });
        Ok(())
    }

    fn handle_map_data_sync(&self, payload: Value) -> Result<()> {
        let msg: MapDataSyncMessage = serde_json::from_value(payload)?;
        if let Some(room) = self.state.room() {
            let map_data = msg.map_data.clone();
            self.state.set_room(Some(Arc::new(
                room.with_character_updated(msg.member_number, move |c| c.with_map_data(map_data)),
            )));
        }
        self.bus.dispatch(&ParlorEvent::MapDataChanged {
            member_number: msg.member_number,
        });
        Ok(())
    }

    fn handle_reorder_players(&self, payload: Value) -> Result<()> {
        let msg: ReorderPlayersSyncMessage = serde_json::from_value(payload)?;
        let Some(room) = self.state.room() else {
            return Ok(());
        };
        self.state
            .set_room(Some(Arc::new(room.with_order(&msg.player_order))));
        self.bus.dispatch(&ParlorEvent::PlayersReordered {
            order: msg.player_order,
        });
        Ok(())
    }

    fn handle_chat_message(&self, payload: Value) -> Result<()> {
        let message: ReceivedChatMessage = serde_json::from_value(payload)?;
        self.bus.dispatch(&ParlorEvent::ChatMessage { message });
        Ok(())
    }

    fn handle_game_response(&self, payload: Value) -> Result<()> {
        let response: GameResponseData = serde_json::from_value(payload)?;
        self.bus.dispatch(&ParlorEvent::GameResponse { response });
        Ok(())
    }

    fn handle_allow_item(&self, payload: Value) -> Result<()> {
        let msg: AllowItemMessage = serde_json::from_value(payload)?;
        self.pending.complete(
            &format!("ChatRoomAllowItem_{}", msg.member_number),
            ResponseValue::AllowItem(msg.allow_item),
        );
        Ok(())
    }

    fn handle_update_response(&self, payload: Value) -> Result<()> {
        let response: String = serde_json::from_value(payload)?;
        self.pending
            .complete("ChatRoomUpdateResponse", ResponseValue::RoomUpdate(response));
        Ok(())
    }
}

fn decode_character(raw: Value) -> Result<CharacterState> {
    let bundle: CharacterBundle = serde_json::from_value(raw)?;
    Ok(CharacterState::from_bundle(bundle))
}
