//! Immutable client-side state snapshots.
//!
//! The worker task owns the current [`RoomState`] and [`PlayerState`] and
//! replaces whole snapshots on every inbound sync; handlers and callers see
//! `Arc`s to frozen values that never mutate under them. All `with_*`
//! methods return a new snapshot and leave `self` untouched.

use std::sync::Arc;

use serde_json::Value;

use crate::protocol::{
    CharacterBundle, ChatRoomAccessRole, ChatRoomBlockCategory, ChatRoomCustomData, ChatRoomGame,
    ChatRoomLanguage, ChatRoomSpace, Difficulty, ItemBundle, ItemSyncEntry, Lovership, Ownership,
    Reputation, RoomPropertiesSyncMessage, RoomSyncMessage, ServerAccountData, Skill,
};

/// Lifecycle of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No live transport connection.
    Disconnected,
    /// Transport is up, not yet authenticated.
    Connected,
    /// Authenticated, not inside a room.
    LoggedIn,
    /// Authenticated and inside a room.
    InRoom,
}

/// The logged-in account, derived from the login response.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub id: String,
    pub member_number: u32,
    pub name: String,
    pub nickname: Option<String>,
    pub account_name: String,
    pub creation: u64,
    pub money: i64,
    pub owner: Option<String>,
    pub ownership: Option<Ownership>,
    pub lovership: Vec<Lovership>,
    pub appearance: Vec<ItemBundle>,
    pub active_pose: Vec<String>,
    pub friend_list: Vec<u32>,
    pub white_list: Vec<u32>,
    pub black_list: Vec<u32>,
    pub ghost_list: Vec<u32>,
    pub skill: Vec<Skill>,
    pub reputation: Vec<Reputation>,
    pub difficulty: Option<Difficulty>,
    pub title: Option<String>,
    pub label_color: Option<String>,
    pub description: Option<String>,
    /// The account snapshot exactly as the server sent it.
    pub raw: ServerAccountData,
}

impl PlayerState {
    /// Build the player snapshot from a successful login payload.
    pub fn from_account_data(data: ServerAccountData) -> Self {
        Self {
            id: data.id.clone(),
            member_number: data.member_number,
            name: data.name.clone(),
            nickname: data.nickname.clone(),
            account_name: data.account_name.clone().unwrap_or_default(),
            creation: data.creation.unwrap_or(0),
            money: data.money.unwrap_or(0),
            owner: data.owner.clone(),
            ownership: data.ownership.clone(),
            lovership: data.lovership.clone().unwrap_or_default(),
            appearance: data.appearance.clone().unwrap_or_default(),
            active_pose: data.active_pose.clone().unwrap_or_default(),
            friend_list: data.friend_list.clone().unwrap_or_default(),
            white_list: data.white_list.clone().unwrap_or_default(),
            black_list: data.black_list.clone().unwrap_or_default(),
            ghost_list: data.ghost_list.clone().unwrap_or_default(),
            skill: data.skill.clone().unwrap_or_default(),
            reputation: data.reputation.clone().unwrap_or_default(),
            difficulty: data.difficulty.clone(),
            title: data.title.clone(),
            label_color: data.label_color.clone(),
            description: data.description.clone(),
            raw: data,
        }
    }

    /// Nickname when set (trimmed, at most 20 characters), otherwise name.
    pub fn display_name(&self) -> &str {
        display_name(self.nickname.as_deref(), &self.name)
    }
}

/// Arousal meter of one character.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ArousalState {
    pub orgasm_timer: Option<f64>,
    pub orgasm_count: Option<i64>,
    pub progress: Option<f64>,
    pub progress_timer: Option<f64>,
}

/// One member of the current room.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterState {
    pub id: String,
    pub member_number: u32,
    pub name: String,
    pub nickname: Option<String>,
    pub appearance: Vec<ItemBundle>,
    pub active_pose: Vec<String>,
    pub owner: Option<String>,
    pub ownership: Option<Ownership>,
    pub lovership: Vec<Lovership>,
    pub reputation: Vec<Reputation>,
    pub white_list: Vec<u32>,
    pub black_list: Vec<u32>,
    pub label_color: Option<String>,
    pub description: Option<String>,
    pub title: Option<String>,
    pub creation: u64,
    pub difficulty: Option<Difficulty>,
    pub arousal: Option<ArousalState>,
    pub map_data: Option<Value>,
    /// Uninterpreted character fields from the wire, preserved verbatim.
    pub extra: serde_json::Map<String, Value>,
}

impl CharacterState {
    /// Build a character snapshot from its wire shape.
    pub fn from_bundle(bundle: CharacterBundle) -> Self {
        Self {
            id: bundle
                .id
                .unwrap_or_else(|| bundle.member_number.to_string()),
            member_number: bundle.member_number,
            name: bundle.name,
            nickname: bundle.nickname,
            appearance: bundle.appearance.unwrap_or_default(),
            active_pose: bundle.active_pose.unwrap_or_default(),
            owner: bundle.owner,
            ownership: bundle.ownership,
            lovership: bundle.lovership.unwrap_or_default(),
            reputation: bundle.reputation.unwrap_or_default(),
            white_list: bundle.white_list.unwrap_or_default(),
            black_list: bundle.black_list.unwrap_or_default(),
            label_color: bundle.label_color,
            description: bundle.description,
            title: bundle.title,
            creation: bundle.creation.unwrap_or(0),
            difficulty: bundle.difficulty,
            arousal: None,
            map_data: None,
            extra: bundle.extra,
        }
    }

    /// Nickname when set (trimmed, at most 20 characters), otherwise name.
    pub fn display_name(&self) -> &str {
        display_name(self.nickname.as_deref(), &self.name)
    }

    /// The worn item occupying `group`, if any.
    pub fn item_in_group(&self, group: &str) -> Option<&ItemBundle> {
        self.appearance.iter().find(|item| item.group == group)
    }

    /// Snapshot with the `Expression` property of the item in `group`
    /// replaced. Unchanged when nothing occupies `group`.
    #[must_use]
    pub fn with_expression(&self, group: &str, name: Option<&str>) -> Self {
        let mut next = self.clone();
        if let Some(item) = next.appearance.iter_mut().find(|item| item.group == group) {
            let mut property = match item.property.take() {
                Some(Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            let expression = name.map_or(Value::Null, |n| Value::String(n.to_owned()));
            property.insert("Expression".to_owned(), expression);
            item.property = Some(Value::Object(property));
        }
        next
    }

    /// Snapshot with the active pose set replaced.
    #[must_use]
    pub fn with_pose(&self, poses: Vec<String>) -> Self {
        let mut next = self.clone();
        next.active_pose = poses;
        next
    }

    /// Snapshot with the arousal meter replaced.
    #[must_use]
    pub fn with_arousal(&self, arousal: ArousalState) -> Self {
        let mut next = self.clone();
        next.arousal = Some(arousal);
        next
    }

    /// Snapshot with an item delta applied: a delta without a name removes
    /// whatever occupies the group, otherwise the new item replaces the
    /// occupant in place (or is appended when the group was empty).
    #[must_use]
    pub fn with_item(&self, entry: &ItemSyncEntry) -> Self {
        let mut next = self.clone();
        match &entry.name {
            None => next.appearance.retain(|item| item.group != entry.group),
            Some(name) => {
                let item = ItemBundle {
                    group: entry.group.clone(),
                    name: name.clone(),
                    color: entry.color.clone(),
                    difficulty: entry.difficulty,
                    property: entry.property.clone(),
                    craft: entry.craft.clone(),
                };
                match next.appearance.iter_mut().find(|i| i.group == entry.group) {
                    Some(existing) => *existing = item,
                    None => next.appearance.push(item),
                }
            }
        }
        next
    }

    /// Snapshot with the map position replaced.
    #[must_use]
    pub fn with_map_data(&self, map_data: Option<Value>) -> Self {
        let mut next = self.clone();
        next.map_data = map_data;
        next
    }
}

/// Room descriptions prefixed with U+256C carry LZString-compressed UTF-16
/// text. Unreadable compressed data falls back to the raw string.
fn decode_description(raw: &str) -> String {
    match raw.strip_prefix('\u{256C}') {
        Some(compressed) => lz_str::decompress_from_utf16(compressed)
            .and_then(|wide| String::from_utf16(&wide).ok())
            .unwrap_or_else(|| raw.to_owned()),
        None => raw.to_owned(),
    }
}

fn display_name<'a>(nickname: Option<&'a str>, name: &'a str) -> &'a str {
    match nickname.map(str::trim) {
        Some(nick) if !nick.is_empty() => {
            let end = nick
                .char_indices()
                .nth(20)
                .map_or(nick.len(), |(index, _)| index);
            nick.get(..end).unwrap_or(nick)
        }
        _ => name,
    }
}

/// The room the client is currently inside.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomState {
    pub name: String,
    pub description: String,
    pub admin: Vec<u32>,
    pub ban: Vec<u32>,
    pub whitelist: Vec<u32>,
    pub background: String,
    pub limit: u32,
    pub locked: bool,
    pub game: ChatRoomGame,
    pub visibility: Vec<ChatRoomAccessRole>,
    pub access: Vec<ChatRoomAccessRole>,
    pub block_category: Vec<ChatRoomBlockCategory>,
    pub language: ChatRoomLanguage,
    pub space: ChatRoomSpace,
    pub map_data: Option<Value>,
    pub custom: Option<ChatRoomCustomData>,
    /// Members in server order.
    pub characters: Vec<Arc<CharacterState>>,
}

impl RoomState {
    /// Build room metadata from a full sync. The member list is attached
    /// separately by the caller.
    pub fn from_sync(msg: &RoomSyncMessage) -> Self {
        Self {
            name: msg.name.clone(),
            description: msg
                .description
                .as_deref()
                .map(decode_description)
                .unwrap_or_default(),
            admin: msg.admin.clone().unwrap_or_default(),
            ban: msg.ban.clone().unwrap_or_default(),
            whitelist: msg.whitelist.clone().unwrap_or_default(),
            background: msg
                .background
                .clone()
                .unwrap_or_else(|| "MainHall".to_owned()),
            limit: msg.limit.unwrap_or(10),
            locked: msg.locked.unwrap_or(false),
            game: msg.game.unwrap_or_default(),
            visibility: msg.visibility.clone().unwrap_or_default(),
            access: msg.access.clone().unwrap_or_default(),
            block_category: msg.block_category.clone().unwrap_or_default(),
            language: msg.language.unwrap_or_default(),
            space: msg.space.unwrap_or_default(),
            map_data: msg.map_data.clone(),
            custom: msg.custom.clone(),
            characters: Vec::new(),
        }
    }

    /// The member with `member_number`, if present.
    pub fn find_character(&self, member_number: u32) -> Option<&Arc<CharacterState>> {
        self.characters
            .iter()
            .find(|c| c.member_number == member_number)
    }

    /// Snapshot without the member `member_number`.
    #[must_use]
    pub fn with_character_removed(&self, member_number: u32) -> Self {
        let mut next = self.clone();
        next.characters.retain(|c| c.member_number != member_number);
        next
    }

    /// Snapshot with `update` applied to the member `member_number`.
    /// Unchanged when that member is not in the room.
    #[must_use]
    pub fn with_character_updated<F>(&self, member_number: u32, update: F) -> Self
    where
        F: FnOnce(&CharacterState) -> CharacterState,
    {
        let mut next = self.clone();
        if let Some(slot) = next
            .characters
            .iter_mut()
            .find(|c| c.member_number == member_number)
        {
            *slot = Arc::new(update(slot));
        }
        next
    }

    /// Snapshot with `character` replacing the member with the same number,
    /// or appended when that member was not present.
    #[must_use]
    pub fn with_character_replaced_or_added(&self, character: Arc<CharacterState>) -> Self {
        let mut next = self.clone();
        match next
            .characters
            .iter_mut()
            .find(|c| c.member_number == character.member_number)
        {
            Some(slot) => *slot = character,
            None => next.characters.push(character),
        }
        next
    }

    /// Snapshot with a partial properties update merged in. Absent fields
    /// keep their previous value.
    #[must_use]
    pub fn apply_properties(&self, msg: &RoomPropertiesSyncMessage) -> Self {
        let mut next = self.clone();
        if let Some(name) = &msg.name {
            next.name = name.clone();
        }
        if let Some(description) = &msg.description {
            next.description = decode_description(description);
        }
        if let Some(admin) = &msg.admin {
            next.admin = admin.clone();
        }
        if let Some(ban) = &msg.ban {
            next.ban = ban.clone();
        }
        if let Some(whitelist) = &msg.whitelist {
            next.whitelist = whitelist.clone();
        }
        if let Some(background) = &msg.background {
            next.background = background.clone();
        }
        if let Some(limit) = msg.limit {
            next.limit = limit;
        }
        if let Some(locked) = msg.locked {
            next.locked = locked;
        }
        if let Some(game) = msg.game {
            next.game = game;
        }
        if let Some(visibility) = &msg.visibility {
            next.visibility = visibility.clone();
        }
        if let Some(access) = &msg.access {
            next.access = access.clone();
        }
        if let Some(block_category) = &msg.block_category {
            next.block_category = block_category.clone();
        }
        if let Some(language) = msg.language {
            next.language = language;
        }
        if let Some(space) = msg.space {
            next.space = space;
        }
        if let Some(map_data) = &msg.map_data {
            next.map_data = Some(map_data.clone());
        }
        if let Some(custom) = &msg.custom {
            next.custom = Some(custom.clone());
        }
        next
    }

    /// Snapshot with members sorted by their position in `order`. Members
    /// missing from `order` keep their relative order at the end.
    #[must_use]
    pub fn with_order(&self, order: &[u32]) -> Self {
        let mut next = self.clone();
        next.characters.sort_by_key(|c| {
            order
                .iter()
                .position(|&n| n == c.member_number)
                .unwrap_or(usize::MAX)
        });
        next
    }
}

/// Holder for the live snapshots, shared between the worker task and the
/// client handle.
///
/// Accessors clone `Arc`s in and out under short-lived locks; no lock is
/// ever held across an event dispatch or an await point.
pub(crate) struct StateHandle {
    connection: std::sync::Mutex<ConnectionState>,
    player: std::sync::Mutex<Option<Arc<PlayerState>>>,
    room: std::sync::Mutex<Option<Arc<RoomState>>>,
}

impl Default for StateHandle {
    fn default() -> Self {
        Self {
            connection: std::sync::Mutex::new(ConnectionState::Disconnected),
            player: std::sync::Mutex::new(None),
            room: std::sync::Mutex::new(None),
        }
    }
}

impl StateHandle {
    pub(crate) fn connection_state(&self) -> ConnectionState {
        *lock(&self.connection)
    }

    /// Replace the connection state, returning the previous one.
    pub(crate) fn set_connection_state(&self, state: ConnectionState) -> ConnectionState {
        std::mem::replace(&mut *lock(&self.connection), state)
    }

    pub(crate) fn player(&self) -> Option<Arc<PlayerState>> {
        lock(&self.player).clone()
    }

    pub(crate) fn set_player(&self, player: Option<Arc<PlayerState>>) {
        *lock(&self.player) = player;
    }

    pub(crate) fn room(&self) -> Option<Arc<RoomState>> {
        lock(&self.room).clone()
    }

    pub(crate) fn set_room(&self, room: Option<Arc<RoomState>>) {
        *lock(&self.room) = room;
    }
}

fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn character(member_number: u32, name: &str) -> Arc<CharacterState> {
        let bundle: CharacterBundle = serde_json::from_value(json!({
            "MemberNumber": member_number,
            "Name": name,
        }))
        .unwrap();
        Arc::new(CharacterState::from_bundle(bundle))
    }

    fn room_with(members: &[(u32, &str)]) -> RoomState {
        let msg: RoomSyncMessage = serde_json::from_value(json!({ "Name": "Lounge" })).unwrap();
        let mut room = RoomState::from_sync(&msg);
        room.characters = members.iter().map(|(n, name)| character(*n, name)).collect();
        room
    }

    #[test]
    fn display_name_prefers_trimmed_nickname() {
        let mut c = (*character(1, "Anna")).clone();
        c.nickname = Some("  Nan  ".to_owned());
        assert_eq!(c.display_name(), "Nan");

        c.nickname = Some("   ".to_owned());
        assert_eq!(c.display_name(), "Anna");

        c.nickname = Some("x".repeat(30));
        assert_eq!(c.display_name().chars().count(), 20);
    }

    #[test]
    fn item_delta_removes_replaces_and_appends() {
        let mut c = (*character(1, "Anna")).clone();
        c.appearance = vec![ItemBundle::new("ItemArms", "Rope")];

        let replace: ItemSyncEntry = serde_json::from_value(json!({
            "Target": 1, "Group": "ItemArms", "Name": "Chains",
        }))
        .unwrap();
        let c2 = c.with_item(&replace);
        assert_eq!(c2.appearance.len(), 1);
        assert_eq!(c2.appearance[0].name, "Chains");

        let append: ItemSyncEntry = serde_json::from_value(json!({
            "Target": 1, "Group": "ItemLegs", "Name": "Rope",
        }))
        .unwrap();
        let c3 = c2.with_item(&append);
        assert_eq!(c3.appearance.len(), 2);

        let remove: ItemSyncEntry = serde_json::from_value(json!({
            "Target": 1, "Group": "ItemArms",
        }))
        .unwrap();
        let c4 = c3.with_item(&remove);
        assert_eq!(c4.appearance.len(), 1);
        assert_eq!(c4.appearance[0].group, "ItemLegs");

        // Snapshots are independent.
        assert_eq!(c.appearance[0].name, "Rope");
    }

    #[test]
    fn expression_lands_in_the_item_property() {
        let mut c = (*character(1, "Anna")).clone();
        c.appearance = vec![ItemBundle::new("Eyes", "Default")];

        let c2 = c.with_expression("Eyes", Some("Closed"));
        let property = c2.appearance[0].property.as_ref().unwrap();
        assert_eq!(property["Expression"], json!("Closed"));

        let c3 = c2.with_expression("Eyes", None);
        let property = c3.appearance[0].property.as_ref().unwrap();
        assert_eq!(property["Expression"], Value::Null);

        // Missing group leaves the snapshot as-is.
        let c4 = c3.with_expression("Mouth", Some("Smile"));
        assert_eq!(c4.appearance.len(), 1);
    }

    #[test]
    fn compressed_descriptions_are_decompressed() {
        let compressed = format!("\u{256C}{}", lz_str::compress_to_utf16("After hours lounge"));

        let msg: RoomSyncMessage = serde_json::from_value(json!({
            "Name": "Lounge",
            "Description": compressed,
        }))
        .unwrap();
        assert_eq!(RoomState::from_sync(&msg).description, "After hours lounge");

        let room = room_with(&[]);
        let patch: RoomPropertiesSyncMessage =
            serde_json::from_value(json!({ "Description": compressed })).unwrap();
        assert_eq!(room.apply_properties(&patch).description, "After hours lounge");

        // Plain descriptions pass through untouched.
        let plain: RoomPropertiesSyncMessage =
            serde_json::from_value(json!({ "Description": "plain text" })).unwrap();
        assert_eq!(room.apply_properties(&plain).description, "plain text");
    }

    #[test]
    fn properties_merge_keeps_absent_fields() {
        let mut room = room_with(&[(1, "Anna")]);
        room.description = "old".to_owned();
        room.limit = 10;

        let msg: RoomPropertiesSyncMessage =
            serde_json::from_value(json!({ "Limit": 15 })).unwrap();
        let updated = room.apply_properties(&msg);

        assert_eq!(updated.limit, 15);
        assert_eq!(updated.description, "old");
        assert_eq!(updated.characters.len(), 1);
    }

    #[test]
    fn reorder_puts_unknown_members_last() {
        let room = room_with(&[(1, "A"), (2, "B"), (3, "C")]);
        let reordered = room.with_order(&[3, 1]);
        let numbers: Vec<u32> = reordered
            .characters
            .iter()
            .map(|c| c.member_number)
            .collect();
        assert_eq!(numbers, vec![3, 1, 2]);
    }

    #[test]
    fn update_of_missing_member_is_a_no_op() {
        let room = room_with(&[(1, "A")]);
        let updated = room.with_character_updated(99, |c| c.with_pose(vec!["Kneel".to_owned()]));
        assert_eq!(updated.characters.len(), 1);
        assert!(updated.characters[0].active_pose.is_empty());
    }

    #[test]
    fn replace_or_add_deduplicates_by_member_number() {
        let room = room_with(&[(1, "A")]);
        let replaced = room.with_character_replaced_or_added(character(1, "A2"));
        assert_eq!(replaced.characters.len(), 1);
        assert_eq!(replaced.characters[0].name, "A2");

        let added = replaced.with_character_replaced_or_added(character(2, "B"));
        assert_eq!(added.characters.len(), 2);
    }
}
