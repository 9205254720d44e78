#![no_main]

use libfuzzer_sys::fuzz_target;
use parlor_client::protocol::{
    BeepMessage, CharacterBundle, ChatRoomSearchResult, ReceivedChatMessage,
    RoomPropertiesSyncMessage, RoomSyncMessage, ServerAccountData,
};

// Inbound payloads come straight off the wire, so every decode path must
// tolerate arbitrary bytes.
fuzz_target!(|data: &[u8]| {
    let _ = serde_json::from_slice::<ServerAccountData>(data);
    let _ = serde_json::from_slice::<CharacterBundle>(data);
    let _ = serde_json::from_slice::<RoomSyncMessage>(data);
    let _ = serde_json::from_slice::<RoomPropertiesSyncMessage>(data);
    let _ = serde_json::from_slice::<Vec<ChatRoomSearchResult>>(data);
    let _ = serde_json::from_slice::<ReceivedChatMessage>(data);
    let _ = serde_json::from_slice::<BeepMessage>(data);
});
