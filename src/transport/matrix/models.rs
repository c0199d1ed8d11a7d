use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
pub(super) struct SyncResponse {
    pub(super) next_batch: String,
    #[serde(default)]
    pub(super) rooms: Rooms,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct Rooms {
    #[serde(default)]
    pub(super) join: HashMap<String, JoinedRoom>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct JoinedRoom {
    #[serde(default)]
    pub(super) state: EventList,
    #[serde(default)]
    pub(super) timeline: EventList,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct EventList {
    #[serde(default)]
    pub(super) events: Vec<RoomEvent>,
}

#[derive(Debug, Deserialize)]
pub(super) struct RoomEvent {
    #[serde(rename = "type")]
    pub(super) event_type: String,
    pub(super) sender: String,
    #[serde(default)]
    pub(super) origin_server_ts: u64,
    #[serde(default)]
    pub(super) state_key: Option<String>,
    #[serde(default)]
    pub(super) content: EventContent,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct EventContent {
    #[serde(default)]
    pub(super) body: Option<String>,
    #[serde(default)]
    pub(super) displayname: Option<String>,
    #[serde(default)]
    pub(super) membership: Option<String>,
    #[serde(default, rename = "m.relates_to")]
    pub(super) relates_to: Option<RelatesTo>,
}

#[derive(Debug, Deserialize, Default)]
pub(super) struct RelatesTo {
    #[serde(default)]
    pub(super) event_id: Option<String>,
    #[serde(default)]
    pub(super) key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WhoAmIResponse {
    pub(super) user_id: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct DisplayNameResponse {
    #[serde(default)]
    pub(super) displayname: Option<String>,
}
