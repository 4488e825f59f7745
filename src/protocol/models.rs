use serde::{Deserialize, Serialize};

use crate::{
    common::types::{Millis, PartyCode, UserId},
    party::{
        authority::PlaybackState,
        chat::ChatEntry,
        content::{ContentRef, ContentSummary},
    },
};

/// Display profile supplied by the auth layer alongside the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Profile {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            avatar: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Connected,
    DisconnectedGrace,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySettings {
    pub max_participants: usize,
    pub allow_guest_control: bool,
}

/// Partial settings change sent by the host.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    #[serde(default)]
    pub max_participants: Option<usize>,
    #[serde(default)]
    pub allow_guest_control: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub user_id: UserId,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub is_host: bool,
    pub connection_state: ConnectionState,
    pub joined_at: Millis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffering_since: Option<Millis>,
}

/// Everything a joining client needs to render the party.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartySnapshot {
    pub code: PartyCode,
    pub content_ref: ContentRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentSummary>,
    pub settings: PartySettings,
    pub host_user_id: Option<UserId>,
    pub participants: Vec<ParticipantView>,
    pub playback: PlaybackState,
    pub buffering_user_ids: Vec<UserId>,
    pub chat_history: Vec<ChatEntry>,
    pub created_at: Millis,
}

/// Request body for POST /v1/parties.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateParty {
    pub content_ref: String,
    pub creator_id: UserId,
    #[serde(default)]
    pub creator_profile: Option<Profile>,
    pub max_participants: usize,
    #[serde(default)]
    pub allow_guest_control: bool,
}

/// Response from POST /v1/parties.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyCreated {
    pub code: PartyCode,
    pub snapshot: PartySnapshot,
}
