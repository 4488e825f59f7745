use serde::Serialize;

use crate::{
    common::types::{PartyCode, UserId},
    party::{
        authority::PlaybackState,
        chat::{ChatMessage, Reaction},
    },
    protocol::models::{ParticipantView, PartySettings, PartySnapshot},
};

/// Messages sent from server to client over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum OutgoingMessage {
    /// First frame on every socket.
    Ready {
        you: UserId,
        resumed: bool,
        snapshot: PartySnapshot,
    },
    Event {
        #[serde(flatten)]
        event: PartyEvent,
    },
    /// A request from this socket was refused. Never broadcast.
    Error {
        /// The `op` of the refused frame, or `frame` when it could not be parsed.
        request: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        nonce: Option<String>,
        code: &'static str,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CloseReason {
    Empty,
    HostLeftNoSuccessor,
    InternalError,
}

/// State changes broadcast to every member of a party, in the order they were applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum PartyEvent {
    MemberJoined {
        participant: ParticipantView,
    },
    MemberLeft {
        user_id: UserId,
    },
    MemberDisconnected {
        user_id: UserId,
    },
    MemberReconnected {
        user_id: UserId,
    },
    HostChanged {
        new_host_user_id: UserId,
    },
    PlaybackStateChanged {
        #[serde(flatten)]
        state: PlaybackState,
    },
    BufferingStatusChanged {
        buffering_user_ids: Vec<UserId>,
    },
    /// Advisory only; the accompanying `PlaybackStateChanged` (if any) is authoritative.
    PauseSuggested {
        buffering_user_ids: Vec<UserId>,
    },
    ChatMessagePosted {
        message: ChatMessage,
    },
    ReactionPosted {
        reaction: Reaction,
    },
    SettingsChanged {
        settings: PartySettings,
    },
    SessionClosed {
        code: PartyCode,
        reason: CloseReason,
    },
}
