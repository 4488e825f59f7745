use serde::Deserialize;

use crate::{
    common::types::UserId,
    party::{authority::PlaybackCommand, buffering::BufferingState},
    protocol::models::SettingsUpdate,
};

/// A client frame. `nonce` is echoed back on errors so the client can match them up.
#[derive(Deserialize, Debug)]
pub struct IncomingFrame {
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub op: IncomingMessage,
}

/// Operations a connected participant can send. The party code and the sender are
/// bound to the socket at join time.
#[derive(Deserialize, Debug)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IncomingMessage {
    Playback {
        #[serde(flatten)]
        command: PlaybackCommand,
    },
    Buffering {
        state: BufferingState,
    },
    Chat {
        body: String,
    },
    Reaction {
        emoji: String,
        #[serde(default)]
        anchor: Option<f64>,
    },
    Heartbeat,
    Leave,
    TransferHost {
        to_user_id: UserId,
    },
    UpdateSettings {
        #[serde(flatten)]
        update: SettingsUpdate,
    },
}

impl IncomingMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Playback { .. } => "playback",
            Self::Buffering { .. } => "buffering",
            Self::Chat { .. } => "chat",
            Self::Reaction { .. } => "reaction",
            Self::Heartbeat => "heartbeat",
            Self::Leave => "leave",
            Self::TransferHost { .. } => "transferHost",
            Self::UpdateSettings { .. } => "updateSettings",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::party::authority::CommandKind;

    #[test]
    fn test_parse_playback_frame() {
        let frame: IncomingFrame = serde_json::from_str(
            r#"{"op":"playback","nonce":"n1","kind":"pause","position":90.5,"basedOn":1234}"#,
        )
        .unwrap();
        assert_eq!(frame.nonce.as_deref(), Some("n1"));
        match frame.op {
            IncomingMessage::Playback { command } => {
                assert_eq!(command.kind, CommandKind::Pause);
                assert_eq!(command.position, 90.5);
                assert_eq!(command.based_on, Some(1234));
            }
            other => panic!("unexpected op {:?}", other),
        }
    }

    #[test]
    fn test_parse_unit_and_nested_frames() {
        let frame: IncomingFrame = serde_json::from_str(r#"{"op":"heartbeat"}"#).unwrap();
        assert!(matches!(frame.op, IncomingMessage::Heartbeat));
        assert_eq!(frame.op.name(), "heartbeat");

        let frame: IncomingFrame =
            serde_json::from_str(r#"{"op":"updateSettings","allowGuestControl":true}"#).unwrap();
        match frame.op {
            IncomingMessage::UpdateSettings { update } => {
                assert_eq!(update.allow_guest_control, Some(true));
                assert_eq!(update.max_participants, None);
            }
            other => panic!("unexpected op {:?}", other),
        }

        let frame: IncomingFrame =
            serde_json::from_str(r#"{"op":"transferHost","toUserId":"u2"}"#).unwrap();
        assert!(matches!(frame.op, IncomingMessage::TransferHost { .. }));
    }

    #[test]
    fn test_rejects_unknown_op() {
        assert!(serde_json::from_str::<IncomingFrame>(r#"{"op":"selfDestruct"}"#).is_err());
    }
}
