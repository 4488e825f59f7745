//! The party's single playback clock.
//!
//! While playing we only store the position at `anchored_at`; the live position is
//! extrapolated on read so nobody has to push position updates.

use serde::{Deserialize, Serialize};

use crate::common::{
    PartyError,
    types::{Millis, UserId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandKind {
    Play,
    Pause,
    Seek,
}

/// A play/pause/seek request as received from a participant.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackCommand {
    pub kind: CommandKind,
    pub position: f64,
    /// `lastUpdatedAt` of the state the sender was looking at when it issued the command.
    /// Omitting it skips the `StaleCommand` check for play and pause.
    #[serde(default)]
    pub based_on: Option<Millis>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Transport {
    Paused { position: f64 },
    Playing { position: f64, anchored_at: Millis },
}

/// Wire form of the authoritative clock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub position: f64,
    pub is_playing: bool,
    pub last_updated_at: Millis,
    pub updated_by: Option<UserId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Changed(PlaybackState),
    /// Replay of the command that produced the current state.
    Unchanged,
}

#[derive(Debug)]
pub struct PlaybackAuthority {
    transport: Transport,
    last_updated_at: Millis,
    updated_by: Option<UserId>,
    last_command: Option<(CommandKind, u64)>,
    staleness_tolerance_ms: u64,
}

impl PlaybackAuthority {
    pub fn new(staleness_tolerance_ms: u64, now: Millis) -> Self {
        Self {
            transport: Transport::Paused { position: 0.0 },
            last_updated_at: now,
            updated_by: None,
            last_command: None,
            staleness_tolerance_ms,
        }
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.transport, Transport::Playing { .. })
    }

    pub fn position_at(&self, now: Millis) -> f64 {
        match self.transport {
            Transport::Paused { position } => position,
            Transport::Playing {
                position,
                anchored_at,
            } => position + now.saturating_sub(anchored_at) as f64 / 1000.0,
        }
    }

    pub fn state_at(&self, now: Millis) -> PlaybackState {
        PlaybackState {
            position: self.position_at(now),
            is_playing: self.is_playing(),
            last_updated_at: self.last_updated_at,
            updated_by: self.updated_by.clone(),
        }
    }

    /// Validates and applies a participant command. Receipt order is the tie-break:
    /// whatever arrives last wins.
    pub fn apply(
        &mut self,
        sender: &UserId,
        command: PlaybackCommand,
        may_control: bool,
        now: Millis,
    ) -> Result<Applied, PartyError> {
        if !may_control {
            return Err(PartyError::Forbidden);
        }
        if !command.position.is_finite() || command.position < 0.0 {
            return Err(PartyError::InvalidPosition);
        }
        if command.kind != CommandKind::Seek {
            if let Some(based_on) = command.based_on {
                if self.last_updated_at > based_on.saturating_add(self.staleness_tolerance_ms) {
                    return Err(PartyError::StaleCommand);
                }
            }
        }

        let key = (command.kind, command.position.to_bits());
        let in_target_state = match command.kind {
            CommandKind::Play => self.is_playing(),
            CommandKind::Pause => !self.is_playing(),
            CommandKind::Seek => true,
        };
        if self.last_command == Some(key) && in_target_state {
            return Ok(Applied::Unchanged);
        }

        self.transport = match command.kind {
            CommandKind::Play => Transport::Playing {
                position: command.position,
                anchored_at: now,
            },
            CommandKind::Pause => Transport::Paused {
                position: command.position,
            },
            CommandKind::Seek if self.is_playing() => Transport::Playing {
                position: command.position,
                anchored_at: now,
            },
            CommandKind::Seek => Transport::Paused {
                position: command.position,
            },
        };
        self.last_command = Some(key);
        Ok(Applied::Changed(self.stamp(sender, now)))
    }

    /// Pause at the extrapolated position on behalf of the coordinator. No permission
    /// check; used by the buffering aggregator.
    pub fn pause_for(&mut self, on_behalf_of: &UserId, now: Millis) -> Applied {
        if !self.is_playing() {
            return Applied::Unchanged;
        }
        self.transport = Transport::Paused {
            position: self.position_at(now),
        };
        self.last_command = None;
        Applied::Changed(self.stamp(on_behalf_of, now))
    }

    /// Resume from the current position on behalf of the coordinator.
    pub fn resume_for(&mut self, on_behalf_of: &UserId, now: Millis) -> Applied {
        if self.is_playing() {
            return Applied::Unchanged;
        }
        self.transport = Transport::Playing {
            position: self.position_at(now),
            anchored_at: now,
        };
        self.last_command = None;
        Applied::Changed(self.stamp(on_behalf_of, now))
    }

    fn stamp(&mut self, by: &UserId, now: Millis) -> PlaybackState {
        // Strictly increasing so every accepted transition has a distinct stamp.
        self.last_updated_at = now.max(self.last_updated_at + 1);
        self.updated_by = Some(by.clone());
        self.state_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: Millis = 1_000_000;

    fn host() -> UserId {
        UserId::from("host")
    }

    fn cmd(kind: CommandKind, position: f64, based_on: Option<Millis>) -> PlaybackCommand {
        PlaybackCommand {
            kind,
            position,
            based_on,
        }
    }

    fn changed(applied: Applied) -> PlaybackState {
        match applied {
            Applied::Changed(state) => state,
            Applied::Unchanged => panic!("expected a state change"),
        }
    }

    #[test]
    fn test_play_extrapolates_position() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        let state = changed(
            authority
                .apply(&host(), cmd(CommandKind::Play, 10.0, None), true, T0 + 10)
                .unwrap(),
        );
        assert!(state.is_playing);
        assert_eq!(state.position, 10.0);
        assert_eq!(state.updated_by, Some(host()));
        assert!((authority.position_at(T0 + 2_510) - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_forbidden_leaves_state() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        let before = authority.state_at(T0);
        let err = authority
            .apply(
                &UserId::from("guest"),
                cmd(CommandKind::Play, 5.0, None),
                false,
                T0 + 1,
            )
            .unwrap_err();
        assert_eq!(err, PartyError::Forbidden);
        assert_eq!(authority.state_at(T0), before);
    }

    #[test]
    fn test_stale_pause_rejected() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        let t = changed(
            authority
                .apply(&host(), cmd(CommandKind::Play, 100.0, None), true, T0 + 5_000)
                .unwrap(),
        )
        .last_updated_at;

        let before = authority.state_at(t + 100);
        let err = authority
            .apply(
                &host(),
                cmd(CommandKind::Pause, 90.0, Some(t - 2_001)),
                true,
                t + 100,
            )
            .unwrap_err();
        assert_eq!(err, PartyError::StaleCommand);
        assert_eq!(authority.state_at(t + 100), before);

        // Within tolerance still applies.
        let state = changed(
            authority
                .apply(
                    &host(),
                    cmd(CommandKind::Pause, 90.0, Some(t - 1_500)),
                    true,
                    t + 200,
                )
                .unwrap(),
        );
        assert!(!state.is_playing);
        assert_eq!(state.position, 90.0);
    }

    #[test]
    fn test_unstamped_command_skips_staleness() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        authority
            .apply(&host(), cmd(CommandKind::Play, 0.0, None), true, T0 + 60_000)
            .unwrap();
        let state = changed(
            authority
                .apply(&host(), cmd(CommandKind::Pause, 5.0, None), true, T0 + 61_000)
                .unwrap(),
        );
        assert!(!state.is_playing);
    }

    #[test]
    fn test_replay_is_idempotent() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        let play = cmd(CommandKind::Play, 30.0, Some(T0));
        let first = changed(authority.apply(&host(), play, true, T0 + 100).unwrap());
        assert_eq!(
            authority.apply(&host(), play, true, T0 + 400).unwrap(),
            Applied::Unchanged
        );
        assert_eq!(authority.state_at(T0 + 400).last_updated_at, first.last_updated_at);

        let seek = cmd(CommandKind::Seek, 55.0, None);
        authority.apply(&host(), seek, true, T0 + 500).unwrap();
        assert_eq!(
            authority.apply(&host(), seek, true, T0 + 600).unwrap(),
            Applied::Unchanged
        );
    }

    #[test]
    fn test_seek_preserves_play_state() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        let paused = changed(
            authority
                .apply(&host(), cmd(CommandKind::Seek, 42.0, None), true, T0 + 1)
                .unwrap(),
        );
        assert!(!paused.is_playing);
        assert_eq!(authority.position_at(T0 + 10_000), 42.0);

        authority
            .apply(&host(), cmd(CommandKind::Play, 42.0, None), true, T0 + 2)
            .unwrap();
        let playing = changed(
            authority
                .apply(&host(), cmd(CommandKind::Seek, 7.0, None), true, T0 + 1_000)
                .unwrap(),
        );
        assert!(playing.is_playing);
        assert!((authority.position_at(T0 + 2_000) - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_positions() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        for position in [-1.0, f64::NAN, f64::INFINITY] {
            assert_eq!(
                authority
                    .apply(&host(), cmd(CommandKind::Seek, position, None), true, T0)
                    .unwrap_err(),
                PartyError::InvalidPosition
            );
        }
    }

    #[test]
    fn test_last_write_wins() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        let a = UserId::from("a");
        let b = UserId::from("b");
        authority
            .apply(&a, cmd(CommandKind::Seek, 10.0, Some(T0)), true, T0 + 1)
            .unwrap();
        authority
            .apply(&b, cmd(CommandKind::Seek, 20.0, Some(T0)), true, T0 + 1)
            .unwrap();
        let state = authority.state_at(T0 + 1);
        assert_eq!(state.position, 20.0);
        assert_eq!(state.updated_by, Some(b));
        assert_eq!(state.last_updated_at, T0 + 2);
    }

    #[test]
    fn test_pause_for_buffering() {
        let mut authority = PlaybackAuthority::new(2000, T0);
        assert_eq!(authority.pause_for(&host(), T0), Applied::Unchanged);
        authority
            .apply(&host(), cmd(CommandKind::Play, 0.0, None), true, T0)
            .unwrap();
        let state = changed(authority.pause_for(&UserId::from("slow"), T0 + 3_000));
        assert!(!state.is_playing);
        assert!((state.position - 3.0).abs() < 1e-9);
        let resumed = changed(authority.resume_for(&host(), T0 + 9_000));
        assert!(resumed.is_playing);
        assert!((resumed.position - 3.0).abs() < 1e-9);
    }
}
