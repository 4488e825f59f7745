//! Decides when the party should stop and wait for stalled players.
//!
//! The aggregator never touches the playback clock. It only answers "should we pause?"
//! and "may we resume?"; the session routes the actual pause through the authority.

use serde::{Deserialize, Serialize};

use crate::{
    common::{
        PartyError,
        types::{Millis, UserId},
    },
    party::membership::MembershipRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BufferingState {
    Buffering,
    Ready,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferingDecision {
    Nothing,
    SuggestPause,
    /// Everyone caught up. `resume` is set when auto-resume is configured.
    Cleared { resume: bool },
}

#[derive(Debug)]
pub struct BufferingAggregator {
    guest_threshold: f64,
    auto_resume: bool,
    advisory_active: bool,
}

impl BufferingAggregator {
    pub fn new(guest_threshold: f64, auto_resume: bool) -> Self {
        Self {
            guest_threshold,
            auto_resume,
            advisory_active: false,
        }
    }

    pub fn advisory_active(&self) -> bool {
        self.advisory_active
    }

    /// Drops the latch without clearing anyone's flag. Stalls still pending count again on
    /// the next evaluation.
    pub fn release(&mut self) {
        self.advisory_active = false;
    }

    /// Records a report. Returns whether the buffering set changed.
    pub fn report(
        &self,
        members: &mut MembershipRegistry,
        user_id: &UserId,
        state: BufferingState,
        now: Millis,
    ) -> Result<bool, PartyError> {
        let since = match state {
            BufferingState::Buffering => Some(now),
            BufferingState::Ready => None,
        };
        members.set_buffering(user_id, since)
    }

    /// Connected participants currently stalled, in join order.
    pub fn buffering_ids(&self, members: &MembershipRegistry) -> Vec<UserId> {
        members
            .connected()
            .filter(|p| p.buffering_since.is_some())
            .map(|p| p.user_id.clone())
            .collect()
    }

    /// With guest control off any stalled guest is enough. With it on, the stalled
    /// fraction of connected participants must exceed the threshold.
    pub fn threshold_crossed(&self, members: &MembershipRegistry, allow_guest_control: bool) -> bool {
        let connected = members.connected().count();
        if connected == 0 {
            return false;
        }
        let stalled: Vec<_> = members
            .connected()
            .filter(|p| p.buffering_since.is_some())
            .collect();
        if allow_guest_control {
            stalled.len() as f64 / connected as f64 > self.guest_threshold
        } else {
            stalled.iter().any(|p| !members.is_host(&p.user_id))
        }
    }

    pub fn evaluate(
        &mut self,
        members: &MembershipRegistry,
        allow_guest_control: bool,
    ) -> BufferingDecision {
        if !self.advisory_active {
            if self.threshold_crossed(members, allow_guest_control) {
                self.advisory_active = true;
                return BufferingDecision::SuggestPause;
            }
            return BufferingDecision::Nothing;
        }

        if self.buffering_ids(members).is_empty() {
            self.advisory_active = false;
            return BufferingDecision::Cleared {
                resume: self.auto_resume,
            };
        }
        BufferingDecision::Nothing
    }
}
