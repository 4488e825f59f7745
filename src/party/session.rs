//! One party: the state machine composing membership, the playback clock, buffering
//! and chat.
//!
//! Every operation takes `now` explicitly and returns the events it produced, in the
//! order they must reach participants. Nothing here does I/O; the caller serializes
//! access and fans the events out.

use tracing::{debug, error, info};

use crate::{
    common::{
        PartyError,
        types::{Millis, PartyCode, UserId},
    },
    configs::PartyConfig,
    party::{
        authority::{Applied, PlaybackAuthority, PlaybackCommand},
        buffering::{BufferingAggregator, BufferingDecision, BufferingState},
        chat::ChatChannel,
        content::{ContentRef, ContentSummary},
        membership::{HostChange, JoinOutcome, MembershipRegistry},
    },
    protocol::{CloseReason, PartyEvent, PartySettings, PartySnapshot, Profile, SettingsUpdate},
};

pub type Events = Vec<PartyEvent>;

/// Everything needed to open a party.
#[derive(Debug, Clone)]
pub struct Founding {
    pub content_ref: ContentRef,
    pub content: Option<ContentSummary>,
    pub creator_id: UserId,
    pub creator_profile: Profile,
    pub settings: PartySettings,
}

#[derive(Debug)]
pub struct PartySession {
    code: PartyCode,
    content_ref: ContentRef,
    content: Option<ContentSummary>,
    settings: PartySettings,
    created_at: Millis,
    members: MembershipRegistry,
    authority: PlaybackAuthority,
    buffering: BufferingAggregator,
    chat: ChatChannel,
    config: PartyConfig,
    /// Set while playback is paused because of a buffering advisory.
    paused_for_buffering: bool,
    closed: Option<CloseReason>,
}

impl PartySession {
    /// Opens a party with the creator registered as host. The creator sits in
    /// disconnected-grace until their socket attaches.
    pub fn new(
        code: PartyCode,
        founding: Founding,
        config: PartyConfig,
        now: Millis,
    ) -> Result<Self, PartyError> {
        validate_capacity(founding.settings.max_participants, &config)?;

        let mut members = MembershipRegistry::new(founding.settings.max_participants);
        members.join(
            founding.creator_id.clone(),
            founding.creator_profile,
            true,
            now,
        )?;
        members.mark_disconnected(&founding.creator_id, now)?;

        Ok(Self {
            code,
            content_ref: founding.content_ref,
            content: founding.content,
            settings: founding.settings,
            created_at: now,
            members,
            authority: PlaybackAuthority::new(config.staleness_tolerance_ms, now),
            buffering: BufferingAggregator::new(
                config.guest_buffering_threshold,
                config.auto_resume,
            ),
            chat: ChatChannel::new(config.chat_retention),
            config,
            paused_for_buffering: false,
            closed: None,
        })
    }

    pub fn code(&self) -> &PartyCode {
        &self.code
    }

    pub fn settings(&self) -> PartySettings {
        self.settings
    }

    pub fn members(&self) -> &MembershipRegistry {
        &self.members
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.get(user_id).is_some()
    }

    pub fn is_playing(&self) -> bool {
        self.authority.is_playing()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn closed_reason(&self) -> Option<CloseReason> {
        self.closed
    }

    pub fn join(
        &mut self,
        user_id: &UserId,
        profile: Profile,
        now: Millis,
    ) -> Result<(JoinOutcome, Events), PartyError> {
        let mut outcome = JoinOutcome::Joined;
        let events = self.guarded(|s| {
            outcome = s.members.join(user_id.clone(), profile, false, now)?;
            let mut events = Vec::new();
            match outcome {
                JoinOutcome::Joined => {
                    let participant = s
                        .members
                        .view_of(user_id)
                        .ok_or(PartyError::InternalInconsistency("joined user missing".into()))?;
                    events.push(PartyEvent::MemberJoined { participant });
                }
                JoinOutcome::Reconnected => events.push(PartyEvent::MemberReconnected {
                    user_id: user_id.clone(),
                }),
            }
            Ok(events)
        })?;
        Ok((outcome, events))
    }

    pub fn leave(&mut self, user_id: &UserId, now: Millis) -> Result<Events, PartyError> {
        self.guarded(|s| s.remove_member(user_id, now))
    }

    /// The participant's link dropped. Their seat and role are held for the grace period.
    pub fn disconnect(&mut self, user_id: &UserId, now: Millis) -> Result<Events, PartyError> {
        self.guarded(|s| s.drop_member(user_id, now))
    }

    /// Any signal of life. A participant in grace is taken back to connected.
    pub fn heartbeat(&mut self, user_id: &UserId, now: Millis) -> Result<Events, PartyError> {
        self.guarded(|s| s.revive(user_id, now))
    }

    pub fn command(
        &mut self,
        user_id: &UserId,
        command: PlaybackCommand,
        now: Millis,
    ) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = s.revive(user_id, now)?;
            let may_control = s.members.is_host(user_id) || s.settings.allow_guest_control;
            if let Applied::Changed(state) = s.authority.apply(user_id, command, may_control, now)? {
                debug!(
                    "Party {}: {:?} at {:.3}s by {}",
                    s.code, command.kind, state.position, user_id
                );
                // An explicit command takes over from any buffering hold. Resuming over a
                // stall reopens the advisory for the next one.
                s.paused_for_buffering = false;
                if state.is_playing {
                    s.buffering.release();
                }
                events.push(PartyEvent::PlaybackStateChanged { state });
            }
            Ok(events)
        })
    }

    pub fn report_buffering(
        &mut self,
        user_id: &UserId,
        state: BufferingState,
        now: Millis,
    ) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = s.revive(user_id, now)?;
            if s.buffering.report(&mut s.members, user_id, state, now)? {
                events.push(PartyEvent::BufferingStatusChanged {
                    buffering_user_ids: s.buffering.buffering_ids(&s.members),
                });
            }
            s.evaluate_buffering(now, &mut events);
            Ok(events)
        })
    }

    pub fn post_message(
        &mut self,
        user_id: &UserId,
        body: &str,
        now: Millis,
    ) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = s.revive(user_id, now)?;
            let sender = s.members.get(user_id).ok_or(PartyError::NotMember)?;
            let message = s.chat.post_message(sender, body, now)?;
            events.push(PartyEvent::ChatMessagePosted { message });
            Ok(events)
        })
    }

    pub fn post_reaction(
        &mut self,
        user_id: &UserId,
        emoji: &str,
        anchor: Option<f64>,
        now: Millis,
    ) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = s.revive(user_id, now)?;
            // Without an explicit anchor the reaction is pinned to the live position.
            let anchor = anchor.or_else(|| Some(s.authority.position_at(now)));
            let sender = s.members.get(user_id).ok_or(PartyError::NotMember)?;
            let reaction = s.chat.post_reaction(sender, emoji, anchor, now)?;
            events.push(PartyEvent::ReactionPosted { reaction });
            Ok(events)
        })
    }

    pub fn transfer_host(
        &mut self,
        from: &UserId,
        to: &UserId,
        now: Millis,
    ) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = s.revive(from, now)?;
            if s.members.transfer_host(from, to)? {
                info!("Party {}: host transferred from {} to {}", s.code, from, to);
                events.push(PartyEvent::HostChanged {
                    new_host_user_id: to.clone(),
                });
                s.evaluate_buffering(now, &mut events);
            }
            Ok(events)
        })
    }

    pub fn update_settings(
        &mut self,
        user_id: &UserId,
        update: SettingsUpdate,
        now: Millis,
    ) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = s.revive(user_id, now)?;
            if !s.members.is_host(user_id) {
                return Err(PartyError::Forbidden);
            }

            let mut next = s.settings;
            if let Some(max) = update.max_participants {
                validate_capacity(max, &s.config)?;
                s.members.set_max_participants(max)?;
                next.max_participants = max;
            }
            if let Some(allow) = update.allow_guest_control {
                next.allow_guest_control = allow;
            }
            if next == s.settings {
                return Ok(events);
            }

            s.settings = next;
            events.push(PartyEvent::SettingsChanged { settings: next });
            s.evaluate_buffering(now, &mut events);
            Ok(events)
        })
    }

    /// Periodic housekeeping: silent participants drop to grace, expired grace becomes a
    /// leave.
    pub fn sweep(&mut self, now: Millis) -> Result<Events, PartyError> {
        self.guarded(|s| {
            let mut events = Vec::new();
            for user_id in s.members.silent_since(now, s.config.heartbeat_timeout_ms) {
                debug!("Party {}: {} missed heartbeats", s.code, user_id);
                events.extend(s.drop_member(&user_id, now)?);
            }
            for user_id in s.members.grace_expired(now, s.config.grace_period_ms) {
                debug!("Party {}: grace expired for {}", s.code, user_id);
                events.extend(s.remove_member(&user_id, now)?);
                if s.closed.is_some() {
                    break;
                }
            }
            Ok(events)
        })
    }

    pub fn snapshot(&self, now: Millis) -> PartySnapshot {
        PartySnapshot {
            code: self.code.clone(),
            content_ref: self.content_ref.clone(),
            content: self.content.clone(),
            settings: self.settings,
            host_user_id: self.members.host().cloned(),
            participants: self.members.views(),
            playback: self.authority.state_at(now),
            buffering_user_ids: self.buffering.buffering_ids(&self.members),
            chat_history: self.chat.recent(self.config.history_replay),
            created_at: self.created_at,
        }
    }

    /// Marks the session closed and returns the closing broadcast.
    pub fn close(&mut self, reason: CloseReason) -> PartyEvent {
        if self.closed.is_none() {
            info!("Party {} closed: {:?}", self.code, reason);
            self.closed = Some(reason);
        }
        PartyEvent::SessionClosed {
            code: self.code.clone(),
            reason: self.closed.unwrap_or(reason),
        }
    }

    /// Runs one transition. A closed session behaves as if it no longer exists, and an
    /// inconsistency found along the way tears the session down.
    fn guarded<F>(&mut self, op: F) -> Result<Events, PartyError>
    where
        F: FnOnce(&mut Self) -> Result<Events, PartyError>,
    {
        if self.closed.is_some() {
            return Err(PartyError::NotFound);
        }

        let mut result = op(self);
        if result.is_ok() && self.closed.is_none() {
            if let Err(e) = self.members.verify() {
                result = Err(e);
            }
        }

        match result {
            Err(PartyError::InternalInconsistency(detail)) => {
                error!("Party {} is inconsistent: {}", self.code, detail);
                Ok(vec![self.close(CloseReason::InternalError)])
            }
            other => other,
        }
    }

    /// A frame from a participant the sweep moved to grace proves their link is alive.
    fn revive(&mut self, user_id: &UserId, now: Millis) -> Result<Events, PartyError> {
        if !self.members.mark_reconnected(user_id, now)? {
            return Ok(Vec::new());
        }
        debug!("Party {}: {} is back", self.code, user_id);
        Ok(vec![PartyEvent::MemberReconnected {
            user_id: user_id.clone(),
        }])
    }

    fn remove_member(&mut self, user_id: &UserId, now: Millis) -> Result<Events, PartyError> {
        let was_buffering = self
            .members
            .get(user_id)
            .is_some_and(|p| p.buffering_since.is_some() && p.is_connected());
        let departure = self.members.leave(user_id)?;
        debug!("Party {}: {} left", self.code, departure.participant.user_id);

        let mut events = vec![PartyEvent::MemberLeft {
            user_id: user_id.clone(),
        }];
        match departure.host_change {
            HostChange::Unchanged => {}
            HostChange::Transferred(new_host_user_id) => {
                info!("Party {}: host handed over to {}", self.code, new_host_user_id);
                events.push(PartyEvent::HostChanged { new_host_user_id });
            }
            HostChange::NoSuccessor => {
                events.push(self.close(CloseReason::HostLeftNoSuccessor));
                return Ok(events);
            }
        }
        if self.members.is_empty() {
            events.push(self.close(CloseReason::Empty));
            return Ok(events);
        }

        if was_buffering {
            events.push(PartyEvent::BufferingStatusChanged {
                buffering_user_ids: self.buffering.buffering_ids(&self.members),
            });
        }
        self.evaluate_buffering(now, &mut events);
        Ok(events)
    }

    fn drop_member(&mut self, user_id: &UserId, now: Millis) -> Result<Events, PartyError> {
        let was_buffering = self
            .members
            .get(user_id)
            .is_some_and(|p| p.buffering_since.is_some() && p.is_connected());
        if !self.members.mark_disconnected(user_id, now)? {
            return Ok(Vec::new());
        }

        let mut events = vec![PartyEvent::MemberDisconnected {
            user_id: user_id.clone(),
        }];
        if was_buffering {
            events.push(PartyEvent::BufferingStatusChanged {
                buffering_user_ids: self.buffering.buffering_ids(&self.members),
            });
        }
        self.evaluate_buffering(now, &mut events);
        Ok(events)
    }

    fn evaluate_buffering(&mut self, now: Millis, events: &mut Events) {
        match self
            .buffering
            .evaluate(&self.members, self.settings.allow_guest_control)
        {
            BufferingDecision::Nothing => {}
            BufferingDecision::SuggestPause => {
                let buffering_user_ids = self.buffering.buffering_ids(&self.members);
                // The pause is attributed to whoever stalled most recently.
                let trigger = self
                    .members
                    .connected()
                    .filter(|p| p.buffering_since.is_some())
                    .max_by_key(|p| p.buffering_since)
                    .map(|p| p.user_id.clone());
                events.push(PartyEvent::PauseSuggested { buffering_user_ids });

                if let Some(trigger) = trigger {
                    if let Applied::Changed(state) = self.authority.pause_for(&trigger, now) {
                        info!("Party {}: paused for buffering ({})", self.code, trigger);
                        self.paused_for_buffering = true;
                        events.push(PartyEvent::PlaybackStateChanged { state });
                    }
                }
            }
            BufferingDecision::Cleared { resume } => {
                let host = self.members.host().cloned();
                if resume && self.paused_for_buffering && !self.authority.is_playing() {
                    if let Some(host) = host {
                        if let Applied::Changed(state) = self.authority.resume_for(&host, now) {
                            info!("Party {}: everyone caught up, resuming", self.code);
                            events.push(PartyEvent::PlaybackStateChanged { state });
                        }
                    }
                }
                self.paused_for_buffering = false;
            }
        }
    }
}

fn validate_capacity(max: usize, config: &PartyConfig) -> Result<(), PartyError> {
    if max < 2 || max > config.max_party_size {
        return Err(PartyError::InvalidSettings(format!(
            "maxParticipants must be between 2 and {}",
            config.max_party_size
        )));
    }
    Ok(())
}
