//! Who is in a party, in what order they joined, and who holds the host role.
//!
//! The host is stored once as `host`; `is_host` on a participant is derived from it, so
//! there can never be two hosts. `verify` checks the other half of the invariant: a
//! non-empty registry always names a host that is actually present.

use crate::{
    common::{
        PartyError,
        types::{Millis, UserId},
    },
    protocol::{ConnectionState, ParticipantView, Profile},
};

#[derive(Debug, Clone)]
pub struct Participant {
    pub user_id: UserId,
    pub profile: Profile,
    pub connection: ConnectionState,
    pub joined_at: Millis,
    pub last_seen_at: Millis,
    pub disconnected_at: Option<Millis>,
    pub buffering_since: Option<Millis>,
}

impl Participant {
    pub fn is_connected(&self) -> bool {
        self.connection == ConnectionState::Connected
    }

    pub fn view(&self, is_host: bool) -> ParticipantView {
        ParticipantView {
            user_id: self.user_id.clone(),
            display_name: self.profile.display_name.clone(),
            avatar: self.profile.avatar.clone(),
            is_host,
            connection_state: self.connection,
            joined_at: self.joined_at,
            buffering_since: self.buffering_since,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The user was holding a seat in disconnected-grace and took it back.
    Reconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostChange {
    Unchanged,
    Transferred(UserId),
    /// The host left and nobody still connected can take over.
    NoSuccessor,
}

#[derive(Debug)]
pub struct Departure {
    pub participant: Participant,
    pub host_change: HostChange,
}

#[derive(Debug)]
pub struct MembershipRegistry {
    /// Join order. Reconnects keep their original slot.
    participants: Vec<Participant>,
    host: Option<UserId>,
    max_participants: usize,
}

impl MembershipRegistry {
    pub fn new(max_participants: usize) -> Self {
        Self {
            participants: Vec::new(),
            host: None,
            max_participants,
        }
    }

    pub fn join(
        &mut self,
        user_id: UserId,
        profile: Profile,
        is_creator: bool,
        now: Millis,
    ) -> Result<JoinOutcome, PartyError> {
        if let Some(existing) = self.get_mut(&user_id) {
            if existing.connection == ConnectionState::Connected {
                return Err(PartyError::AlreadyJoined);
            }
            existing.profile = profile;
            existing.connection = ConnectionState::Connected;
            existing.last_seen_at = now;
            existing.disconnected_at = None;
            return Ok(JoinOutcome::Reconnected);
        }

        if !is_creator && self.active_count() >= self.max_participants {
            return Err(PartyError::PartyFull);
        }

        self.participants.push(Participant {
            user_id: user_id.clone(),
            profile,
            connection: ConnectionState::Connected,
            joined_at: now,
            last_seen_at: now,
            disconnected_at: None,
            buffering_since: None,
        });
        if is_creator || self.host.is_none() {
            self.host = Some(user_id);
        }
        self.verify()?;
        Ok(JoinOutcome::Joined)
    }

    /// Removes the user. When the host leaves, the earliest-joined connected participant
    /// takes over.
    pub fn leave(&mut self, user_id: &UserId) -> Result<Departure, PartyError> {
        let idx = self
            .index_of(user_id)
            .ok_or(PartyError::NotMember)?;
        let mut participant = self.participants.remove(idx);
        participant.connection = ConnectionState::Left;
        participant.buffering_since = None;

        let mut host_change = HostChange::Unchanged;
        if self.host.as_ref() == Some(user_id) {
            self.host = None;
            if !self.participants.is_empty() {
                match self.participants.iter().find(|p| p.is_connected()) {
                    Some(successor) => {
                        self.host = Some(successor.user_id.clone());
                        host_change = HostChange::Transferred(successor.user_id.clone());
                    }
                    None => host_change = HostChange::NoSuccessor,
                }
            }
        }

        // A hostless, non-empty registry is only legal on the way to teardown.
        if host_change != HostChange::NoSuccessor {
            self.verify()?;
        }
        Ok(Departure {
            participant,
            host_change,
        })
    }

    /// Returns false if the user was already disconnected.
    pub fn mark_disconnected(&mut self, user_id: &UserId, now: Millis) -> Result<bool, PartyError> {
        let participant = self.get_mut(user_id).ok_or(PartyError::NotMember)?;
        if participant.connection != ConnectionState::Connected {
            return Ok(false);
        }
        participant.connection = ConnectionState::DisconnectedGrace;
        participant.disconnected_at = Some(now);
        // A dropped player can't be waited on.
        participant.buffering_since = None;
        Ok(true)
    }

    pub fn mark_reconnected(&mut self, user_id: &UserId, now: Millis) -> Result<bool, PartyError> {
        let participant = self.get_mut(user_id).ok_or(PartyError::NotMember)?;
        participant.last_seen_at = now;
        if participant.connection == ConnectionState::Connected {
            return Ok(false);
        }
        participant.connection = ConnectionState::Connected;
        participant.disconnected_at = None;
        Ok(true)
    }

    /// Connected participants that have been silent for longer than `timeout_ms`.
    pub fn silent_since(&self, now: Millis, timeout_ms: u64) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| p.is_connected() && now.saturating_sub(p.last_seen_at) > timeout_ms)
            .map(|p| p.user_id.clone())
            .collect()
    }

    /// Participants whose disconnected-grace window has run out.
    pub fn grace_expired(&self, now: Millis, grace_ms: u64) -> Vec<UserId> {
        self.participants
            .iter()
            .filter(|p| {
                p.connection == ConnectionState::DisconnectedGrace
                    && p
                        .disconnected_at
                        .is_some_and(|at| now.saturating_sub(at) >= grace_ms)
            })
            .map(|p| p.user_id.clone())
            .collect()
    }

    /// Hands the host role to another connected participant.
    pub fn transfer_host(&mut self, from: &UserId, to: &UserId) -> Result<bool, PartyError> {
        if !self.is_host(from) {
            return Err(PartyError::Forbidden);
        }
        let target = self.get(to).ok_or(PartyError::NotMember)?;
        if !target.is_connected() {
            return Err(PartyError::NotMember);
        }
        if from == to {
            return Ok(false);
        }
        self.host = Some(to.clone());
        self.verify()?;
        Ok(true)
    }

    pub fn set_max_participants(&mut self, max: usize) -> Result<(), PartyError> {
        if max < 2 {
            return Err(PartyError::InvalidSettings(
                "maxParticipants must be at least 2".into(),
            ));
        }
        if max < self.active_count() {
            return Err(PartyError::InvalidSettings(format!(
                "maxParticipants cannot drop below the {} current participants",
                self.active_count()
            )));
        }
        self.max_participants = max;
        Ok(())
    }

    pub fn set_buffering(
        &mut self,
        user_id: &UserId,
        since: Option<Millis>,
    ) -> Result<bool, PartyError> {
        let participant = self.get_mut(user_id).ok_or(PartyError::NotMember)?;
        if !participant.is_connected() {
            return Ok(false);
        }
        let changed = participant.buffering_since.is_some() != since.is_some();
        if changed {
            participant.buffering_since = since;
        }
        Ok(changed)
    }

    /// Host uniqueness and presence.
    pub fn verify(&self) -> Result<(), PartyError> {
        match &self.host {
            None if self.participants.is_empty() => Ok(()),
            None => Err(PartyError::InternalInconsistency(
                "non-empty party without a host".into(),
            )),
            Some(host) => {
                let hosts = self
                    .participants
                    .iter()
                    .filter(|p| &p.user_id == host)
                    .count();
                if hosts == 1 {
                    Ok(())
                } else {
                    Err(PartyError::InternalInconsistency(format!(
                        "host {} present {} times",
                        host, hosts
                    )))
                }
            }
        }
    }

    pub fn list(&self) -> &[Participant] {
        &self.participants
    }

    pub fn views(&self) -> Vec<ParticipantView> {
        self.participants
            .iter()
            .map(|p| p.view(self.is_host(&p.user_id)))
            .collect()
    }

    pub fn view_of(&self, user_id: &UserId) -> Option<ParticipantView> {
        self.get(user_id).map(|p| p.view(self.is_host(user_id)))
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    fn get_mut(&mut self, user_id: &UserId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| &p.user_id == user_id)
    }

    fn index_of(&self, user_id: &UserId) -> Option<usize> {
        self.participants.iter().position(|p| &p.user_id == user_id)
    }

    pub fn host(&self) -> Option<&UserId> {
        self.host.as_ref()
    }

    pub fn is_host(&self, user_id: &UserId) -> bool {
        self.host.as_ref() == Some(user_id)
    }

    pub fn connected(&self) -> impl Iterator<Item = &Participant> {
        self.participants.iter().filter(|p| p.is_connected())
    }

    /// Connected plus disconnected-grace; the number capacity is checked against.
    pub fn active_count(&self) -> usize {
        self.participants.len()
    }

    pub fn max_participants(&self) -> usize {
        self.max_participants
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[cfg(test)]
    pub(crate) fn force_host(&mut self, user_id: Option<UserId>) {
        self.host = user_id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(s: &str) -> UserId {
        UserId::from(s)
    }

    fn registry_with(users: &[&str], max: usize) -> MembershipRegistry {
        let mut registry = MembershipRegistry::new(max);
        for (i, user) in users.iter().enumerate() {
            registry
                .join(uid(user), Profile::named(*user), i == 0, i as u64)
                .unwrap();
        }
        registry
    }

    fn host_count(registry: &MembershipRegistry) -> usize {
        registry.views().iter().filter(|v| v.is_host).count()
    }

    #[test]
    fn test_creator_is_host_and_capacity_enforced() {
        let mut registry = registry_with(&["u1", "u2"], 2);
        assert!(registry.is_host(&uid("u1")));
        assert_eq!(
            registry
                .join(uid("u3"), Profile::named("u3"), false, 10)
                .unwrap_err(),
            PartyError::PartyFull
        );
        assert_eq!(
            registry
                .join(uid("u2"), Profile::named("u2"), false, 10)
                .unwrap_err(),
            PartyError::AlreadyJoined
        );
    }

    #[test]
    fn test_grace_participants_count_toward_capacity() {
        let mut registry = registry_with(&["u1", "u2"], 2);
        registry.mark_disconnected(&uid("u2"), 5).unwrap();
        assert_eq!(
            registry
                .join(uid("u3"), Profile::named("u3"), false, 6)
                .unwrap_err(),
            PartyError::PartyFull
        );
        // ...but the seat holder can come back.
        assert_eq!(
            registry
                .join(uid("u2"), Profile::named("u2"), false, 7)
                .unwrap(),
            JoinOutcome::Reconnected
        );
    }

    #[test]
    fn test_host_handover_follows_join_order() {
        let mut registry = registry_with(&["a", "b", "c"], 5);

        let departure = registry.leave(&uid("a")).unwrap();
        assert_eq!(departure.host_change, HostChange::Transferred(uid("b")));
        assert_eq!(departure.participant.connection, ConnectionState::Left);
        assert_eq!(host_count(&registry), 1);

        let departure = registry.leave(&uid("b")).unwrap();
        assert_eq!(departure.host_change, HostChange::Transferred(uid("c")));
        assert_eq!(host_count(&registry), 1);

        let departure = registry.leave(&uid("c")).unwrap();
        assert_eq!(departure.host_change, HostChange::Unchanged);
        assert!(registry.is_empty());
        assert_eq!(registry.host(), None);
        assert!(registry.verify().is_ok());
    }

    #[test]
    fn test_handover_skips_disconnected() {
        let mut registry = registry_with(&["a", "b", "c"], 5);
        registry.mark_disconnected(&uid("b"), 10).unwrap();
        let departure = registry.leave(&uid("a")).unwrap();
        assert_eq!(departure.host_change, HostChange::Transferred(uid("c")));
    }

    #[test]
    fn test_no_connected_successor() {
        let mut registry = registry_with(&["a", "b"], 5);
        registry.mark_disconnected(&uid("b"), 10).unwrap();
        let departure = registry.leave(&uid("a")).unwrap();
        assert_eq!(departure.host_change, HostChange::NoSuccessor);
        assert!(registry.verify().is_err());
    }

    #[test]
    fn test_non_host_leave_keeps_host() {
        let mut registry = registry_with(&["a", "b", "c"], 5);
        let departure = registry.leave(&uid("b")).unwrap();
        assert_eq!(departure.host_change, HostChange::Unchanged);
        assert!(registry.is_host(&uid("a")));
        assert_eq!(registry.leave(&uid("b")).unwrap_err(), PartyError::NotMember);
    }

    #[test]
    fn test_list_is_stable_across_reconnect() {
        let mut registry = registry_with(&["a", "b", "c"], 5);
        registry.mark_disconnected(&uid("b"), 10).unwrap();
        registry
            .join(uid("b"), Profile::named("Bee"), false, 20)
            .unwrap();
        let order: Vec<&str> = registry.list().iter().map(|p| &*p.user_id).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(registry.get(&uid("b")).unwrap().profile.display_name, "Bee");
    }

    #[test]
    fn test_timeouts() {
        let mut registry = registry_with(&["a", "b"], 5);
        // Refreshing a connected participant is not a reconnect.
        assert!(!registry.mark_reconnected(&uid("a"), 10_000).unwrap());
        assert_eq!(registry.silent_since(16_000, 15_000), vec![uid("b")]);

        registry.mark_disconnected(&uid("b"), 16_000).unwrap();
        assert!(registry.grace_expired(45_999, 30_000).is_empty());
        assert_eq!(registry.grace_expired(46_000, 30_000), vec![uid("b")]);
    }

    #[test]
    fn test_disconnect_clears_buffering() {
        let mut registry = registry_with(&["a", "b"], 5);
        assert!(registry.set_buffering(&uid("b"), Some(3)).unwrap());
        registry.mark_disconnected(&uid("b"), 4).unwrap();
        assert_eq!(registry.get(&uid("b")).unwrap().buffering_since, None);
        assert!(!registry.set_buffering(&uid("b"), Some(5)).unwrap());
    }

    #[test]
    fn test_transfer_host() {
        let mut registry = registry_with(&["a", "b", "c"], 5);
        assert_eq!(
            registry.transfer_host(&uid("b"), &uid("c")).unwrap_err(),
            PartyError::Forbidden
        );
        registry.mark_disconnected(&uid("c"), 3).unwrap();
        assert_eq!(
            registry.transfer_host(&uid("a"), &uid("c")).unwrap_err(),
            PartyError::NotMember
        );
        assert!(registry.transfer_host(&uid("a"), &uid("b")).unwrap());
        assert!(registry.is_host(&uid("b")));
        assert_eq!(host_count(&registry), 1);
    }

    #[test]
    fn test_capacity_change_bounds() {
        let mut registry = registry_with(&["a", "b", "c"], 5);
        assert!(registry.set_max_participants(1).is_err());
        assert!(registry.set_max_participants(2).is_err());
        registry.set_max_participants(3).unwrap();
        assert_eq!(registry.max_participants(), 3);
    }

    #[test]
    fn test_verify_detects_missing_host() {
        let mut registry = registry_with(&["a", "b"], 5);
        registry.force_host(Some(uid("ghost")));
        assert!(matches!(
            registry.verify(),
            Err(PartyError::InternalInconsistency(_))
        ));
    }
}
