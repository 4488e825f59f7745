use std::collections::HashMap;

use axum::extract::ws::{CloseFrame, Message, close_code};
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::{
    common::{
        PartyError,
        types::{Millis, PartyCode, UserId},
    },
    party::{PartySession, membership::JoinOutcome, session::Events},
    protocol::{IncomingFrame, IncomingMessage, OutgoingMessage, PartySnapshot, Profile},
};

/// A live party plus the outbound channel of every attached socket.
///
/// The lock is held for one state transition and the enqueue of the events it
/// produced, so every member sees events in the order they were applied. Sends are
/// non-blocking; the socket tasks do the actual I/O.
#[derive(Debug)]
pub struct PartyRoom {
    code: PartyCode,
    inner: Mutex<RoomInner>,
}

#[derive(Debug)]
struct RoomInner {
    session: PartySession,
    peers: HashMap<UserId, flume::Sender<Message>>,
}

/// Counters for the stats route.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoomStats {
    pub participants: usize,
    pub connected: usize,
    pub playing: bool,
}

impl PartyRoom {
    pub fn new(session: PartySession) -> Self {
        Self {
            code: session.code().clone(),
            inner: Mutex::new(RoomInner {
                session,
                peers: HashMap::new(),
            }),
        }
    }

    pub fn code(&self) -> &PartyCode {
        &self.code
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().session.is_closed()
    }

    pub fn snapshot(&self, now: Millis) -> Result<PartySnapshot, PartyError> {
        let inner = self.inner.lock();
        if inner.session.is_closed() {
            return Err(PartyError::NotFound);
        }
        Ok(inner.session.snapshot(now))
    }

    pub fn stats(&self) -> RoomStats {
        let inner = self.inner.lock();
        if inner.session.is_closed() {
            return RoomStats::default();
        }
        let members = inner.session.members();
        RoomStats {
            participants: members.len(),
            connected: members.connected().count(),
            playing: inner.session.is_playing(),
        }
    }

    /// Joins (or reconnects) `user_id` and binds `tx` as their outbound channel. The
    /// `ready` frame is queued on `tx` before any broadcast. Returns whether this was a
    /// reconnect.
    pub fn attach(
        &self,
        user_id: &UserId,
        profile: Profile,
        tx: flume::Sender<Message>,
        now: Millis,
    ) -> Result<bool, PartyError> {
        let mut inner = self.inner.lock();
        let (outcome, events) = inner.session.join(user_id, profile, now)?;
        let resumed = outcome == JoinOutcome::Reconnected;

        let ready = OutgoingMessage::Ready {
            you: user_id.clone(),
            resumed,
            snapshot: inner.session.snapshot(now),
        };
        if let Some(msg) = encode(&ready) {
            let _ = tx.send(msg);
        }
        inner.peers.insert(user_id.clone(), tx);

        debug!(
            "Party {}: {} attached (resumed={})",
            self.code, user_id, resumed
        );
        inner.publish(&self.code, events);
        Ok(resumed)
    }

    /// Applies one client frame. Refusals go back to `tx` only.
    pub fn dispatch(
        &self,
        user_id: &UserId,
        frame: IncomingFrame,
        tx: &flume::Sender<Message>,
        now: Millis,
    ) {
        let mut inner = self.inner.lock();
        // Frames from a socket that has been replaced or dropped are ignored.
        if !inner
            .peers
            .get(user_id)
            .is_some_and(|peer| peer.same_channel(tx))
        {
            debug!("Party {}: ignoring frame from detached socket of {}", self.code, user_id);
            return;
        }

        // Every frame is a sign of life. A revival is announced even if the frame itself is
        // refused.
        if !matches!(frame.op, IncomingMessage::Heartbeat | IncomingMessage::Leave) {
            if let Ok(events) = inner.session.heartbeat(user_id, now) {
                inner.publish(&self.code, events);
            }
        }

        let request = frame.op.name();
        let session = &mut inner.session;
        let result = match frame.op {
            IncomingMessage::Playback { command } => session.command(user_id, command, now),
            IncomingMessage::Buffering { state } => session.report_buffering(user_id, state, now),
            IncomingMessage::Chat { body } => session.post_message(user_id, &body, now),
            IncomingMessage::Reaction { emoji, anchor } => {
                session.post_reaction(user_id, &emoji, anchor, now)
            }
            IncomingMessage::Heartbeat => session.heartbeat(user_id, now),
            IncomingMessage::Leave => session.leave(user_id, now),
            IncomingMessage::TransferHost { to_user_id } => {
                session.transfer_host(user_id, &to_user_id, now)
            }
            IncomingMessage::UpdateSettings { update } => {
                session.update_settings(user_id, update, now)
            }
        };

        match result {
            Ok(events) => inner.publish(&self.code, events),
            Err(e) => {
                debug!("Party {}: {} refused for {}: {}", self.code, request, user_id, e);
                let refusal = OutgoingMessage::Error {
                    request,
                    nonce: frame.nonce,
                    code: e.code(),
                    message: e.to_string(),
                };
                if let Some(msg) = encode(&refusal) {
                    let _ = tx.send(msg);
                }
            }
        }
    }

    /// The socket behind `tx` went away. Ignored if the user has since attached a newer
    /// socket.
    pub fn detach(&self, user_id: &UserId, tx: &flume::Sender<Message>, now: Millis) {
        let mut inner = self.inner.lock();
        let current = inner
            .peers
            .get(user_id)
            .is_some_and(|peer| peer.same_channel(tx));
        if !current {
            return;
        }
        inner.peers.remove(user_id);

        if inner.session.is_closed() || !inner.session.is_member(user_id) {
            return;
        }
        match inner.session.disconnect(user_id, now) {
            Ok(events) => inner.publish(&self.code, events),
            Err(e) => warn!("Party {}: disconnect of {} failed: {}", self.code, user_id, e),
        }
    }

    pub fn leave(&self, user_id: &UserId, now: Millis) -> Result<(), PartyError> {
        let mut inner = self.inner.lock();
        let events = inner.session.leave(user_id, now)?;
        inner.publish(&self.code, events);
        Ok(())
    }

    pub fn sweep(&self, now: Millis) {
        let mut inner = self.inner.lock();
        if inner.session.is_closed() {
            return;
        }
        match inner.session.sweep(now) {
            Ok(events) => inner.publish(&self.code, events),
            Err(e) => error!("Party {}: sweep failed: {}", self.code, e),
        }
    }
}

impl RoomInner {
    /// Fans `events` out to every attached member, then closes sockets that no longer
    /// belong to the party.
    fn publish(&mut self, code: &PartyCode, events: Events) {
        for event in events {
            let Some(msg) = encode(&OutgoingMessage::Event { event }) else {
                continue;
            };
            for tx in self.peers.values() {
                let _ = tx.send(msg.clone());
            }
        }

        let reason = if self.session.is_closed() {
            "party closed"
        } else {
            "left party"
        };
        let session = &self.session;
        let gone: Vec<UserId> = self
            .peers
            .keys()
            .filter(|user_id| session.is_closed() || !session.is_member(user_id))
            .cloned()
            .collect();
        for user_id in gone {
            if let Some(tx) = self.peers.remove(&user_id) {
                debug!("Party {}: closing socket of {}", code, user_id);
                let _ = tx.send(Message::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: reason.into(),
                })));
            }
        }
    }
}

fn encode(msg: &OutgoingMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("Failed to serialize outgoing message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        configs::PartyConfig,
        party::Founding,
        protocol::PartySettings,
    };

    const T0: Millis = 1_700_000_000_000;

    fn uid(s: &str) -> UserId {
        UserId::from(s)
    }

    fn room() -> PartyRoom {
        let founding = Founding {
            content_ref: "movie:m1".parse().unwrap(),
            content: None,
            creator_id: uid("A"),
            creator_profile: Profile::named("Alice"),
            settings: PartySettings {
                max_participants: 4,
                allow_guest_control: false,
            },
        };
        let session = PartySession::new(
            PartyCode("ROOM01".into()),
            founding,
            PartyConfig::default(),
            T0,
        )
        .unwrap();
        PartyRoom::new(session)
    }

    fn drain(rx: &flume::Receiver<Message>) -> Vec<serde_json::Value> {
        rx.try_iter()
            .filter_map(|msg| match msg {
                Message::Text(text) => serde_json::from_str(text.as_str()).ok(),
                Message::Close(_) => Some(serde_json::json!({"op": "close"})),
                _ => None,
            })
            .collect()
    }

    fn frame(raw: &str) -> IncomingFrame {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_ready_precedes_broadcasts() {
        let room = room();
        let (tx_a, rx_a) = flume::unbounded();
        assert!(room.attach(&uid("A"), Profile::named("Alice"), tx_a, T0).unwrap());

        let frames = drain(&rx_a);
        assert_eq!(frames[0]["op"], "ready");
        assert_eq!(frames[0]["snapshot"]["code"], "ROOM01");
        assert_eq!(frames[1]["op"], "event");
        assert_eq!(frames[1]["type"], "memberReconnected");

        let (tx_b, rx_b) = flume::unbounded();
        assert!(!room.attach(&uid("B"), Profile::named("Bob"), tx_b, T0 + 1).unwrap());
        let a_frames = drain(&rx_a);
        assert_eq!(a_frames[0]["type"], "memberJoined");
        assert_eq!(a_frames[0]["participant"]["userId"], "B");
        let b_frames = drain(&rx_b);
        assert_eq!(b_frames[0]["op"], "ready");
    }

    #[test]
    fn test_refusal_goes_to_sender_only() {
        let room = room();
        let (tx_a, rx_a) = flume::unbounded();
        let (tx_b, rx_b) = flume::unbounded();
        room.attach(&uid("A"), Profile::named("Alice"), tx_a, T0).unwrap();
        room.attach(&uid("B"), Profile::named("Bob"), tx_b.clone(), T0).unwrap();
        drain(&rx_a);
        drain(&rx_b);

        room.dispatch(
            &uid("B"),
            frame(r#"{"op":"playback","nonce":"x1","kind":"play","position":0}"#),
            &tx_b,
            T0 + 10,
        );
        let b_frames = drain(&rx_b);
        assert_eq!(b_frames.len(), 1);
        assert_eq!(b_frames[0]["op"], "error");
        assert_eq!(b_frames[0]["request"], "playback");
        assert_eq!(b_frames[0]["nonce"], "x1");
        assert_eq!(b_frames[0]["code"], "forbidden");
        assert!(drain(&rx_a).is_empty());
    }

    #[test]
    fn test_refused_frame_still_revives_member() {
        let room = room();
        let (tx_a, rx_a) = flume::unbounded();
        let (tx_b, rx_b) = flume::unbounded();
        room.attach(&uid("A"), Profile::named("Alice"), tx_a.clone(), T0).unwrap();
        room.attach(&uid("B"), Profile::named("Bob"), tx_b.clone(), T0).unwrap();
        room.dispatch(&uid("A"), frame(r#"{"op":"heartbeat"}"#), &tx_a, T0 + 10_000);
        room.sweep(T0 + 16_000);
        assert_eq!(room.stats().connected, 1);
        drain(&rx_a);
        drain(&rx_b);

        room.dispatch(
            &uid("B"),
            frame(r#"{"op":"playback","kind":"play","position":0}"#),
            &tx_b,
            T0 + 17_000,
        );
        let a_frames = drain(&rx_a);
        assert_eq!(a_frames.len(), 1);
        assert_eq!(a_frames[0]["type"], "memberReconnected");
        let b_frames = drain(&rx_b);
        assert_eq!(b_frames[0]["type"], "memberReconnected");
        assert_eq!(b_frames[1]["code"], "forbidden");
        assert_eq!(room.stats().connected, 2);
    }

    #[test]
    fn test_stale_socket_cannot_disconnect_member() {
        let room = room();
        let (old_tx, _old_rx) = flume::unbounded();
        room.attach(&uid("A"), Profile::named("Alice"), old_tx.clone(), T0).unwrap();
        room.detach(&uid("A"), &old_tx, T0 + 1);

        let (new_tx, new_rx) = flume::unbounded();
        assert!(room.attach(&uid("A"), Profile::named("Alice"), new_tx, T0 + 2).unwrap());
        drain(&new_rx);

        // The old socket's late cleanup must not touch the new one.
        room.detach(&uid("A"), &old_tx, T0 + 3);
        assert_eq!(room.stats().connected, 1);
    }

    #[test]
    fn test_leave_closes_socket() {
        let room = room();
        let (tx_a, rx_a) = flume::unbounded();
        let (tx_b, rx_b) = flume::unbounded();
        room.attach(&uid("A"), Profile::named("Alice"), tx_a, T0).unwrap();
        room.attach(&uid("B"), Profile::named("Bob"), tx_b.clone(), T0).unwrap();
        drain(&rx_a);
        drain(&rx_b);

        room.dispatch(&uid("B"), frame(r#"{"op":"leave"}"#), &tx_b, T0 + 5);
        let b_frames = drain(&rx_b);
        assert_eq!(b_frames[0]["type"], "memberLeft");
        assert_eq!(b_frames.last().unwrap()["op"], "close");
        assert_eq!(drain(&rx_a)[0]["type"], "memberLeft");
        assert_eq!(room.stats().participants, 1);
    }

    #[test]
    fn test_last_leave_closes_room() {
        let room = room();
        let (tx_a, rx_a) = flume::unbounded();
        room.attach(&uid("A"), Profile::named("Alice"), tx_a, T0).unwrap();
        drain(&rx_a);

        room.leave(&uid("A"), T0 + 1).unwrap();
        let frames = drain(&rx_a);
        assert_eq!(frames[1]["type"], "sessionClosed");
        assert_eq!(frames[1]["reason"], "empty");
        assert!(room.is_closed());
        assert_eq!(room.snapshot(T0 + 2).unwrap_err(), PartyError::NotFound);
    }
}
