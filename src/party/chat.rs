//! Ephemeral chat and reactions for one party.

use std::collections::VecDeque;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    common::{
        PartyError,
        types::{Millis, UserId},
    },
    party::membership::Participant,
};

pub const MAX_MESSAGE_CHARS: usize = 500;

pub const REACTION_EMOJIS: &[&str] = &[
    "👍", "❤️", "😂", "😮", "😢", "😱", "👏", "🔥", "🎉", "🍿",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    /// Position in the party's single total order of chat entries.
    pub seq: u64,
    pub sender_id: UserId,
    pub sender_name: String,
    pub body: String,
    pub sent_at: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reaction {
    pub id: Uuid,
    pub seq: u64,
    pub sender_id: UserId,
    pub sender_name: String,
    pub emoji: String,
    pub sent_at: Millis,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_time_anchor: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ChatEntry {
    Message(ChatMessage),
    Reaction(Reaction),
}

impl ChatEntry {
    pub fn seq(&self) -> u64 {
        match self {
            Self::Message(m) => m.seq,
            Self::Reaction(r) => r.seq,
        }
    }
}

#[derive(Debug)]
pub struct ChatChannel {
    log: VecDeque<ChatEntry>,
    retention: usize,
    next_seq: u64,
}

impl ChatChannel {
    pub fn new(retention: usize) -> Self {
        Self {
            log: VecDeque::with_capacity(retention.min(256)),
            retention,
            next_seq: 1,
        }
    }

    pub fn post_message(
        &mut self,
        sender: &Participant,
        body: &str,
        now: Millis,
    ) -> Result<ChatMessage, PartyError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(PartyError::Empty);
        }
        if body.chars().count() > MAX_MESSAGE_CHARS {
            return Err(PartyError::TooLong(MAX_MESSAGE_CHARS));
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            seq: self.take_seq(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.profile.display_name.clone(),
            body: body.to_string(),
            sent_at: now,
        };
        self.append(ChatEntry::Message(message.clone()));
        Ok(message)
    }

    pub fn post_reaction(
        &mut self,
        sender: &Participant,
        emoji: &str,
        anchor: Option<f64>,
        now: Millis,
    ) -> Result<Reaction, PartyError> {
        if !REACTION_EMOJIS.contains(&emoji) {
            return Err(PartyError::InvalidEmoji);
        }
        if anchor.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(PartyError::InvalidPosition);
        }

        let reaction = Reaction {
            id: Uuid::new_v4(),
            seq: self.take_seq(),
            sender_id: sender.user_id.clone(),
            sender_name: sender.profile.display_name.clone(),
            emoji: emoji.to_string(),
            sent_at: now,
            content_time_anchor: anchor,
        };
        self.append(ChatEntry::Reaction(reaction.clone()));
        Ok(reaction)
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<ChatEntry> {
        let skip = self.log.len().saturating_sub(n);
        self.log.iter().skip(skip).cloned().collect()
    }

    fn take_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn append(&mut self, entry: ChatEntry) {
        if self.retention == 0 {
            return;
        }
        while self.log.len() >= self.retention {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ConnectionState, Profile};

    fn participant(id: &str) -> Participant {
        Participant {
            user_id: UserId::from(id),
            profile: Profile::named(format!("{} name", id)),
            connection: ConnectionState::Connected,
            joined_at: 0,
            last_seen_at: 0,
            disconnected_at: None,
            buffering_since: None,
        }
    }

    #[test]
    fn test_message_validation() {
        let mut chat = ChatChannel::new(10);
        let alice = participant("alice");

        assert_eq!(chat.post_message(&alice, "   ", 1).unwrap_err(), PartyError::Empty);
        let long = "x".repeat(MAX_MESSAGE_CHARS + 1);
        assert_eq!(
            chat.post_message(&alice, &long, 1).unwrap_err(),
            PartyError::TooLong(MAX_MESSAGE_CHARS)
        );
        // Limit counts characters, not bytes.
        let emoji_body = "🍿".repeat(MAX_MESSAGE_CHARS);
        assert!(chat.post_message(&alice, &emoji_body, 1).is_ok());

        let message = chat.post_message(&alice, "  hello  ", 2).unwrap();
        assert_eq!(message.body, "hello");
        assert_eq!(message.sender_name, "alice name");
        assert_eq!(chat.recent(10).len(), 2);
    }

    #[test]
    fn test_reaction_validation() {
        let mut chat = ChatChannel::new(10);
        let bob = participant("bob");
        assert_eq!(
            chat.post_reaction(&bob, "🦀", None, 1).unwrap_err(),
            PartyError::InvalidEmoji
        );
        assert_eq!(
            chat.post_reaction(&bob, "🔥", Some(-3.0), 1).unwrap_err(),
            PartyError::InvalidPosition
        );
        let reaction = chat.post_reaction(&bob, "🔥", Some(61.5), 1).unwrap();
        assert_eq!(reaction.content_time_anchor, Some(61.5));
    }

    #[test]
    fn test_total_order_and_retention() {
        let mut chat = ChatChannel::new(3);
        let a = participant("a");
        let b = participant("b");
        chat.post_message(&a, "one", 1).unwrap();
        chat.post_reaction(&b, "👍", None, 2).unwrap();
        chat.post_message(&b, "three", 3).unwrap();
        chat.post_message(&a, "four", 4).unwrap();

        let seqs: Vec<u64> = chat.recent(10).iter().map(ChatEntry::seq).collect();
        assert_eq!(seqs, vec![2, 3, 4]);
        let last: Vec<u64> = chat.recent(2).iter().map(ChatEntry::seq).collect();
        assert_eq!(last, vec![3, 4]);
    }

    #[test]
    fn test_rejected_posts_do_not_consume_sequence() {
        let mut chat = ChatChannel::new(10);
        let a = participant("a");
        chat.post_message(&a, "", 1).unwrap_err();
        let message = chat.post_message(&a, "first", 2).unwrap();
        assert_eq!(message.seq, 1);
    }
}
