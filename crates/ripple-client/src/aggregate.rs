//! Latest-message-per-conversation view, built by merging a pulled snapshot
//! with live push events. The merge is the single source of truth: it is
//! idempotent and order-independent, so snapshot and push data can arrive in
//! any interleaving and converge to the same state.

use std::collections::HashMap;

use uuid::Uuid;

use ripple_types::models::{ConversationKey, MessageEnvelope};

pub struct ConversationAggregator {
    viewer: Uuid,
    entries: HashMap<ConversationKey, MessageEnvelope>,
}

impl ConversationAggregator {
    pub fn new(viewer: Uuid) -> Self {
        Self {
            viewer,
            entries: HashMap::new(),
        }
    }

    pub fn viewer(&self) -> Uuid {
        self.viewer
    }

    /// Merge a pulled batch. Duplicates and reorderings are valid input;
    /// feeding the same message twice is the same as feeding it once.
    pub fn merge_snapshot<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = MessageEnvelope>,
    {
        for message in messages {
            self.merge_one(message);
        }
    }

    /// Merge one live push event. The viewer's own sends are excluded here:
    /// they already reached this view through the send acknowledgment, and
    /// counting the echo would double them up.
    ///
    /// Returns whether the event was merged.
    pub fn merge_push(&mut self, message: MessageEnvelope) -> bool {
        if message.from.id == self.viewer {
            return false;
        }
        self.merge_one(message);
        true
    }

    /// Replace the entry for the message's conversation iff the incoming
    /// message is strictly newer, or there is no entry yet.
    fn merge_one(&mut self, message: MessageEnvelope) {
        let key = message.conversation_key();
        match self.entries.get(&key) {
            Some(existing) if existing.created_at >= message.created_at => {}
            _ => {
                self.entries.insert(key, message);
            }
        }
    }

    /// Display order: one entry per conversation, newest first.
    pub fn overview(&self) -> Vec<&MessageEnvelope> {
        let mut entries: Vec<&MessageEnvelope> = self.entries.values().collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        entries
    }

    pub fn entry(&self, key: &ConversationKey) -> Option<&MessageEnvelope> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
