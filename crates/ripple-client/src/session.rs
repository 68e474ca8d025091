//! Per-open-conversation transcript state. A viewer has at most one
//! conversation open; push events are routed against the key that is open at
//! the moment each event arrives, not the one that was open when the push
//! channel connected.

use uuid::Uuid;

use ripple_types::models::{ConversationKey, DirectMessage, MessageEnvelope};

/// Where a push event went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Appended to the open transcript.
    Transcript,
    /// Not for the open conversation; surface a notification instead.
    Background,
}

struct OpenConversation {
    partner: Uuid,
    /// Ascending order, oldest first.
    transcript: Vec<DirectMessage>,
}

pub struct ChatSession {
    viewer: Uuid,
    open: Option<OpenConversation>,
}

impl ChatSession {
    pub fn new(viewer: Uuid) -> Self {
        Self { viewer, open: None }
    }

    pub fn viewer(&self) -> Uuid {
        self.viewer
    }

    pub fn open_partner(&self) -> Option<Uuid> {
        self.open.as_ref().map(|o| o.partner)
    }

    /// Open a conversation from a freshly pulled history (newest first, as
    /// the store returns it). The transcript is kept oldest-first for
    /// display, so the pull order is reversed on entry.
    ///
    /// Opening replaces whatever conversation was open before.
    pub fn open(&mut self, partner: Uuid, history_newest_first: Vec<DirectMessage>) {
        let mut transcript = history_newest_first;
        transcript.reverse();
        self.open = Some(OpenConversation { partner, transcript });
    }

    /// Navigate away. The transcript is dropped; anything already merged
    /// into the aggregator stays merged.
    pub fn close(&mut self) {
        self.open = None;
    }

    /// Route one push event. Belongs to the open conversation: append to the
    /// transcript (a pushed event is always newer than pulled history, so
    /// appending at the ascending end keeps order). Anything else is
    /// `Background` for the caller to surface as a notification.
    pub fn route(&mut self, event: &MessageEnvelope) -> Routed {
        let open = match self.open.as_mut() {
            Some(open) => open,
            None => return Routed::Background,
        };

        let open_key = ConversationKey::new(self.viewer, open.partner);
        if event.conversation_key() == open_key {
            open.transcript.push(event.to_message());
            Routed::Transcript
        } else {
            Routed::Background
        }
    }

    /// The open transcript, oldest first.
    pub fn transcript(&self) -> Option<&[DirectMessage]> {
        self.open.as_ref().map(|o| o.transcript.as_slice())
    }
}
