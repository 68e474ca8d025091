//! Glue between the push stream, the open-conversation transcript, and the
//! conversation overview: one entry point that applies the routing and merge
//! rules to every incoming event.

use uuid::Uuid;

use ripple_types::events::PushEvent;
use ripple_types::models::{DirectMessage, MessageEnvelope};

use crate::aggregate::ConversationAggregator;
use crate::session::{ChatSession, Routed};

/// What the caller should do with a push event after it was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum PushOutcome {
    /// Nothing to show (subscription ack, or the viewer's own echo).
    Ignored,
    /// Appended to the open transcript.
    Transcript,
    /// Surface a transient notification for this message.
    Notification(MessageEnvelope),
}

pub struct SyncEngine {
    viewer: Uuid,
    pub aggregator: ConversationAggregator,
    pub session: ChatSession,
}

impl SyncEngine {
    pub fn new(viewer: Uuid) -> Self {
        Self {
            viewer,
            aggregator: ConversationAggregator::new(viewer),
            session: ChatSession::new(viewer),
        }
    }

    pub fn viewer(&self) -> Uuid {
        self.viewer
    }

    /// Seed (or refresh) the overview from a recent-messages pull.
    pub fn load_overview<I>(&mut self, messages: I)
    where
        I: IntoIterator<Item = MessageEnvelope>,
    {
        self.aggregator.merge_snapshot(messages);
    }

    /// Open a conversation from a pulled history (newest first).
    pub fn open_conversation(&mut self, partner: Uuid, history_newest_first: Vec<DirectMessage>) {
        self.session.open(partner, history_newest_first);
    }

    pub fn close_conversation(&mut self) {
        self.session.close();
    }

    /// Apply one event from the push channel. The routing decision reads the
    /// session state as of right now, so it tracks navigation between
    /// conversations while the channel stays connected. Every accepted
    /// message is also merged into the overview, which tolerates later
    /// pulls re-delivering it.
    pub fn handle_push(&mut self, event: PushEvent) -> PushOutcome {
        let envelope = match event {
            PushEvent::Connected { .. } => return PushOutcome::Ignored,
            PushEvent::Message(envelope) => envelope,
        };

        // Own sends come back through the send acknowledgment, not this
        // channel; the echo is dropped before routing.
        if envelope.from.id == self.viewer {
            return PushOutcome::Ignored;
        }

        let routed = self.session.route(&envelope);
        self.aggregator.merge_push(envelope.clone());

        match routed {
            Routed::Transcript => PushOutcome::Transcript,
            Routed::Background => PushOutcome::Notification(envelope),
        }
    }
}
