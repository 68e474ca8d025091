use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Slimmed-down user record embedded in denormalized messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRef {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Message content, discriminated by kind. A text message must carry text;
/// an image message must carry a media URL (caption optional). Anything else
/// fails deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "message_type", rename_all = "snake_case")]
pub enum MessageContent {
    Text {
        text: String,
    },
    Image {
        media_url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
}

impl MessageContent {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { text, .. } => text.as_deref(),
        }
    }

    pub fn media_url(&self) -> Option<&str> {
        match self {
            Self::Text { .. } => None,
            Self::Image { media_url, .. } => Some(media_url),
        }
    }
}

/// A stored direct message between two users.
///
/// `created_at` is assigned by the store at persistence time; clients never
/// supply it. `seen` only ever transitions false -> true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectMessage {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    #[serde(flatten)]
    pub content: MessageContent,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl DirectMessage {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(self.from_user_id, self.to_user_id)
    }
}

/// A direct message with both user records expanded. This is the shape
/// pushed over the live channel and returned by the recent-messages pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub id: Uuid,
    pub from: UserRef,
    pub to: UserRef,
    #[serde(flatten)]
    pub content: MessageContent,
    pub seen: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageEnvelope {
    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(self.from.id, self.to.id)
    }

    /// Strip the user expansion back down to the stored message shape,
    /// e.g. for appending a pushed event to a transcript of pulled history.
    pub fn to_message(&self) -> DirectMessage {
        DirectMessage {
            id: self.id,
            from_user_id: self.from.id,
            to_user_id: self.to.id,
            content: self.content.clone(),
            seen: self.seen,
            created_at: self.created_at,
        }
    }

    /// The non-viewer side of the conversation.
    pub fn counterpart(&self, viewer: Uuid) -> &UserRef {
        if self.from.id == viewer { &self.to } else { &self.from }
    }
}

/// The unordered pair of user ids identifying a two-party thread.
/// Normalized so `new(a, b) == new(b, a)`. Used only as a grouping key,
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationKey(Uuid, Uuid);

impl ConversationKey {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b { Self(a, b) } else { Self(b, a) }
    }

    /// The other side of the pair, or `None` if `viewer` is not a party.
    pub fn partner_of(&self, viewer: Uuid) -> Option<Uuid> {
        if self.0 == viewer {
            Some(self.1)
        } else if self.1 == viewer {
            Some(self.0)
        } else {
            None
        }
    }
}
