use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::MessageEnvelope;

/// Events sent over a live push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    /// Server confirms the subscription is live.
    Connected { user_id: Uuid },

    /// A new message addressed to the subscriber was persisted.
    Message(MessageEnvelope),
}
