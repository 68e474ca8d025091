use std::sync::Arc;

use tracing::{error, warn};
use uuid::Uuid;

use ripple_db::Database;
use ripple_types::events::PushEvent;

use crate::registry::Registry;

/// Fans a freshly persisted message out to the recipient's live channels.
///
/// Runs after the sender has already been acknowledged, so nothing here can
/// fail the send: persistence succeeded, and live delivery is best-effort on
/// top of it.
#[derive(Clone)]
pub struct Publisher {
    db: Arc<Database>,
    registry: Registry,
}

impl Publisher {
    pub fn new(db: Arc<Database>, registry: Registry) -> Self {
        Self { db, registry }
    }

    /// Re-read the message in its denormalized form and broadcast it to the
    /// recipient. If the expansion fails (a referenced user record is gone)
    /// the broadcast is dropped; the stored message still surfaces on the
    /// next pull.
    pub async fn publish_created(&self, message_id: Uuid) {
        let db = self.db.clone();
        let envelope = tokio::task::spawn_blocking(move || db.envelope_for(message_id)).await;

        let envelope = match envelope {
            Ok(Ok(Some(envelope))) => envelope,
            Ok(Ok(None)) => {
                warn!(
                    "message {} cannot be expanded (user record missing), skipping broadcast",
                    message_id
                );
                return;
            }
            Ok(Err(e)) => {
                warn!("expansion read for {} failed: {}, skipping broadcast", message_id, e);
                return;
            }
            Err(e) => {
                error!("spawn_blocking join error: {}", e);
                return;
            }
        };

        let recipient = envelope.to.id;
        self.registry.broadcast(recipient, PushEvent::Message(envelope));
    }
}
