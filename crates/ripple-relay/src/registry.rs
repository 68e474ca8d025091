use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use ripple_types::events::PushEvent;

/// One registered push channel. The receiver half lives inside the long-lived
/// subscription response; when that response ends, the receiver drops and the
/// next send fails, which is how closure is detected.
struct Channel {
    id: Uuid,
    tx: mpsc::UnboundedSender<PushEvent>,
}

/// Process-wide map from user id to that user's open push channels.
///
/// The registry exclusively owns the channel list. Register/deregister and
/// broadcast all take the same lock, so the list is never mutated underneath
/// a writer; broadcast snapshots the senders and delivers after releasing the
/// lock, so no delivery happens while holding it.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<RwLock<HashMap<Uuid, Vec<Channel>>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new channel for `user_id`. Every logged-in session registers
    /// its own channel, so one user may hold many concurrently.
    pub fn register(&self, user_id: Uuid) -> (Uuid, mpsc::UnboundedReceiver<PushEvent>) {
        let channel_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut map = self.inner.write().expect("registry lock poisoned");
        let channels = map.entry(user_id).or_default();
        channels.push(Channel { id: channel_id, tx });
        info!(
            "channel {} registered for {} ({} open)",
            channel_id,
            user_id,
            channels.len()
        );

        (channel_id, rx)
    }

    /// Remove exactly one channel. When the last channel goes, the user's
    /// entry goes with it; no empty lists are retained.
    pub fn deregister(&self, user_id: Uuid, channel_id: Uuid) {
        let mut map = self.inner.write().expect("registry lock poisoned");
        if let Some(channels) = map.get_mut(&user_id) {
            channels.retain(|c| c.id != channel_id);
            if channels.is_empty() {
                map.remove(&user_id);
            }
        }
        debug!("channel {} deregistered for {}", channel_id, user_id);
    }

    /// Deliver `event` to every channel currently open for `user_id`, in
    /// registration order. A user with no channels is simply offline: the
    /// event is dropped here and stays recoverable via pull.
    ///
    /// A channel whose receiver has gone away does not block delivery to the
    /// others; it is deregistered through the same path an explicit
    /// disconnect would take.
    pub fn broadcast(&self, user_id: Uuid, event: PushEvent) {
        // Snapshot under the read lock, deliver after releasing it.
        let targets: Vec<(Uuid, mpsc::UnboundedSender<PushEvent>)> = {
            let map = self.inner.read().expect("registry lock poisoned");
            match map.get(&user_id) {
                Some(channels) => channels.iter().map(|c| (c.id, c.tx.clone())).collect(),
                None => return,
            }
        };

        debug!("broadcasting to {} channels for {}", targets.len(), user_id);

        for (channel_id, tx) in targets {
            if tx.send(event.clone()).is_err() {
                self.deregister(user_id, channel_id);
            }
        }
    }

    /// Number of channels currently open for `user_id`.
    pub fn channel_count(&self, user_id: Uuid) -> usize {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .get(&user_id)
            .map_or(0, Vec::len)
    }

    /// Whether the registry holds any entry for `user_id` at all.
    pub fn is_registered(&self, user_id: Uuid) -> bool {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .contains_key(&user_id)
    }
}
