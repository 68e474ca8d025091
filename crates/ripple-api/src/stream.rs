use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use tracing::{error, info};
use uuid::Uuid;

use ripple_relay::Registry;
use ripple_types::events::PushEvent;

use crate::auth::AppState;

/// Keep-alive cadence for a registered channel. The heartbeat keeps idle
/// transports open; it never tears one down, closure detection does that.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Deregisters the channel when the subscription response is dropped,
/// whichever side ends the transport first.
struct ChannelGuard {
    registry: Registry,
    user_id: Uuid,
    channel_id: Uuid,
}

impl Drop for ChannelGuard {
    fn drop(&mut self) {
        info!("push subscriber disconnected: {}", self.user_id);
        self.registry.deregister(self.user_id, self.channel_id);
    }
}

/// Long-lived push subscription. Emits an initial `connected` acknowledgment,
/// then one event per message addressed to this user, with heartbeat comments
/// in between.
pub async fn subscribe(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (channel_id, mut rx) = state.registry.register(user_id);
    info!("new push subscriber: {}", user_id);

    let guard = ChannelGuard {
        registry: state.registry.clone(),
        user_id,
        channel_id,
    };

    let stream = async_stream::stream! {
        // Owned by the stream: dropping the response deregisters the channel.
        let _guard = guard;

        yield sse_event(&PushEvent::Connected { user_id });

        while let Some(event) = rx.recv().await {
            yield sse_event(&event);
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

fn sse_event(event: &PushEvent) -> Result<Event, Infallible> {
    match Event::default().json_data(event) {
        Ok(ev) => Ok(ev),
        Err(e) => {
            error!("push event serialization failed: {}", e);
            Ok(Event::default().comment("serialization error"))
        }
    }
}
