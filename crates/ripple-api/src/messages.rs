use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use uuid::Uuid;

use ripple_types::api::{HistoryRequest, HistoryResponse, RecentMessagesResponse, SendMessageRequest};
use ripple_types::models::MessageContent;

use crate::auth::AppState;
use crate::middleware::Claims;

/// Persist a message and acknowledge the sender immediately. Fan-out to the
/// recipient's live channels happens in a separate task after the response
/// is on its way; the sender never waits on delivery.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let content = content_from_request(&req).ok_or(StatusCode::BAD_REQUEST)?;
    let message_id = Uuid::new_v4();

    // Run blocking DB insert off the async runtime
    let db = state.db.clone();
    let from = claims.sub;
    let to = req.to_user_id;
    let stored = tokio::task::spawn_blocking(move || db.insert_message(message_id, from, to, &content))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|e| { error!("message insert failed: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    // Persistence succeeded; publish independently of this response.
    let publisher = state.publisher.clone();
    tokio::spawn(async move {
        publisher.publish_created(message_id).await;
    });

    Ok((StatusCode::CREATED, Json(stored)))
}

/// Full history with one counterpart, newest first. Pulling a conversation
/// is what marks its inbound messages seen; the rows returned here still
/// show the pre-pull seen state, the next pull shows the flipped one.
pub async fn get_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<HistoryRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let viewer = claims.sub;
    let counterpart = req.with_user_id;

    let messages = tokio::task::spawn_blocking(move || {
        let messages = db.messages_between(viewer, counterpart)?;
        db.mark_seen(counterpart, viewer)?;
        Ok::<_, ripple_db::StoreError>(messages)
    })
    .await
    .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
    .map_err(|e| { error!("history query failed: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    Ok(Json(HistoryResponse { messages }))
}

/// Every denormalized message involving the caller, for client-side
/// aggregation into a latest-per-conversation overview.
pub async fn recent_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let viewer = claims.sub;

    let messages = tokio::task::spawn_blocking(move || db.messages_involving(viewer))
        .await
        .map_err(|e| { error!("spawn_blocking join error: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?
        .map_err(|e| { error!("recent messages query failed: {}", e); StatusCode::INTERNAL_SERVER_ERROR })?;

    Ok(Json(RecentMessagesResponse { messages }))
}

fn content_from_request(req: &SendMessageRequest) -> Option<MessageContent> {
    match (&req.media_url, &req.text) {
        (Some(media_url), text) => Some(MessageContent::Image {
            media_url: media_url.clone(),
            text: text.clone().filter(|t| !t.is_empty()),
        }),
        (None, Some(text)) if !text.is_empty() => Some(MessageContent::Text { text: text.clone() }),
        (None, _) => None,
    }
}
