use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DirectMessage, MessageEnvelope};

// -- JWT Claims --

/// JWT claims shared between the REST middleware and anything else that
/// validates tokens. Canonical definition lives here in ripple-types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Messages --

/// Body of a send request. Media files are uploaded out-of-band; the client
/// passes the resulting URL here. A request with neither text nor media is
/// rejected.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub to_user_id: Uuid,
    pub text: Option<String>,
    pub media_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HistoryRequest {
    pub with_user_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub messages: Vec<DirectMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecentMessagesResponse {
    pub messages: Vec<MessageEnvelope>,
}
