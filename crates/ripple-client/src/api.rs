//! Typed pull/send client for the message endpoints. Every request first
//! awaits an auth token from the provider, then the response; both are
//! ordinary suspension points for the single-threaded caller.

use uuid::Uuid;

use ripple_types::api::{
    HistoryRequest, HistoryResponse, RecentMessagesResponse, SendMessageRequest,
};
use ripple_types::models::{DirectMessage, MessageEnvelope};

use crate::ClientError;

/// Source of bearer tokens. Session issuance itself lives outside this core;
/// the client only ever asks for the current token.
pub trait TokenProvider {
    fn token(&self) -> impl Future<Output = Result<String, ClientError>> + Send;
}

/// A fixed token, e.g. one obtained from a login response.
pub struct StaticToken(pub String);

impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }
}

pub struct ApiClient<P> {
    http: reqwest::Client,
    base_url: String,
    tokens: P,
}

impl<P: TokenProvider> ApiClient<P> {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, tokens: P) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    /// Send a message. The response is the persisted message, acknowledged
    /// before any fan-out happens server-side.
    pub async fn send(&self, req: &SendMessageRequest) -> Result<DirectMessage, ClientError> {
        let token = self.tokens.token().await?;
        let message = self
            .http
            .post(format!("{}/api/messages/send", self.base_url))
            .bearer_auth(token)
            .json(req)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(message)
    }

    /// Pull the full history with one counterpart, newest first. The server
    /// marks inbound messages seen as part of this pull.
    pub async fn history(&self, with_user_id: Uuid) -> Result<Vec<DirectMessage>, ClientError> {
        let token = self.tokens.token().await?;
        let response: HistoryResponse = self
            .http
            .post(format!("{}/api/messages/history", self.base_url))
            .bearer_auth(token)
            .json(&HistoryRequest { with_user_id })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.messages)
    }

    /// Pull every message involving the caller, for overview aggregation.
    pub async fn recent(&self) -> Result<Vec<MessageEnvelope>, ClientError> {
        let token = self.tokens.token().await?;
        let response: RecentMessagesResponse = self
            .http
            .get(format!("{}/api/messages/recent", self.base_url))
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.messages)
    }
}
