//! Database row types that map directly to SQLite rows.
//! Conversions into the ripple-types domain shapes live here too, so the
//! string/int decoding is done in one place.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use ripple_types::models::{DirectMessage, MessageContent, MessageEnvelope, UserRef};

use crate::StoreError;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub message_type: String,
    pub text: Option<String>,
    pub media_url: Option<String>,
    pub seen: bool,
    pub created_at: String,
}

/// A message row joined with both user rows.
pub struct EnvelopeRow {
    pub message: MessageRow,
    pub from_username: String,
    pub from_avatar_url: Option<String>,
    pub to_username: String,
    pub to_avatar_url: Option<String>,
}

fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, StoreError> {
    raw.parse()
        .map_err(|_| StoreError::Corrupt(format!("{field}: bad uuid '{raw}'")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::Corrupt(format!("bad created_at '{raw}'")))
}

fn decode_content(row: &MessageRow) -> Result<MessageContent, StoreError> {
    match row.message_type.as_str() {
        "text" => {
            let text = row
                .text
                .clone()
                .ok_or_else(|| StoreError::Corrupt(format!("text message {} has no text", row.id)))?;
            Ok(MessageContent::Text { text })
        }
        "image" => {
            let media_url = row.media_url.clone().ok_or_else(|| {
                StoreError::Corrupt(format!("image message {} has no media_url", row.id))
            })?;
            Ok(MessageContent::Image {
                media_url,
                text: row.text.clone(),
            })
        }
        other => Err(StoreError::Corrupt(format!(
            "message {} has unknown type '{other}'",
            row.id
        ))),
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<DirectMessage, StoreError> {
        let content = decode_content(&self)?;
        Ok(DirectMessage {
            id: parse_uuid("id", &self.id)?,
            from_user_id: parse_uuid("from_user_id", &self.from_user_id)?,
            to_user_id: parse_uuid("to_user_id", &self.to_user_id)?,
            content,
            seen: self.seen,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

impl EnvelopeRow {
    pub fn into_envelope(self) -> Result<MessageEnvelope, StoreError> {
        let content = decode_content(&self.message)?;
        Ok(MessageEnvelope {
            id: parse_uuid("id", &self.message.id)?,
            from: UserRef {
                id: parse_uuid("from_user_id", &self.message.from_user_id)?,
                username: self.from_username,
                avatar_url: self.from_avatar_url,
            },
            to: UserRef {
                id: parse_uuid("to_user_id", &self.message.to_user_id)?,
                username: self.to_username,
                avatar_url: self.to_avatar_url,
            },
            content,
            seen: self.message.seen,
            created_at: parse_timestamp(&self.message.created_at)?,
        })
    }
}
