use chrono::{SecondsFormat, SubsecRound, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use ripple_types::models::{DirectMessage, MessageContent, MessageEnvelope};

use crate::models::{EnvelopeRow, MessageRow, UserRow};
use crate::{Database, Result, StoreError};

const MESSAGE_COLUMNS: &str =
    "id, from_user_id, to_user_id, message_type, text, media_url, seen, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    // -- Messages --

    /// Persist a message. The store assigns `created_at` from its own clock
    /// and the implicit creation sequence; the returned message is exactly
    /// what a later read of this row would decode to.
    pub fn insert_message(
        &self,
        id: Uuid,
        from_user_id: Uuid,
        to_user_id: Uuid,
        content: &MessageContent,
    ) -> Result<DirectMessage> {
        // Truncate to the precision the TEXT column stores, so the returned
        // value is identical to what a later read decodes.
        let created_at = Utc::now().trunc_subsecs(6);
        let created_raw = created_at.to_rfc3339_opts(SecondsFormat::Micros, true);

        let (message_type, text, media_url) = match content {
            MessageContent::Text { text } => ("text", Some(text.as_str()), None),
            MessageContent::Image { media_url, text } => {
                ("image", text.as_deref(), Some(media_url.as_str()))
            }
        };

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, from_user_id, to_user_id, message_type, text, media_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    id.to_string(),
                    from_user_id.to_string(),
                    to_user_id.to_string(),
                    message_type,
                    text,
                    media_url,
                    created_raw,
                ],
            )?;
            Ok(())
        })?;

        Ok(DirectMessage {
            id,
            from_user_id,
            to_user_id,
            content: content.clone(),
            seen: false,
            created_at,
        })
    }

    /// Both directions of one conversation, newest first.
    pub fn messages_between(&self, a: Uuid, b: Uuid) -> Result<Vec<DirectMessage>> {
        let rows = self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages
                 WHERE (from_user_id = ?1 AND to_user_id = ?2)
                    OR (from_user_id = ?2 AND to_user_id = ?1)
                 ORDER BY created_at DESC, seq DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::params![a.to_string(), b.to_string()],
                    message_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Every message involving `user`, denormalized with both user records,
    /// newest first. Messages whose counterpart record no longer exists are
    /// excluded; they cannot be displayed, but they stay in the table.
    pub fn messages_involving(&self, user: Uuid) -> Result<Vec<MessageEnvelope>> {
        let rows = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.from_user_id, m.to_user_id, m.message_type, m.text,
                        m.media_url, m.seen, m.created_at,
                        fu.username, fu.avatar_url, tu.username, tu.avatar_url
                 FROM messages m
                 JOIN users fu ON m.from_user_id = fu.id
                 JOIN users tu ON m.to_user_id = tu.id
                 WHERE m.from_user_id = ?1 OR m.to_user_id = ?1
                 ORDER BY m.created_at DESC, m.seq DESC",
            )?;
            let rows = stmt
                .query_map([user.to_string()], envelope_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(EnvelopeRow::into_envelope).collect()
    }

    /// Flip `seen` for all messages `from_user_id -> to_user_id` in one
    /// statement. Only ever transitions false -> true. Returns the number of
    /// rows that changed.
    pub fn mark_seen(&self, from_user_id: Uuid, to_user_id: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET seen = 1
                 WHERE from_user_id = ?1 AND to_user_id = ?2 AND seen = 0",
                rusqlite::params![from_user_id.to_string(), to_user_id.to_string()],
            )?;
            Ok(changed)
        })
    }

    /// The denormalization read used by the publisher after a send.
    /// Returns `None` when the message or either user record is missing.
    pub fn envelope_for(&self, message_id: Uuid) -> Result<Option<MessageEnvelope>> {
        let row = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT m.id, m.from_user_id, m.to_user_id, m.message_type, m.text,
                        m.media_url, m.seen, m.created_at,
                        fu.username, fu.avatar_url, tu.username, tu.avatar_url
                 FROM messages m
                 JOIN users fu ON m.from_user_id = fu.id
                 JOIN users tu ON m.to_user_id = tu.id
                 WHERE m.id = ?1",
            )?;
            stmt.query_row([message_id.to_string()], envelope_row)
                .optional()
        })?;

        row.map(EnvelopeRow::into_envelope).transpose()
    }
}

fn message_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        from_user_id: row.get(1)?,
        to_user_id: row.get(2)?,
        message_type: row.get(3)?,
        text: row.get(4)?,
        media_url: row.get(5)?,
        seen: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn envelope_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EnvelopeRow> {
    Ok(EnvelopeRow {
        message: MessageRow {
            id: row.get(0)?,
            from_user_id: row.get(1)?,
            to_user_id: row.get(2)?,
            message_type: row.get(3)?,
            text: row.get(4)?,
            media_url: row.get(5)?,
            seen: row.get(6)?,
            created_at: row.get(7)?,
        },
        from_username: row.get(8)?,
        from_avatar_url: row.get(9)?,
        to_username: row.get(10)?,
        to_avatar_url: row.get(11)?,
    })
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password, avatar_url, created_at FROM users WHERE username = ?1",
    )?;

    stmt.query_row([username], user_row).optional()
}

fn query_user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, password, avatar_url, created_at FROM users WHERE id = ?1",
    )?;

    stmt.query_row([id], user_row).optional()
}

fn user_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        password: row.get(2)?,
        avatar_url: row.get(3)?,
        created_at: row.get(4)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn seed_user(db: &Database, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(&id.to_string(), name, "hash").unwrap();
        id
    }

    fn send_text(db: &Database, from: Uuid, to: Uuid, text: &str) -> DirectMessage {
        db.insert_message(
            Uuid::new_v4(),
            from,
            to,
            &MessageContent::Text { text: text.into() },
        )
        .unwrap()
    }

    #[test]
    fn messages_between_is_newest_first_both_directions() {
        let db = test_db();
        let a = seed_user(&db, "ana");
        let b = seed_user(&db, "bo");

        send_text(&db, a, b, "one");
        send_text(&db, b, a, "two");
        send_text(&db, a, b, "three");

        let msgs = db.messages_between(a, b).unwrap();
        let texts: Vec<_> = msgs.iter().filter_map(|m| m.content.text()).collect();
        assert_eq!(texts, ["three", "two", "one"]);

        // Same conversation regardless of which side asks
        let msgs_rev = db.messages_between(b, a).unwrap();
        assert_eq!(msgs_rev.len(), 3);
    }

    #[test]
    fn same_timestamp_orders_by_creation_sequence() {
        let db = test_db();
        let a = seed_user(&db, "ana");
        let b = seed_user(&db, "bo");

        // Force identical created_at values; seq must break the tie.
        let first = send_text(&db, a, b, "first");
        let second = send_text(&db, a, b, "second");
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE messages SET created_at = ?1",
                ["2026-01-01T00:00:00.000000Z"],
            )?;
            Ok(())
        })
        .unwrap();

        let msgs = db.messages_between(a, b).unwrap();
        assert_eq!(msgs[0].id, second.id);
        assert_eq!(msgs[1].id, first.id);
    }

    #[test]
    fn mark_seen_is_one_way() {
        let db = test_db();
        let a = seed_user(&db, "ana");
        let b = seed_user(&db, "bo");

        send_text(&db, a, b, "hi");
        send_text(&db, b, a, "reply");

        // Only a -> b flips; b -> a is untouched
        assert_eq!(db.mark_seen(a, b).unwrap(), 1);
        let msgs = db.messages_between(a, b).unwrap();
        for m in &msgs {
            if m.from_user_id == a {
                assert!(m.seen);
            } else {
                assert!(!m.seen);
            }
        }

        // Second pull changes nothing; no true -> false transition possible
        assert_eq!(db.mark_seen(a, b).unwrap(), 0);
        let again = db.messages_between(a, b).unwrap();
        assert!(again.iter().filter(|m| m.from_user_id == a).all(|m| m.seen));
    }

    #[test]
    fn envelope_for_missing_user_is_none() {
        let db = test_db();
        let a = seed_user(&db, "ana");
        let b = seed_user(&db, "bo");
        let msg = send_text(&db, a, b, "hi");

        assert!(db.envelope_for(msg.id).unwrap().is_some());

        // Sender record removed out from under the message
        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [a.to_string()])?;
            Ok(())
        })
        .unwrap();

        assert!(db.envelope_for(msg.id).unwrap().is_none());
    }

    #[test]
    fn messages_involving_excludes_broken_counterparts() {
        let db = test_db();
        let a = seed_user(&db, "ana");
        let b = seed_user(&db, "bo");
        let c = seed_user(&db, "cleo");

        send_text(&db, b, a, "from bo");
        send_text(&db, c, a, "from cleo");

        db.with_conn(|conn| {
            conn.execute("DELETE FROM users WHERE id = ?1", [c.to_string()])?;
            Ok(())
        })
        .unwrap();

        let envelopes = db.messages_involving(a).unwrap();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].from.username, "bo");
    }

    #[test]
    fn store_returns_exactly_one_row_per_send() {
        let db = test_db();
        let a = seed_user(&db, "ana");
        let b = seed_user(&db, "bo");

        let msg = send_text(&db, a, b, "hi");
        let pulled = db.messages_between(b, a).unwrap();
        assert_eq!(pulled.len(), 1);
        assert_eq!(pulled[0].id, msg.id);
        assert_eq!(pulled[0].created_at, msg.created_at);
    }
}
