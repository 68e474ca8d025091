use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            avatar_url  TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- seq is the creation-order tie-break for messages that share a
        -- created_at timestamp. Never exposed to clients.
        -- User ids are intentionally not foreign keys: a user record can be
        -- removed while its messages remain, and reads must tolerate that.
        CREATE TABLE IF NOT EXISTS messages (
            seq             INTEGER PRIMARY KEY AUTOINCREMENT,
            id              TEXT NOT NULL UNIQUE,
            from_user_id    TEXT NOT NULL,
            to_user_id      TEXT NOT NULL,
            message_type    TEXT NOT NULL CHECK (message_type IN ('text', 'image')),
            text            TEXT,
            media_url       TEXT,
            seen            INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_from_to
            ON messages(from_user_id, to_user_id, created_at);

        CREATE INDEX IF NOT EXISTS idx_messages_to
            ON messages(to_user_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
