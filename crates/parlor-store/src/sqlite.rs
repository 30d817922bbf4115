//! SQLite-backed message log via `sqlx`.
//!
//! Every statement is parameterized — room codes, usernames, and
//! message bodies are bound values, never spliced into SQL text.

use async_trait::async_trait;
use parlor_protocol::{Message, RoomCode};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::{MessageLog, NewMessage, StoreError};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS messages (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    room_code    TEXT    NOT NULL,
    username     TEXT    NOT NULL,
    display_name TEXT    NOT NULL,
    text         TEXT    NOT NULL,
    created_at   INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_room ON messages (room_code, id);
";

/// A [`MessageLog`] persisted in SQLite.
///
/// The pool is capped at one connection: SQLite serializes writers
/// anyway, and a single connection keeps `sqlite::memory:` databases
/// coherent across tasks.
pub struct SqliteMessageLog {
    pool: SqlitePool,
}

impl SqliteMessageLog {
    /// Connects to the given database URL (e.g. `sqlite://parlor.db`
    /// or `sqlite::memory:`) and creates the schema if needed.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(url)
            .await?;
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        tracing::info!(url, "message log connected");
        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageLog for SqliteMessageLog {
    async fn append(
        &self,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let row = sqlx::query(
            "INSERT INTO messages \
             (room_code, username, display_name, text, created_at) \
             VALUES (?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(message.room_code.as_str())
        .bind(&message.username)
        .bind(&message.display_name)
        .bind(&message.text)
        .bind(message.created_at as i64)
        .fetch_one(&self.pool)
        .await?;

        let id: i64 = row.get("id");
        Ok(Message {
            id: id as u64,
            created_at: message.created_at,
            room_code: message.room_code,
            username: message.username,
            display_name: message.display_name,
            text: message.text,
        })
    }

    async fn last_n(
        &self,
        room: &RoomCode,
        n: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, room_code, username, display_name, text, created_at \
             FROM messages WHERE room_code = ? \
             ORDER BY id DESC LIMIT ?",
        )
        .bind(room.as_str())
        .bind(n as i64)
        .fetch_all(&self.pool)
        .await?;

        // The query walks the log backwards for the LIMIT; flip back
        // to chronological order for the caller.
        let mut messages: Vec<Message> = rows
            .into_iter()
            .map(|row| Message {
                id: row.get::<i64, _>("id") as u64,
                created_at: row.get::<i64, _>("created_at") as u64,
                room_code: RoomCode::new(row.get::<String, _>("room_code")),
                username: row.get("username"),
                display_name: row.get("display_name"),
                text: row.get("text"),
            })
            .collect();
        messages.reverse();
        Ok(messages)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_log() -> SqliteMessageLog {
        SqliteMessageLog::connect("sqlite::memory:")
            .await
            .expect("should connect")
    }

    fn msg(room: &str, text: &str) -> NewMessage {
        NewMessage {
            created_at: 1_700_000_000_000,
            room_code: RoomCode::new(room),
            username: "alice".into(),
            display_name: "Alice".into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let log = memory_log().await;

        let a = log.append(msg("LOBBY", "one")).await.unwrap();
        let b = log.append(msg("OTHER", "two")).await.unwrap();

        assert!(a.id >= 1);
        assert!(b.id > a.id, "ids increase across rooms");
    }

    #[tokio::test]
    async fn test_last_n_round_trips_messages() {
        let log = memory_log().await;
        for i in 0..5 {
            log.append(msg("LOBBY", &format!("m{i}"))).await.unwrap();
        }

        let tail = log
            .last_n(&RoomCode::new("LOBBY"), 3)
            .await
            .expect("should query");

        let texts: Vec<_> =
            tail.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m2", "m3", "m4"], "oldest first");
        assert_eq!(tail[0].username, "alice");
        assert_eq!(tail[0].created_at, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn test_last_n_unknown_room_returns_empty() {
        let log = memory_log().await;

        let tail =
            log.last_n(&RoomCode::new("NOWHERE"), 20).await.unwrap();

        assert!(tail.is_empty());
    }

    #[tokio::test]
    async fn test_append_stores_hostile_text_verbatim() {
        // Bound parameters, so quotes and SQL fragments are just text.
        let log = memory_log().await;
        let hostile = "'; DROP TABLE messages; --";

        log.append(msg("LOBBY", hostile)).await.unwrap();
        let tail =
            log.last_n(&RoomCode::new("LOBBY"), 1).await.unwrap();

        assert_eq!(tail[0].text, hostile);
        // And the table survived.
        log.append(msg("LOBBY", "still here")).await.unwrap();
    }

    #[tokio::test]
    async fn test_rooms_are_isolated() {
        let log = memory_log().await;
        log.append(msg("LOBBY", "lobby msg")).await.unwrap();
        log.append(msg("ADMIN", "audit msg")).await.unwrap();

        let admin = log.last_n(&RoomCode::admin(), 20).await.unwrap();

        assert_eq!(admin.len(), 1);
        assert_eq!(admin[0].text, "audit msg");
    }
}
