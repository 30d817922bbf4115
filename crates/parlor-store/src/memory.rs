//! In-memory message log for development and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use parlor_protocol::{Message, RoomCode};
use tokio::sync::Mutex;

use crate::{MessageLog, NewMessage, StoreError};

struct Inner {
    /// Next id to assign. Starts at 1 so id 0 never appears, matching
    /// the SQLite backend's AUTOINCREMENT.
    next_id: u64,
    by_room: HashMap<RoomCode, Vec<Message>>,
}

/// A [`MessageLog`] backed by a per-room `Vec` behind a mutex.
///
/// Append order within a room is the `Vec` order, so `last_n` is a
/// cheap tail slice.
pub struct MemoryMessageLog {
    inner: Mutex<Inner>,
}

impl MemoryMessageLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                by_room: HashMap::new(),
            }),
        }
    }
}

impl Default for MemoryMessageLog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageLog for MemoryMessageLog {
    async fn append(
        &self,
        message: NewMessage,
    ) -> Result<Message, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let stored = Message {
            id,
            created_at: message.created_at,
            room_code: message.room_code.clone(),
            username: message.username,
            display_name: message.display_name,
            text: message.text,
        };
        inner
            .by_room
            .entry(message.room_code)
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn last_n(
        &self,
        room: &RoomCode,
        n: usize,
    ) -> Result<Vec<Message>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(messages) = inner.by_room.get(room) else {
            return Ok(Vec::new());
        };
        let start = messages.len().saturating_sub(n);
        Ok(messages[start..].to_vec())
    }
}

// =========================================================================
// Tests
// =========================================================================
