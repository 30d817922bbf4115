//! The room directory: the static set of rooms a deployment serves.
//!
//! Rooms are configured at startup and never change while the server
//! runs. The directory maps short codes to display names and back,
//! and resolves a user's allow list into displayable entries.

use std::collections::HashMap;

use parlor_protocol::{RoomCode, RoomEntry};
use parlor_session::Identity;

/// Code ↔ display name lookup for the configured rooms.
///
/// The administrative room is always present: if the configuration
/// doesn't name it, it is seeded as "Admin".
pub struct RoomDirectory {
    /// Configured order, preserved for listings.
    entries: Vec<RoomEntry>,
    /// Fast lookup by code.
    names: HashMap<RoomCode, String>,
}

impl RoomDirectory {
    /// Builds a directory from (code, display name) pairs.
    pub fn new(
        rooms: impl IntoIterator<Item = (RoomCode, String)>,
    ) -> Self {
        let mut entries: Vec<RoomEntry> = rooms
            .into_iter()
            .map(|(room_code, display_name)| RoomEntry {
                room_code,
                display_name,
            })
            .collect();
        if !entries.iter().any(|e| e.room_code.is_admin()) {
            entries.push(RoomEntry {
                room_code: RoomCode::admin(),
                display_name: "Admin".to_string(),
            });
        }
        let names = entries
            .iter()
            .map(|e| (e.room_code.clone(), e.display_name.clone()))
            .collect();
        Self { entries, names }
    }

    /// Whether a room with this code is configured.
    pub fn contains(&self, room: &RoomCode) -> bool {
        self.names.contains_key(room)
    }

    /// The display name for a room code.
    pub fn display_name(&self, room: &RoomCode) -> Option<&str> {
        self.names.get(room).map(String::as_str)
    }

    /// The inverse lookup: the code for a display name.
    pub fn code_for_name(&self, name: &str) -> Option<&RoomCode> {
        self.entries
            .iter()
            .find(|e| e.display_name == name)
            .map(|e| &e.room_code)
    }

    /// All configured room codes, in configured order.
    pub fn room_codes(&self) -> impl Iterator<Item = &RoomCode> {
        self.entries.iter().map(|e| &e.room_code)
    }

    /// All configured entries, in configured order.
    pub fn entries(&self) -> &[RoomEntry] {
        &self.entries
    }

    /// Resolves a user's allow list into displayable entries, in the
    /// user's configured order. Rooms on the allow list that the
    /// directory doesn't know are skipped.
    pub fn entries_for(&self, identity: &Identity) -> Vec<RoomEntry> {
        identity
            .authorized_rooms
            .iter()
            .filter_map(|code| {
                self.names.get(code).map(|name| RoomEntry {
                    room_code: code.clone(),
                    display_name: name.clone(),
                })
            })
            .collect()
    }
}

// =========================================================================
// Tests
// =========================================================================
