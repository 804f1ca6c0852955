use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::{
    common::types::{RoomId, UserId},
    tracks::Track,
};

#[derive(Debug)]
struct Entry {
    stored_at: Instant,
    results: Vec<Track>,
}

/// Pending search results, one entry per (room, user), consumed on selection.
///
/// Entries older than the ttl are never handed out and are pruned on the next
/// store, so searches that are never followed by a selection do not pile up.
#[derive(Debug)]
pub struct SearchCache {
    entries: DashMap<(RoomId, UserId), Entry>,
    ttl: Duration,
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn is_expired(&self, entry: &Entry) -> bool {
        entry.stored_at.elapsed() >= self.ttl
    }

    /// Stores `results`, replacing any earlier search by the same user.
    pub fn store(&self, room: RoomId, user: UserId, results: Vec<Track>) {
        self.entries.retain(|_, entry| !self.is_expired(entry));
        self.entries.insert(
            (room, user),
            Entry {
                stored_at: Instant::now(),
                results,
            },
        );
    }

    /// Removes and returns the user's pending results, unless they expired.
    pub fn take(&self, room: &RoomId, user: &UserId) -> Option<Vec<Track>> {
        self.entries
            .remove(&(room.clone(), user.clone()))
            .map(|(_, entry)| entry)
            .filter(|entry| !self.is_expired(entry))
            .map(|entry| entry.results)
    }

    /// Drops every pending search for a room.
    pub fn purge_room(&self, room: &RoomId) {
        self.entries.retain(|(r, _), _| r != room);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
