//! Session-wide tracking of written content ids.

use std::collections::HashSet;
use std::sync::Mutex;

use cairn_types::ContentId;

/// Guarded set of every content id produced by the writers of one session.
///
/// Higher layers use the snapshot to commit a transaction referencing all
/// contents written through a manager. Insertion is idempotent, so a
/// retried chunk that reuses an already-returned id is recorded once.
#[derive(Default)]
pub struct ContentIdTracker {
    contents: Mutex<HashSet<ContentId>>,
}

impl ContentIdTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a content id. Idempotent.
    pub fn add(&self, id: ContentId) {
        self.contents.lock().expect("lock poisoned").insert(id);
    }

    /// Copy out the current members. Order is unspecified.
    pub fn snapshot(&self) -> Vec<ContentId> {
        self.contents
            .lock()
            .expect("lock poisoned")
            .iter()
            .cloned()
            .collect()
    }
}
