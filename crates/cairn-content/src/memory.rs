//! In-memory content manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use bytes::Bytes;
use cairn_types::{ContentId, Prefix};
use tracing::debug;

use crate::error::ContentError;
use crate::ContentManager;

/// In-memory content manager backed by a `RwLock<HashMap>`.
///
/// Useful for testing and for repositories configured to run in
/// memory-only mode. Content ids are `[prefix] + blake3_hex(payload)`, so
/// deduplication falls out of the addressing scheme. Tracks total bytes
/// stored against a configurable maximum; used bytes are maintained
/// incrementally via an atomic counter.
pub struct MemoryContentManager {
    contents: RwLock<HashMap<ContentId, Bytes>>,
    max_bytes: u64,
    used_bytes: AtomicU64,
}

impl MemoryContentManager {
    /// Create a new in-memory manager with the given capacity limit.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            contents: RwLock::new(HashMap::new()),
            max_bytes,
            used_bytes: AtomicU64::new(0),
        }
    }

    /// Number of distinct contents stored.
    pub fn content_count(&self) -> usize {
        self.contents.read().expect("lock poisoned").len()
    }

    /// Whether the given content id is present.
    pub fn contains(&self, id: &ContentId) -> bool {
        self.contents
            .read()
            .expect("lock poisoned")
            .contains_key(id)
    }
}

#[async_trait::async_trait]
impl ContentManager for MemoryContentManager {
    async fn write_content(
        &self,
        payload: &[u8],
        prefix: Option<Prefix>,
    ) -> Result<ContentId, ContentError> {
        let id = ContentId::from_hash(prefix, blake3::hash(payload).as_bytes());

        let mut map = self.contents.write().expect("lock poisoned");
        if map.contains_key(&id) {
            debug!(%id, size = payload.len(), "deduplicated content write");
            return Ok(id);
        }

        let used = self.used_bytes.load(Ordering::Relaxed);
        let needed = payload.len() as u64;
        if used + needed > self.max_bytes {
            return Err(ContentError::Storage(format!(
                "capacity exceeded: need {needed} bytes, only {} available",
                self.max_bytes.saturating_sub(used)
            )));
        }

        debug!(%id, size = payload.len(), "storing content in memory");
        map.insert(id.clone(), Bytes::copy_from_slice(payload));
        self.used_bytes.store(used + needed, Ordering::Relaxed);
        Ok(id)
    }

    async fn open_content(&self, id: &ContentId) -> Result<Bytes, ContentError> {
        let map = self.contents.read().expect("lock poisoned");
        map.get(id)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(id.clone()))
    }
}
