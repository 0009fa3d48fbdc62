//! Content storage interface for the cairn object layer.
//!
//! This crate provides:
//! - [`ContentManager`] — the trait the object writer persists chunks
//!   through. Managers deduplicate (equal payload + equal prefix yields an
//!   equal [`ContentId`](cairn_types::ContentId)) and own durability,
//!   packing, and encryption.
//! - [`MemoryContentManager`] — an in-memory backend for tests and
//!   single-process use.

mod error;
mod memory;

use bytes::Bytes;
use cairn_types::{ContentId, Prefix};

pub use error::ContentError;
pub use memory::MemoryContentManager;

/// Persists chunk payloads and hands back stable, deduplicating ids.
///
/// All implementations must be `Send + Sync`: many writers may share one
/// manager, and the manager is the only concurrency boundary they cross.
#[async_trait::async_trait]
pub trait ContentManager: Send + Sync {
    /// Persist a payload and return its content id.
    ///
    /// Identical payloads written with an identical prefix must return
    /// equal ids; the id is stable across retries.
    async fn write_content(
        &self,
        payload: &[u8],
        prefix: Option<Prefix>,
    ) -> Result<ContentId, ContentError>;

    /// Fetch a previously written payload.
    async fn open_content(&self, id: &ContentId) -> Result<Bytes, ContentError>;
}
