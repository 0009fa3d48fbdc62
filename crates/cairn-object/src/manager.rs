//! [`ObjectManager`] — constructs writers and resolves object ids back to
//! their byte streams.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use cairn_content::ContentManager;
use cairn_splitter::SplitterFactory;
use cairn_types::{ContentId, ObjectId};
use tracing::debug;

use crate::error::ObjectError;
use crate::index::IndirectIndex;
use crate::pool::BufferPool;
use crate::tracker::ContentIdTracker;
use crate::writer::{ObjectWriter, WriterOptions};

/// Entry point of the object layer for one write session.
///
/// Owns the buffer pool and the session's content-id tracker, and holds the
/// content manager and splitter factory all writers share. Cloning is cheap
/// and clones share all of the above.
#[derive(Clone)]
pub struct ObjectManager {
    content: Arc<dyn ContentManager>,
    splitters: Arc<dyn SplitterFactory>,
    pool: BufferPool,
    tracker: Arc<ContentIdTracker>,
}

impl ObjectManager {
    /// Create a manager over the given content manager and splitter factory.
    pub fn new(content: Arc<dyn ContentManager>, splitters: Arc<dyn SplitterFactory>) -> Self {
        Self {
            content,
            splitters,
            pool: BufferPool::new(),
            tracker: Arc::new(ContentIdTracker::new()),
        }
    }

    /// Construct a writer for one logical object.
    ///
    /// Fails with [`ObjectError::UnknownCompressor`] when the options name
    /// a compressor the registry does not know.
    pub fn new_writer(&self, options: WriterOptions) -> Result<ObjectWriter, ObjectError> {
        let compressor = match &options.compressor {
            Some(name) => Some(
                cairn_compress::lookup(name)
                    .ok_or_else(|| ObjectError::UnknownCompressor(name.clone()))?,
            ),
            None => None,
        };
        Ok(ObjectWriter::new(self.clone(), options, compressor))
    }

    /// Content ids written through this manager's writers so far.
    ///
    /// Higher layers use this to commit a transaction referencing every
    /// content the session produced.
    pub fn session_content_ids(&self) -> Vec<ContentId> {
        self.tracker.snapshot()
    }

    /// Resolve an object id back to the full byte stream it was written
    /// from.
    ///
    /// Indirect objects are validated before use: the index document must
    /// carry the expected stream sentinel, entries must be contiguous from
    /// offset zero, and every chunk must resolve to exactly the length the
    /// index records. Any deviation is an error.
    pub async fn open(&self, id: &ObjectId) -> Result<Bytes, ObjectError> {
        let data = self.read_object(id).await?;
        debug!(id = %id, size = data.len(), "opened object");
        Ok(data)
    }

    pub(crate) fn content(&self) -> &dyn ContentManager {
        self.content.as_ref()
    }

    pub(crate) fn splitters(&self) -> &dyn SplitterFactory {
        self.splitters.as_ref()
    }

    pub(crate) fn pool(&self) -> &BufferPool {
        &self.pool
    }

    pub(crate) fn tracker(&self) -> &ContentIdTracker {
        &self.tracker
    }

    // Boxed so indirect objects can recurse: the index document is itself
    // an object, and its entries may be indirect in turn.
    fn read_object<'a>(
        &'a self,
        id: &'a ObjectId,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, ObjectError>> + Send + 'a>> {
        Box::pin(async move {
            match id {
                ObjectId::Direct(content_id) => Ok(self.content.open_content(content_id).await?),
                ObjectId::Compressed(content_id) => {
                    let stored = self.content.open_content(content_id).await?;
                    let mut raw = Vec::new();
                    cairn_compress::decompress(&stored, &mut raw)?;
                    Ok(Bytes::from(raw))
                }
                ObjectId::Indirect(inner) => {
                    let document = self.read_object(inner).await?;
                    let index: IndirectIndex = serde_json::from_slice(&document)
                        .map_err(|e| ObjectError::MalformedIndex {
                            reason: e.to_string(),
                        })?;
                    index.validate()?;

                    let mut assembled = BytesMut::with_capacity(index.total_length() as usize);
                    for (i, entry) in index.entries.iter().enumerate() {
                        let part = self.read_object(&entry.object).await?;
                        if part.len() as u64 != entry.length {
                            return Err(ObjectError::LengthMismatch {
                                entry: i,
                                expected: entry.length,
                                actual: part.len() as u64,
                            });
                        }
                        assembled.extend_from_slice(&part);
                    }
                    Ok(assembled.freeze())
                }
            }
        })
    }
}
