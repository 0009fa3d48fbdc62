//! The streaming object writer.
//!
//! A writer consumes an arbitrary byte stream, cuts it into chunks at
//! splitter-chosen boundaries, optionally compresses each chunk, and
//! persists chunks through the content manager. Finalizing yields a single
//! [`ObjectId`]: the lone chunk's id for small objects, or an indirect id
//! over a JSON index document written through a nested writer.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use cairn_compress::{CompressError, Compressor};
use cairn_content::ContentError;
use cairn_splitter::Splitter;
use cairn_types::{ObjectId, Prefix};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ObjectError;
use crate::index::{IndirectEntry, IndirectIndex};
use crate::manager::ObjectManager;
use crate::pool::PooledBuffer;

/// Options accepted by [`ObjectManager::new_writer`].
#[derive(Clone, Default)]
pub struct WriterOptions {
    /// Used only in error messages.
    pub description: String,

    /// Optional classifier propagated to every chunk's content id, enabling
    /// content-manager routing.
    pub prefix: Option<Prefix>,

    /// Name of a registered compressor; `None` stores chunks raw.
    pub compressor: Option<String>,

    /// Cancellation signal raced against content-manager writes.
    pub cancel: CancellationToken,
}

impl WriterOptions {
    /// Set the description used in error messages.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the content-id prefix.
    pub fn prefix(mut self, prefix: Prefix) -> Self {
        self.prefix = Some(prefix);
        self
    }

    /// Select a registered compressor by name.
    pub fn compressor(mut self, name: impl Into<String>) -> Self {
        self.compressor = Some(name.into());
        self
    }

    /// Attach a cancellation token.
    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

enum WriterState {
    Open,
    Finalized,
    Poisoned(ObjectError),
}

/// A chunk recorded in the in-memory indirect index.
///
/// The entry is appended *before* the chunk payload is written, so
/// `start`/`length` describe the consumed bytes even when the write fails
/// and a higher layer retries; `object` is filled in once the content
/// manager returns.
struct PendingChunk {
    start: u64,
    length: u64,
    object: Option<ObjectId>,
}

/// Streaming, single-producer writer for one logical object.
///
/// Writers are append-only and sequential; the first error poisons the
/// writer and every subsequent operation other than [`close`](Self::close)
/// re-surfaces it.
pub struct ObjectWriter {
    manager: ObjectManager,
    description: String,
    prefix: Option<Prefix>,
    compressor: Option<Arc<dyn Compressor>>,
    cancel: CancellationToken,
    splitter: Box<dyn Splitter>,
    accum: PooledBuffer,
    total_bytes: u64,
    cursor: u64,
    index: Vec<PendingChunk>,
    state: WriterState,
}

impl ObjectWriter {
    pub(crate) fn new(
        manager: ObjectManager,
        options: WriterOptions,
        compressor: Option<Arc<dyn Compressor>>,
    ) -> Self {
        let splitter = manager.splitters().new_splitter();
        let accum = manager.pool().allocate(splitter.max_segment_size());
        Self {
            manager,
            description: options.description,
            prefix: options.prefix,
            compressor,
            cancel: options.cancel,
            splitter,
            accum,
            total_bytes: 0,
            cursor: 0,
            index: Vec::new(),
            state: WriterState::Open,
        }
    }

    /// Total bytes accepted so far.
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Append bytes to the object, flushing chunks at splitter boundaries.
    ///
    /// Returns the number of bytes accepted (the full input on success).
    /// The first storage, compression, or cancellation error poisons the
    /// writer; subsequent calls return the same error.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize, ObjectError> {
        self.ensure_open()?;
        self.total_bytes += data.len() as u64;

        for &byte in data {
            self.accum.push(byte);
            if self.splitter.should_split(byte) {
                if let Err(e) = self.flush_chunk().await {
                    self.state = WriterState::Poisoned(e.clone());
                    return Err(e);
                }
            }
        }

        Ok(data.len())
    }

    /// Finalize the object and return its id.
    ///
    /// Every object gets at least one chunk, including the empty one. A
    /// single-chunk object returns that chunk's id directly; otherwise the
    /// indirect index document is written through a nested writer and the
    /// result is wrapped as indirect.
    pub async fn result(&mut self) -> Result<ObjectId, ObjectError> {
        self.finalize().await
    }

    // Boxed so the nested index writer can recurse on the finalization
    // path: the index document may itself split into multiple chunks.
    fn finalize(&mut self) -> Pin<Box<dyn Future<Output = Result<ObjectId, ObjectError>> + Send + '_>> {
        Box::pin(async move {
            self.ensure_open()?;

            if !self.accum.is_empty() || self.index.is_empty() {
                if let Err(e) = self.flush_chunk().await {
                    self.state = WriterState::Poisoned(e.clone());
                    return Err(e);
                }
            }

            if self.index.len() == 1 {
                let object = take_object(&self.index[0])?;
                self.state = WriterState::Finalized;
                return Ok(object);
            }

            let mut entries = Vec::with_capacity(self.index.len());
            for pending in &self.index {
                entries.push(IndirectEntry {
                    start: pending.start,
                    length: pending.length,
                    object: take_object(pending)?,
                });
            }

            let document = serde_json::to_vec(&IndirectIndex::new(entries))
                .map_err(|e| ObjectError::Io(format!("unable to encode indirect index: {e}")))?;

            // The index is small and already structured, so the nested
            // writer never compresses; it shares the prefix and the
            // cancellation signal of the outer writer.
            let mut nested = self.manager.new_writer(WriterOptions {
                description: format!("index({})", self.description),
                prefix: self.prefix,
                compressor: None,
                cancel: self.cancel.clone(),
            })?;

            let nested_result = async {
                nested.write(&document).await?;
                nested.finalize().await
            }
            .await;
            nested.close();

            match nested_result {
                Ok(inner) => {
                    debug!(
                        chunks = self.index.len(),
                        total_bytes = self.total_bytes,
                        "finalized indirect object"
                    );
                    self.state = WriterState::Finalized;
                    Ok(ObjectId::indirect(inner))
                }
                Err(e) => {
                    self.state = WriterState::Poisoned(e.clone());
                    Err(e)
                }
            }
        })
    }

    /// Release the accumulation buffer and seal the writer.
    ///
    /// Idempotent; also invoked by `Drop`. Closing without a preceding
    /// [`result`](Self::result) discards in-flight work and does not
    /// guarantee all chunks have been persisted.
    pub fn close(&mut self) {
        self.accum.release();
        if matches!(self.state, WriterState::Open) {
            self.state = WriterState::Finalized;
        }
    }

    fn ensure_open(&self) -> Result<(), ObjectError> {
        match &self.state {
            WriterState::Open => Ok(()),
            WriterState::Finalized => Err(ObjectError::Finalized {
                description: self.description.clone(),
            }),
            WriterState::Poisoned(e) => Err(e.clone()),
        }
    }

    /// Flush the accumulation buffer as one chunk.
    async fn flush_chunk(&mut self) -> Result<(), ObjectError> {
        let length = self.accum.len() as u64;
        let chunk = self.index.len();
        self.index.push(PendingChunk {
            start: self.cursor,
            length,
            object: None,
        });
        self.cursor += length;

        let mut compressed = self
            .manager
            .pool()
            .allocate(self.splitter.max_segment_size());

        let (payload, is_compressed) = maybe_compressed_bytes(
            self.compressor.as_deref(),
            &mut compressed,
            self.accum.as_slice(),
        )
        .map_err(|source| ObjectError::CompressChunk {
            chunk,
            description: self.description.clone(),
            source,
        })?;

        let written = {
            let write = self.manager.content().write_content(payload, self.prefix);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(ContentError::Cancelled),
                result = write => result,
            }
        };

        // Reset regardless of outcome: the pending entry keeps its
        // start/length so a higher-layer retry sees consistent offsets.
        self.accum.clear();

        let content_id = written.map_err(|source| ObjectError::FlushChunk {
            chunk,
            description: self.description.clone(),
            source,
        })?;

        debug!(chunk, length, compressed = is_compressed, id = %content_id, "flushed chunk");
        self.manager.tracker().add(content_id.clone());

        let object = if is_compressed {
            ObjectId::compressed(content_id)
        } else {
            ObjectId::direct(content_id)
        };
        self.index[chunk].object = Some(object);

        Ok(())
    }
}

impl Drop for ObjectWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn take_object(pending: &PendingChunk) -> Result<ObjectId, ObjectError> {
    pending
        .object
        .clone()
        .ok_or_else(|| ObjectError::Io("chunk flushed without an object id".to_string()))
}

/// Apply the shrink-or-skip rule: compressed output is used only when
/// strictly shorter than the input; otherwise the original bytes are
/// stored and the chunk is marked uncompressed.
fn maybe_compressed_bytes<'a>(
    compressor: Option<&dyn Compressor>,
    output: &'a mut Vec<u8>,
    input: &'a [u8],
) -> Result<(&'a [u8], bool), CompressError> {
    if let Some(compressor) = compressor {
        compressor.compress(input, output)?;
        if output.len() < input.len() {
            return Ok((output.as_slice(), true));
        }
    }
    Ok((input, false))
}
