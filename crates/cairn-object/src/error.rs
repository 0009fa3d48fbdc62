//! Error types for object writing and read-back.

use cairn_compress::CompressError;
use cairn_content::ContentError;

/// Errors surfaced by the object writer and the read-back path.
///
/// The enum is `Clone`: the first error on a write poisons the writer, and
/// every subsequent operation re-surfaces that same error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ObjectError {
    /// A content-manager error outside the chunk flush path.
    #[error("content error: {0}")]
    Content(#[from] ContentError),

    /// A compression error outside the chunk flush path.
    #[error("compression error: {0}")]
    Compress(#[from] CompressError),

    /// The content manager rejected a chunk.
    #[error("error flushing chunk {chunk} of {description:?}: {source}")]
    FlushChunk {
        /// 0-based index of the failed chunk.
        chunk: usize,
        /// The writer's description.
        description: String,
        /// The underlying content-manager error.
        #[source]
        source: ContentError,
    },

    /// The compressor failed on a chunk it accepted.
    #[error("compression failed on chunk {chunk} of {description:?}: {source}")]
    CompressChunk {
        /// 0-based index of the failed chunk.
        chunk: usize,
        /// The writer's description.
        description: String,
        /// The underlying compressor error.
        #[source]
        source: CompressError,
    },

    /// Serialization or buffer failure.
    #[error("io error: {0}")]
    Io(String),

    /// The requested compressor name is not registered.
    #[error("unknown compressor {0:?}")]
    UnknownCompressor(String),

    /// The writer has already produced its result (or been closed).
    #[error("writer for {description:?} already finalized")]
    Finalized {
        /// The writer's description.
        description: String,
    },

    /// The indirect index document failed validation.
    #[error("malformed indirect index: {reason}")]
    MalformedIndex {
        /// What was wrong with the document.
        reason: String,
    },

    /// A chunk referenced by an indirect index resolved to the wrong
    /// number of bytes.
    #[error("indirect entry {entry}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// 0-based index of the entry.
        entry: usize,
        /// Length recorded in the index.
        expected: u64,
        /// Length of the payload actually read.
        actual: u64,
    },
}
