//! Error types for chunk compression.

/// Errors that can occur while compressing or decompressing a chunk.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompressError {
    /// The compressor failed on input it accepted.
    #[error("compression error: {0}")]
    Compress(String),

    /// The stored payload could not be decompressed.
    #[error("decompression error: {0}")]
    Decompress(String),
}
