//! Error types for content-manager operations.

use cairn_types::ContentId;

/// Errors surfaced by a content manager.
///
/// Variants carry owned text so the object writer can retain a failure as
/// its poison and re-surface it on every subsequent operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    /// The requested content was not found.
    #[error("content not found: {0}")]
    NotFound(ContentId),

    /// The manager rejected or failed to persist a payload.
    #[error("storage error: {0}")]
    Storage(String),

    /// The payload could not be encrypted or decrypted.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// An I/O error occurred while talking to the backing store.
    #[error("io error: {0}")]
    Io(String),

    /// The operation was cancelled by the caller.
    #[error("operation cancelled")]
    Cancelled,
}
