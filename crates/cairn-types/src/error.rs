//! Error types for identifier parsing and validation.

/// Errors that can occur while parsing or constructing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The object id text was empty.
    #[error("empty object id")]
    Empty,

    /// The content id contains invalid characters or has an invalid length.
    #[error("malformed content id {0:?}")]
    MalformedContentId(String),

    /// A compressed object id wrapped something other than a direct id.
    #[error("compressed object id must wrap a direct content id: {0:?}")]
    CompressedNonDirect(String),

    /// The prefix is not a single character in `'g'..='z'`.
    #[error("malformed content prefix {0:?}: must be a single character in 'g'..='z'")]
    MalformedPrefix(char),
}
