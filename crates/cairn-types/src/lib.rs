//! Identifier types shared across the cairn workspace.
//!
//! This crate defines the two identifier layers of the repository:
//! - [`ContentId`] — the opaque token the content manager assigns to a
//!   durably stored payload, optionally carrying a routing [`Prefix`].
//! - [`ObjectId`] — the caller-facing identifier for a logical object,
//!   one of direct, compressed-direct, or indirect, with a textual codec
//!   that round-trips exactly (`parse ∘ format = identity`).

mod error;
mod object_id;

use std::fmt;

pub use error::IdError;
pub use object_id::ObjectId;

// ---------------------------------------------------------------------------
// Prefix
// ---------------------------------------------------------------------------

/// Single-character classifier attached to every chunk of an object.
///
/// Valid prefixes are `'g'..='z'`. The range is disjoint from both hex
/// digits (`0-9a-f`) and the uppercase sigils of the [`ObjectId`] codec,
/// so a prefixed content id never becomes ambiguous to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix(char);

impl Prefix {
    /// Validate a prefix character.
    pub fn new(c: char) -> Result<Self, IdError> {
        if c.is_ascii_lowercase() && c >= 'g' {
            Ok(Self(c))
        } else {
            Err(IdError::MalformedPrefix(c))
        }
    }

    /// Return the underlying character.
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl TryFrom<char> for Prefix {
    type Error = IdError;

    fn try_from(c: char) -> Result<Self, IdError> {
        Self::new(c)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// ContentId
// ---------------------------------------------------------------------------

/// Maximum length of a content id in characters.
pub const MAX_CONTENT_ID_LEN: usize = 128;

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Opaque identifier assigned by the content manager to a stored payload.
///
/// Content ids are printable tokens over `[0-9a-z]`: an optional routing
/// prefix character followed by the hex digest of the payload. Equal
/// payloads with equal prefix always yield equal ids — that equality is
/// the deduplication contract.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentId(String);

impl ContentId {
    /// Validate an externally supplied content id.
    pub fn new(text: impl Into<String>) -> Result<Self, IdError> {
        let text = text.into();
        if text.is_empty()
            || text.len() > MAX_CONTENT_ID_LEN
            || !text.bytes().all(|b| b.is_ascii_digit() || b.is_ascii_lowercase())
        {
            return Err(IdError::MalformedContentId(text));
        }
        Ok(Self(text))
    }

    /// Build a content id from a 32-byte digest and an optional prefix.
    pub fn from_hash(prefix: Option<Prefix>, hash: &[u8; 32]) -> Self {
        let mut text = String::with_capacity(1 + 2 * hash.len());
        if let Some(prefix) = prefix {
            text.push(prefix.as_char());
        }
        for byte in hash {
            text.push(HEX[(byte >> 4) as usize] as char);
            text.push(HEX[(byte & 0x0f) as usize] as char);
        }
        Self(text)
    }

    /// Return the id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the routing prefix, if the id carries one.
    ///
    /// A leading character in `'g'..='z'` can only be a prefix: hex digests
    /// never start with one.
    pub fn prefix(&self) -> Option<Prefix> {
        self.0.chars().next().and_then(|c| Prefix::new(c).ok())
    }
}

impl AsRef<str> for ContentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
