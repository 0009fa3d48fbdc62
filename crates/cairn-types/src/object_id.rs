//! The object-id codec: direct, compressed-direct, and indirect variants.

use std::fmt;
use std::str::FromStr;

use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::IdError;
use crate::ContentId;

/// Caller-facing identifier for a logical object.
///
/// The textual scheme is prefix-free against content ids (which never
/// contain uppercase characters):
/// - direct: `<ContentId>`
/// - compressed-direct: `Z<ContentId>`
/// - indirect: `I<ObjectId>`, recursively
///
/// A compressed variant structurally wraps a [`ContentId`] rather than an
/// `ObjectId`, so compressed-of-indirect cannot be constructed; the parser
/// rejects it with [`IdError::CompressedNonDirect`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObjectId {
    /// A single stored chunk, referenced as-is.
    Direct(ContentId),
    /// A single stored chunk whose payload is compressed; readers must
    /// decompress it.
    Compressed(ContentId),
    /// An object whose chunks are listed by an index document, itself
    /// stored as an object.
    Indirect(Box<ObjectId>),
}

impl ObjectId {
    /// Wrap a content id as a direct object id.
    pub fn direct(id: ContentId) -> Self {
        Self::Direct(id)
    }

    /// Wrap a content id as a compressed-direct object id.
    pub fn compressed(id: ContentId) -> Self {
        Self::Compressed(id)
    }

    /// Wrap an object id as indirect.
    pub fn indirect(inner: ObjectId) -> Self {
        Self::Indirect(Box::new(inner))
    }

    /// Parse the textual form. Inverse of [`fmt::Display`].
    pub fn parse(text: &str) -> Result<Self, IdError> {
        if text.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(rest) = text.strip_prefix('I') {
            return Ok(Self::indirect(Self::parse(rest)?));
        }
        if let Some(rest) = text.strip_prefix('Z') {
            if rest.starts_with('I') || rest.starts_with('Z') {
                return Err(IdError::CompressedNonDirect(text.to_string()));
            }
            return Ok(Self::Compressed(ContentId::new(rest)?));
        }
        Ok(Self::Direct(ContentId::new(text)?))
    }

    /// Return the content id this object ultimately stores under, for the
    /// direct and compressed variants.
    pub fn content_id(&self) -> Option<&ContentId> {
        match self {
            Self::Direct(id) | Self::Compressed(id) => Some(id),
            Self::Indirect(_) => None,
        }
    }

    /// Whether this is the indirect variant.
    pub fn is_indirect(&self) -> bool {
        matches!(self, Self::Indirect(_))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct(id) => f.write_str(id.as_str()),
            Self::Compressed(id) => write!(f, "Z{id}"),
            Self::Indirect(inner) => write!(f, "I{inner}"),
        }
    }
}

impl FromStr for ObjectId {
    type Err = IdError;

    fn from_str(text: &str) -> Result<Self, IdError> {
        Self::parse(text)
    }
}

// Object ids travel through the indirect index document as plain text.

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::parse(&text).map_err(de::Error::custom)
    }
}
