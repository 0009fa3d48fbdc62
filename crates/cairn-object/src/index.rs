//! On-disk format of the indirect index document.
//!
//! A multi-chunk object is stitched together by a JSON document listing its
//! chunks in stream order. The document is itself written as an object and
//! referenced through the indirect object-id variant. Field names are part
//! of the on-disk contract and must not change.

use cairn_types::ObjectId;
use serde::{Deserialize, Serialize};

use crate::error::ObjectError;

/// Sentinel identifying the indirect index format. Readers reject any
/// document carrying a different value before trusting its entries.
pub const INDIRECT_STREAM: &str = "cairn:indirect";

/// One chunk of a logical object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectEntry {
    /// Byte offset of this chunk within the logical object.
    #[serde(rename = "s")]
    pub start: u64,

    /// Length of this chunk in bytes.
    #[serde(rename = "l")]
    pub length: u64,

    /// Object holding the chunk's bytes.
    #[serde(rename = "o")]
    pub object: ObjectId,
}

/// The indirect index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectIndex {
    /// Format sentinel; always [`INDIRECT_STREAM`] when written by us.
    pub stream: String,

    /// Constituent chunks in increasing `start` order, contiguous and
    /// non-overlapping.
    pub entries: Vec<IndirectEntry>,
}

impl IndirectIndex {
    /// Build a document over the given entries.
    pub fn new(entries: Vec<IndirectEntry>) -> Self {
        Self {
            stream: INDIRECT_STREAM.to_string(),
            entries,
        }
    }

    /// Check the sentinel and entry contiguity.
    pub fn validate(&self) -> Result<(), ObjectError> {
        if self.stream != INDIRECT_STREAM {
            return Err(ObjectError::MalformedIndex {
                reason: format!("unexpected stream sentinel {:?}", self.stream),
            });
        }

        let mut expected_start = 0u64;
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.start != expected_start {
                return Err(ObjectError::MalformedIndex {
                    reason: format!(
                        "entry {i} starts at {} (expected {expected_start})",
                        entry.start
                    ),
                });
            }
            expected_start = expected_start.checked_add(entry.length).ok_or_else(|| {
                ObjectError::MalformedIndex {
                    reason: format!("entry {i} length overflows the object size"),
                }
            })?;
        }
        Ok(())
    }

    /// Total logical length covered by the entries.
    pub fn total_length(&self) -> u64 {
        self.entries
            .last()
            .map(|entry| entry.start + entry.length)
            .unwrap_or(0)
    }
}
