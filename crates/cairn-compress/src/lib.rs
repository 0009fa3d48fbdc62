//! Per-chunk compression for the object writer.
//!
//! This crate provides:
//! - [`Compressor`] — the trait the writer calls per chunk.
//! - [`ZstdCompressor`] — Zstandard at a configurable level.
//! - [`lookup`] — the registry mapping configuration names to compressors.
//! - [`decompress`] — the single decoder used on the read-back path.
//!
//! Whether compressed output is actually *used* is decided by the writer
//! (compressed bytes are kept only when strictly shorter than the input);
//! compressors here just fill the output buffer.

mod error;
mod zstd_impl;

use std::sync::Arc;

pub use error::CompressError;
pub use zstd_impl::ZstdCompressor;

/// A chunk compressor. Implementations write the complete compressed frame
/// into the caller-provided output buffer.
pub trait Compressor: Send + Sync {
    /// Registry name of this compressor.
    fn name(&self) -> &'static str;

    /// Compress `input`, appending the frame to `output`.
    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<(), CompressError>;
}

/// Look up a registered compressor by configuration name.
///
/// Known names: `"zstd"` (balanced) and `"zstd-max"` (slow, smallest
/// output). Returns `None` for unknown names.
pub fn lookup(name: &str) -> Option<Arc<dyn Compressor>> {
    match name {
        "zstd" => Some(Arc::new(ZstdCompressor::default())),
        "zstd-max" => Some(Arc::new(ZstdCompressor::new(19))),
        _ => None,
    }
}

/// Decompress a stored chunk payload, appending to `output`.
///
/// Every registered compressor emits self-describing Zstandard frames, so
/// one decoder covers all of them regardless of the level used to write.
pub fn decompress(input: &[u8], output: &mut Vec<u8>) -> Result<(), CompressError> {
    zstd::stream::copy_decode(input, &mut *output)
        .map_err(|e| CompressError::Decompress(e.to_string()))
}
