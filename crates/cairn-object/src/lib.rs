//! Content-addressed object writing for the cairn repository.
//!
//! This crate turns arbitrary byte streams into immutable, content-addressed
//! chunks and stitches multi-chunk objects back together through a JSON
//! index document. It provides:
//!
//! - [`ObjectWriter`] — streaming writer: content-defined chunking,
//!   shrink-or-skip compression, delegation to the content manager, and a
//!   recursive index write on finalization.
//! - [`ObjectManager`] — constructs writers for a session and resolves
//!   object ids back to bytes.
//! - [`BufferPool`] — recycled buffers bounding allocations on the hot
//!   write path.
//! - [`ContentIdTracker`] — the session-wide set of written content ids.
//! - [`IndirectIndex`] — the on-disk index document format.
//!
//! Writers are single-producer and sequential; run many writers over one
//! shared [`ObjectManager`] for parallelism.

mod error;
mod index;
mod manager;
mod pool;
mod tracker;
mod writer;

pub use error::ObjectError;
pub use index::{IndirectEntry, IndirectIndex, INDIRECT_STREAM};
pub use manager::ObjectManager;
pub use pool::{BufferPool, PooledBuffer};
pub use tracker::ContentIdTracker;
pub use writer::{ObjectWriter, WriterOptions};

#[cfg(test)]
mod tests;
