//! Size-bucketed buffer pool for the hot write path.
//!
//! The writer allocates two buffers per chunk (accumulation and compression
//! output); without recycling, a long backup stream would allocate
//! per-chunk. Buffers are owned by the writer between [`BufferPool::allocate`]
//! and release, and return to the pool cleared.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};

/// Maximum number of recycled buffers retained per size bucket.
const MAX_PER_BUCKET: usize = 8;

/// Smallest bucket handed out, to keep degenerate requests useful.
const MIN_BUCKET: usize = 64;

/// Thread-safe pool of reusable byte buffers, bucketed by capacity.
#[derive(Clone, Default)]
pub struct BufferPool {
    inner: Arc<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    buckets: Mutex<HashMap<usize, Vec<Vec<u8>>>>,
}

impl BufferPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a buffer with capacity of at least `min_size` bytes.
    ///
    /// The buffer starts empty. It returns to the pool on
    /// [`PooledBuffer::release`] or drop, whichever comes first.
    pub fn allocate(&self, min_size: usize) -> PooledBuffer {
        let bucket = bucket_for(min_size);
        let recycled = {
            let mut buckets = self.inner.buckets.lock().expect("lock poisoned");
            buckets.get_mut(&bucket).and_then(Vec::pop)
        };
        PooledBuffer {
            data: recycled.unwrap_or_else(|| Vec::with_capacity(bucket)),
            released: false,
            pool: Arc::clone(&self.inner),
        }
    }

    #[cfg(test)]
    fn recycled_count(&self) -> usize {
        let buckets = self.inner.buckets.lock().expect("lock poisoned");
        buckets.values().map(Vec::len).sum()
    }
}

fn bucket_for(size: usize) -> usize {
    size.next_power_of_two().max(MIN_BUCKET)
}

/// A byte buffer on loan from a [`BufferPool`].
///
/// Dereferences to `Vec<u8>`; the buffer may grow past its bucket size,
/// in which case it is recycled under the larger bucket.
pub struct PooledBuffer {
    data: Vec<u8>,
    released: bool,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    /// Return the buffer to the pool. Idempotent; after release the buffer
    /// reads as empty.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        let mut data = std::mem::take(&mut self.data);
        if data.capacity() == 0 {
            return;
        }
        data.clear();

        let bucket = bucket_for(data.capacity());
        let mut buckets = self.pool.buckets.lock().expect("lock poisoned");
        let slot = buckets.entry(bucket).or_default();
        if slot.len() < MAX_PER_BUCKET {
            slot.push(data);
        }
    }
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.data
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.data
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
