//! Content-defined splitting via a buzhash rolling hash.

use std::sync::LazyLock;

use crate::Splitter;

/// Default minimum segment size (512 KB).
pub const DEFAULT_MIN_SIZE: usize = 512 * 1024;

/// Default average segment size (1 MB).
pub const DEFAULT_AVG_SIZE: usize = 1024 * 1024;

/// Default maximum segment size (2 MB).
pub const DEFAULT_MAX_SIZE: usize = 2 * 1024 * 1024;

/// Rolling-hash window in bytes. Must stay a multiple of 32 so the
/// outgoing byte's table entry needs no rotation (`rotl(x, 64) = x`).
const WINDOW_SIZE: usize = 64;

// The byte-substitution table is derived from a fixed seed via splitmix64.
// The seed must never change: boundary placement is part of the
// deduplication contract, and re-seeding would re-chunk every stream.
const TABLE_SEED: u64 = 0x5bd1_e995_9d1b_58a3;

static TABLE: LazyLock<[u32; 256]> = LazyLock::new(|| {
    let mut state = TABLE_SEED;
    let mut table = [0u32; 256];
    for slot in table.iter_mut() {
        state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        *slot = ((z ^ (z >> 31)) >> 32) as u32;
    }
    table
});

/// Content-defined splitter using buzhash over a 64-byte window.
///
/// A boundary is declared when the rolling hash masks to zero, subject to a
/// minimum segment size (boundary checks are suppressed below it) and a
/// maximum (a hard split fires at it regardless of content). With
/// `mask = avg_size - 1` the expected segment size is close to `avg_size`.
///
/// Parameters are derived from the average: `min = avg / 2`,
/// `max = avg * 2`. They are fixed at deployment; changing them re-chunks
/// every stream and defeats deduplication against existing data.
pub struct RollingSplitter {
    min_size: usize,
    max_size: usize,
    mask: u32,
    hash: u32,
    window: [u8; WINDOW_SIZE],
    pos: usize,
    count: usize,
}

impl RollingSplitter {
    /// Create a splitter targeting the given average segment size.
    ///
    /// # Panics
    ///
    /// Panics if `avg_size` is not a power of two or is smaller than 128.
    pub fn new(avg_size: usize) -> Self {
        Self::with_sizes(avg_size / 2, avg_size, avg_size * 2)
    }

    /// Create a splitter with explicit bounds (for testing).
    ///
    /// # Panics
    ///
    /// Panics if `avg_size` is not a power of two, if `min_size` is smaller
    /// than the rolling window, or if the bounds are not ordered.
    pub fn with_sizes(min_size: usize, avg_size: usize, max_size: usize) -> Self {
        assert!(
            avg_size.is_power_of_two(),
            "avg_size must be a power of two (got {avg_size})"
        );
        assert!(
            min_size >= WINDOW_SIZE,
            "min_size must cover the {WINDOW_SIZE}-byte rolling window (got {min_size})"
        );
        assert!(min_size <= max_size, "min_size must not exceed max_size");

        Self {
            min_size,
            max_size,
            mask: (avg_size - 1) as u32,
            hash: 0,
            window: [0; WINDOW_SIZE],
            pos: 0,
            count: 0,
        }
    }

    fn reset(&mut self) {
        self.hash = 0;
        self.window = [0; WINDOW_SIZE];
        self.pos = 0;
        self.count = 0;
    }
}

impl Splitter for RollingSplitter {
    fn should_split(&mut self, byte: u8) -> bool {
        let outgoing = self.window[self.pos];
        self.window[self.pos] = byte;
        self.pos = (self.pos + 1) & (WINDOW_SIZE - 1);
        self.hash = self.hash.rotate_left(1) ^ TABLE[outgoing as usize] ^ TABLE[byte as usize];
        self.count += 1;

        if self.count >= self.max_size
            || (self.count >= self.min_size && self.hash & self.mask == 0)
        {
            self.reset();
            return true;
        }
        false
    }

    fn max_segment_size(&self) -> usize {
        self.max_size
    }
}
