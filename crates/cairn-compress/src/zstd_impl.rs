//! Zstandard compressor.

use crate::error::CompressError;
use crate::Compressor;

/// Default compression level: zstd's own default, a good speed/ratio
/// balance for backup payloads.
const DEFAULT_LEVEL: i32 = 3;

/// Zstandard compressor at a fixed level.
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    /// Create a compressor at the given zstd level.
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    /// Return the configured level.
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(DEFAULT_LEVEL)
    }
}

impl Compressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        if self.level >= 19 {
            "zstd-max"
        } else {
            "zstd"
        }
    }

    fn compress(&self, input: &[u8], output: &mut Vec<u8>) -> Result<(), CompressError> {
        zstd::stream::copy_encode(input, &mut *output, self.level)
            .map_err(|e| CompressError::Compress(e.to_string()))
    }
}
