//! Quantized, deduplicated storage for baked vertex frames.
//!
//! Every distinct vertex position across a clip is stored once in a pool of
//! quantized integers. Each frame is then a list of indices into that pool.
//! A position `c` is stored as `round((c + size_offset) * accuracy)` where
//! `size_offset` is the smallest power of ten covering every coordinate, so
//! stored values are never negative.

mod compress;
mod decompress;
mod types;

/// Quantization scale used when the caller has no preference
pub const DEFAULT_ACCURACY: f32 = 1000.0;
/// Smallest accepted quantization scale
pub const MIN_ACCURACY: f32 = 1.0;
/// Largest accepted quantization scale
pub const MAX_ACCURACY: f32 = 10000.0;

pub(crate) use compress::position_key;

// Re-exports
pub use {
    compress::compress,
    decompress::decompress,
    types::{CompressedClip, DecompressedFrame, QuantizedPositions},
};
