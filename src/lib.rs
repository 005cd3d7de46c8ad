//! Baked per vertex mesh animation.
//!
//! Clips are recorded offline as vertex positions per frame and stored in a
//! quantized, deduplicated form (`codec`). At runtime an `Animator` decodes
//! them into `AnimationClip`s, generates mesh frames with recalculated
//! normals on demand and shares those frames through the `Runtime` cache
//! with every other animator on the same base mesh. Crossfades between clips
//! are generated by background workers. A `Manager` owns animators and ticks
//! each one at its own rate.

pub mod attach;
pub mod clip;
pub mod codec;
pub mod config;
pub mod manager;
pub mod mesh;
pub mod normals;
pub mod playback;
pub mod pool;
pub mod runtime;
pub mod transform;
pub mod types;
pub mod va_error;
pub mod vertex;
