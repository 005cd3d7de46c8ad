//! Per instance playback.
//!
//! An `Animator` advances time on its current clip, picks the logical frame
//! to show and swaps in the generated mesh frame when it changes. Crossfades
//! are built one step at a time by the `CrossfadeWorkers` and applied by the
//! animator on its own tick, so a slow worker only delays the next step.

mod animator;
mod crossfade;
mod observer;
mod workers;

// Re-exports
pub use {
    animator::Animator,
    crossfade::CrossfadeState,
    observer::{AnimatorEvent, Observers},
    workers::{CrossfadeJob, CrossfadeWorkers},
};
