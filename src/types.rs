use crate::clip::AnimationEvent;
use serde::{Deserialize, Serialize};

/// Playback frame rate used when no LOD level applies
pub const DEFAULT_FPS: u32 = 30;

/// Crossfade duration in seconds used by `crossfade_default`
pub const DEFAULT_CROSSFADE_SECONDS: f32 = 0.1;

/// Smallest interval between two ticks of one animator, in seconds
pub const MIN_TICK_INTERVAL: f32 = 0.0001;

/// What happens when playback runs off either end of a clip
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum WrapMode {
    #[default]
    Once,
    Loop,
    PingPong,
    ClampForever,
}

impl WrapMode {
    /// Looping modes keep ticking after a clip finishes
    #[must_use]
    pub const fn is_looping(self) -> bool {
        matches!(self, Self::Loop | Self::PingPong)
    }
}

/// How root motion stored in a clip is used at playback time
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub enum RootMotionMode {
    #[default]
    None,
    /// Motion was baked into the vertex positions, nothing to do at runtime
    Baked,
    /// Motion is applied incrementally to the animator's own transform
    AppliedToTransform,
}

/// Trait for something that receives timed clip events
pub trait EventReceiver {
    fn receive(&mut self, clip_name: &str, event: &AnimationEvent);
}

/// Closures can be used directly as receivers, which is handy for tests
impl<F> EventReceiver for F
where
    F: FnMut(&str, &AnimationEvent),
{
    fn receive(&mut self, clip_name: &str, event: &AnimationEvent) {
        self(clip_name, event);
    }
}
