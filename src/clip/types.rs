use crate::types::{RootMotionMode, WrapMode};
use serde::{Deserialize, Serialize};

/// Data carried by a timed event
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum EventPayload {
    #[default]
    None,
    Text(String),
    Float(f32),
    Int(i64),
}

/// Named event fired when playback reaches a logical frame
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationEvent {
    pub name: String,
    pub frame: usize,
    pub payload: EventPayload,
}

/// Metadata for one clip
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipInfo {
    pub name: String,
    /// Seconds
    pub length: f32,
    /// Logical frames per stored frame
    pub frame_skip: u32,
    pub wrap_mode: WrapMode,
    pub root_motion_mode: RootMotionMode,
    /// Degrees. `None` averages face normals without an angle test.
    pub smoothing_angle: Option<f32>,
    pub playback_speed: f32,
    pub pre_generate_frames: bool,
    pub events: Vec<AnimationEvent>,
    /// Names of child transforms driven by baked matrices, in stored order
    pub exposed_transforms: Vec<String>,
}

impl Default for ClipInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            length: 1.0,
            frame_skip: 1,
            wrap_mode: WrapMode::default(),
            root_motion_mode: RootMotionMode::default(),
            smoothing_angle: None,
            playback_speed: 1.0,
            pre_generate_frames: false,
            events: Vec::new(),
            exposed_transforms: Vec::new(),
        }
    }
}

/// Interpolation used when sampling between stored frames
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Blend {
    #[default]
    Linear,
    /// Interpolates direction on the sphere and length linearly
    Spherical,
}
