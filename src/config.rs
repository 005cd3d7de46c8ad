use crate::{
    types::{DEFAULT_CROSSFADE_SECONDS, DEFAULT_FPS},
    va_error::VaError,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path};

/// Playback rate used beyond a viewpoint distance
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LodLevel {
    pub fps: u32,
    pub distance: f32,
}

/// Per animator settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorConfig {
    pub fps: u32,
    pub speed: f32,
    pub update_when_offscreen: bool,
    pub play_automatically: bool,
    pub reset_on_enable: bool,
    /// Clip started on activation. The first clip is used when unset.
    pub default_clip: Option<String>,
    /// Seconds, used by `crossfade_default`
    pub crossfade_duration: f32,
    pub recalculate_crossfade_normals: bool,
    /// Ordered by increasing distance
    pub lod_levels: Vec<LodLevel>,
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            speed: 1.0,
            update_when_offscreen: false,
            play_automatically: true,
            reset_on_enable: true,
            default_clip: None,
            crossfade_duration: DEFAULT_CROSSFADE_SECONDS,
            recalculate_crossfade_normals: false,
            lod_levels: Vec::new(),
        }
    }
}

/// Settings shared by every animator using one `Runtime`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Generate crossfade frames on background workers
    pub threaded: bool,
    pub max_workers: usize,
    /// Live animators served by each crossfade worker
    pub instances_per_worker: usize,
    /// Idle arrays kept per length in the buffer pool
    pub max_pooled_per_bucket: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            threaded: true,
            max_workers: 20,
            instances_per_worker: 15,
            max_pooled_per_bucket: 64,
        }
    }
}

/// Configuration that can be read from YAML
pub trait YamlConfig: DeserializeOwned {
    /// Parses YAML text. Missing fields take their default values.
    ///
    /// # Errors
    /// May return `VaError`
    fn from_yaml(yaml: &str) -> Result<Self, VaError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reads a YAML file
    ///
    /// # Errors
    /// May return `VaError`
    fn load<P: AsRef<Path>>(path: P) -> Result<Self, VaError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_yaml::from_reader(reader)?)
    }
}

impl YamlConfig for AnimatorConfig {}
impl YamlConfig for RuntimeConfig {}
impl YamlConfig for crate::clip::ClipInfo {}
