use super::DEFAULT_ACCURACY;
use crate::va_error::VaError;
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// One decoded frame. Shared by `Arc` between every instance playing the
/// clip and never modified after decoding.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecompressedFrame {
    pub positions: Vec<glm::Vec3>,
    pub exposed_transforms: Vec<glm::Mat4>,
    pub root_motion_position: glm::Vec3,
    pub root_motion_rotation: glm::Quat,
}

impl DecompressedFrame {
    /// Frame with positions only and neutral root motion
    #[must_use]
    pub fn new(positions: Vec<glm::Vec3>) -> Self {
        Self {
            positions,
            exposed_transforms: Vec::new(),
            root_motion_position: glm::Vec3::zeros(),
            root_motion_rotation: glm::quat_identity(),
        }
    }

    /// True if this frame moves or turns the root
    #[must_use]
    pub fn has_root_motion(&self) -> bool {
        self.root_motion_position != glm::Vec3::zeros()
            || self.root_motion_rotation != glm::quat_identity()
    }
}

impl Default for DecompressedFrame {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Pooled quantized coordinates, three values per position. The narrower
/// form is chosen whenever every value fits in 16 bits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuantizedPositions {
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl QuantizedPositions {
    /// Number of pooled positions
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U16(v) => v.len() / 3,
            Self::U32(v) => v.len() / 3,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Quantized coordinates of pooled position `index`, if present
    #[must_use]
    pub fn get(&self, index: usize) -> Option<[u32; 3]> {
        let start = index.checked_mul(3)?;
        match self {
            Self::U16(v) => v
                .get(start..start + 3)
                .map(|q| [q[0].into(), q[1].into(), q[2].into()]),
            Self::U32(v) => v.get(start..start + 3).map(|q| [q[0], q[1], q[2]]),
        }
    }

    /// True when stored as 16 bit values
    #[must_use]
    pub const fn is_narrow(&self) -> bool {
        matches!(self, Self::U16(_))
    }
}

impl Default for QuantizedPositions {
    fn default() -> Self {
        Self::U16(Vec::new())
    }
}

/// Compact form of one clip's baked frames
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompressedClip {
    pub accuracy: f32,
    pub size_offset: u32,
    pub frame_count: usize,
    pub verts_per_frame: usize,
    pub exposed_count: usize,
    pub positions: QuantizedPositions,
    /// `frame_count * verts_per_frame` indices into `positions`
    pub frame_indexes: Vec<u32>,
    /// Transform-major: transform `j` of frame `i` is at `frame_count * j + i`
    pub exposed_transforms: Vec<glm::Mat4>,
    pub root_motion_positions: Option<Vec<glm::Vec3>>,
    pub root_motion_rotations: Option<Vec<glm::Quat>>,
}

impl Default for CompressedClip {
    fn default() -> Self {
        Self {
            accuracy: DEFAULT_ACCURACY,
            size_offset: 1,
            frame_count: 0,
            verts_per_frame: 0,
            exposed_count: 0,
            positions: QuantizedPositions::default(),
            frame_indexes: Vec::new(),
            exposed_transforms: Vec::new(),
            root_motion_positions: None,
            root_motion_rotations: None,
        }
    }
}

impl CompressedClip {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Checks the layout invariants. Decompression tolerates broken data by
    /// clamping, so this is only for callers that want strict loading.
    ///
    /// # Errors
    /// May return `VaError`
    pub fn validate(&self) -> Result<(), VaError> {
        if !self.accuracy.is_finite() || self.accuracy <= 0.0 {
            return Err(VaError::InvalidLayout);
        }
        let expected = self.frame_count * self.verts_per_frame;
        if self.frame_indexes.len() != expected {
            return Err(VaError::CountMismatch {
                expected,
                found: self.frame_indexes.len(),
            });
        }
        let len = self.positions.len();
        let out_of_range = |&&i: &&u32| i as usize >= len;
        if let Some(bad) = self.frame_indexes.iter().find(out_of_range) {
            return Err(VaError::IndexOutOfRange {
                index: *bad as usize,
                len,
            });
        }
        let expected = self.frame_count * self.exposed_count;
        if self.exposed_transforms.len() != expected {
            return Err(VaError::CountMismatch {
                expected,
                found: self.exposed_transforms.len(),
            });
        }
        let motion_ok =
            |len: Option<usize>| len.map_or(true, |l| l == self.frame_count);
        if !motion_ok(self.root_motion_positions.as_ref().map(Vec::len))
            || !motion_ok(self.root_motion_rotations.as_ref().map(Vec::len))
        {
            return Err(VaError::InvalidLayout);
        }
        Ok(())
    }
}
