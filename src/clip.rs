//! Animation clips and the shared cache of frames generated from them.

mod cache;
mod sample;
mod types;

use crate::{
    codec::{self, CompressedClip, DecompressedFrame},
    mesh::{BaseMesh, MeshFrame},
    normals::recalculate_normals,
    pool::Pools,
    types::EventReceiver,
    va_error::VaError,
};
use log::debug;
use nalgebra_glm as glm;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

// Re-exports
pub use {
    cache::{FrameCache, MeshHandle},
    sample::bracket,
    types::{AnimationEvent, Blend, ClipInfo, EventPayload},
};

static NEXT_CLIP_ID: AtomicUsize = AtomicUsize::new(0);

/// One decoded clip. Clips are immutable after construction and are shared
/// between animators by `Arc`. Generated mesh frames live in a `FrameCache`
/// keyed by this clip's id.
#[derive(Debug)]
pub struct AnimationClip {
    id: usize,
    info: ClipInfo,
    frames: Vec<Arc<DecompressedFrame>>,
    total_frames: usize,
}

impl AnimationClip {
    /// Creates a clip from decoded frames
    ///
    /// # Errors
    /// May return `VaError`
    pub fn new(
        mut info: ClipInfo,
        frames: Vec<DecompressedFrame>,
    ) -> Result<Self, VaError> {
        if frames.is_empty() {
            return Err(VaError::EmptyClip);
        }
        info.frame_skip = info.frame_skip.max(1);
        let total_frames = frames.len() * info.frame_skip as usize;
        Ok(Self {
            id: NEXT_CLIP_ID.fetch_add(1, Ordering::Relaxed),
            info,
            frames: frames.into_iter().map(Arc::new).collect(),
            total_frames,
        })
    }

    /// Decompresses and creates a clip
    ///
    /// # Errors
    /// May return `VaError`
    pub fn from_compressed(
        info: ClipInfo,
        clip: &CompressedClip,
    ) -> Result<Self, VaError> {
        Self::new(info, codec::decompress(clip))
    }

    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    #[must_use]
    pub const fn info(&self) -> &ClipInfo {
        &self.info
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Logical frame count, stored frames times frame skip
    #[must_use]
    pub const fn total_frames(&self) -> usize {
        self.total_frames
    }

    #[must_use]
    pub const fn frame_skip(&self) -> usize {
        self.info.frame_skip as usize
    }

    #[must_use]
    pub fn stored_frames(&self) -> &[Arc<DecompressedFrame>] {
        &self.frames
    }

    /// Clamps a logical frame into range
    #[must_use]
    pub fn clamp_frame(&self, frame: usize) -> usize {
        frame.min(self.total_frames - 1)
    }

    fn sample_into(
        &self,
        frame: usize,
        blend: Blend,
        out: &mut Vec<glm::Vec3>,
    ) {
        let frame = self.clamp_frame(frame);
        let (lower, upper, t) =
            bracket(frame, self.frame_skip(), self.frames.len());
        let from = &self.frames[lower].positions;
        out.clear();
        if lower == upper {
            out.extend_from_slice(from);
        } else {
            out.resize(from.len(), glm::Vec3::zeros());
            let to = &self.frames[upper].positions;
            sample::blend_into(from, to, t, blend, out);
        }
    }

    /// Vertex positions for a logical frame, linearly interpolated inside a
    /// stride
    #[must_use]
    pub fn get_frame(&self, frame: usize) -> Vec<glm::Vec3> {
        self.sample_positions(frame, Blend::Linear)
    }

    /// Vertex positions for a logical frame with a chosen blend
    #[must_use]
    pub fn sample_positions(
        &self,
        frame: usize,
        blend: Blend,
    ) -> Vec<glm::Vec3> {
        let mut out = Vec::new();
        self.sample_into(frame, blend, &mut out);
        out
    }

    /// Stored frame closest to a logical frame. No mesh data is generated.
    #[must_use]
    pub fn get_nearest_frame(&self, frame: usize) -> &Arc<DecompressedFrame> {
        let skip = self.frame_skip();
        let nearest = (frame + skip / 2) / skip;
        self.frames.get(nearest).unwrap_or(&self.frames[0])
    }

    /// Builds a frame without touching any cache
    fn build_frame(
        &self,
        mesh: &BaseMesh,
        pools: &Pools,
        frame: usize,
    ) -> MeshFrame {
        let mut positions = pools.vectors.get(self.frames[0].positions.len());
        self.sample_into(frame, Blend::Linear, &mut positions);
        let normals = recalculate_normals(
            &mesh.indices,
            &positions,
            self.info.smoothing_angle,
            pools,
        );
        MeshFrame::new(positions, normals)
    }

    /// Mesh frame for a logical frame, generated on first use and shared
    /// through the cache with every animator using the same base mesh.
    pub fn generate_frame(
        &self,
        cache: &FrameCache,
        handle: MeshHandle,
        mesh: &BaseMesh,
        pools: &Pools,
        frame: usize,
    ) -> Arc<MeshFrame> {
        let frame = self.clamp_frame(frame);
        if let Some(cached) = cache.get(handle, self.id, frame) {
            return cached;
        }
        debug!("Generating frame {frame} of \"{}\"", self.info.name);
        let built = Arc::new(self.build_frame(mesh, pools, frame));
        cache.insert(handle, self.id, frame, self.total_frames, built)
    }

    /// First use setup for a mesh. Generates every frame when the clip asks
    /// for pre-generation, otherwise only frame 0.
    pub fn generate_frames(
        &self,
        cache: &FrameCache,
        handle: MeshHandle,
        mesh: &BaseMesh,
        pools: &Pools,
    ) {
        if cache.has_clip(handle, self.id) {
            return;
        }
        if !self.info.pre_generate_frames {
            self.generate_frame(cache, handle, mesh, pools, 0);
            return;
        }
        #[cfg(feature = "rayon")]
        let built: Vec<(usize, MeshFrame)> = (0..self.total_frames)
            .into_par_iter()
            .map(|i| (i, self.build_frame(mesh, pools, i)))
            .collect();
        #[cfg(not(feature = "rayon"))]
        let built: Vec<(usize, MeshFrame)> = (0..self.total_frames)
            .map(|i| (i, self.build_frame(mesh, pools, i)))
            .collect();
        for (i, frame) in built {
            let frame = Arc::new(frame);
            cache.insert(handle, self.id, i, self.total_frames, frame);
        }
        debug!(
            "Pre-generated {} frames of \"{}\"",
            self.total_frames, self.info.name
        );
    }

    /// True once every frame exists in the cache for this mesh
    #[must_use]
    pub fn completely_generated(
        &self,
        cache: &FrameCache,
        handle: MeshHandle,
    ) -> bool {
        cache.completely_generated(handle, self.id)
    }

    /// Calls the receiver for every event declared on `frame`
    pub fn fire_events<R: EventReceiver + ?Sized>(
        &self,
        receiver: &mut R,
        frame: usize,
    ) {
        for event in self.info.events.iter().filter(|e| e.frame == frame) {
            receiver.receive(&self.info.name, event);
        }
    }

    /// Drops every frame generated from this clip for the mesh
    pub fn reset(&self, cache: &FrameCache, handle: MeshHandle) {
        cache.reset_clip(handle, self.id);
    }
}
