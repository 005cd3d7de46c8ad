use crate::{
    codec::DecompressedFrame,
    mesh::{BaseMesh, Bounds, MeshFrame},
    normals::recalculate_normals,
    pool::Pools,
};
use log::trace;
use nalgebra_glm as glm;
use std::sync::Arc;

/// Blend between a snapshot of the old clip and the first frame of the new
/// one. Shared with the crossfade workers, which fill `frame` for
/// `current_frame` while the animator consumes it one step at a time.
#[derive(Debug, Default)]
pub struct CrossfadeState {
    from: Option<Arc<DecompressedFrame>>,
    to: Option<Arc<DecompressedFrame>>,
    mesh: Option<Arc<BaseMesh>>,
    recalculate_normals: bool,
    frames_needed: usize,
    current_frame: usize,
    generated_frame: Option<usize>,
    fading: bool,
    frame: Option<MeshFrame>,
}

impl CrossfadeState {
    pub(super) fn start(
        &mut self,
        from: Arc<DecompressedFrame>,
        to: Arc<DecompressedFrame>,
        frames_needed: usize,
        mesh: Arc<BaseMesh>,
        recalculate_normals: bool,
    ) {
        self.from = Some(from);
        self.to = Some(to);
        self.mesh = Some(mesh);
        self.recalculate_normals = recalculate_normals;
        self.frames_needed = frames_needed;
        self.current_frame = 0;
        self.generated_frame = None;
        self.fading = true;
    }

    /// Stops fading and hands any scratch buffer back to the pool
    pub(super) fn reset(&mut self, pools: &Pools) {
        self.from = None;
        self.to = None;
        self.mesh = None;
        self.fading = false;
        self.frames_needed = 0;
        self.current_frame = 0;
        self.generated_frame = None;
        self.return_frame(pools);
    }

    fn return_frame(&mut self, pools: &Pools) {
        if let Some(frame) = self.frame.take() {
            pools.vectors.put(frame.positions, false);
            pools.vectors.put(frame.normals, false);
        }
    }

    #[must_use]
    pub const fn is_fading(&self) -> bool {
        self.fading
    }

    #[must_use]
    pub const fn frames_needed(&self) -> usize {
        self.frames_needed
    }

    #[must_use]
    pub const fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.current_frame >= self.frames_needed
    }

    /// Blend weight for the current step
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn delta(&self) -> f32 {
        if self.frames_needed == 0 {
            1.0
        } else {
            self.current_frame as f32 / self.frames_needed as f32
        }
    }

    pub(super) fn endpoints(
        &self,
    ) -> Option<(&Arc<DecompressedFrame>, &Arc<DecompressedFrame>)> {
        self.from.as_ref().zip(self.to.as_ref())
    }

    /// Builds the frame for the current step unless it already exists.
    /// Safe to call any number of times for the same step.
    pub fn generate(&mut self, pools: &Pools) {
        if !self.fading
            || self.is_complete()
            || self.generated_frame == Some(self.current_frame)
        {
            return;
        }
        let Some((from, to)) = self.endpoints() else {
            return;
        };
        let (from, to) = (from.clone(), to.clone());
        let count = to.positions.len();
        let delta = self.delta();
        let mut positions = pools.vectors.get(count);
        let pairs = from.positions.iter().zip(&to.positions);
        for (p, (a, b)) in positions.iter_mut().zip(pairs) {
            *p = glm::lerp(a, b, delta);
        }
        let normals = match self.mesh.as_deref() {
            Some(mesh) if self.recalculate_normals => {
                recalculate_normals(&mesh.indices, &positions, None, pools)
            }
            Some(mesh) => {
                let mut normals = pools.vectors.get(count);
                let zero = glm::Vec3::zeros();
                for (i, n) in normals.iter_mut().enumerate() {
                    *n = *mesh.normals.get(i).unwrap_or(&zero);
                }
                normals
            }
            None => pools.vectors.get(count),
        };
        self.return_frame(pools);
        self.frame = Some(MeshFrame {
            bounds: Bounds::from_positions(&positions),
            positions,
            normals,
        });
        self.generated_frame = Some(self.current_frame);
        trace!("Generated crossfade step {}", self.current_frame);
    }

    /// Takes the frame for the current step if it is ready and moves on to
    /// the next step
    pub(super) fn take_ready(&mut self) -> Option<MeshFrame> {
        if !self.fading || self.generated_frame != Some(self.current_frame) {
            return None;
        }
        let frame = self.frame.take()?;
        self.current_frame += 1;
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints() -> (Arc<DecompressedFrame>, Arc<DecompressedFrame>) {
        (
            Arc::new(DecompressedFrame::new(vec![glm::vec3(0.0, 0.0, 0.0)])),
            Arc::new(DecompressedFrame::new(vec![glm::vec3(4.0, 0.0, 0.0)])),
        )
    }

    #[test]
    fn steps_are_generated_once_and_in_order() {
        let pools = Pools::default();
        let (from, to) = endpoints();
        let mut state = CrossfadeState::default();
        state.start(from, to, 4, Arc::new(BaseMesh::default()), false);

        assert!(state.take_ready().is_none());
        state.generate(&pools);
        state.generate(&pools);
        assert_eq!(pools.vectors.stats().outstanding(), 2);
        let first = state.take_ready().unwrap();
        assert_eq!(first.positions[0].x, 0.0);
        assert!(state.take_ready().is_none());

        state.generate(&pools);
        let second = state.take_ready().unwrap();
        assert_eq!(second.positions[0].x, 1.0);
        assert_eq!(state.current_frame(), 2);

        state.generate(&pools);
        state.reset(&pools);
        assert!(!state.is_fading());
        // Scratch from the unconsumed step went back to the pool
        assert_eq!(pools.vectors.stats().outstanding(), 4);
    }

    #[test]
    fn zero_frames_is_complete() {
        let pools = Pools::default();
        let (from, to) = endpoints();
        let mut state = CrossfadeState::default();
        state.start(from, to, 0, Arc::new(BaseMesh::default()), true);
        assert!(state.is_complete());
        state.generate(&pools);
        assert!(state.take_ready().is_none());
    }
}
