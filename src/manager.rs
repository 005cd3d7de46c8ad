use crate::{
    clip::AnimationClip, config::AnimatorConfig, mesh::BaseMesh,
    playback::Animator, runtime::Runtime,
};
use log::debug;
use nalgebra_glm as glm;
use std::sync::Arc;

/// Key of an animator owned by a `Manager`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimatorId {
    index: u32,
    generation: u32,
}

#[derive(Default)]
struct Slot {
    generation: u32,
    animator: Option<Animator>,
}

/// Owns animators and ticks each one once its next tick is due
pub struct Manager {
    runtime: Arc<Runtime>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    viewpoint: Option<glm::Vec3>,
}

impl Manager {
    #[must_use]
    pub const fn new(runtime: Arc<Runtime>) -> Self {
        Self {
            runtime,
            slots: Vec::new(),
            free: Vec::new(),
            viewpoint: None,
        }
    }

    #[must_use]
    pub const fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Takes ownership of an animator
    pub fn add(&mut self, mut animator: Animator) -> AnimatorId {
        animator.set_viewpoint(self.viewpoint);
        let index = if let Some(index) = self.free.pop() {
            index
        } else {
            self.slots.push(Slot::default());
            u32::try_from(self.slots.len() - 1).unwrap_or(u32::MAX)
        };
        let slot = &mut self.slots[index as usize];
        slot.animator = Some(animator);
        AnimatorId {
            index,
            generation: slot.generation,
        }
    }

    /// Creates an animator on the shared runtime, activates it at `time` and
    /// adds it
    pub fn spawn(
        &mut self,
        mesh: Arc<BaseMesh>,
        clips: Vec<Arc<AnimationClip>>,
        config: AnimatorConfig,
        time: f32,
    ) -> AnimatorId {
        let mut animator =
            Animator::new(self.runtime.clone(), mesh, clips, config);
        animator.activate(time);
        self.add(animator)
    }

    /// Removes an animator and hands it back. Stale ids return `None`.
    pub fn remove(&mut self, id: AnimatorId) -> Option<Animator> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)?;
        let animator = slot.animator.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(animator)
    }

    #[must_use]
    pub fn get(&self, id: AnimatorId) -> Option<&Animator> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.animator.as_ref())
    }

    pub fn get_mut(&mut self, id: AnimatorId) -> Option<&mut Animator> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.animator.as_mut())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.animator.is_some()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Animator> {
        self.slots.iter().filter_map(|s| s.animator.as_ref())
    }

    /// Ticks every animator whose next tick is due at `time`. Returns the
    /// number ticked.
    pub fn update(&mut self, time: f32) -> usize {
        let mut ticked = 0;
        let animators =
            self.slots.iter_mut().filter_map(|s| s.animator.as_mut());
        for animator in animators {
            if time >= animator.next_tick() {
                animator.update_tick(time);
                ticked += 1;
            }
        }
        if ticked > 0 {
            debug!("Ticked {ticked} animators at {time}");
        }
        ticked
    }

    /// Reference point for LOD distance checks on every animator
    pub fn set_viewpoint(&mut self, viewpoint: Option<glm::Vec3>) {
        self.viewpoint = viewpoint;
        let animators =
            self.slots.iter_mut().filter_map(|s| s.animator.as_mut());
        for animator in animators {
            animator.set_viewpoint(viewpoint);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clip::ClipInfo, codec::DecompressedFrame, config::RuntimeConfig,
        types::WrapMode,
    };

    fn manager() -> Manager {
        Manager::new(Arc::new(Runtime::new(RuntimeConfig {
            threaded: false,
            ..RuntimeConfig::default()
        })))
    }

    fn clip() -> Arc<AnimationClip> {
        let frames = (0..4u8)
            .map(|i| {
                DecompressedFrame::new(vec![glm::vec3(f32::from(i), 0.0, 0.0)])
            })
            .collect();
        let info = ClipInfo {
            name: "walk".to_string(),
            wrap_mode: WrapMode::Loop,
            ..ClipInfo::default()
        };
        Arc::new(AnimationClip::new(info, frames).unwrap())
    }

    fn mesh() -> Arc<BaseMesh> {
        Arc::new(BaseMesh {
            name: "dot".to_string(),
            positions: vec![glm::Vec3::zeros()],
            normals: vec![glm::Vec3::y()],
            indices: Vec::new(),
        })
    }

    #[test]
    fn ticks_only_due_animators() {
        let mut manager = manager();
        let clip = clip();
        let mesh = mesh();
        let config = AnimatorConfig::default();
        manager.spawn(mesh.clone(), vec![clip.clone()], config.clone(), 0.0);
        manager.spawn(mesh, vec![clip], config, 0.0);
        assert_eq!(manager.len(), 2);
        assert_eq!(manager.update(0.0), 2);
        assert_eq!(manager.update(0.01), 0);
        assert_eq!(manager.update(0.2), 2);
        assert!(manager.iter().all(|a| a.current_frame() > 0));
    }

    #[test]
    fn removed_ids_go_stale() {
        let mut manager = manager();
        let config = AnimatorConfig::default();
        let first = manager.spawn(mesh(), vec![clip()], config.clone(), 0.0);
        assert!(manager.remove(first).is_some());
        assert!(manager.get(first).is_none());
        assert!(manager.remove(first).is_none());

        let second = manager.spawn(mesh(), vec![clip()], config, 0.0);
        assert_ne!(first, second);
        assert!(manager.get_mut(second).is_some());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn viewpoint_reaches_new_animators() {
        let mut manager = manager();
        manager.set_viewpoint(Some(glm::vec3(100.0, 0.0, 0.0)));
        let config = AnimatorConfig {
            lod_levels: vec![
                crate::config::LodLevel { fps: 30, distance: 0.0 },
                crate::config::LodLevel { fps: 5, distance: 50.0 },
            ],
            ..AnimatorConfig::default()
        };
        let id = manager.spawn(mesh(), vec![clip()], config, 0.0);
        manager.update(0.0);
        assert_eq!(manager.get(id).map(Animator::lod_level), Some(1));
    }
}
