use crate::mesh::{BaseMesh, MeshFrame};
use ahash::AHashMap;
use log::{debug, info};
use parking_lot::Mutex;
use std::sync::Arc;

/// Generational key of a base mesh entry in a `FrameCache`. A handle whose
/// entry has been removed no longer matches anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshHandle {
    index: u32,
    generation: u32,
}

#[derive(Debug, Default)]
struct ClipFrames {
    frames: Vec<Option<Arc<MeshFrame>>>,
    generated: usize,
}

impl ClipFrames {
    fn completely_generated(&self) -> bool {
        !self.frames.is_empty() && self.generated == self.frames.len()
    }
}

#[derive(Debug)]
struct Entry {
    mesh: Arc<BaseMesh>,
    live: usize,
    clips: AHashMap<usize, ClipFrames>,
}

#[derive(Debug, Default)]
struct Slot {
    generation: u32,
    entry: Option<Entry>,
}

#[derive(Debug, Default)]
struct Inner {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Inner {
    fn entry(&self, handle: MeshHandle) -> Option<&Entry> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.entry.as_ref())
    }

    fn entry_mut(&mut self, handle: MeshHandle) -> Option<&mut Entry> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.entry.as_mut())
    }
}

/// Generated mesh frames shared by every animator using the same base mesh.
///
/// Each base mesh entry counts the live animators registered against it and
/// is removed, along with every frame generated for it, when the last one
/// releases. The lock is held only for lookups and inserts. Frame generation
/// happens outside it, so two threads may occasionally build the same frame
/// and the first insert wins.
#[derive(Debug, Default)]
pub struct FrameCache {
    inner: Mutex<Inner>,
}

impl FrameCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one more animator for `mesh`. Meshes are identified by `Arc`
    /// pointer so clones of the same allocation share an entry.
    pub fn register(&self, mesh: &Arc<BaseMesh>) -> MeshHandle {
        let mut inner = self.inner.lock();
        let found = inner.slots.iter_mut().enumerate().find_map(|(i, s)| {
            let gen = s.generation;
            s.entry
                .as_mut()
                .filter(|e| Arc::ptr_eq(&e.mesh, mesh))
                .map(|e| (i, gen, e))
        });
        if let Some((index, generation, entry)) = found {
            entry.live += 1;
            debug!("Mesh \"{}\" now has {} animators", mesh.name, entry.live);
            return MeshHandle {
                index: u32::try_from(index).unwrap_or(u32::MAX),
                generation,
            };
        }
        let entry = Entry {
            mesh: mesh.clone(),
            live: 1,
            clips: AHashMap::new(),
        };
        let index = if let Some(index) = inner.free.pop() {
            index
        } else {
            inner.slots.push(Slot::default());
            u32::try_from(inner.slots.len() - 1).unwrap_or(u32::MAX)
        };
        let slot = &mut inner.slots[index as usize];
        slot.entry = Some(entry);
        let generation = slot.generation;
        drop(inner);
        info!("Registered mesh \"{}\" in frame cache", mesh.name);
        MeshHandle { index, generation }
    }

    /// Releases one animator's reference. Returns true when this removed the
    /// entry and its frames. Stale handles are ignored.
    pub fn release(&self, handle: MeshHandle) -> bool {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entry_mut(handle) else {
            return false;
        };
        entry.live = entry.live.saturating_sub(1);
        if entry.live > 0 {
            return false;
        }
        let slot = &mut inner.slots[handle.index as usize];
        let removed = slot.entry.take();
        slot.generation = slot.generation.wrapping_add(1);
        inner.free.push(handle.index);
        drop(inner);
        if let Some(entry) = removed {
            info!("Removed mesh \"{}\" from frame cache", entry.mesh.name);
        }
        true
    }

    /// Cached frame for a clip, or `None` on a miss or stale handle
    #[must_use]
    pub fn get(
        &self,
        handle: MeshHandle,
        clip_id: usize,
        frame: usize,
    ) -> Option<Arc<MeshFrame>> {
        self.inner
            .lock()
            .entry(handle)?
            .clips
            .get(&clip_id)?
            .frames
            .get(frame)?
            .clone()
    }

    /// Stores a generated frame and returns the cached copy, which is an
    /// earlier insert if another thread got there first. With a stale handle
    /// nothing is stored and `frame` comes straight back.
    pub fn insert(
        &self,
        handle: MeshHandle,
        clip_id: usize,
        index: usize,
        total_frames: usize,
        frame: Arc<MeshFrame>,
    ) -> Arc<MeshFrame> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entry_mut(handle) else {
            return frame;
        };
        let clip = entry.clips.entry(clip_id).or_default();
        if clip.frames.len() < total_frames {
            clip.frames.resize(total_frames, None);
        }
        match clip.frames.get_mut(index) {
            Some(Some(existing)) => existing.clone(),
            Some(empty) => {
                *empty = Some(frame.clone());
                clip.generated += 1;
                frame
            }
            None => frame,
        }
    }

    /// True once every frame of the clip has been generated for this mesh
    #[must_use]
    pub fn completely_generated(
        &self,
        handle: MeshHandle,
        clip_id: usize,
    ) -> bool {
        self.inner
            .lock()
            .entry(handle)
            .and_then(|e| e.clips.get(&clip_id))
            .is_some_and(ClipFrames::completely_generated)
    }

    /// True if frames for the clip have been generated for this mesh before
    #[must_use]
    pub fn has_clip(&self, handle: MeshHandle, clip_id: usize) -> bool {
        self.inner
            .lock()
            .entry(handle)
            .is_some_and(|e| e.clips.contains_key(&clip_id))
    }

    /// Drops every frame generated for the clip on this mesh
    pub fn reset_clip(&self, handle: MeshHandle, clip_id: usize) {
        let removed = self
            .inner
            .lock()
            .entry_mut(handle)
            .and_then(|e| e.clips.remove(&clip_id));
        if let Some(frames) = removed {
            debug!("Released {} generated frames", frames.generated);
        }
    }

    /// Number of animators registered against the entry
    #[must_use]
    pub fn live_instances(&self, handle: MeshHandle) -> usize {
        self.inner.lock().entry(handle).map_or(0, |e| e.live)
    }

    /// Total live animators across every entry
    #[must_use]
    pub fn total_live(&self) -> usize {
        self.inner
            .lock()
            .slots
            .iter()
            .filter_map(|s| s.entry.as_ref())
            .map(|e| e.live)
            .sum()
    }

    /// Number of base mesh entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .slots
            .iter()
            .filter(|s| s.entry.is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
