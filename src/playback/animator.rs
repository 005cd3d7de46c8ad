use super::{
    observer::{AnimatorEvent, EventFanout, Observers},
    workers::CrossfadeJob,
};
use crate::{
    clip::{AnimationClip, MeshHandle},
    codec::DecompressedFrame,
    config::AnimatorConfig,
    mesh::{BaseMesh, MeshFrame},
    runtime::Runtime,
    transform::{nlerp, Transform},
    types::{EventReceiver, RootMotionMode, WrapMode, MIN_TICK_INTERVAL},
    va_error::VaError,
};
use ahash::AHashMap;
use log::{debug, info, trace, warn};
use nalgebra_glm as glm;
use parking_lot::Mutex;
use rand::seq::SliceRandom;
use std::{
    collections::VecDeque,
    ops::RangeInclusive,
    sync::{mpsc::Receiver, Arc},
};

/// One animated instance of a base mesh.
///
/// The embedder drives it with `update_tick` whenever `next_tick` has passed,
/// usually through a `Manager`. Playback never fails: bad indices and names
/// are ignored or clamped and configuration problems leave the animator
/// inactive with a logged warning.
pub struct Animator {
    runtime: Arc<Runtime>,
    config: AnimatorConfig,
    mesh: Arc<BaseMesh>,
    handle: Option<MeshHandle>,
    clips: Vec<Arc<AnimationClip>>,
    clip_indexes: AHashMap<String, usize>,
    default_clip: usize,

    initialized: bool,
    active: bool,
    visible: bool,
    paused: bool,
    ping_pong: bool,
    restart_clock: bool,
    current_index: Option<usize>,
    current_frame: usize,
    current_time: f32,
    last_frame_time: f32,
    next_tick: f32,
    queued: VecDeque<String>,
    event_cursor: Option<usize>,
    lod_level: usize,
    viewpoint: Option<glm::Vec3>,

    crossfade: CrossfadeJob,
    fading: bool,
    display: Arc<MeshFrame>,
    displayed: Option<(usize, usize)>,
    display_is_crossfade: bool,
    mesh_version: u64,

    transform: Transform,
    exposed: AHashMap<String, Transform>,
    observers: Observers,
    receiver: Option<Box<dyn EventReceiver + Send>>,
}

impl Animator {
    #[must_use]
    pub fn new(
        runtime: Arc<Runtime>,
        mesh: Arc<BaseMesh>,
        clips: Vec<Arc<AnimationClip>>,
        config: AnimatorConfig,
    ) -> Self {
        let mut clip_indexes = AHashMap::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            clip_indexes.entry(clip.name().to_string()).or_insert(i);
        }
        let display = Arc::new(mesh.rest_frame());
        Self {
            runtime,
            config,
            mesh,
            handle: None,
            clips,
            clip_indexes,
            default_clip: 0,
            initialized: false,
            active: false,
            visible: true,
            paused: false,
            ping_pong: false,
            restart_clock: false,
            current_index: None,
            current_frame: 0,
            current_time: 0.0,
            last_frame_time: 0.0,
            next_tick: 0.0,
            queued: VecDeque::new(),
            event_cursor: None,
            lod_level: 0,
            viewpoint: None,
            crossfade: Arc::default(),
            fading: false,
            display,
            displayed: None,
            display_is_crossfade: false,
            mesh_version: 0,
            transform: Transform::default(),
            exposed: AHashMap::new(),
            observers: Observers::default(),
            receiver: None,
        }
    }

    fn default_clip_index(&self) -> Result<usize, VaError> {
        if self.clips.is_empty() {
            return Err(VaError::NoClips);
        }
        match self.config.default_clip.as_deref() {
            None => Ok(0),
            Some(name) => self
                .clip_indexes
                .get(name)
                .copied()
                .ok_or_else(|| VaError::MissingDefaultClip(name.to_string())),
        }
    }

    /// Checks that the animator has something to play. `activate` makes the
    /// same check and stays inactive with a warning instead of failing.
    ///
    /// # Errors
    /// May return `VaError`
    pub fn validate(&self) -> Result<(), VaError> {
        self.default_clip_index().map(|_| ())
    }

    /// One time setup on first activation. Returns false if the animator
    /// cannot play.
    fn initialize(&mut self) -> bool {
        match self.default_clip_index() {
            Ok(index) => self.default_clip = index,
            Err(e) => {
                warn!(
                    "Animator on mesh \"{}\" disabled: {e}",
                    self.mesh.name
                );
                return false;
            }
        }
        let handle = self.runtime.cache().register(&self.mesh);
        self.handle = Some(handle);
        for clip in &self.clips {
            clip.generate_frames(
                self.runtime.cache(),
                handle,
                &self.mesh,
                self.runtime.pools(),
            );
            for name in &clip.info().exposed_transforms {
                self.exposed.entry(name.clone()).or_default();
            }
        }
        self.runtime.ensure_workers();
        self.initialized = true;
        info!(
            "Initialized animator on \"{}\" with {} clips",
            self.mesh.name,
            self.clips.len()
        );
        true
    }

    /// Starts ticking at time `time`. The first activation registers the
    /// mesh and generates initial frames. Returns false and stays inactive
    /// when there is nothing valid to play.
    pub fn activate(&mut self, time: f32) -> bool {
        let first = !self.initialized;
        if first && !self.initialize() {
            return false;
        }
        // A deactivated animator has no clip and falls back to the default
        if first || self.config.reset_on_enable || self.current_index.is_none()
        {
            self.play(self.default_clip);
            if !self.config.play_automatically {
                self.paused = true;
            }
            if let Some(clip) = self.current_clip().cloned() {
                self.show_frame(&clip, self.current_frame);
            }
        }
        self.active = true;
        self.last_frame_time = time;
        self.next_tick = time;
        true
    }

    /// Stops ticking. Any crossfade is abandoned, the current clip and the
    /// queue are cleared.
    pub fn deactivate(&mut self) {
        self.active = false;
        self.reset_crossfade();
        self.current_index = None;
        self.ping_pong = false;
        self.queued.clear();
    }

    /// Visibility as reported by the embedder. Invisible animators do not
    /// tick unless `update_when_offscreen` is set.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        self.observers
            .publish(&AnimatorEvent::VisibilityChanged(visible));
    }

    fn reset_crossfade(&mut self) {
        self.crossfade.lock().reset(self.runtime.pools());
        self.fading = false;
    }

    /// Receiver for notifications from this animator
    pub fn subscribe(&mut self) -> Receiver<AnimatorEvent> {
        self.observers.subscribe()
    }

    /// Receiver called directly for timed clip events
    pub fn set_event_receiver(
        &mut self,
        receiver: Box<dyn EventReceiver + Send>,
    ) {
        self.receiver = Some(receiver);
    }

    /// Plays a clip by index from its start. Does nothing if the clip is
    /// already playing or the index is out of range.
    pub fn play(&mut self, index: usize) {
        if index >= self.clips.len() || self.current_index == Some(index) {
            return;
        }
        self.queued.clear();
        self.current_index = Some(index);
        self.current_frame = 0;
        self.current_time = 0.0;
        self.event_cursor = None;
        self.ping_pong = false;
        self.paused = false;
        self.restart_clock = true;
        self.next_tick = self.last_frame_time;
        debug!("Playing \"{}\"", self.clips[index].name());
    }

    /// Plays a clip by name. Unknown names are ignored.
    pub fn play_named(&mut self, name: &str) {
        if let Some(&index) = self.clip_indexes.get(name) {
            self.play(index);
        }
    }

    /// Plays one of the named clips at random
    pub fn play_random(&mut self, names: &[&str]) {
        if let Some(name) = names.choose(&mut rand::thread_rng()) {
            self.play_named(name);
        }
    }

    /// Plays a clip once the current one finishes
    pub fn play_queued(&mut self, name: &str) {
        self.queued.push_back(name.to_string());
    }

    /// Blends from the current pose into the start of another clip over
    /// `duration` seconds
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn crossfade(&mut self, index: usize, duration: f32) {
        if index >= self.clips.len() {
            return;
        }
        let from = match self.current_clip() {
            Some(clip) => clip.get_nearest_frame(self.current_frame).clone(),
            None => self.clips[self.default_clip].get_nearest_frame(0).clone(),
        };
        self.play(index);
        let to = self.clips[index].get_nearest_frame(0).clone();
        let frames_needed = (duration * self.config.fps as f32) as usize;
        self.crossfade.lock().start(
            from,
            to,
            frames_needed,
            self.mesh.clone(),
            self.config.recalculate_crossfade_normals,
        );
        self.fading = true;
        self.runtime.enqueue_crossfade(self.crossfade.clone());
        debug!(
            "Crossfading into \"{}\" over {frames_needed} frames",
            self.clips[index].name()
        );
    }

    pub fn crossfade_named(&mut self, name: &str, duration: f32) {
        if let Some(&index) = self.clip_indexes.get(name) {
            self.crossfade(index, duration);
        }
    }

    /// Crossfade using the configured duration
    pub fn crossfade_default(&mut self, name: &str) {
        self.crossfade_named(name, self.config.crossfade_duration);
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Continues after `pause` without a jump for the time spent paused
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.restart_clock = true;
        }
    }

    /// Returns the current clip to its first frame
    pub fn restart(&mut self) {
        self.current_frame = 0;
        self.current_time = 0.0;
        self.event_cursor = None;
    }

    /// Jumps to `seconds` into the current clip, clamped to its length
    pub fn set_time(&mut self, seconds: f32, apply: bool) {
        let Some(clip) = self.current_clip() else {
            return;
        };
        self.current_time = seconds.clamp(0.0, clip.info().length.max(0.0));
        if apply {
            self.restart_clock = true;
            self.update_tick(self.last_frame_time);
        }
    }

    /// Jumps to a fraction of the current clip
    pub fn set_time_normalized(&mut self, fraction: f32, apply: bool) {
        let Some(clip) = self.current_clip() else {
            return;
        };
        let length = clip.info().length;
        self.set_time(fraction.clamp(0.0, 1.0) * length, apply);
    }

    #[must_use]
    pub fn get_clip(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.clip_indexes.get(name).map(|&i| &self.clips[i])
    }

    #[must_use]
    pub fn current_clip(&self) -> Option<&Arc<AnimationClip>> {
        self.current_index
            .map(|i| &self.clips[i.min(self.clips.len().saturating_sub(1))])
    }

    /// Frames per second for the current LOD level
    fn tick_fps(&self) -> u32 {
        self.config
            .lod_levels
            .get(self.lod_level)
            .map_or(self.config.fps, |level| level.fps)
            .max(1)
    }

    /// Advances playback to wall clock `time`
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss,
        clippy::float_cmp
    )]
    pub fn update_tick(&mut self, time: f32) {
        if !self.active {
            return;
        }
        let Some(clip) = self.current_clip().cloned() else {
            return;
        };
        let info = clip.info();
        if (!self.visible && !self.config.update_when_offscreen)
            || self.paused
            || self.config.speed == 0.0
            || info.playback_speed == 0.0
        {
            return;
        }
        if self.restart_clock {
            self.last_frame_time = time;
            self.restart_clock = false;
        }

        let total_speed = (info.playback_speed * self.config.speed).abs();
        let tick_rate = (1.0 / self.tick_fps() as f32 / total_speed)
            .max(MIN_TICK_INTERVAL);
        let elapsed = time - self.last_frame_time;
        let mut direction = if info.playback_speed * self.config.speed < 0.0 {
            -1.0
        } else {
            1.0
        };
        if self.ping_pong {
            direction = -direction;
        }
        self.current_time += elapsed * direction * total_speed;

        let length = info.length.max(0.0);
        let mut finished = false;
        if self.current_time < 0.0 {
            finished = true;
            self.current_time = if info.wrap_mode == WrapMode::Loop {
                length
            } else {
                0.0
            };
        } else if self.current_time > length {
            finished = true;
            self.current_time = if info.wrap_mode == WrapMode::Loop {
                0.0
            } else {
                length
            };
        }
        self.next_tick = time + tick_rate;
        self.last_frame_time = time;

        let total = clip.total_frames();
        let normalized = if length > 0.0 {
            self.current_time / length
        } else {
            0.0
        };
        let previous_frame = self.current_frame;
        let frame = (normalized * total as f32).round().max(0.0) as usize;
        self.current_frame = frame.min(total - 1);
        trace!(
            "\"{}\" time {} frame {}",
            clip.name(),
            self.current_time,
            self.current_frame
        );

        if finished {
            if info.wrap_mode == WrapMode::PingPong {
                self.ping_pong = !self.ping_pong;
            }
            if !info.wrap_mode.is_looping() {
                self.next_tick = f32::INFINITY;
            }
            if let Some(next) = self.queued.pop_front() {
                self.fire_events(&clip, direction < 0.0, true);
                self.play_named(&next);
                self.observers
                    .publish(&AnimatorEvent::Finished(clip.name().to_string()));
                return;
            }
            self.observers
                .publish(&AnimatorEvent::Finished(clip.name().to_string()));
        }

        let mut previous = Some(previous_frame);
        if self.fading {
            previous = self.advance_crossfade(&clip, previous);
        }
        if !self.fading {
            if self.displayed != Some((clip.id(), self.current_frame)) {
                self.show_frame(&clip, self.current_frame);
            }
            if previous != Some(self.current_frame) {
                let nearest =
                    clip.get_nearest_frame(self.current_frame).clone();
                self.apply_exposed(&clip, |i| {
                    let matrix = nearest.exposed_transforms.get(i)?;
                    Some(Transform::from_matrix(matrix))
                });
                if info.root_motion_mode == RootMotionMode::AppliedToTransform {
                    self.apply_root_motion(&clip, previous, direction < 0.0);
                }
            }
        }

        self.observers.publish(&AnimatorEvent::FrameUpdated);
        self.fire_events(&clip, direction < 0.0, finished);
        self.update_lod();
    }

    /// Consumes the next crossfade step if it is ready. Returns the previous
    /// frame to use for the rest of the tick, which is `None` when the fade
    /// has just completed so the destination frame is shown in full.
    fn advance_crossfade(
        &mut self,
        clip: &Arc<AnimationClip>,
        previous: Option<usize>,
    ) -> Option<usize> {
        // A worker holding the lock is building a step, so show the old one
        let Some(mut state) = self.crossfade.try_lock() else {
            return previous;
        };
        if state.is_complete() {
            state.reset(self.runtime.pools());
            drop(state);
            self.fading = false;
            self.current_frame = 0;
            self.current_time = 0.0;
            self.displayed = None;
            debug!("Crossfade into \"{}\" complete", clip.name());
            return None;
        }
        if !self.runtime.is_threaded() {
            state.generate(self.runtime.pools());
        }
        let Some(frame) = state.take_ready() else {
            return previous;
        };
        let delta = state.delta();
        let more = !state.is_complete();
        let endpoints = state
            .endpoints()
            .map(|(from, to)| (from.clone(), to.clone()));
        drop(state);

        self.show_crossfade(frame);
        if more {
            self.runtime.enqueue_crossfade(self.crossfade.clone());
        }
        if let Some((from, to)) = endpoints {
            self.apply_exposed(clip, |i| {
                let a = from.exposed_transforms.get(i)?;
                let b = to.exposed_transforms.get(i)?;
                Some(Transform::lerp(
                    &Transform::from_matrix(a),
                    &Transform::from_matrix(b),
                    delta,
                ))
            });
            let motion = clip.info().root_motion_mode;
            if motion == RootMotionMode::AppliedToTransform {
                self.transform.translate_local(&glm::lerp(
                    &from.root_motion_position,
                    &to.root_motion_position,
                    delta,
                ));
                self.transform.rotate_local(&nlerp(
                    &from.root_motion_rotation,
                    &to.root_motion_rotation,
                    delta,
                ));
            }
        }
        previous
    }

    fn show_frame(&mut self, clip: &AnimationClip, frame: usize) {
        let Some(handle) = self.handle else {
            return;
        };
        let generated = clip.generate_frame(
            self.runtime.cache(),
            handle,
            &self.mesh,
            self.runtime.pools(),
            frame,
        );
        self.swap_display(generated, false);
        self.displayed = Some((clip.id(), clip.clamp_frame(frame)));
    }

    fn show_crossfade(&mut self, frame: MeshFrame) {
        self.swap_display(Arc::new(frame), true);
        self.displayed = None;
    }

    /// Replaces the displayed frame. Buffers of an outgoing crossfade frame
    /// go back to the pool.
    fn swap_display(&mut self, frame: Arc<MeshFrame>, is_crossfade: bool) {
        let old = std::mem::replace(&mut self.display, frame);
        if self.display_is_crossfade {
            if let Ok(old) = Arc::try_unwrap(old) {
                let pools = self.runtime.pools();
                pools.vectors.put(old.positions, false);
                pools.vectors.put(old.normals, false);
            }
        }
        self.display_is_crossfade = is_crossfade;
        self.mesh_version += 1;
    }

    /// Moves each exposed child transform to the value given by `pose`
    fn apply_exposed<F>(&mut self, clip: &AnimationClip, pose: F)
    where
        F: Fn(usize) -> Option<Transform>,
    {
        let names = clip.info().exposed_transforms.iter().enumerate();
        for (i, name) in names {
            let Some(child) = self.exposed.get_mut(name) else {
                continue;
            };
            if let Some(t) = pose(i) {
                *child = t;
            }
        }
    }

    /// Applies root motion for every logical frame passed since `previous`
    fn apply_root_motion(
        &mut self,
        clip: &AnimationClip,
        previous: Option<usize>,
        backward: bool,
    ) {
        let current = self.current_frame;
        let total = clip.total_frames();
        let apply = |range: RangeInclusive<usize>, transform: &mut Transform| {
            for i in range {
                let frame: &DecompressedFrame = clip.get_nearest_frame(i);
                transform.translate_local(&frame.root_motion_position);
                transform.rotate_local(&frame.root_motion_rotation);
            }
        };
        let mut transform = self.transform;
        match previous {
            None => apply(0..=current, &mut transform),
            Some(prev) if !backward && prev < current => {
                apply(prev + 1..=current, &mut transform);
            }
            Some(prev) if !backward => {
                // Looped around, finish the tail then run the head
                apply(prev + 1..=total - 1, &mut transform);
                apply(0..=current, &mut transform);
            }
            Some(prev) if current < prev => {
                apply(current..=prev - 1, &mut transform);
            }
            Some(prev) => {
                // Looped around while playing backward
                if prev > 0 {
                    apply(0..=prev - 1, &mut transform);
                }
                apply(current..=total - 1, &mut transform);
            }
        }
        self.transform = transform;
    }

    /// Fires timed events between the event cursor and the current frame.
    /// Each event fires once per pass over its frame.
    fn fire_events(
        &mut self,
        clip: &AnimationClip,
        backward: bool,
        finished: bool,
    ) {
        if clip.info().events.is_empty()
            || self.event_cursor == Some(self.current_frame)
        {
            return;
        }
        let total = clip.total_frames();
        let current = self.current_frame;
        let mut fanout = EventFanout {
            observers: &mut self.observers,
            receiver: self.receiver.as_mut(),
        };
        if backward {
            let start = self.event_cursor.unwrap_or(total);
            let end = if finished { 0 } else { current };
            for frame in (end..start).rev() {
                clip.fire_events(&mut fanout, frame);
            }
            self.event_cursor =
                if finished { Some(total) } else { Some(current) };
        } else {
            let start = self.event_cursor.map_or(0, |c| c + 1);
            let end = if finished { total } else { current };
            for frame in start..=end {
                clip.fire_events(&mut fanout, frame);
            }
            self.event_cursor = if finished { None } else { Some(current) };
        }
    }

    fn update_lod(&mut self) {
        if self.config.lod_levels.is_empty() {
            return;
        }
        let Some(viewpoint) = self.viewpoint else {
            return;
        };
        let distance = (viewpoint - self.transform.position).norm_squared();
        let level = self
            .config
            .lod_levels
            .iter()
            .rposition(|l| distance > l.distance * l.distance)
            .unwrap_or(0);
        if level != self.lod_level {
            trace!("LOD level {} -> {}", self.lod_level, level);
            self.lod_level = level;
        }
    }

    /// Reference point for LOD distance checks
    pub fn set_viewpoint(&mut self, viewpoint: Option<glm::Vec3>) {
        self.viewpoint = viewpoint;
    }

    /// Frame currently displayed
    #[must_use]
    pub fn current_mesh(&self) -> &MeshFrame {
        &self.display
    }

    /// Increments each time the displayed frame changes
    #[must_use]
    pub const fn mesh_version(&self) -> u64 {
        self.mesh_version
    }

    #[must_use]
    pub const fn current_frame(&self) -> usize {
        self.current_frame
    }

    #[must_use]
    pub const fn current_time(&self) -> f32 {
        self.current_time
    }

    /// Earliest time at which the next tick does anything
    #[must_use]
    pub const fn next_tick(&self) -> f32 {
        self.next_tick
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused
    }

    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    #[must_use]
    pub const fn is_crossfading(&self) -> bool {
        self.fading
    }

    #[must_use]
    pub const fn lod_level(&self) -> usize {
        self.lod_level
    }

    #[must_use]
    pub fn speed(&self) -> f32 {
        self.config.speed
    }

    pub fn set_speed(&mut self, speed: f32) {
        self.config.speed = speed;
    }

    #[must_use]
    pub const fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    #[must_use]
    pub const fn base_mesh(&self) -> &Arc<BaseMesh> {
        &self.mesh
    }

    #[must_use]
    pub fn clips(&self) -> &[Arc<AnimationClip>] {
        &self.clips
    }

    #[must_use]
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_mut(&mut self) -> &mut Transform {
        &mut self.transform
    }

    /// Local transform of an exposed child
    #[must_use]
    pub fn exposed_transform(&self, name: &str) -> Option<&Transform> {
        self.exposed.get(name)
    }
}

impl Drop for Animator {
    fn drop(&mut self) {
        self.reset_crossfade();
        let Some(handle) = self.handle.take() else {
            return;
        };
        let cache = self.runtime.cache();
        if cache.live_instances(handle) <= 1 {
            for clip in &self.clips {
                clip.reset(cache, handle);
            }
        }
        cache.release(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clip::{AnimationEvent, ClipInfo},
        config::RuntimeConfig,
    };

    fn runtime() -> Arc<Runtime> {
        Arc::new(Runtime::new(RuntimeConfig {
            threaded: false,
            ..RuntimeConfig::default()
        }))
    }

    /// Four stored frames of one vertex walking along x, one second long
    fn clip(name: &str, wrap_mode: WrapMode) -> Arc<AnimationClip> {
        let frames = (0..4u8)
            .map(|i| {
                DecompressedFrame::new(vec![glm::vec3(f32::from(i), 0.0, 0.0)])
            })
            .collect();
        let info = ClipInfo {
            name: name.to_string(),
            wrap_mode,
            ..ClipInfo::default()
        };
        Arc::new(AnimationClip::new(info, frames).unwrap())
    }

    fn new_animator(
        clips: Vec<Arc<AnimationClip>>,
        config: AnimatorConfig,
    ) -> Animator {
        Animator::new(runtime(), mesh(), clips, config)
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
    fn missing_default_stays_inactive() {
        let config = AnimatorConfig {
            default_clip: Some("nope".to_string()),
            ..AnimatorConfig::default()
        };
        let mut animator =
            new_animator(vec![clip("a", WrapMode::Loop)], config);
        assert!(!animator.activate(0.0));
        assert!(!animator.is_active());

        let mut empty = new_animator(Vec::new(), AnimatorConfig::default());
        assert!(!empty.activate(0.0));
    }

    #[test]
    fn frames_follow_time() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Once)],
            AnimatorConfig::default(),
        );
        assert!(animator.activate(0.0));
        animator.update_tick(0.0);
        assert_eq!(animator.current_frame(), 0);
        animator.update_tick(0.5);
        assert_eq!(animator.current_frame(), 2);
        assert_eq!(animator.current_mesh().positions[0].x, 2.0);
        animator.update_tick(2.0);
        assert_eq!(animator.current_frame(), 3);
        assert!(animator.next_tick().is_infinite());
    }

    #[test]
    fn unchanged_frame_keeps_mesh_version() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        animator.activate(0.0);
        animator.update_tick(0.0);
        let version = animator.mesh_version();
        animator.update_tick(0.01);
        assert_eq!(animator.mesh_version(), version);
        animator.update_tick(0.26);
        assert_eq!(animator.mesh_version(), version + 1);
    }

    #[test]
    fn queued_clip_plays_on_finish() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Once), clip("b", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        let events = animator.subscribe();
        animator.activate(0.0);
        animator.play_queued("b");
        animator.update_tick(0.0);
        animator.update_tick(1.5);
        assert_eq!(animator.current_clip().map(|c| c.name()), Some("b"));
        assert_eq!(animator.current_frame(), 0);
        let finished: Vec<_> = events
            .try_iter()
            .filter(|e| matches!(e, AnimatorEvent::Finished(_)))
            .collect();
        assert_eq!(finished, vec![AnimatorEvent::Finished("a".to_string())]);
    }

    #[test]
    fn ping_pong_reverses() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::PingPong)],
            AnimatorConfig::default(),
        );
        animator.activate(0.0);
        animator.update_tick(0.0);
        animator.update_tick(1.2);
        assert!((animator.current_time() - 1.0).abs() < 1.0e-6);
        animator.update_tick(1.45);
        assert!((animator.current_time() - 0.75).abs() < 1.0e-5);
        assert_eq!(animator.current_frame(), 3);
    }

    #[test]
    fn events_fire_once_per_pass() {
        let mut a = clip("a", WrapMode::Loop).info().clone();
        a.events = vec![AnimationEvent {
            name: "step".to_string(),
            frame: 1,
            ..AnimationEvent::default()
        }];
        let frames = clip("a", WrapMode::Loop)
            .stored_frames()
            .iter()
            .map(|f| (**f).clone())
            .collect();
        let clip = Arc::new(AnimationClip::new(a, frames).unwrap());
        let mut animator = new_animator(vec![clip], AnimatorConfig::default());
        let fired = Arc::new(Mutex::new(0));
        let counter = fired.clone();
        let receiver = move |_: &str, _: &AnimationEvent| {
            *counter.lock() += 1;
        };
        animator.set_event_receiver(Box::new(receiver));
        animator.activate(0.0);
        for i in 0..8u8 {
            animator.update_tick(f32::from(i) * 0.125);
        }
        assert_eq!(*fired.lock(), 1);
        // Second pass over the loop
        for i in 8..16u8 {
            animator.update_tick(f32::from(i) * 0.125);
        }
        assert_eq!(*fired.lock(), 2);
    }

    #[test]
    fn deactivate_clears_state() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Loop), clip("b", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        animator.activate(0.0);
        animator.crossfade(1, 0.1);
        animator.play_queued("a");
        animator.deactivate();
        assert!(!animator.is_crossfading());
        assert!(animator.current_clip().is_none());
        animator.update_tick(1.0);
        assert!(animator.activate(2.0));
        assert_eq!(animator.current_clip().map(|c| c.name()), Some("a"));
    }

    #[test]
    fn lod_from_viewpoint() {
        let config = AnimatorConfig {
            lod_levels: vec![
                crate::config::LodLevel { fps: 30, distance: 0.0 },
                crate::config::LodLevel { fps: 10, distance: 10.0 },
            ],
            ..AnimatorConfig::default()
        };
        let mut animator =
            new_animator(vec![clip("a", WrapMode::Loop)], config);
        animator.activate(0.0);
        animator.set_viewpoint(Some(glm::vec3(0.0, 0.0, 20.0)));
        animator.update_tick(0.0);
        assert_eq!(animator.lod_level(), 1);
        // The slower rate applies from the next tick
        animator.update_tick(0.1);
        assert!((animator.next_tick() - 0.2).abs() < 1.0e-5);
        animator.set_viewpoint(Some(glm::vec3(0.0, 0.0, 5.0)));
        animator.update_tick(0.2);
        assert_eq!(animator.lod_level(), 0);
    }

    /// Looping clip with a "hand" transform and one unit of forward root
    /// motion per stored frame
    fn rigged(name: &str, hand: impl Fn(u8) -> f32) -> Arc<AnimationClip> {
        let frames = (0..4u8)
            .map(|i| {
                let x = f32::from(i);
                let matrix = glm::translation(&glm::vec3(hand(i), 0.0, 0.0));
                DecompressedFrame {
                    exposed_transforms: vec![matrix],
                    root_motion_position: glm::vec3(0.0, 0.0, 1.0),
                    ..DecompressedFrame::new(vec![glm::vec3(x, 0.0, 0.0)])
                }
            })
            .collect();
        let info = ClipInfo {
            name: name.to_string(),
            wrap_mode: WrapMode::Loop,
            root_motion_mode: RootMotionMode::AppliedToTransform,
            exposed_transforms: vec!["hand".to_string()],
            ..ClipInfo::default()
        };
        Arc::new(AnimationClip::new(info, frames).unwrap())
    }

    fn hand_x(animator: &Animator) -> f32 {
        animator.exposed_transform("hand").map_or(f32::NAN, |t| t.position.x)
    }

    #[test]
    fn exposed_transforms_follow_frames() {
        let clip = rigged("a", f32::from);
        let mut animator = new_animator(vec![clip], AnimatorConfig::default());
        assert!(animator.activate(0.0));
        animator.update_tick(0.0);
        animator.update_tick(0.5);
        assert_eq!(animator.current_frame(), 2);
        assert!((hand_x(&animator) - 2.0).abs() < 1.0e-5);
        let hand = animator.exposed_transform("hand").unwrap();
        assert!((hand.scale - glm::vec3(1.0, 1.0, 1.0)).norm() < 1.0e-5);
    }

    #[test]
    fn exposed_transforms_blend_during_crossfade() {
        let config = AnimatorConfig {
            fps: 8,
            ..AnimatorConfig::default()
        };
        let clips = vec![rigged("a", f32::from), rigged("b", |_| 10.0)];
        let mut animator = new_animator(clips, config);
        assert!(animator.activate(0.0));
        animator.update_tick(0.0);
        animator.update_tick(0.5);
        assert!((hand_x(&animator) - 2.0).abs() < 1.0e-5);

        animator.crossfade(1, 0.5);
        let mut time = 0.5;
        let mut hands = Vec::new();
        while animator.is_crossfading() {
            assert!(hands.len() < 10, "crossfade did not finish");
            time += 0.125;
            animator.update_tick(time);
            hands.push(hand_x(&animator));
        }
        assert!(hands[0] > 2.0 && hands[0] < 10.0);
        assert!(hands.windows(2).all(|w| w[0] <= w[1] + 1.0e-5));
        assert!((hand_x(&animator) - 10.0).abs() < 1.0e-5);
    }

    #[test]
    fn backward_root_motion_across_seam() {
        let config = AnimatorConfig {
            speed: -1.0,
            ..AnimatorConfig::default()
        };
        let clip = rigged("a", f32::from);
        let mut animator = new_animator(vec![clip], config);
        let events = animator.subscribe();
        assert!(animator.activate(0.0));
        animator.set_time(0.25, false);
        animator.update_tick(0.0);
        assert_eq!(animator.current_frame(), 1);
        let start = animator.transform().position.z;

        // Frame 1 back past the seam to frame 3 passes frames 0 and 3
        animator.update_tick(0.5);
        assert_eq!(animator.current_frame(), 3);
        assert!((animator.transform().position.z - start - 2.0).abs() < 1.0e-5);
        let finished = events
            .try_iter()
            .filter(|e| matches!(e, AnimatorEvent::Finished(_)))
            .count();
        assert_eq!(finished, 1);

        animator.update_tick(0.75);
        assert_eq!(animator.current_frame(), 3);
        animator.update_tick(1.0);
        assert_eq!(animator.current_frame(), 2);
        assert!((animator.transform().position.z - start - 3.0).abs() < 1.0e-5);
    }

    #[test]
    fn pause_and_resume_without_jump() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        animator.activate(0.0);
        animator.update_tick(0.0);
        animator.update_tick(0.25);
        assert_eq!(animator.current_frame(), 1);

        animator.pause();
        animator.update_tick(0.5);
        animator.update_tick(3.0);
        assert!(animator.is_paused());
        assert_eq!(animator.current_frame(), 1);

        animator.resume();
        animator.update_tick(3.0);
        assert_eq!(animator.current_frame(), 1);
        animator.update_tick(3.25);
        assert_eq!(animator.current_frame(), 2);
    }

    #[test]
    fn set_time_and_restart() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        animator.activate(0.0);
        animator.update_tick(0.0);

        animator.set_time(0.5, true);
        assert_eq!(animator.current_frame(), 2);
        assert_eq!(animator.current_mesh().positions[0].x, 2.0);
        animator.set_time_normalized(0.25, true);
        assert_eq!(animator.current_frame(), 1);

        // Without apply only the clock moves, clamped to the clip
        animator.set_time(5.0, false);
        assert!((animator.current_time() - 1.0).abs() < 1.0e-6);
        assert_eq!(animator.current_frame(), 1);

        animator.restart();
        assert_eq!(animator.current_frame(), 0);
        assert_eq!(animator.current_time(), 0.0);
    }

    #[test]
    fn play_random_picks_named_clip() {
        let mut animator = new_animator(
            vec![clip("a", WrapMode::Loop), clip("b", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        animator.activate(0.0);
        animator.play_random(&["b"]);
        assert_eq!(animator.current_clip().map(|c| c.name()), Some("b"));
        animator.play_random(&[]);
        animator.play_random(&["missing"]);
        assert_eq!(animator.current_clip().map(|c| c.name()), Some("b"));
    }

    #[test]
    fn invisible_ticks_are_skipped() {
        let mut hidden = new_animator(
            vec![clip("a", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        let events = hidden.subscribe();
        hidden.activate(0.0);
        hidden.update_tick(0.0);
        hidden.set_visible(false);
        hidden.update_tick(0.5);
        assert!(!hidden.is_visible());
        assert_eq!(hidden.current_frame(), 0);
        assert!(events
            .try_iter()
            .any(|e| e == AnimatorEvent::VisibilityChanged(false)));

        let config = AnimatorConfig {
            update_when_offscreen: true,
            ..AnimatorConfig::default()
        };
        let mut offscreen =
            new_animator(vec![clip("a", WrapMode::Loop)], config);
        offscreen.activate(0.0);
        offscreen.set_visible(false);
        offscreen.update_tick(0.0);
        offscreen.update_tick(0.5);
        assert_eq!(offscreen.current_frame(), 2);
    }

    #[test]
    fn reactivation_falls_back_to_default_clip() {
        let config = AnimatorConfig {
            reset_on_enable: false,
            ..AnimatorConfig::default()
        };
        let mut animator =
            new_animator(vec![clip("a", WrapMode::Loop)], config);
        animator.activate(0.0);
        animator.update_tick(0.0);
        animator.update_tick(0.5);
        assert_eq!(animator.current_frame(), 2);

        animator.deactivate();
        assert!(animator.activate(1.0));
        assert_eq!(animator.current_clip().map(|c| c.name()), Some("a"));
        animator.update_tick(1.0);
        animator.update_tick(1.25);
        assert_eq!(animator.current_frame(), 1);

        // Still playing, so reactivation keeps the position
        assert!(animator.activate(2.0));
        assert_eq!(animator.current_frame(), 1);
    }

    #[test]
    fn manual_start_selects_default_paused() {
        let config = AnimatorConfig {
            play_automatically: false,
            ..AnimatorConfig::default()
        };
        let mut animator =
            new_animator(vec![clip("a", WrapMode::Loop)], config);
        assert!(animator.activate(0.0));
        assert!(animator.is_paused());
        assert_eq!(animator.current_clip().map(|c| c.name()), Some("a"));
        animator.update_tick(0.5);
        assert_eq!(animator.current_frame(), 0);
    }

    #[test]
    fn validate_reports_clip_problems() {
        let empty = new_animator(Vec::new(), AnimatorConfig::default());
        assert!(matches!(empty.validate(), Err(VaError::NoClips)));

        let config = AnimatorConfig {
            default_clip: Some("nope".to_string()),
            ..AnimatorConfig::default()
        };
        let missing = new_animator(vec![clip("a", WrapMode::Loop)], config);
        assert!(matches!(
            missing.validate(),
            Err(VaError::MissingDefaultClip(name)) if name == "nope"
        ));

        let fine = new_animator(
            vec![clip("a", WrapMode::Loop)],
            AnimatorConfig::default(),
        );
        assert!(fine.validate().is_ok());
    }
}
