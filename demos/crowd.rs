//! Headless demo of a small crowd sharing one baked clip set.
//!
//! Bakes two clips for a single quad, compresses and decompresses them, then
//! lets a `Manager` tick a dozen animators in simulated time while a viewer
//! walks past. Run with `RUST_LOG=info` (or `debug`) to follow along.

use log::info;
use nalgebra_glm as glm;
use rand::Rng;
use std::sync::Arc;
use vertanim::{
    clip::{AnimationClip, AnimationEvent, ClipInfo, EventPayload},
    codec::{self, DecompressedFrame},
    config::{AnimatorConfig, LodLevel, RuntimeConfig, YamlConfig},
    manager::Manager,
    mesh::BaseMesh,
    runtime::Runtime,
    types::WrapMode,
    va_error::VaError,
};

const SIM_RATE: f32 = 1.0 / 60.0;
const SIM_SECONDS: f32 = 6.0;
const CROWD: usize = 12;
const BAKED_FRAMES: u8 = 24;

const ANIMATOR_YAML: &str = "
fps: 30
crossfade_duration: 0.25
recalculate_crossfade_normals: true
lod_levels:
  - fps: 30
    distance: 0.0
  - fps: 10
    distance: 8.0
";

fn quad() -> BaseMesh {
    let positions = vec![
        glm::vec3(-0.5, 0.0, 0.0),
        glm::vec3(0.5, 0.0, 0.0),
        glm::vec3(-0.5, 1.0, 0.0),
        glm::vec3(0.5, 1.0, 0.0),
    ];
    BaseMesh {
        name: "quad".to_string(),
        normals: vec![glm::Vec3::z(); positions.len()],
        positions,
        indices: vec![0, 1, 2, 2, 1, 3],
    }
}

/// Bakes a clip by bending the top edge of the quad with `bend`
fn bake(
    mesh: &BaseMesh,
    info: ClipInfo,
    bend: impl Fn(f32) -> f32,
) -> Result<AnimationClip, VaError> {
    let frames: Vec<DecompressedFrame> = (0..BAKED_FRAMES)
        .map(|i| {
            let t = f32::from(i) / f32::from(BAKED_FRAMES);
            let positions = mesh
                .positions
                .iter()
                .map(|p| glm::vec3(p.x, p.y, p.y * bend(t)))
                .collect();
            DecompressedFrame::new(positions)
        })
        .collect();
    let compressed = codec::compress(&frames, codec::DEFAULT_ACCURACY)?;
    info!(
        "Baked \"{}\": {} frames, {} unique positions",
        info.name,
        compressed.frame_count,
        compressed.positions.len()
    );
    AnimationClip::from_compressed(info, &compressed)
}

fn main() -> Result<(), VaError> {
    env_logger::init();

    let mesh = Arc::new(quad());
    let sway = bake(
        &mesh,
        ClipInfo {
            name: "sway".to_string(),
            length: 2.0,
            frame_skip: 2,
            wrap_mode: WrapMode::Loop,
            smoothing_angle: Some(60.0),
            ..ClipInfo::default()
        },
        |t| (t * std::f32::consts::TAU).sin() * 0.3,
    )?;
    let wave = bake(
        &mesh,
        ClipInfo {
            name: "wave".to_string(),
            wrap_mode: WrapMode::PingPong,
            events: vec![AnimationEvent {
                name: "peak".to_string(),
                frame: usize::from(BAKED_FRAMES) - 1,
                payload: EventPayload::Int(1),
            }],
            ..ClipInfo::default()
        },
        |t| t * 0.8,
    )?;
    let clips = vec![Arc::new(sway), Arc::new(wave)];

    let config = AnimatorConfig::from_yaml(ANIMATOR_YAML)?;
    let runtime = Arc::new(Runtime::new(RuntimeConfig::default()));
    let mut manager = Manager::new(runtime.clone());
    let mut rng = rand::thread_rng();
    let mut ids = Vec::with_capacity(CROWD);
    for i in 0..CROWD {
        let id =
            manager.spawn(mesh.clone(), clips.clone(), config.clone(), 0.0);
        if let Some(animator) = manager.get_mut(id) {
            #[allow(clippy::cast_precision_loss)]
            let x = i as f32 * 1.5;
            animator.transform_mut().position = glm::vec3(x, 0.0, 0.0);
            animator.set_speed(rng.gen_range(0.8..1.2));
        }
        ids.push(id);
    }
    info!("{} animators on {} workers", manager.len(), runtime.worker_count());

    let mut time = 0.0;
    let mut ticks = 0;
    let mut waved = false;
    while time < SIM_SECONDS {
        time += SIM_RATE;
        // Viewer strolls along the line of animators
        manager.set_viewpoint(Some(glm::vec3(time * 3.0, 1.0, 4.0)));
        ticks += manager.update(time);

        if !waved && time > SIM_SECONDS / 2.0 {
            for id in ids.iter().step_by(2) {
                if let Some(animator) = manager.get_mut(*id) {
                    animator.crossfade_default("wave");
                }
            }
            waved = true;
        }
    }

    for animator in manager.iter() {
        info!(
            "{:>5} frame {:>2} lod {} bounds {:?}",
            animator.current_clip().map_or("-", |c| c.name()),
            animator.current_frame(),
            animator.lod_level(),
            animator.current_mesh().bounds.size(),
        );
    }
    info!(
        "{ticks} ticks, vector pool hit rate {:.2}",
        runtime.pools().vectors.stats().hit_rate()
    );
    runtime.shutdown();
    Ok(())
}
