use super::types::{CompressedClip, DecompressedFrame};
use log::{debug, warn};
use nalgebra_glm as glm;

#[allow(clippy::cast_possible_truncation)]
fn dequantize(q: [u32; 3], size_offset: u32, accuracy: f32) -> glm::Vec3 {
    let c = |v: u32| {
        (f64::from(v) / f64::from(accuracy) - f64::from(size_offset)) as f32
    };
    glm::vec3(c(q[0]), c(q[1]), c(q[2]))
}

/// Number of frames the stored arrays can actually back. Header counts
/// claiming more than that are not trusted.
fn backed_frames(clip: &CompressedClip) -> usize {
    let limit = if clip.verts_per_frame > 0 {
        clip.frame_indexes.len() / clip.verts_per_frame
    } else {
        let len = |v: Option<usize>| v.unwrap_or(0);
        clip.exposed_transforms
            .len()
            .checked_div(clip.exposed_count)
            .unwrap_or(0)
            .max(len(clip.root_motion_positions.as_ref().map(Vec::len)))
            .max(len(clip.root_motion_rotations.as_ref().map(Vec::len)))
    };
    clip.frame_count.min(limit)
}

/// Expands a compressed clip back into dense frames.
///
/// Never fails. Indices that do not resolve into the position pool are
/// clamped to its last entry, and missing transform or root motion entries
/// decode as identity. A header claiming more frames or transforms than the
/// stored arrays hold is clamped to what is stored.
#[must_use]
pub fn decompress(clip: &CompressedClip) -> Vec<DecompressedFrame> {
    if clip.is_empty() {
        return Vec::new();
    }
    let frame_count = backed_frames(clip);
    let exposed_count = clip
        .exposed_transforms
        .len()
        .checked_div(clip.frame_count)
        .unwrap_or(0)
        .min(clip.exposed_count);
    if frame_count < clip.frame_count || exposed_count < clip.exposed_count {
        warn!(
            "Clip header claims {} frames and {} transforms, \
             decoding {} and {}",
            clip.frame_count, clip.exposed_count, frame_count, exposed_count
        );
    }
    let accuracy = if clip.accuracy.is_finite() && clip.accuracy > 0.0 {
        clip.accuracy
    } else {
        warn!("Invalid accuracy {} replaced with 1", clip.accuracy);
        1.0
    };
    let pool: Vec<glm::Vec3> = (0..clip.positions.len())
        .filter_map(|i| clip.positions.get(i))
        .map(|q| dequantize(q, clip.size_offset, accuracy))
        .collect();
    let fallback = pool.last().copied().unwrap_or_else(glm::Vec3::zeros);

    let mut clamped = 0usize;
    let frames: Vec<DecompressedFrame> = (0..frame_count)
        .map(|f| {
            let start = f * clip.verts_per_frame;
            let positions = (start..start + clip.verts_per_frame)
                .map(|slot| {
                    let p = clip
                        .frame_indexes
                        .get(slot)
                        .and_then(|&i| pool.get(i as usize));
                    p.copied().unwrap_or_else(|| {
                        clamped += 1;
                        fallback
                    })
                })
                .collect();
            let exposed_transforms = (0..exposed_count)
                .map(|j| {
                    clip.frame_count
                        .checked_mul(j)
                        .and_then(|offset| offset.checked_add(f))
                        .and_then(|i| clip.exposed_transforms.get(i))
                        .copied()
                        .unwrap_or_else(glm::identity)
                })
                .collect();
            DecompressedFrame {
                positions,
                exposed_transforms,
                root_motion_position: clip
                    .root_motion_positions
                    .as_ref()
                    .and_then(|v| v.get(f))
                    .copied()
                    .unwrap_or_else(glm::Vec3::zeros),
                root_motion_rotation: clip
                    .root_motion_rotations
                    .as_ref()
                    .and_then(|v| v.get(f))
                    .copied()
                    .unwrap_or_else(glm::quat_identity),
            }
        })
        .collect();
    if clamped > 0 {
        warn!("Clamped {clamped} vertex indices outside the position pool");
    }
    debug!(
        "Decompressed {} frames from {} pooled positions",
        frame_count,
        pool.len()
    );
    frames
}
