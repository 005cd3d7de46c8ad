//! Smooth normals for generated frames.
//!
//! Triangles that touch the same vertex position are grouped, and a vertex
//! only takes in the normals of neighbours within the smoothing angle. Hard
//! creases in the source mesh therefore survive recalculation even when the
//! vertices on either side share a position.

use crate::{
    codec::position_key,
    pool::{Pools, Reusable},
};
use ahash::AHashMap;
use itertools::Itertools;
use log::trace;
use nalgebra_glm as glm;
use smallvec::SmallVec;

/// Largest dot product passed to `acos`
const DOT_LIMIT: f32 = 0.99999;

/// Vertex slots and triangles that share one exact position, reused between
/// calls through the object pool
#[derive(Debug, Default)]
pub struct VertexGroups(AHashMap<[u32; 3], SmallVec<[(u32, u32); 8]>>);

impl Reusable for VertexGroups {
    fn recycle(&mut self) {
        self.0.clear();
    }
}

/// Unit normal of each triangle. Degenerate triangles get a zero normal.
fn face_normals(
    indices: &[u32],
    positions: &[glm::Vec3],
    out: &mut Vec<glm::Vec3>,
) {
    out.clear();
    for (i0, i1, i2) in indices.iter().tuples() {
        let p = |i: &u32| positions.get(*i as usize).copied();
        let normal = match (p(i0), p(i1), p(i2)) {
            (Some(v0), Some(v1), Some(v2)) => {
                let n = glm::cross(&(v1 - v0), &(v2 - v0));
                if n.norm_squared() > f32::EPSILON * f32::EPSILON {
                    n.normalize()
                } else {
                    glm::Vec3::zeros()
                }
            }
            _ => glm::Vec3::zeros(),
        };
        out.push(normal);
    }
}

fn normalize_or_zero(v: &glm::Vec3) -> glm::Vec3 {
    if v.norm_squared() > 0.0 {
        v.normalize()
    } else {
        glm::Vec3::zeros()
    }
}

/// Computes one normal per vertex.
///
/// With `smoothing_angle` of `None` each vertex averages the face normals of
/// the triangles that index it. With an angle in degrees, vertices that share
/// a position are smoothed across triangles whose normals are within that
/// angle of each other. The returned array comes from `pools.vectors` and may
/// be handed back there once the caller is done with it.
#[must_use]
pub fn recalculate_normals(
    indices: &[u32],
    positions: &[glm::Vec3],
    smoothing_angle: Option<f32>,
    pools: &Pools,
) -> Vec<glm::Vec3> {
    let mut faces = pools.vectors.get(indices.len() / 3);
    face_normals(indices, positions, &mut faces);
    let mut normals = pools.vectors.get(positions.len());
    normals.fill(glm::Vec3::zeros());

    if let Some(angle) = smoothing_angle {
        let threshold = angle.to_radians();
        let mut groups = pools.groups.get();
        for (triangle, corners) in indices.chunks_exact(3).enumerate() {
            let Ok(triangle) = u32::try_from(triangle) else {
                break;
            };
            for &slot in corners {
                if let Some(p) = positions.get(slot as usize) {
                    groups
                        .0
                        .entry(position_key(p))
                        .or_default()
                        .push((slot, triangle));
                }
            }
        }
        for group in groups.0.values() {
            for &(slot_i, tri_i) in group {
                let own = faces[tri_i as usize];
                let mut sum = glm::Vec3::zeros();
                for &(slot_j, tri_j) in group {
                    let other = faces[tri_j as usize];
                    if slot_i == slot_j
                        || glm::dot(&own, &other)
                            .clamp(-DOT_LIMIT, DOT_LIMIT)
                            .acos()
                            <= threshold
                    {
                        sum += other;
                    }
                }
                // Later pairs for the same slot overwrite earlier ones
                normals[slot_i as usize] = normalize_or_zero(&sum);
            }
        }
        trace!("Smoothed {} position groups", groups.0.len());
        pools.groups.put(groups);
    } else {
        for (corners, face) in indices.chunks_exact(3).zip(faces.iter()) {
            for &slot in corners {
                if let Some(n) = normals.get_mut(slot as usize) {
                    *n += face;
                }
            }
        }
        for n in &mut normals {
            *n = normalize_or_zero(n);
        }
    }

    pools.vectors.put(faces, false);
    normals
}
