use crate::{
    clip::Blend,
    playback::Animator,
    transform::{look_rotation, Transform},
};
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Pins an object to one triangle of an animated mesh
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceAttachment {
    /// Triangle number, clamped to the mesh
    pub face: usize,
    /// Offset along the face orientation
    pub offset: glm::Vec3,
    /// Extra rotation as Euler angles in degrees, applied z then x then y
    pub rotation_offset: glm::Vec3,
}

fn euler_degrees(angles: &glm::Vec3) -> glm::Quat {
    let axis = |angle: f32, axis: glm::Vec3| {
        glm::quat_angle_axis(angle.to_radians(), &axis)
    };
    axis(angles.y, glm::Vec3::y())
        * axis(angles.x, glm::Vec3::x())
        * axis(angles.z, glm::Vec3::z())
}

impl FaceAttachment {
    /// World transform for the attached object. The face centre is taken
    /// from the animator's current logical frame or from the base mesh when
    /// nothing is playing. Returns `None` for a mesh without triangles.
    #[must_use]
    pub fn resolve(&self, animator: &Animator) -> Option<Transform> {
        let mesh = animator.base_mesh();
        let triangles = mesh.triangle_count();
        if triangles == 0 {
            return None;
        }
        let face = self.face.min(triangles - 1);
        let sampled;
        let positions = if let Some(clip) = animator.current_clip() {
            sampled = clip
                .sample_positions(animator.current_frame(), Blend::Spherical);
            &sampled
        } else {
            &mesh.positions
        };
        let corner = |i: usize| {
            mesh.indices
                .get(face * 3 + i)
                .and_then(|&v| positions.get(v as usize))
                .copied()
        };
        let (v1, v2, v3) = (corner(0)?, corner(1)?, corner(2)?);
        let center = (v1 + v2 + v3) / 3.0;
        let normal = glm::cross(&(v1 - v2), &(v1 - v3));
        let face_rotation = if normal.norm_squared() > 0.0 {
            look_rotation(&normal, &glm::Vec3::y())
        } else {
            glm::quat_identity()
        };
        let owner = animator.transform();
        let rotation = owner.rotation * face_rotation;
        Some(Transform {
            position: owner.transform_point(&center)
                + glm::quat_rotate_vec3(&rotation, &self.offset),
            rotation: glm::quat_normalize(
                &(rotation * euler_degrees(&self.rotation_offset)),
            ),
            scale: glm::vec3(1.0, 1.0, 1.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clip::{AnimationClip, ClipInfo},
        codec::DecompressedFrame,
        config::{AnimatorConfig, RuntimeConfig},
        mesh::BaseMesh,
        runtime::Runtime,
    };
    use std::sync::Arc;

    const EPSILON: f32 = 0.0001;

    fn close(a: &glm::Vec3, b: &glm::Vec3) -> bool {
        glm::equal_eps(a, b, EPSILON).iter().all(|x| *x)
    }

    /// Upright triangle facing +z
    fn triangle(shift: f32) -> Vec<glm::Vec3> {
        vec![
            glm::vec3(shift, 0.0, 0.0),
            glm::vec3(shift + 1.0, 0.0, 0.0),
            glm::vec3(shift, 1.0, 0.0),
        ]
    }

    fn animator(clips: Vec<Arc<AnimationClip>>) -> Animator {
        let runtime = Arc::new(Runtime::new(RuntimeConfig {
            threaded: false,
            ..RuntimeConfig::default()
        }));
        let mesh = Arc::new(BaseMesh {
            name: "panel".to_string(),
            positions: triangle(0.0),
            normals: vec![glm::Vec3::z(); 3],
            indices: vec![0, 1, 2],
        });
        Animator::new(runtime, mesh, clips, AnimatorConfig::default())
    }

    #[test]
    fn rest_pose_without_clip() {
        let animator = animator(Vec::new());
        let attachment = FaceAttachment {
            face: 7,
            offset: glm::vec3(0.0, 0.0, 1.0),
            ..FaceAttachment::default()
        };
        let t = attachment.resolve(&animator).unwrap();
        assert!(close(&t.position, &glm::vec3(1.0 / 3.0, 1.0 / 3.0, 1.0)));
        let forward = glm::quat_rotate_vec3(&t.rotation, &glm::Vec3::z());
        assert!(close(&forward, &glm::Vec3::z()));
    }

    #[test]
    fn follows_animation_and_owner() {
        let frames = (0..4u8)
            .map(|i| DecompressedFrame::new(triangle(f32::from(i))))
            .collect();
        let clip = AnimationClip::new(ClipInfo::default(), frames).unwrap();
        let mut animator = animator(vec![Arc::new(clip)]);
        animator.transform_mut().position = glm::vec3(0.0, 10.0, 0.0);
        assert!(animator.activate(0.0));
        animator.update_tick(0.0);
        animator.update_tick(0.5);
        assert_eq!(animator.current_frame(), 2);

        let attachment = FaceAttachment {
            rotation_offset: glm::vec3(0.0, 90.0, 0.0),
            ..FaceAttachment::default()
        };
        let t = attachment.resolve(&animator).unwrap();
        let third = 1.0 / 3.0;
        assert!(close(&t.position, &glm::vec3(2.0 + third, 10.0 + third, 0.0)));
        let forward = glm::quat_rotate_vec3(&t.rotation, &glm::Vec3::z());
        assert!(close(&forward, &glm::Vec3::x()));
    }

    #[test]
    fn no_triangles() {
        let runtime = Arc::new(Runtime::default());
        let mesh = Arc::new(BaseMesh {
            name: "points".to_string(),
            positions: triangle(0.0),
            normals: vec![glm::Vec3::z(); 3],
            indices: Vec::new(),
        });
        let animator =
            Animator::new(runtime, mesh, Vec::new(), AnimatorConfig::default());
        assert!(FaceAttachment::default().resolve(&animator).is_none());
    }
}
