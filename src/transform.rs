use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of an animator or one of its exposed child
/// transforms
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: glm::Vec3,
    pub rotation: glm::Quat,
    pub scale: glm::Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: glm::Vec3::zeros(),
            rotation: glm::quat_identity(),
            scale: glm::vec3(1.0, 1.0, 1.0),
        }
    }
}

/// Rotation whose local z axis points along `forward` with y as close to `up`
/// as possible. Returns identity for a zero `forward`.
#[must_use]
pub fn look_rotation(forward: &glm::Vec3, up: &glm::Vec3) -> glm::Quat {
    if forward.norm_squared() <= f32::EPSILON {
        return glm::quat_identity();
    }
    let z = forward.normalize();
    let mut x = glm::cross(up, &z);
    if x.norm_squared() <= f32::EPSILON {
        // `up` is parallel to `forward` so any perpendicular will do
        let alt = if z.x.abs() < 0.9 {
            glm::Vec3::x()
        } else {
            glm::Vec3::y()
        };
        x = glm::cross(&alt, &z);
    }
    let x = x.normalize();
    let y = glm::cross(&z, &x);
    let basis = glm::Mat3::from_columns(&[x, y, z]);
    glm::quat_normalize(&glm::mat3_to_quat(&basis))
}

/// Normalized linear blend of two rotations along the shorter arc
#[must_use]
pub fn nlerp(a: &glm::Quat, b: &glm::Quat, t: f32) -> glm::Quat {
    let b = if glm::quat_dot(a, b) < 0.0 { -*b } else { *b };
    let q = glm::quat_lerp(a, &b, t);
    if q.norm_squared() <= f32::EPSILON {
        *a
    } else {
        glm::quat_normalize(&q)
    }
}

impl Transform {
    /// Affine matrix applying scale, then rotation, then translation
    #[must_use]
    pub fn matrix(&self) -> glm::Mat4 {
        glm::translation(&self.position)
            * glm::quat_to_mat4(&self.rotation)
            * glm::scaling(&self.scale)
    }

    /// Decomposes an affine matrix. Shear is discarded.
    #[must_use]
    pub fn from_matrix(m: &glm::Mat4) -> Self {
        let column = |i: usize| glm::vec3(m[(0, i)], m[(1, i)], m[(2, i)]);
        let scale =
            glm::vec3(column(0).norm(), column(1).norm(), column(2).norm());
        Self {
            position: column(3),
            rotation: look_rotation(&column(2), &column(1)),
            scale,
        }
    }

    /// Moves along the transform's own axes
    pub fn translate_local(&mut self, delta: &glm::Vec3) {
        self.position += glm::quat_rotate_vec3(&self.rotation, delta);
    }

    /// Applies a rotation relative to the current orientation
    pub fn rotate_local(&mut self, rotation: &glm::Quat) {
        self.rotation = glm::quat_normalize(&(self.rotation * rotation));
    }

    #[must_use]
    pub fn transform_point(&self, point: &glm::Vec3) -> glm::Vec3 {
        glm::quat_rotate_vec3(&self.rotation, &self.scale.component_mul(point))
            + self.position
    }

    /// Interpolates every component, rotation along the shorter arc
    #[must_use]
    pub fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            position: glm::lerp(&a.position, &b.position, t),
            rotation: nlerp(&a.rotation, &b.rotation, t),
            scale: glm::lerp(&a.scale, &b.scale, t),
        }
    }
}
