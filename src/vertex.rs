// Vertex output for upload. Positions and normals are interleaved in a
// single stream since every animated frame rewrites both.
use bytemuck::{Pod, Zeroable};
use nalgebra_glm as glm;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Zeroable, Pod)]
pub struct AnimVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl AnimVertex {
    #[must_use]
    pub fn new(position: &glm::Vec3, normal: &glm::Vec3) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            normal: [normal.x, normal.y, normal.z],
        }
    }
}
