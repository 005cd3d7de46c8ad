use crate::vertex::AnimVertex;
use nalgebra_glm as glm;
use serde::{Deserialize, Serialize};

/// Axis aligned bounding box
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: glm::Vec3,
    pub max: glm::Vec3,
}

impl Bounds {
    /// Smallest box holding every position. Empty input gives a zero box.
    #[must_use]
    pub fn from_positions(positions: &[glm::Vec3]) -> Self {
        let Some(first) = positions.first() else {
            return Self::default();
        };
        positions.iter().fold(
            Self {
                min: *first,
                max: *first,
            },
            |b, p| Self {
                min: glm::min2(&b.min, p),
                max: glm::max2(&b.max, p),
            },
        )
    }

    #[must_use]
    pub fn center(&self) -> glm::Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn size(&self) -> glm::Vec3 {
        self.max - self.min
    }
}

/// The mesh an animator deforms. Frames replace positions and normals only,
/// so the index buffer is shared by every frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseMesh {
    pub name: String,
    pub positions: Vec<glm::Vec3>,
    pub normals: Vec<glm::Vec3>,
    pub indices: Vec<u32>,
}

impl BaseMesh {
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// The undeformed mesh as a displayable frame
    #[must_use]
    pub fn rest_frame(&self) -> MeshFrame {
        MeshFrame::new(self.positions.clone(), self.normals.clone())
    }
}

/// One concrete frame ready for display
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshFrame {
    pub positions: Vec<glm::Vec3>,
    pub normals: Vec<glm::Vec3>,
    pub bounds: Bounds,
}

impl MeshFrame {
    /// Builds a frame and computes its bounds
    #[must_use]
    pub fn new(positions: Vec<glm::Vec3>, normals: Vec<glm::Vec3>) -> Self {
        let bounds = Bounds::from_positions(&positions);
        Self {
            positions,
            normals,
            bounds,
        }
    }

    /// Interleaved vertices for upload. Missing normals are written as zero.
    #[must_use]
    pub fn to_vertices(&self) -> Vec<AnimVertex> {
        let zero = glm::Vec3::zeros();
        self.positions
            .iter()
            .enumerate()
            .map(|(i, p)| {
                AnimVertex::new(p, self.normals.get(i).unwrap_or(&zero))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_of_positions() {
        let b = Bounds::from_positions(&[
            glm::vec3(1.0, -1.0, 0.0),
            glm::vec3(-3.0, 2.0, 1.0),
        ]);
        assert_eq!(b.min, glm::vec3(-3.0, -1.0, 0.0));
        assert_eq!(b.max, glm::vec3(1.0, 2.0, 1.0));
        assert_eq!(b.center(), glm::vec3(-1.0, 0.5, 0.5));
        assert_eq!(Bounds::from_positions(&[]), Bounds::default());
    }

    #[test]
    fn vertices_are_pod() {
        let frame = MeshFrame::new(
            vec![glm::vec3(1.0, 2.0, 3.0), glm::vec3(4.0, 5.0, 6.0)],
            vec![glm::vec3(0.0, 1.0, 0.0)],
        );
        let vertices = frame.to_vertices();
        let floats: &[f32] = bytemuck::cast_slice(&vertices);
        assert_eq!(floats.len(), 12);
        assert_eq!(&floats[0..6], &[1.0, 2.0, 3.0, 0.0, 1.0, 0.0]);
        assert_eq!(&floats[9..12], &[0.0, 0.0, 0.0]);
    }
}
