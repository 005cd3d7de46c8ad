use super::types::Blend;
use nalgebra_glm as glm;

/// Stored frames either side of a logical frame and the weight of the later
/// one. The last stride of a clip blends back toward the first stored frame.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn bracket(
    frame: usize,
    frame_skip: usize,
    stored: usize,
) -> (usize, usize, f32) {
    let skip = frame_skip.max(1);
    let last = stored.saturating_sub(1);
    let lower = (frame / skip).min(last);
    let rest = frame % skip;
    if rest == 0 {
        return (lower, lower, 0.0);
    }
    let upper = if lower + 1 >= stored { 0 } else { lower + 1 };
    (lower, upper, rest as f32 / skip as f32)
}

/// Vector slerp that also interpolates length. Falls back to a plain lerp
/// for zero length or opposing vectors.
fn slerp_vector(a: &glm::Vec3, b: &glm::Vec3, t: f32) -> glm::Vec3 {
    let (la, lb) = (a.norm(), b.norm());
    if la <= f32::EPSILON || lb <= f32::EPSILON {
        return glm::lerp(a, b, t);
    }
    let (da, db) = (a / la, b / lb);
    let cos = glm::dot(&da, &db);
    if cos < -0.9999 {
        return glm::lerp(a, b, t);
    }
    if cos > 0.9999 {
        return glm::lerp(&da, &db, t).normalize() * glm::lerp_scalar(la, lb, t);
    }
    glm::slerp(&da, &db, t) * glm::lerp_scalar(la, lb, t)
}

/// Blends two position arrays into `out`. Only the common prefix is written.
pub fn blend_into(
    a: &[glm::Vec3],
    b: &[glm::Vec3],
    t: f32,
    blend: Blend,
    out: &mut [glm::Vec3],
) {
    for ((o, pa), pb) in out.iter_mut().zip(a).zip(b) {
        *o = match blend {
            Blend::Linear => glm::lerp(pa, pb, t),
            Blend::Spherical => slerp_vector(pa, pb, t),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    #[test]
    fn brackets() {
        assert_eq!(bracket(0, 2, 4), (0, 0, 0.0));
        assert_eq!(bracket(1, 2, 4), (0, 1, 0.5));
        assert_eq!(bracket(4, 2, 4), (2, 2, 0.0));
        // Loop seam
        assert_eq!(bracket(7, 2, 4), (3, 0, 0.5));
        assert_eq!(bracket(5, 1, 4), (3, 3, 0.0));
        assert_eq!(bracket(10, 4, 3), (2, 0, 0.5));
    }

    #[test]
    fn spherical_keeps_length() {
        let a = glm::vec3(2.0, 0.0, 0.0);
        let b = glm::vec3(0.0, 2.0, 0.0);
        let mut out = [glm::Vec3::zeros()];
        blend_into(&[a], &[b], 0.5, Blend::Spherical, &mut out);
        assert!((out[0].norm() - 2.0).abs() < EPSILON);
        blend_into(&[a], &[b], 0.5, Blend::Linear, &mut out);
        assert!(glm::equal_eps(&out[0], &glm::vec3(1.0, 1.0, 0.0), EPSILON)
            .iter()
            .all(|x| *x));
    }
}
