use super::{
    types::{CompressedClip, DecompressedFrame, QuantizedPositions},
    DEFAULT_ACCURACY, MAX_ACCURACY, MIN_ACCURACY,
};
use crate::va_error::VaError;
use ahash::AHashMap;
use log::debug;
use nalgebra_glm as glm;

/// Exact identity of a position for deduplication. Negative zero is folded
/// into positive zero so both end up in the same slot.
pub(crate) fn position_key(p: &glm::Vec3) -> [u32; 3] {
    let bits = |c: f32| if c == 0.0 { 0.0f32.to_bits() } else { c.to_bits() };
    [bits(p.x), bits(p.y), bits(p.z)]
}

/// Smallest power of ten, starting at 1, not less than `max_abs`
fn size_offset_for(max_abs: f32) -> Result<u32, VaError> {
    let mut offset = 1u32;
    while f64::from(max_abs) > f64::from(offset) {
        offset = offset.checked_mul(10).ok_or(VaError::ValueOutOfRange)?;
    }
    Ok(offset)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize(c: f32, size_offset: u32, accuracy: f32) -> Result<u32, VaError> {
    let q = ((f64::from(c) + f64::from(size_offset)) * f64::from(accuracy))
        .round();
    if (0.0..=f64::from(u32::MAX)).contains(&q) {
        Ok(q as u32)
    } else {
        Err(VaError::ValueOutOfRange)
    }
}

/// Compresses a clip's frames. The first frame fixes the vertex and exposed
/// transform counts that every other frame must match. `accuracy` is clamped
/// to the supported range.
///
/// # Errors
/// May return `VaError`
pub fn compress(
    frames: &[DecompressedFrame],
    accuracy: f32,
) -> Result<CompressedClip, VaError> {
    let accuracy = if accuracy.is_finite() {
        accuracy.clamp(MIN_ACCURACY, MAX_ACCURACY)
    } else {
        DEFAULT_ACCURACY
    };
    let Some(first) = frames.first() else {
        return Ok(CompressedClip {
            accuracy,
            ..CompressedClip::default()
        });
    };
    let verts_per_frame = first.positions.len();
    let exposed_count = first.exposed_transforms.len();

    // Pool unique positions in first-seen order
    let mut ids: AHashMap<[u32; 3], u32> = AHashMap::new();
    let mut all_positions: Vec<glm::Vec3> = Vec::new();
    let mut frame_indexes = Vec::with_capacity(frames.len() * verts_per_frame);
    let mut max_abs = 0.0f32;
    for frame in frames {
        if frame.positions.len() != verts_per_frame {
            return Err(VaError::CountMismatch {
                expected: verts_per_frame,
                found: frame.positions.len(),
            });
        }
        if frame.exposed_transforms.len() != exposed_count {
            return Err(VaError::CountMismatch {
                expected: exposed_count,
                found: frame.exposed_transforms.len(),
            });
        }
        for p in &frame.positions {
            let id = match ids.get(&position_key(p)) {
                Some(id) => *id,
                None => {
                    if !p.iter().all(|c| c.is_finite()) {
                        return Err(VaError::NonFinitePosition);
                    }
                    max_abs = p.iter().fold(max_abs, |m, c| m.max(c.abs()));
                    let id = u32::try_from(all_positions.len())
                        .map_err(|_| VaError::ValueOutOfRange)?;
                    ids.insert(position_key(p), id);
                    all_positions.push(*p);
                    id
                }
            };
            frame_indexes.push(id);
        }
    }

    let size_offset = size_offset_for(max_abs)?;
    let mut quantized = Vec::with_capacity(all_positions.len() * 3);
    for p in &all_positions {
        for c in p.iter() {
            quantized.push(quantize(*c, size_offset, accuracy)?);
        }
    }
    let positions = if quantized.iter().all(|q| *q <= u32::from(u16::MAX)) {
        QuantizedPositions::U16(
            quantized
                .iter()
                .filter_map(|q| u16::try_from(*q).ok())
                .collect(),
        )
    } else {
        QuantizedPositions::U32(quantized)
    };

    let mut exposed_transforms =
        Vec::with_capacity(frames.len() * exposed_count);
    for j in 0..exposed_count {
        exposed_transforms
            .extend(frames.iter().map(|f| f.exposed_transforms[j]));
    }

    let (root_motion_positions, root_motion_rotations) =
        if frames.iter().any(DecompressedFrame::has_root_motion) {
            (
                Some(frames.iter().map(|f| f.root_motion_position).collect()),
                Some(frames.iter().map(|f| f.root_motion_rotation).collect()),
            )
        } else {
            (None, None)
        };

    debug!(
        "Compressed {} frames of {} vertices into {} pooled positions, \
        offset {}, {} bit",
        frames.len(),
        verts_per_frame,
        all_positions.len(),
        size_offset,
        if positions.is_narrow() { 16 } else { 32 }
    );

    Ok(CompressedClip {
        accuracy,
        size_offset,
        frame_count: frames.len(),
        verts_per_frame,
        exposed_count,
        positions,
        frame_indexes,
        exposed_transforms,
        root_motion_positions,
        root_motion_rotations,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(points: &[[f32; 3]]) -> DecompressedFrame {
        DecompressedFrame::new(
            points.iter().map(|p| glm::vec3(p[0], p[1], p[2])).collect(),
        )
    }

    #[test]
    fn offsets_are_powers_of_ten() {
        assert_eq!(size_offset_for(0.0).unwrap(), 1);
        assert_eq!(size_offset_for(1.0).unwrap(), 1);
        assert_eq!(size_offset_for(1.01).unwrap(), 10);
        assert_eq!(size_offset_for(99.0).unwrap(), 100);
    }

    #[test]
    fn deduplicates_across_frames() {
        let frames = [
            frame(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]),
            frame(&[[-0.0, 0.0, 0.0], [0.5, 0.5, 0.0]]),
        ];
        let clip = compress(&frames, 1000.0).unwrap();
        assert_eq!(clip.positions.len(), 3);
        assert_eq!(clip.frame_indexes, vec![0, 1, 0, 2]);
        assert_eq!(clip.positions.get(1), Some([2000, 1000, 1000]));
        assert!(clip.positions.is_narrow());
        assert!(clip.root_motion_positions.is_none());
    }

    #[test]
    fn wide_values_use_32_bits() {
        let clip = compress(&[frame(&[[50.0, 0.0, 0.0]])], 1000.0).unwrap();
        assert_eq!(clip.size_offset, 100);
        assert!(!clip.positions.is_narrow());
        assert_eq!(clip.positions.get(0), Some([150_000, 100_000, 100_000]));
    }

    #[test]
    fn rejects_bad_input() {
        let frames = [frame(&[[0.0, 0.0, 0.0]]), frame(&[])];
        assert!(matches!(
            compress(&frames, 1000.0),
            Err(VaError::CountMismatch { expected: 1, found: 0 })
        ));
        assert!(matches!(
            compress(&[frame(&[[f32::NAN, 0.0, 0.0]])], 1000.0),
            Err(VaError::NonFinitePosition)
        ));
    }

    #[test]
    fn empty_input() {
        let clip = compress(&[], 5.0e6).unwrap();
        assert!(clip.is_empty());
        assert!(clip.frame_indexes.is_empty());
        assert!((clip.accuracy - MAX_ACCURACY).abs() < f32::EPSILON);
    }

    #[test]
    fn root_motion_kept_when_present() {
        let mut frames =
            vec![frame(&[[0.0, 0.0, 0.0]]), frame(&[[0.0, 0.0, 0.0]])];
        frames[1].root_motion_position = glm::vec3(0.0, 0.0, 0.25);
        let clip = compress(&frames, 1000.0).unwrap();
        let positions = clip.root_motion_positions.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[1], glm::vec3(0.0, 0.0, 0.25));
        assert_eq!(clip.root_motion_rotations.map(|r| r.len()), Some(2));
    }
}
