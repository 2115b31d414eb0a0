use glam::Vec2;

use crate::collision::manifold::ContactFeature;

/// A candidate contact point carrying the feature pair that produced it.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub cf: ContactFeature,
}

/// Sutherland–Hodgman clip of a two-point segment against the half-plane
/// `normal · x - offset <= 0`.
///
/// Returns the number of points written to `out` (0, 1 or 2). A point
/// produced by the plane crossing records `vertex_index_a` as the clipping
/// face on A.
pub fn clip_segment_to_line(
    out: &mut [ClipVertex; 2],
    input: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: u8,
) -> usize {
    let mut count = 0;

    let distance0 = normal.dot(input[0].v) - offset;
    let distance1 = normal.dot(input[1].v) - offset;

    if distance0 <= 0.0 {
        out[count] = input[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        out[count] = input[1];
        count += 1;
    }

    // The points straddle the plane: emit the intersection.
    if distance0 * distance1 < 0.0 {
        let interp = distance0 / (distance0 - distance1);
        out[count].v = input[0].v + interp * (input[1].v - input[0].v);
        out[count].cf = ContactFeature::face_vertex(vertex_index_a, input[0].cf.index_b);
        count += 1;
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_inside_segment_survives() {
        let input = [
            ClipVertex {
                v: Vec2::new(0.0, -1.0),
                ..Default::default()
            },
            ClipVertex {
                v: Vec2::new(0.0, 1.0),
                ..Default::default()
            },
        ];
        let mut out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut out, &input, Vec2::Y, 2.0, 0);
        assert_eq!(n, 2);
    }

    #[test]
    fn straddling_segment_gets_split() {
        let input = [
            ClipVertex {
                v: Vec2::new(0.0, -1.0),
                ..Default::default()
            },
            ClipVertex {
                v: Vec2::new(0.0, 3.0),
                ..Default::default()
            },
        ];
        let mut out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut out, &input, Vec2::Y, 1.0, 7);
        assert_eq!(n, 2);
        assert!((out[1].v.y - 1.0).abs() < 1e-6);
        assert_eq!(out[1].cf.index_a, 7);
    }

    #[test]
    fn fully_outside_segment_vanishes() {
        let input = [
            ClipVertex {
                v: Vec2::new(0.0, 2.0),
                ..Default::default()
            },
            ClipVertex {
                v: Vec2::new(0.0, 3.0),
                ..Default::default()
            },
        ];
        let mut out = [ClipVertex::default(); 2];
        let n = clip_segment_to_line(&mut out, &input, Vec2::Y, 1.0, 0);
        assert_eq!(n, 0);
    }
}
