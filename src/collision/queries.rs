use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::shapes::{DistanceProxy, Shape};
use crate::core::types::Transform;

/// Directed segment from `p1` toward `p2`, clipped at `max_fraction`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

impl RayCastInput {
    pub fn new(p1: Vec2, p2: Vec2) -> Self {
        Self {
            p1,
            p2,
            max_fraction: 1.0,
        }
    }

    pub fn point_at(&self, fraction: f32) -> Vec2 {
        self.p1 + fraction * (self.p2 - self.p1)
    }
}

/// Hit surface description for a ray cast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastOutput {
    /// Outward surface normal at the hit point.
    pub normal: Vec2,
    /// Fraction along `p1 → p2` at which the ray enters the shape.
    pub fraction: f32,
}

/// Casts a ray against one shape child.
pub fn ray_cast_shape(
    shape: &Shape,
    child_index: usize,
    xf: &Transform,
    input: &RayCastInput,
) -> Option<RayCastOutput> {
    let proxy = shape.child(child_index)?;
    ray_cast_proxy(&proxy, xf, input)
}

/// Casts a ray against a transformed distance proxy.
///
/// Single-vertex proxies are treated as circles of their vertex radius,
/// two-vertex proxies as thin segments, and larger proxies as convex
/// polygons (radius ignored, as for polygon ray casts generally).
pub fn ray_cast_proxy(
    proxy: &DistanceProxy,
    xf: &Transform,
    input: &RayCastInput,
) -> Option<RayCastOutput> {
    match proxy.count() {
        0 => None,
        1 => ray_cast_circle(
            xf.transform_point(proxy.vertices[0]),
            proxy.vertex_radius,
            input,
        ),
        2 => ray_cast_segment(
            xf.transform_point(proxy.vertices[0]),
            xf.transform_point(proxy.vertices[1]),
            input,
        ),
        _ => ray_cast_polygon(proxy, xf, input),
    }
}

fn ray_cast_circle(center: Vec2, radius: f32, input: &RayCastInput) -> Option<RayCastOutput> {
    let s = input.p1 - center;
    let b = s.length_squared() - radius * radius;

    let r = input.p2 - input.p1;
    let c = s.dot(r);
    let rr = r.length_squared();
    let sigma = c * c - rr * b;
    if sigma < 0.0 || rr < f32::EPSILON {
        return None;
    }

    let a = -(c + sigma.sqrt());
    if a >= 0.0 && a <= input.max_fraction * rr {
        let fraction = a / rr;
        return Some(RayCastOutput {
            normal: (s + fraction * r).normalize_or_zero(),
            fraction,
        });
    }
    None
}

fn ray_cast_segment(v1: Vec2, v2: Vec2, input: &RayCastInput) -> Option<RayCastOutput> {
    let d = input.p2 - input.p1;
    let e = v2 - v1;
    let mut normal = Vec2::new(e.y, -e.x).normalize_or_zero();

    // t solves (p1 + t d - v1) · normal = 0.
    let denominator = d.dot(normal);
    if denominator.abs() < f32::EPSILON {
        return None;
    }
    let t = (v1 - input.p1).dot(normal) / denominator;
    if t < 0.0 || t > input.max_fraction {
        return None;
    }

    let q = input.p1 + t * d;
    let rr = e.length_squared();
    if rr < f32::EPSILON {
        return None;
    }
    let s = (q - v1).dot(e) / rr;
    if !(0.0..=1.0).contains(&s) {
        return None;
    }

    // Face the normal against the ray.
    if normal.dot(d) > 0.0 {
        normal = -normal;
    }
    Some(RayCastOutput {
        normal,
        fraction: t,
    })
}

fn ray_cast_polygon(
    proxy: &DistanceProxy,
    xf: &Transform,
    input: &RayCastInput,
) -> Option<RayCastOutput> {
    // Work in the polygon's local frame.
    let p1 = xf.inv_transform_point(input.p1);
    let p2 = xf.inv_transform_point(input.p2);
    let d = p2 - p1;

    let mut lower = 0.0_f32;
    let mut upper = input.max_fraction;
    let mut index = None;

    for i in 0..proxy.count() {
        let normal = proxy.normals[i];
        let vertex = proxy.vertices[i];
        let numerator = normal.dot(vertex - p1);
        let denominator = normal.dot(d);

        if denominator == 0.0 {
            if numerator < 0.0 {
                return None;
            }
        } else {
            if denominator < 0.0 && numerator < lower * denominator {
                // Entering this half-plane; raise the lower bound.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Exiting; lower the upper bound.
                upper = numerator / denominator;
            }
        }
        if upper < lower {
            return None;
        }
    }

    index.map(|i| RayCastOutput {
        normal: xf.q.rotate(proxy.normals[i]),
        fraction: lower,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;

    #[test]
    fn ray_hits_circle_head_on() {
        let shape = Shape::disk(1.0);
        let input = RayCastInput::new(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0));
        let out = ray_cast_shape(&shape, 0, &Transform::IDENTITY, &input).unwrap();
        assert!((out.fraction - 0.4).abs() < 1e-5);
        assert!((out.normal - Vec2::new(-1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn ray_starting_inside_circle_misses() {
        let shape = Shape::disk(1.0);
        let input = RayCastInput::new(Vec2::ZERO, Vec2::new(5.0, 0.0));
        assert!(ray_cast_shape(&shape, 0, &Transform::IDENTITY, &input).is_none());
    }

    #[test]
    fn ray_hits_polygon_face() {
        let shape = Shape::rect(1.0, 1.0);
        let xf = Transform::from_angle(Vec2::new(3.0, 0.0), 0.0);
        let input = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        let out = ray_cast_shape(&shape, 0, &xf, &input).unwrap();
        assert!((out.fraction - 0.2).abs() < 1e-5);
        assert!((out.normal - Vec2::new(-1.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn ray_hits_edge_from_either_side() {
        let shape = Shape::edge(Vec2::new(2.0, -1.0), Vec2::new(2.0, 1.0));
        let from_left = RayCastInput::new(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0));
        let hit = ray_cast_shape(&shape, 0, &Transform::IDENTITY, &from_left).unwrap();
        assert!((hit.fraction - 0.5).abs() < 1e-5);
        assert!(hit.normal.x < 0.0);

        let from_right = RayCastInput::new(Vec2::new(4.0, 0.0), Vec2::new(0.0, 0.0));
        let hit = ray_cast_shape(&shape, 0, &Transform::IDENTITY, &from_right).unwrap();
        assert!((hit.fraction - 0.5).abs() < 1e-5);
        assert!(hit.normal.x > 0.0);
    }

    #[test]
    fn ray_respects_max_fraction() {
        let shape = Shape::rect(1.0, 1.0);
        let xf = Transform::from_angle(Vec2::new(9.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 0.5,
        };
        assert!(ray_cast_shape(&shape, 0, &xf, &input).is_none());
    }
}
