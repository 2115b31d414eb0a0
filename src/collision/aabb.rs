use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::core::shapes::DistanceProxy;
use crate::core::types::Transform;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// The additive identity for [`Aabb::union`].
    pub const EMPTY: Self = Self {
        min: Vec2::splat(f32::INFINITY),
        max: Vec2::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec2>) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        aabb
    }

    /// Tight box around a transformed distance proxy, including its radius.
    pub fn for_proxy(proxy: &DistanceProxy, xf: &Transform) -> Self {
        let mut aabb = Self::from_points(proxy.vertices.iter().map(|v| xf.transform_point(*v)));
        aabb.min -= Vec2::splat(proxy.vertex_radius);
        aabb.max += Vec2::splat(proxy.vertex_radius);
        aabb
    }

    pub fn center(&self) -> Vec2 {
        0.5 * (self.min + self.max)
    }

    pub fn extents(&self) -> Vec2 {
        0.5 * (self.max - self.min)
    }

    /// Surface-area analog in 2D: the perimeter.
    pub fn perimeter(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x + d.y)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && other.max.x <= self.max.x
            && other.max.y <= self.max.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.min.y <= other.max.y
            && other.min.x <= self.max.x
            && other.min.y <= self.max.y
    }

    /// Grows the box by a uniform margin.
    pub fn fattened(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec2::splat(margin),
            max: self.max + Vec2::splat(margin),
        }
    }

    /// Extends the box in the direction of a displacement, leaving the
    /// opposite side untouched.
    pub fn displaced(&self, d: Vec2) -> Aabb {
        let mut aabb = *self;
        if d.x < 0.0 {
            aabb.min.x += d.x;
        } else {
            aabb.max.x += d.x;
        }
        if d.y < 0.0 {
            aabb.min.y += d.y;
        } else {
            aabb.max.y += d.y;
        }
        aabb
    }

    pub fn translated(&self, d: Vec2) -> Aabb {
        Aabb {
            min: self.min + d,
            max: self.max + d,
        }
    }

    /// Slab test of the segment `p1 → p2` against the box.
    ///
    /// Returns the entry fraction in `[0, max_fraction]`, or `None` when the
    /// segment misses.
    pub fn ray_intersect(&self, p1: Vec2, p2: Vec2, max_fraction: f32) -> Option<f32> {
        let d = p2 - p1;
        let mut tmin = 0.0_f32;
        let mut tmax = max_fraction;

        for axis in 0..2 {
            let (origin, dir, lo, hi) = match axis {
                0 => (p1.x, d.x, self.min.x, self.max.x),
                _ => (p1.y, d.y, self.min.y, self.max.y),
            };
            if dir.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
            } else {
                let inv = 1.0 / dir;
                let mut t1 = (lo - origin) * inv;
                let mut t2 = (hi - origin) * inv;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                tmin = tmin.max(t1);
                tmax = tmax.min(t2);
                if tmin > tmax {
                    return None;
                }
            }
        }
        Some(tmin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_contains() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let b = Aabb::new(Vec2::new(2.0, 2.0), Vec2::new(3.0, 3.0));
        let u = a.union(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
        assert!(!a.overlaps(&b));
        assert!(u.overlaps(&a));
    }

    #[test]
    fn displaced_grows_one_sided() {
        let a = Aabb::new(Vec2::ZERO, Vec2::ONE);
        let d = a.displaced(Vec2::new(-2.0, 3.0));
        assert_eq!(d.min, Vec2::new(-2.0, 0.0));
        assert_eq!(d.max, Vec2::new(1.0, 4.0));
    }

    #[test]
    fn ray_intersect_reports_entry_fraction() {
        let a = Aabb::new(Vec2::new(1.0, -1.0), Vec2::new(2.0, 1.0));
        let hit = a.ray_intersect(Vec2::new(0.0, 0.0), Vec2::new(4.0, 0.0), 1.0);
        assert!(hit.is_some());
        assert!((hit.unwrap() - 0.25).abs() < 1e-6);

        let miss = a.ray_intersect(Vec2::new(0.0, 5.0), Vec2::new(4.0, 5.0), 1.0);
        assert!(miss.is_none());
    }
}
