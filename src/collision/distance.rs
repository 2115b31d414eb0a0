use glam::Vec2;
use smallvec::SmallVec;

use crate::config::DEFAULT_MAX_DIST_ITERS;
use crate::core::shapes::DistanceProxy;
use crate::core::types::Transform;
use crate::utils::math::cross;

/// Witness-point pair index into the two proxies.
pub type IndexPair = (u8, u8);

/// Cross-call cache of the last simplex, keyed by a size metric so a stale
/// cache from different geometry is detected and discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimplexCache {
    pub metric: f32,
    pub indices: SmallVec<[IndexPair; 3]>,
}

/// Tuning for a single distance query.
#[derive(Debug, Clone, Copy)]
pub struct DistanceConf {
    pub max_iterations: u32,
}

impl Default for DistanceConf {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_DIST_ITERS,
        }
    }
}

/// Result of a GJK closest-point query, radii not yet applied.
#[derive(Debug, Clone, Copy)]
pub struct DistanceOutput {
    pub witness_a: Vec2,
    pub witness_b: Vec2,
    pub distance: f32,
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on A in world coordinates.
    wa: Vec2,
    /// Support point on B in world coordinates.
    wb: Vec2,
    /// Minkowski difference `wb - wa`.
    w: Vec2,
    /// Barycentric coordinate for the closest point.
    a: f32,
    index_a: u8,
    index_b: u8,
}

#[derive(Debug, Clone, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        &mut self,
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) {
        self.count = 0;
        for &(ia, ib) in cache.indices.iter() {
            if (ia as usize) < proxy_a.count() && (ib as usize) < proxy_b.count() {
                let wa = xf_a.transform_point(proxy_a.vertices[ia as usize]);
                let wb = xf_b.transform_point(proxy_b.vertices[ib as usize]);
                self.v[self.count] = SimplexVertex {
                    wa,
                    wb,
                    w: wb - wa,
                    a: 0.0,
                    index_a: ia,
                    index_b: ib,
                };
                self.count += 1;
            }
        }

        // A cached simplex whose metric drifted too far is stale.
        if self.count > 1 {
            let metric1 = cache.metric;
            let metric2 = self.metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                self.count = 0;
            }
        }

        if self.count == 0 {
            let wa = xf_a.transform_point(proxy_a.vertices[0]);
            let wb = xf_b.transform_point(proxy_b.vertices[0]);
            self.v[0] = SimplexVertex {
                wa,
                wb,
                w: wb - wa,
                a: 1.0,
                index_a: 0,
                index_b: 0,
            };
            self.count = 1;
        }
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.indices.clear();
        for v in &self.v[..self.count] {
            cache.indices.push((v.index_a, v.index_b));
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => self.v[0].w.distance(self.v[1].w),
            3 => cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::new(-e12.y, e12.x)
                } else {
                    Vec2::new(e12.y, -e12.x)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v[0].wa, self.v[0].wb),
            2 => (
                self.v[0].a * self.v[0].wa + self.v[1].a * self.v[1].wa,
                self.v[0].a * self.v[0].wb + self.v[1].a * self.v[1].wb,
            ),
            3 => {
                let p = self.v[0].a * self.v[0].wa
                    + self.v[1].a * self.v[1].wa
                    + self.v[2].a * self.v[2].wa;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    /// Closest point on a 1-simplex (line segment) to the origin.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest feature of a 2-simplex (triangle) to the origin.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        // Vertex regions.
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[0] = self.v[1];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[0] = self.v[2];
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // Edge regions.
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.v[1] = self.v[2];
            self.count = 2;
            return;
        }
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.v[0] = self.v[1];
            self.v[1] = self.v[2];
            self.count = 2;
            return;
        }

        // Interior: origin is inside the triangle.
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// GJK closest-point query between two transformed proxies.
///
/// The returned distance ignores vertex radii; callers subtract
/// `r_A + r_B` when they need surface separation.
pub fn distance(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
    cache: &mut SimplexCache,
    conf: DistanceConf,
) -> DistanceOutput {
    let mut simplex = Simplex::default();
    simplex.read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut iterations = 0;
    let mut saved: SmallVec<[IndexPair; 3]> = SmallVec::new();

    while iterations < conf.max_iterations {
        saved.clear();
        for v in &simplex.v[..simplex.count] {
            saved.push((v.index_a, v.index_b));
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            _ => simplex.solve3(),
        }

        // Inside the triangle means overlap; the origin is enclosed.
        if simplex.count == 3 {
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin is on an edge or vertex of the simplex. Leaving
            // now keeps the witness points valid; going on would risk a
            // degenerate search direction.
            break;
        }

        let index_a = proxy_a.support(xf_a.q.inv_rotate(-d));
        let index_b = proxy_b.support(xf_b.q.inv_rotate(d));
        let wa = xf_a.transform_point(proxy_a.vertices[index_a]);
        let wb = xf_b.transform_point(proxy_b.vertices[index_b]);

        iterations += 1;

        // A repeated support pair means no further progress is possible.
        if saved
            .iter()
            .any(|&(ia, ib)| ia as usize == index_a && ib as usize == index_b)
        {
            break;
        }

        simplex.v[simplex.count] = SimplexVertex {
            wa,
            wb,
            w: wb - wa,
            a: 0.0,
            index_a: index_a as u8,
            index_b: index_b as u8,
        };
        simplex.count += 1;
    }

    simplex.write_cache(cache);
    let (witness_a, witness_b) = simplex.witness_points();
    DistanceOutput {
        witness_a,
        witness_b,
        distance: witness_a.distance(witness_b),
        iterations,
    }
}

/// Signed separation of proxy B from a face of proxy A, with the face index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationInfo {
    pub separation: f32,
    /// Index of the A face achieving the maximum.
    pub index: usize,
}

/// Largest signed separation of B's vertices over A's face normals.
///
/// Short-circuits as soon as a face beats `stop`; ties keep the lowest face
/// index. Requires a polygon-like proxy A (at least one normal).
pub fn max_separation(
    proxy_a: &DistanceProxy,
    xf_a: &Transform,
    proxy_b: &DistanceProxy,
    xf_b: &Transform,
    stop: f32,
) -> SeparationInfo {
    let xf = xf_a.inv_mul(*xf_b);
    let mut best = SeparationInfo {
        separation: f32::NEG_INFINITY,
        index: 0,
    };

    for (i, normal) in proxy_a.normals.iter().enumerate() {
        let vertex = proxy_a.vertices[i];
        // Deepest B vertex against this face, all in A-local space.
        let mut min_sep = f32::INFINITY;
        for vb in proxy_b.vertices.iter() {
            let s = normal.dot(xf.transform_point(*vb) - vertex);
            min_sep = min_sep.min(s);
        }
        if min_sep > best.separation {
            best = SeparationInfo {
                separation: min_sep,
                index: i,
            };
            if min_sep >= stop {
                break;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;
    use crate::core::types::Transform;

    fn proxy_of(shape: &Shape) -> DistanceProxy {
        shape.child(0).unwrap()
    }

    #[test]
    fn disks_report_center_distance() {
        let a = Shape::disk(0.5);
        let b = Shape::disk(0.5);
        let xf_a = Transform::from_angle(Vec2::new(-2.0, 0.0), 0.0);
        let xf_b = Transform::from_angle(Vec2::new(2.0, 0.0), 0.0);
        let mut cache = SimplexCache::default();
        let out = distance(
            &proxy_of(&a),
            &xf_a,
            &proxy_of(&b),
            &xf_b,
            &mut cache,
            DistanceConf::default(),
        );
        assert!((out.distance - 4.0).abs() < 1e-5);
        assert!((out.witness_a - Vec2::new(-2.0, 0.0)).length() < 1e-5);
        assert!((out.witness_b - Vec2::new(2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn squares_face_to_face() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::rect(1.0, 1.0);
        let xf_a = Transform::from_angle(Vec2::ZERO, 0.0);
        let xf_b = Transform::from_angle(Vec2::new(5.0, 0.0), 0.0);
        let mut cache = SimplexCache::default();
        let out = distance(
            &proxy_of(&a),
            &xf_a,
            &proxy_of(&b),
            &xf_b,
            &mut cache,
            DistanceConf::default(),
        );
        assert!((out.distance - 3.0).abs() < 1e-4);
        // The warmed cache converges in fewer iterations the second time.
        let out2 = distance(
            &proxy_of(&a),
            &xf_a,
            &proxy_of(&b),
            &xf_b,
            &mut cache,
            DistanceConf::default(),
        );
        assert!(out2.iterations <= out.iterations);
    }

    #[test]
    fn overlapping_shapes_report_zero_distance() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::rect(1.0, 1.0);
        let xf_a = Transform::from_angle(Vec2::ZERO, 0.0);
        let xf_b = Transform::from_angle(Vec2::new(0.5, 0.25), 0.3);
        let mut cache = SimplexCache::default();
        let out = distance(
            &proxy_of(&a),
            &xf_a,
            &proxy_of(&b),
            &xf_b,
            &mut cache,
            DistanceConf::default(),
        );
        assert!(out.distance < 1e-4);
    }

    #[test]
    fn max_separation_finds_the_facing_side() {
        let a = Shape::rect(1.0, 1.0);
        let b = Shape::rect(1.0, 1.0);
        let xf_a = Transform::from_angle(Vec2::ZERO, 0.0);
        let xf_b = Transform::from_angle(Vec2::new(3.0, 0.0), 0.0);
        let info = max_separation(
            &proxy_of(&a),
            &xf_a,
            &proxy_of(&b),
            &xf_b,
            f32::INFINITY,
        );
        assert!((info.separation - 1.0).abs() < 1e-5);
        // Face 1 of a rect runs from (+hw,-hh) to (+hw,+hh): the +x face.
        assert_eq!(info.index, 1);
    }
}
