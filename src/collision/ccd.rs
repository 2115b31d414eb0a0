use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::collision::distance::{distance, DistanceConf, SimplexCache};
use crate::config::{
    DEFAULT_MAX_DIST_ITERS, DEFAULT_MAX_ROOT_ITERS, DEFAULT_MAX_TOI_ITERS, DEFAULT_TARGET_DEPTH,
    DEFAULT_TOLERANCE,
};
use crate::core::shapes::DistanceProxy;
use crate::core::types::Sweep;
use crate::utils::math::next_after;

/// Tuning for a single time-of-impact query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToiConf {
    /// Upper bound of the search interval, as a sweep fraction.
    pub t_max: f32,
    /// Overlap depth the query tries to land on.
    pub target_depth: f32,
    /// Acceptance band around the target depth.
    pub tolerance: f32,
    pub max_toi_iters: u32,
    pub max_root_iters: u32,
    pub max_dist_iters: u32,
}

impl Default for ToiConf {
    fn default() -> Self {
        Self {
            t_max: 1.0,
            target_depth: DEFAULT_TARGET_DEPTH,
            tolerance: DEFAULT_TOLERANCE,
            max_toi_iters: DEFAULT_MAX_TOI_ITERS,
            max_root_iters: DEFAULT_MAX_ROOT_ITERS,
            max_dist_iters: DEFAULT_MAX_DIST_ITERS,
        }
    }
}

/// Terminal state of a TOI query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToiState {
    /// The shapes reach the target depth at `time`.
    Touching,
    /// The shapes stay separated over the whole interval.
    Separated,
    /// The shapes are deeper than the target depth at `time`.
    Overlapped,
    /// The interval fell below one ULP before convergence.
    NextAfter,
    /// The outer loop hit its iteration budget.
    MaxToiIters,
    /// The root finder hit its budget or lost its bracket.
    MaxRootIters,
    /// `target_depth` exceeds the sum of vertex radii.
    TargetDepthExceedsTotalRadius,
    /// `(target - tolerance)²` is not representable.
    MinTargetSquaredOverflow,
    /// `(target + tolerance)²` is not representable.
    MaxTargetSquaredOverflow,
}

impl ToiState {
    /// States whose `time` is a usable impact time.
    pub fn is_valid_for_time(self) -> bool {
        matches!(self, ToiState::Touching)
    }
}

/// Iteration counters accumulated by a TOI query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ToiStats {
    pub toi_iters: u32,
    pub max_dist_iters: u32,
    pub sum_dist_iters: u32,
    pub max_root_iters: u32,
    pub sum_root_iters: u32,
}

/// Result of a TOI query.
#[derive(Debug, Clone, Copy)]
pub struct ToiOutput {
    pub state: ToiState,
    /// Sweep fraction in `[0, t_max]`; meaning depends on `state`.
    pub time: f32,
    pub stats: ToiStats,
}

impl ToiOutput {
    fn new(state: ToiState, time: f32, stats: ToiStats) -> Self {
        Self { state, time, stats }
    }
}

enum SeparationKind {
    /// Witness points on both proxies.
    Points,
    /// Axis is a face normal on proxy A.
    FaceA,
    /// Axis is a face normal on proxy B.
    FaceB,
}

/// Separation function along the witness axis picked at the interval start.
struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: &'a Sweep,
    sweep_b: &'a Sweep,
    kind: SeparationKind,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: &'a Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: &'a Sweep,
        t1: f32,
    ) -> Self {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);
        let count = cache.indices.len();
        debug_assert!(count > 0);

        if count == 1 {
            let (ia, ib) = cache.indices[0];
            let point_a = xf_a.transform_point(proxy_a.vertices[ia as usize]);
            let point_b = xf_b.transform_point(proxy_b.vertices[ib as usize]);
            return Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::Points,
                local_point: Vec2::ZERO,
                axis: (point_b - point_a).normalize_or_zero(),
            };
        }

        if cache.indices[0].0 == cache.indices[1].0 {
            // Two points on B and one on A: the axis lives on B's edge.
            let b1 = proxy_b.vertices[cache.indices[0].1 as usize];
            let b2 = proxy_b.vertices[cache.indices[1].1 as usize];
            let edge = b2 - b1;
            let mut axis = Vec2::new(edge.y, -edge.x).normalize_or_zero();
            let normal = xf_b.q.rotate(axis);
            let local_point = 0.5 * (b1 + b2);
            let point_b = xf_b.transform_point(local_point);
            let point_a =
                xf_a.transform_point(proxy_a.vertices[cache.indices[0].0 as usize]);
            if (point_a - point_b).dot(normal) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two points on A and one (or two) on B: axis on A's edge.
            let a1 = proxy_a.vertices[cache.indices[0].0 as usize];
            let a2 = proxy_a.vertices[cache.indices[1].0 as usize];
            let edge = a2 - a1;
            let mut axis = Vec2::new(edge.y, -edge.x).normalize_or_zero();
            let normal = xf_a.q.rotate(axis);
            let local_point = 0.5 * (a1 + a2);
            let point_a = xf_a.transform_point(local_point);
            let point_b =
                xf_b.transform_point(proxy_b.vertices[cache.indices[0].1 as usize]);
            if (point_b - point_a).dot(normal) < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                kind: SeparationKind::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// Minimum separation over the support points at time `t`, with the
    /// achieving witness indices.
    fn find_min_separation(&self, t: f32) -> (f32, usize, usize) {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);
        match self.kind {
            SeparationKind::Points => {
                let axis_a = xf_a.q.inv_rotate(self.axis);
                let axis_b = xf_b.q.inv_rotate(-self.axis);
                let index_a = self.proxy_a.support(axis_a);
                let index_b = self.proxy_b.support(axis_b);
                let point_a = xf_a.transform_point(self.proxy_a.vertices[index_a]);
                let point_b = xf_b.transform_point(self.proxy_b.vertices[index_b]);
                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.transform_point(self.local_point);
                let axis_b = xf_b.q.inv_rotate(-normal);
                let index_b = self.proxy_b.support(axis_b);
                let point_b = xf_b.transform_point(self.proxy_b.vertices[index_b]);
                ((point_b - point_a).dot(normal), usize::MAX, index_b)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.transform_point(self.local_point);
                let axis_a = xf_a.q.inv_rotate(-normal);
                let index_a = self.proxy_a.support(axis_a);
                let point_a = xf_a.transform_point(self.proxy_a.vertices[index_a]);
                ((point_a - point_b).dot(normal), index_a, usize::MAX)
            }
        }
    }

    /// Separation of fixed witness indices at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.transform_at(t);
        let xf_b = self.sweep_b.transform_at(t);
        match self.kind {
            SeparationKind::Points => {
                let point_a = xf_a.transform_point(self.proxy_a.vertices[index_a]);
                let point_b = xf_b.transform_point(self.proxy_b.vertices[index_b]);
                (point_b - point_a).dot(self.axis)
            }
            SeparationKind::FaceA => {
                let normal = xf_a.q.rotate(self.axis);
                let point_a = xf_a.transform_point(self.local_point);
                let point_b = xf_b.transform_point(self.proxy_b.vertices[index_b]);
                (point_b - point_a).dot(normal)
            }
            SeparationKind::FaceB => {
                let normal = xf_b.q.rotate(self.axis);
                let point_b = xf_b.transform_point(self.local_point);
                let point_a = xf_a.transform_point(self.proxy_a.vertices[index_a]);
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Earliest time in `[0, t_max]` at which the swept, fattened proxies reach
/// the target depth.
///
/// Conservative advancement: each outer iteration measures GJK distance at
/// the interval start, picks a witness axis, and bisects the separation
/// function to the time the axis separation reaches the target. Sweeps are
/// not mutated; the caller maps the returned fraction back onto its own
/// `alpha0` bookkeeping.
pub fn time_of_impact(
    proxy_a: &DistanceProxy,
    sweep_a: &Sweep,
    proxy_b: &DistanceProxy,
    sweep_b: &Sweep,
    conf: ToiConf,
) -> ToiOutput {
    let mut stats = ToiStats::default();

    let total_radius = proxy_a.vertex_radius + proxy_b.vertex_radius;
    if conf.target_depth > total_radius {
        return ToiOutput::new(ToiState::TargetDepthExceedsTotalRadius, 0.0, stats);
    }

    let target = total_radius - conf.target_depth;
    let min_target = (target - conf.tolerance).max(0.0);
    let max_target = target + conf.tolerance;
    let min_target_squared = min_target * min_target;
    if !min_target_squared.is_finite() {
        return ToiOutput::new(ToiState::MinTargetSquaredOverflow, 0.0, stats);
    }
    let max_target_squared = max_target * max_target;
    if !max_target_squared.is_finite() {
        return ToiOutput::new(ToiState::MaxTargetSquaredOverflow, 0.0, stats);
    }

    let t_max = conf.t_max;
    let mut t1 = 0.0_f32;
    let mut cache = SimplexCache::default();
    let dist_conf = DistanceConf {
        max_iterations: conf.max_dist_iters,
    };

    loop {
        let xf_a = sweep_a.transform_at(t1);
        let xf_b = sweep_b.transform_at(t1);
        let dist = distance(proxy_a, &xf_a, proxy_b, &xf_b, &mut cache, dist_conf);
        stats.toi_iters += 1;
        stats.max_dist_iters = stats.max_dist_iters.max(dist.iterations);
        stats.sum_dist_iters += dist.iterations;

        let dist_squared = dist.distance * dist.distance;
        if dist_squared < min_target_squared {
            return ToiOutput::new(ToiState::Overlapped, t1, stats);
        }
        if dist_squared <= max_target_squared {
            return ToiOutput::new(ToiState::Touching, t1, stats);
        }

        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Successively resolve the deepest point at the interval end. This
        // loop is bounded by the proxy vertex counts.
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        let max_push_back = proxy_a.count() + proxy_b.count();
        loop {
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            if s2 > max_target {
                // Separated over the whole remaining interval.
                return ToiOutput::new(ToiState::Separated, t_max, stats);
            }
            if s2 > min_target {
                if t2 >= t_max || next_after(t1) >= t2 {
                    // Cannot represent any progress past t1.
                    if t2 < t_max {
                        return ToiOutput::new(ToiState::NextAfter, t1, stats);
                    }
                }
                // Advance the interval start to the touching time.
                t1 = t2;
                break;
            }

            let mut s1 = fcn.evaluate(index_a, index_b, t1);
            if s1 < min_target {
                // Root finder lost its bracket.
                return ToiOutput::new(ToiState::MaxRootIters, t1, stats);
            }
            if s1 <= max_target {
                return ToiOutput::new(ToiState::Touching, t1, stats);
            }

            // Mix of secant and bisection on s(t) = target.
            let mut root_iters = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                let t = if root_iters & 1 == 1 {
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    0.5 * (a1 + a2)
                };
                root_iters += 1;
                stats.sum_root_iters += 1;

                let s = fcn.evaluate(index_a, index_b, t);
                if (s - target).abs() < conf.tolerance {
                    // Tentative new interval end.
                    t2 = t;
                    break;
                }
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iters == conf.max_root_iters {
                    stats.max_root_iters = stats.max_root_iters.max(root_iters);
                    return ToiOutput::new(ToiState::MaxRootIters, t1, stats);
                }
            }
            stats.max_root_iters = stats.max_root_iters.max(root_iters);

            push_back_iter += 1;
            if push_back_iter == max_push_back {
                break;
            }
        }

        if stats.toi_iters == conf.max_toi_iters {
            return ToiOutput::new(ToiState::MaxToiIters, t1, stats);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::shapes::Shape;
    use crate::core::types::Position;

    fn still_sweep(x: f32, y: f32) -> Sweep {
        Sweep::new(Position::new(Vec2::new(x, y), 0.0), Vec2::ZERO)
    }

    fn moving_sweep(from: Vec2, to: Vec2) -> Sweep {
        let mut sweep = Sweep::new(Position::new(from, 0.0), Vec2::ZERO);
        sweep.pos1 = Position::new(to, 0.0);
        sweep
    }

    #[test]
    fn coincident_proxies_overlap_at_time_zero() {
        let disk = Shape::disk(0.5).child(0).unwrap();
        let out = time_of_impact(
            &disk,
            &still_sweep(0.0, 0.0),
            &disk,
            &still_sweep(0.0, 0.0),
            ToiConf::default(),
        );
        assert_eq!(out.state, ToiState::Overlapped);
        assert_eq!(out.time, 0.0);
    }

    #[test]
    fn proxies_at_target_depth_touch_at_time_zero() {
        let disk = Shape::disk(0.5).child(0).unwrap();
        let conf = ToiConf::default();
        // Surfaces exactly at target separation.
        let gap = 1.0 - conf.target_depth;
        let out = time_of_impact(
            &disk,
            &still_sweep(0.0, 0.0),
            &disk,
            &still_sweep(gap, 0.0),
            conf,
        );
        assert_eq!(out.state, ToiState::Touching);
        assert_eq!(out.time, 0.0);
    }

    #[test]
    fn approaching_disks_hit_at_the_expected_fraction() {
        let disk = Shape::disk(1.0).child(0).unwrap();
        let out = time_of_impact(
            &disk,
            &moving_sweep(Vec2::new(-2.0, 0.0), Vec2::new(0.0, 0.0)),
            &disk,
            &moving_sweep(Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0)),
            ToiConf::default(),
        );
        assert_eq!(out.state, ToiState::Touching);
        // Center distance shrinks 4 → 0; touching at separation ≈ 2.
        assert!((out.time - 0.5).abs() < 0.01, "time = {}", out.time);
        assert!(out.stats.toi_iters >= 1);
    }

    #[test]
    fn diverging_proxies_report_separated() {
        let disk = Shape::disk(0.5).child(0).unwrap();
        let out = time_of_impact(
            &disk,
            &moving_sweep(Vec2::new(-2.0, 0.0), Vec2::new(-4.0, 0.0)),
            &disk,
            &moving_sweep(Vec2::new(2.0, 0.0), Vec2::new(4.0, 0.0)),
            ToiConf::default(),
        );
        assert_eq!(out.state, ToiState::Separated);
        assert_eq!(out.time, 1.0);
    }

    #[test]
    fn excessive_target_depth_is_rejected() {
        let disk = Shape::disk(0.01).child(0).unwrap();
        let conf = ToiConf {
            target_depth: 1.0,
            ..Default::default()
        };
        let out = time_of_impact(
            &disk,
            &still_sweep(0.0, 0.0),
            &disk,
            &still_sweep(3.0, 0.0),
            conf,
        );
        assert_eq!(out.state, ToiState::TargetDepthExceedsTotalRadius);
    }

    #[test]
    fn fast_box_against_edge_finds_impact() {
        let bullet = Shape::rect(0.1, 0.1).child(0).unwrap();
        let wall = Shape::edge(Vec2::new(5.0, -5.0), Vec2::new(5.0, 5.0))
            .child(0)
            .unwrap();
        let out = time_of_impact(
            &bullet,
            &moving_sweep(Vec2::new(0.0, 0.0), Vec2::new(20.0, 0.0)),
            &wall,
            &still_sweep(0.0, 0.0),
            ToiConf::default(),
        );
        assert_eq!(out.state, ToiState::Touching);
        // Leading face reaches x = 5 after 4.9 of 20 units.
        assert!((out.time - 0.245).abs() < 0.01, "time = {}", out.time);
    }
}
