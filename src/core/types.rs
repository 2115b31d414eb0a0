use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

/// Rotation stored as a unit complex number.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rot {
    /// Cosine of the angle.
    pub c: f32,
    /// Sine of the angle.
    pub s: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Self = Self { c: 1.0, s: 0.0 };

    pub fn from_angle(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        Self { c, s }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Rescales to unit length, guarding against a degenerate zero rotation.
    pub fn normalized(&self) -> Self {
        let mag = (self.c * self.c + self.s * self.s).sqrt();
        if mag > f32::EPSILON {
            Self {
                c: self.c / mag,
                s: self.s / mag,
            }
        } else {
            Self::IDENTITY
        }
    }

    /// Rotates a vector.
    #[inline]
    pub fn rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Applies the inverse rotation to a vector.
    #[inline]
    pub fn inv_rotate(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Composition `self ∘ other`.
    #[inline]
    pub fn mul(&self, other: Rot) -> Rot {
        Rot {
            c: self.c * other.c - self.s * other.s,
            s: self.s * other.c + self.c * other.s,
        }
    }

    /// Composition `self⁻¹ ∘ other`.
    #[inline]
    pub fn inv_mul(&self, other: Rot) -> Rot {
        Rot {
            c: self.c * other.c + self.s * other.s,
            s: self.c * other.s - self.s * other.c,
        }
    }

    /// Unit vector of the rotated local x axis.
    #[inline]
    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Unit vector of the rotated local y axis.
    #[inline]
    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }
}

/// Rigid 2D transform: a translation plus a [`Rot`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    pub fn new(p: Vec2, q: Rot) -> Self {
        Self { p, q }
    }

    pub fn from_angle(p: Vec2, radians: f32) -> Self {
        Self {
            p,
            q: Rot::from_angle(radians),
        }
    }

    /// Maps a local point into world space.
    #[inline]
    pub fn transform_point(&self, v: Vec2) -> Vec2 {
        self.p + self.q.rotate(v)
    }

    /// Maps a world point into local space.
    #[inline]
    pub fn inv_transform_point(&self, v: Vec2) -> Vec2 {
        self.q.inv_rotate(v - self.p)
    }

    /// Composition `self ∘ other`.
    pub fn mul(&self, other: Transform) -> Transform {
        Transform {
            p: self.p + self.q.rotate(other.p),
            q: self.q.mul(other.q),
        }
    }

    /// Composition `self⁻¹ ∘ other`; maps B-local into A-local space.
    pub fn inv_mul(&self, other: Transform) -> Transform {
        Transform {
            p: self.q.inv_rotate(other.p - self.p),
            q: self.q.inv_mul(other.q),
        }
    }
}

/// Positional state: linear location of the world center plus orientation.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub linear: Vec2,
    pub angular: f32,
}

impl Position {
    pub fn new(linear: Vec2, angular: f32) -> Self {
        Self { linear, angular }
    }

    /// Linear interpolation between two positions.
    pub fn lerp(&self, other: Position, t: f32) -> Position {
        Position {
            linear: self.linear.lerp(other.linear, t),
            angular: self.angular + t * (other.angular - self.angular),
        }
    }

    /// Angular component folded into `(-π, π]`.
    pub fn normalized(&self) -> Position {
        let two_pi = 2.0 * std::f32::consts::PI;
        let mut angular = self.angular % two_pi;
        if angular <= -std::f32::consts::PI {
            angular += two_pi;
        } else if angular > std::f32::consts::PI {
            angular -= two_pi;
        }
        Position {
            linear: self.linear,
            angular,
        }
    }
}

impl Add for Position {
    type Output = Position;
    fn add(self, rhs: Position) -> Position {
        Position::new(self.linear + rhs.linear, self.angular + rhs.angular)
    }
}

impl Sub for Position {
    type Output = Position;
    fn sub(self, rhs: Position) -> Position {
        Position::new(self.linear - rhs.linear, self.angular - rhs.angular)
    }
}

impl Mul<f32> for Position {
    type Output = Position;
    fn mul(self, rhs: f32) -> Position {
        Position::new(self.linear * rhs, self.angular * rhs)
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec2,
    pub angular: f32,
}

impl Velocity {
    pub fn new(linear: Vec2, angular: f32) -> Self {
        Self { linear, angular }
    }
}

/// Motion of a body's center of mass over the span of a step.
///
/// `pos0` is the interpolation origin at fraction `alpha0` of the step and
/// `pos1` the endpoint at fraction 1. Both track the world *center of mass*;
/// `local_center` relates that back to the body origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sweep {
    pub pos0: Position,
    pub pos1: Position,
    pub local_center: Vec2,
    pub alpha0: f32,
}

impl Sweep {
    pub fn new(pos: Position, local_center: Vec2) -> Self {
        Self {
            pos0: pos,
            pos1: pos,
            local_center,
            alpha0: 0.0,
        }
    }

    /// Interpolated body-origin transform at sweep fraction `beta ∈ [0, 1]`.
    pub fn transform_at(&self, beta: f32) -> Transform {
        let pos = self.pos0.lerp(self.pos1, beta);
        transform_for(pos, self.local_center)
    }

    /// Body-origin transform at the start of the remaining interval.
    pub fn transform0(&self) -> Transform {
        transform_for(self.pos0, self.local_center)
    }

    /// Body-origin transform at the end of the step.
    pub fn transform1(&self) -> Transform {
        transform_for(self.pos1, self.local_center)
    }

    /// Advances the interpolation origin to absolute step fraction `alpha`.
    ///
    /// Requires `alpha0 ≤ alpha < 1`; interpolation from the new origin
    /// still lands on the same `pos1`.
    pub fn advance0(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.pos0 = self.pos0.lerp(self.pos1, beta);
        self.alpha0 = alpha;
    }

    /// Restarts the interval at the current origin.
    pub fn reset_alpha0(&mut self) {
        self.alpha0 = 0.0;
    }

    /// Angles folded into a bounded range.
    ///
    /// Large rotations break the TOI root finder, so sweeps are normalized
    /// before continuous collision queries.
    pub fn normalized(&self) -> Sweep {
        let d = self.pos0.normalized().angular - self.pos0.angular;
        Sweep {
            pos0: Position::new(self.pos0.linear, self.pos0.angular + d),
            pos1: Position::new(self.pos1.linear, self.pos1.angular + d),
            local_center: self.local_center,
            alpha0: self.alpha0,
        }
    }
}

/// Body-origin transform for a center-of-mass position.
pub fn transform_for(pos: Position, local_center: Vec2) -> Transform {
    let q = Rot::from_angle(pos.angular);
    Transform {
        p: pos.linear - q.rotate(local_center),
        q,
    }
}

/// Mass, rotational inertia about the shape origin, and centroid.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MassData {
    pub mass: f32,
    /// Second moment of mass about the shape's origin.
    pub inertia: f32,
    pub center: Vec2,
}

impl MassData {
    pub fn new(mass: f32, inertia: f32, center: Vec2) -> Self {
        Self {
            mass,
            inertia,
            center,
        }
    }
}

/// Velocity of a point offset `r` from the center of a body moving with `v`.
#[inline]
pub fn point_velocity(v: Velocity, r: Vec2) -> Vec2 {
    v.linear + crate::utils::math::cross_sv(v.angular, r)
}

/// Relative velocity of two attached points.
#[inline]
pub fn relative_velocity(va: Velocity, ra: Vec2, vb: Velocity, rb: Vec2) -> Vec2 {
    point_velocity(vb, rb) - point_velocity(va, ra)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rot_round_trips_angles() {
        for deg in [-170.0_f32, -90.0, -1.0, 0.0, 1.0, 45.0, 90.0, 170.0] {
            let rad = deg.to_radians();
            let q = Rot::from_angle(rad);
            assert!((q.angle() - rad).abs() < 1e-5);
            let v = Vec2::new(0.3, -0.7);
            let back = q.inv_rotate(q.rotate(v));
            assert!((back - v).length() < 1e-5);
        }
    }

    #[test]
    fn transform_inverse_composes_to_identity() {
        let xf = Transform::from_angle(Vec2::new(3.0, -2.0), 0.6);
        let p = Vec2::new(-1.5, 4.0);
        let round = xf.inv_transform_point(xf.transform_point(p));
        assert!((round - p).length() < 1e-5);

        let id = xf.inv_mul(xf);
        assert!(id.p.length() < 1e-5);
        assert!((id.q.c - 1.0).abs() < 1e-5);
    }

    #[test]
    fn sweep_advance0_preserves_endpoint_interpolation() {
        let mut sweep = Sweep::new(Position::new(Vec2::ZERO, 0.0), Vec2::ZERO);
        sweep.pos1 = Position::new(Vec2::new(10.0, 0.0), 1.0);

        let mid_before = sweep.transform_at(0.75);
        sweep.advance0(0.5);
        assert_eq!(sweep.alpha0, 0.5);
        // Half-way through the remaining interval lands on the same world
        // transform as 0.75 of the original one.
        let mid_after = sweep.transform_at(0.5);
        assert!((mid_before.p - mid_after.p).length() < 1e-4);
    }

    #[test]
    fn sweep_normalization_keeps_angular_delta() {
        let mut sweep = Sweep::new(
            Position::new(Vec2::ZERO, 10.0 * std::f32::consts::PI),
            Vec2::ZERO,
        );
        sweep.pos1.angular = 10.0 * std::f32::consts::PI + 0.25;
        let n = sweep.normalized();
        assert!(n.pos0.angular.abs() <= std::f32::consts::PI);
        let delta = n.pos1.angular - n.pos0.angular;
        assert!((delta - 0.25).abs() < 1e-4);
    }
}
