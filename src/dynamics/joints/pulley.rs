use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Idealized rope over two world-fixed pulleys:
/// `lengthA + ratio · lengthB = constant`.
#[derive(Debug, Clone)]
pub struct PulleyJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    /// World anchor of A's pulley wheel.
    pub ground_anchor_a: Vec2,
    /// World anchor of B's pulley wheel.
    pub ground_anchor_b: Vec2,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length_a: f32,
    pub length_b: f32,
    pub ratio: f32,
    constant: f32,

    // Solver cache.
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
    impulse: f32,
}

impl PulleyJoint {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        body_a: EntityId,
        body_b: EntityId,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length_a: f32,
        length_b: f32,
        ratio: f32,
    ) -> Self {
        let ratio = if ratio != 0.0 { ratio } else { 1.0 };
        Self {
            body_a,
            body_b,
            collide_connected: true,
            ground_anchor_a,
            ground_anchor_b,
            local_anchor_a,
            local_anchor_b,
            length_a,
            length_b,
            ratio,
            constant: length_a + ratio * length_b,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            impulse: 0.0,
        }
    }

    pub fn body_a(&self) -> EntityId {
        self.body_a
    }

    pub fn body_b(&self) -> EntityId {
        self.body_b
    }

    pub fn shift_origin(&mut self, delta: Vec2) {
        self.ground_anchor_a -= delta;
        self.ground_anchor_b -= delta;
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        self.r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        self.r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);

        self.u_a = a.position.linear + self.r_a - self.ground_anchor_a;
        self.u_b = b.position.linear + self.r_b - self.ground_anchor_b;

        let length_a = self.u_a.length();
        let length_b = self.u_b.length();
        self.u_a = if length_a > 10.0 * conf.linear_slop {
            self.u_a / length_a
        } else {
            Vec2::ZERO
        };
        self.u_b = if length_b > 10.0 * conf.linear_slop {
            self.u_b / length_b
        } else {
            Vec2::ZERO
        };

        let cr_a = cross(self.r_a, self.u_a);
        let cr_b = cross(self.r_b, self.u_b);
        let m_a = a.inv_mass + a.inv_inertia * cr_a * cr_a;
        let m_b = b.inv_mass + b.inv_inertia * cr_b * cr_b;
        let inv_mass = m_a + self.ratio * self.ratio * m_b;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            let p_a = -self.impulse * self.u_a;
            let p_b = -self.ratio * self.impulse * self.u_b;
            a.velocity.linear += a.inv_mass * p_a;
            a.velocity.angular += a.inv_inertia * cross(self.r_a, p_a);
            b.velocity.linear += b.inv_mass * p_b;
            b.velocity.angular += b.inv_inertia * cross(self.r_b, p_b);
        } else {
            self.impulse = 0.0;
        }

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
    }

    pub fn solve_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        let vp_a = a.velocity.linear + cross_sv(a.velocity.angular, self.r_a);
        let vp_b = b.velocity.linear + cross_sv(b.velocity.angular, self.r_b);
        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = -self.ratio * impulse * self.u_b;
        a.velocity.linear += a.inv_mass * p_a;
        a.velocity.angular += a.inv_inertia * cross(self.r_a, p_a);
        b.velocity.linear += b.inv_mass * p_b;
        b.velocity.angular += b.inv_inertia * cross(self.r_b, p_b);

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        impulse.abs() <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        let r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);

        let mut u_a = a.position.linear + r_a - self.ground_anchor_a;
        let mut u_b = b.position.linear + r_b - self.ground_anchor_b;
        let length_a = u_a.length();
        let length_b = u_b.length();
        u_a = if length_a > 10.0 * conf.linear_slop {
            u_a / length_a
        } else {
            Vec2::ZERO
        };
        u_b = if length_b > 10.0 * conf.linear_slop {
            u_b / length_b
        } else {
            Vec2::ZERO
        };

        let cr_a = cross(r_a, u_a);
        let cr_b = cross(r_b, u_b);
        let m_a = a.inv_mass + a.inv_inertia * cr_a * cr_a;
        let m_b = b.inv_mass + b.inv_inertia * cr_b * cr_b;
        let inv_mass = m_a + self.ratio * self.ratio * m_b;
        let mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();
        let impulse = -mass * c;

        let p_a = -impulse * u_a;
        let p_b = -self.ratio * impulse * u_b;
        a.position.linear += a.inv_mass * p_a;
        a.position.angular += a.inv_inertia * cross(r_a, p_a);
        b.position.linear += b.inv_mass * p_b;
        b.position.angular += b.inv_inertia * cross(r_b, p_b);

        bodies.set_position(ia, a.position);
        bodies.set_position(ib, b.position);
        linear_error < conf.linear_slop
    }
}
