use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Keeps two local anchor points at a fixed distance.
///
/// With a non-zero `frequency` the constraint turns into a damped spring.
#[derive(Debug, Clone)]
pub struct DistanceJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub length: f32,
    /// Oscillation frequency in Hz; 0 keeps the constraint rigid.
    pub frequency: f32,
    pub damping_ratio: f32,

    // Solver cache.
    u: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    mass: f32,
    impulse: f32,
    bias: f32,
    gamma: f32,
}

impl DistanceJoint {
    pub fn new(
        body_a: EntityId,
        body_b: EntityId,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        length: f32,
    ) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a,
            local_anchor_b,
            length: length.max(f32::EPSILON),
            frequency: 0.0,
            damping_ratio: 0.0,
            u: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            mass: 0.0,
            impulse: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    pub fn body_a(&self) -> EntityId {
        self.body_a
    }

    pub fn body_b(&self) -> EntityId {
        self.body_b
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        self.r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        self.r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        self.u = (b.position.linear + self.r_b) - (a.position.linear + self.r_a);

        let len = self.u.length();
        if len > conf.linear_slop {
            self.u /= len;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_a = cross(self.r_a, self.u);
        let cr_b = cross(self.r_b, self.u);
        let mut inv_mass =
            a.inv_mass + b.inv_mass + a.inv_inertia * cr_a * cr_a + b.inv_inertia * cr_b * cr_b;
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency > 0.0 {
            let c = len - self.length;
            let omega = 2.0 * std::f32::consts::PI * self.frequency;
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            let k = self.mass * omega * omega;
            let h = conf.delta_time;
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            let p = self.impulse * self.u;
            a.velocity.linear -= a.inv_mass * p;
            a.velocity.angular -= a.inv_inertia * cross(self.r_a, p);
            b.velocity.linear += b.inv_mass * p;
            b.velocity.angular += b.inv_inertia * cross(self.r_b, p);
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
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        a.velocity.linear -= a.inv_mass * p;
        a.velocity.angular -= a.inv_inertia * cross(self.r_a, p);
        b.velocity.linear += b.inv_mass * p;
        b.velocity.angular += b.inv_inertia * cross(self.r_b, p);

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        impulse.abs() <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        if self.frequency > 0.0 {
            // Springs carry no positional constraint.
            return true;
        }

        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        let r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let mut u = (b.position.linear + r_b) - (a.position.linear + r_a);
        let len = u.length();
        u = u.normalize_or_zero();
        let c = (len - self.length).clamp(-conf.max_linear_correction, conf.max_linear_correction);

        let impulse = -self.mass * c;
        let p = impulse * u;

        a.position.linear -= a.inv_mass * p;
        a.position.angular -= a.inv_inertia * cross(r_a, p);
        b.position.linear += b.inv_mass * p;
        b.position.angular += b.inv_inertia * cross(r_b, p);

        bodies.set_position(ia, a.position);
        bodies.set_position(ib, b.position);
        c.abs() < conf.linear_slop
    }
}
