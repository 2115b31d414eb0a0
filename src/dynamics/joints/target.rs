use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot, solve22};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Soft drag constraint pulling an anchor on a single body toward a world
/// target point. The classic mouse-drag joint.
#[derive(Debug, Clone)]
pub struct TargetJoint {
    /// Target joints have no first body.
    pub body_b: EntityId,
    pub collide_connected: bool,
    /// World-space point the anchor is pulled toward.
    pub target: Vec2,
    pub local_anchor_b: Vec2,
    pub max_force: f32,
    pub frequency: f32,
    pub damping_ratio: f32,

    // Solver cache.
    r_b: Vec2,
    k11: f32,
    k12: f32,
    k22: f32,
    c: Vec2,
    gamma: f32,
    impulse: Vec2,
}

impl TargetJoint {
    pub fn new(body_b: EntityId, target: Vec2, local_anchor_b: Vec2) -> Self {
        Self {
            body_b,
            collide_connected: true,
            target,
            local_anchor_b,
            max_force: 0.0,
            frequency: 5.0,
            damping_ratio: 0.7,
            r_b: Vec2::ZERO,
            k11: 0.0,
            k12: 0.0,
            k22: 0.0,
            c: Vec2::ZERO,
            gamma: 0.0,
            impulse: Vec2::ZERO,
        }
    }

    pub fn body_a(&self) -> EntityId {
        EntityId::default()
    }

    pub fn body_b(&self) -> EntityId {
        self.body_b
    }

    pub fn shift_origin(&mut self, delta: Vec2) {
        self.target -= delta;
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        let ib = bodies.slot(self.body_b);
        let mut b = bodies.get(ib);
        let h = conf.delta_time;

        let mass = if b.inv_mass > 0.0 { 1.0 / b.inv_mass } else { 0.0 };
        let omega = 2.0 * std::f32::consts::PI * self.frequency;
        let d = 2.0 * mass * self.damping_ratio * omega;
        let k = mass * omega * omega;

        self.gamma = h * (d + h * k);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        let beta = h * k * self.gamma;

        self.r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        self.k11 = b.inv_mass + b.inv_inertia * self.r_b.y * self.r_b.y + self.gamma;
        self.k12 = -b.inv_inertia * self.r_b.x * self.r_b.y;
        self.k22 = b.inv_mass + b.inv_inertia * self.r_b.x * self.r_b.x + self.gamma;

        self.c = (b.position.linear + self.r_b - self.target) * beta;

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            b.velocity.linear += b.inv_mass * self.impulse;
            b.velocity.angular += b.inv_inertia * cross(self.r_b, self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }

        bodies.set_velocity(ib, b.velocity);
    }

    pub fn solve_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ib = bodies.slot(self.body_b);
        let mut b = bodies.get(ib);
        let h = conf.delta_time;

        let cdot = b.velocity.linear + cross_sv(b.velocity.angular, self.r_b);
        let mut impulse = solve22(
            self.k11,
            self.k12,
            self.k22,
            -(cdot + self.c + self.gamma * self.impulse),
        );

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = h * self.max_force;
        if max_impulse > 0.0 && self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse = self.impulse.normalize_or_zero() * max_impulse;
        }
        impulse = self.impulse - old_impulse;

        b.velocity.linear += b.inv_mass * impulse;
        b.velocity.angular += b.inv_inertia * cross(self.r_b, impulse);

        bodies.set_velocity(ib, b.velocity);
        impulse.length() <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, _bodies: &mut SolverBodies<'_>, _conf: &StepConf) -> bool {
        // The soft constraint corrects position through the velocity bias.
        true
    }
}
