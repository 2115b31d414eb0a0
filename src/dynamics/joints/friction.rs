use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot, solve22};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Top-down friction: bleeds off relative linear and angular velocity,
/// bounded by a maximum force and torque.
#[derive(Debug, Clone)]
pub struct FrictionJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub max_force: f32,
    pub max_torque: f32,

    // Solver cache.
    r_a: Vec2,
    r_b: Vec2,
    k11: f32,
    k12: f32,
    k22: f32,
    angular_mass: f32,
    linear_impulse: Vec2,
    angular_impulse: f32,
}

impl FrictionJoint {
    pub fn new(
        body_a: EntityId,
        body_b: EntityId,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
    ) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a,
            local_anchor_b,
            max_force: 0.0,
            max_torque: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k11: 0.0,
            k12: 0.0,
            k22: 0.0,
            angular_mass: 0.0,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
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
        let (m_a, m_b) = (a.inv_mass, b.inv_mass);
        let (i_a, i_b) = (a.inv_inertia, b.inv_inertia);

        self.r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        self.r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);

        self.k11 = m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y;
        self.k12 = -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y;
        self.k22 = m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x;

        let inv_angular = i_a + i_b;
        self.angular_mass = if inv_angular > 0.0 {
            1.0 / inv_angular
        } else {
            0.0
        };

        if conf.do_warm_start {
            self.linear_impulse *= conf.dt_ratio;
            self.angular_impulse *= conf.dt_ratio;
            let p = self.linear_impulse;
            a.velocity.linear -= m_a * p;
            a.velocity.angular -= i_a * (cross(self.r_a, p) + self.angular_impulse);
            b.velocity.linear += m_b * p;
            b.velocity.angular += i_b * (cross(self.r_b, p) + self.angular_impulse);
        } else {
            self.linear_impulse = Vec2::ZERO;
            self.angular_impulse = 0.0;
        }

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
    }

    pub fn solve_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);
        let (m_a, m_b) = (a.inv_mass, b.inv_mass);
        let (i_a, i_b) = (a.inv_inertia, b.inv_inertia);
        let h = conf.delta_time;

        // Angular friction.
        let mut applied = 0.0_f32;
        {
            let cdot = b.velocity.angular - a.velocity.angular;
            let mut impulse = -self.angular_mass * cdot;
            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse =
                (self.angular_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;
            applied = applied.max(impulse.abs());

            a.velocity.angular -= i_a * impulse;
            b.velocity.angular += i_b * impulse;
        }

        // Linear friction.
        {
            let cdot = (b.velocity.linear + cross_sv(b.velocity.angular, self.r_b))
                - (a.velocity.linear + cross_sv(a.velocity.angular, self.r_a));
            let mut impulse = solve22(self.k11, self.k12, self.k22, -cdot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize_or_zero() * max_impulse;
            }
            impulse = self.linear_impulse - old_impulse;
            applied = applied.max(impulse.length());

            a.velocity.linear -= m_a * impulse;
            a.velocity.angular -= i_a * cross(self.r_a, impulse);
            b.velocity.linear += m_b * impulse;
            b.velocity.angular += i_b * cross(self.r_b, impulse);
        }

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        applied <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, _bodies: &mut SolverBodies<'_>, _conf: &StepConf) -> bool {
        // Friction carries no positional constraint.
        true
    }
}
