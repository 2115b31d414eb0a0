use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot, solve22};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Drives B toward a target linear and angular offset from A, with bounded
/// force and torque. Useful for kinematic characters.
#[derive(Debug, Clone)]
pub struct MotorJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    /// Target position of B's origin in A's frame.
    pub linear_offset: Vec2,
    /// Target angle of B relative to A.
    pub angular_offset: f32,
    pub max_force: f32,
    pub max_torque: f32,
    /// Fraction of the position error fed back per step.
    pub correction_factor: f32,

    // Solver cache.
    r_a: Vec2,
    r_b: Vec2,
    linear_error: Vec2,
    angular_error: f32,
    k11: f32,
    k12: f32,
    k22: f32,
    angular_mass: f32,
    linear_impulse: Vec2,
    angular_impulse: f32,
}

impl MotorJoint {
    pub fn new(body_a: EntityId, body_b: EntityId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            linear_offset: Vec2::ZERO,
            angular_offset: 0.0,
            max_force: 1.0,
            max_torque: 1.0,
            correction_factor: 0.3,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            linear_error: Vec2::ZERO,
            angular_error: 0.0,
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

        let q_a = body_rot(&a);
        self.r_a = anchor_arm(q_a, self.linear_offset, a.local_center);
        self.r_b = body_rot(&b).rotate(-b.local_center);

        self.k11 = m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y;
        self.k12 = -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y;
        self.k22 = m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x;

        let inv_angular = i_a + i_b;
        self.angular_mass = if inv_angular > 0.0 {
            1.0 / inv_angular
        } else {
            0.0
        };

        self.linear_error =
            (b.position.linear + self.r_b) - (a.position.linear + self.r_a);
        self.angular_error = b.position.angular - a.position.angular - self.angular_offset;

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
        let inv_h = conf.inv_time();

        // Angular drive.
        {
            let cdot =
                b.velocity.angular - a.velocity.angular + inv_h * self.correction_factor * self.angular_error;
            let mut impulse = -self.angular_mass * cdot;
            let old_impulse = self.angular_impulse;
            let max_impulse = h * self.max_torque;
            self.angular_impulse =
                (self.angular_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.angular_impulse - old_impulse;

            a.velocity.angular -= i_a * impulse;
            b.velocity.angular += i_b * impulse;
        }

        // Linear drive.
        {
            let cdot = (b.velocity.linear + cross_sv(b.velocity.angular, self.r_b))
                - (a.velocity.linear + cross_sv(a.velocity.angular, self.r_a))
                + inv_h * self.correction_factor * self.linear_error;
            let mut impulse = solve22(self.k11, self.k12, self.k22, -cdot);
            let old_impulse = self.linear_impulse;
            self.linear_impulse += impulse;

            let max_impulse = h * self.max_force;
            if self.linear_impulse.length_squared() > max_impulse * max_impulse {
                self.linear_impulse = self.linear_impulse.normalize_or_zero() * max_impulse;
            }
            impulse = self.linear_impulse - old_impulse;

            a.velocity.linear -= m_a * impulse;
            a.velocity.angular -= i_a * cross(self.r_a, impulse);
            b.velocity.linear += m_b * impulse;
            b.velocity.angular += i_b * cross(self.r_b, impulse);
        }

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        true
    }

    pub fn solve_position(&mut self, _bodies: &mut SolverBodies<'_>, _conf: &StepConf) -> bool {
        // Position error feeds back through the velocity bias instead.
        true
    }
}
