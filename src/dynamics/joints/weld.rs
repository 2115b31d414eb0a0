use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot, solve22};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Rigidly glues two bodies: shared anchor point plus locked relative
/// angle. A non-zero `frequency` softens the angular lock into a spring.
#[derive(Debug, Clone)]
pub struct WeldJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub reference_angle: f32,
    pub frequency: f32,
    pub damping_ratio: f32,

    // Solver cache.
    r_a: Vec2,
    r_b: Vec2,
    k11: f32,
    k12: f32,
    k22: f32,
    angular_mass: f32,
    linear_impulse: Vec2,
    angular_impulse: f32,
    bias: f32,
    gamma: f32,
}

impl WeldJoint {
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
            reference_angle: 0.0,
            frequency: 0.0,
            damping_ratio: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k11: 0.0,
            k12: 0.0,
            k22: 0.0,
            angular_mass: 0.0,
            linear_impulse: Vec2::ZERO,
            angular_impulse: 0.0,
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

        self.gamma = 0.0;
        self.bias = 0.0;
        if self.frequency > 0.0 && self.angular_mass > 0.0 {
            let c = b.position.angular - a.position.angular - self.reference_angle;
            let omega = 2.0 * std::f32::consts::PI * self.frequency;
            let d = 2.0 * self.angular_mass * self.damping_ratio * omega;
            let k = self.angular_mass * omega * omega;
            let h = conf.delta_time;
            self.gamma = h * (d + h * k);
            self.gamma = if self.gamma != 0.0 { 1.0 / self.gamma } else { 0.0 };
            self.bias = c * h * k * self.gamma;
            self.angular_mass = 1.0 / (inv_angular + self.gamma);
        }

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

        // Angular lock (possibly soft).
        {
            let cdot = b.velocity.angular - a.velocity.angular;
            let impulse = -self.angular_mass
                * (cdot + self.bias + self.gamma * self.angular_impulse);
            self.angular_impulse += impulse;
            a.velocity.angular -= i_a * impulse;
            b.velocity.angular += i_b * impulse;
        }

        // Point-to-point.
        let cdot = (b.velocity.linear + cross_sv(b.velocity.angular, self.r_b))
            - (a.velocity.linear + cross_sv(a.velocity.angular, self.r_a));
        let impulse = solve22(self.k11, self.k12, self.k22, -cdot);
        self.linear_impulse += impulse;

        a.velocity.linear -= m_a * impulse;
        a.velocity.angular -= i_a * cross(self.r_a, impulse);
        b.velocity.linear += m_b * impulse;
        b.velocity.angular += i_b * cross(self.r_b, impulse);

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        impulse.length() <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);
        let (m_a, m_b) = (a.inv_mass, b.inv_mass);
        let (i_a, i_b) = (a.inv_inertia, b.inv_inertia);

        let mut angular_error = 0.0;
        if self.frequency == 0.0 {
            let c = b.position.angular - a.position.angular - self.reference_angle;
            let inv = i_a + i_b;
            let impulse = if inv > 0.0 { -c / inv } else { 0.0 };
            a.position.angular -= i_a * impulse;
            b.position.angular += i_b * impulse;
            angular_error = c.abs();
        }

        let r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let c = (b.position.linear + r_b) - (a.position.linear + r_a);
        let position_error = c.length();

        let k11 = m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y;
        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k22 = m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x;
        let impulse = -solve22(k11, k12, k22, c);

        a.position.linear -= m_a * impulse;
        a.position.angular -= i_a * cross(r_a, impulse);
        b.position.linear += m_b * impulse;
        b.position.angular += i_b * cross(r_b, impulse);

        bodies.set_position(ia, a.position);
        bodies.set_position(ib, b.position);
        position_error <= conf.linear_slop && angular_error <= conf.angular_slop
    }
}
