use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot, solve22};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::cross;

/// Slider joint: relative motion restricted to an axis fixed in body A,
/// relative rotation locked, with optional translation limits and a motor.
#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Slide axis in A's frame; normalized at construction.
    pub local_axis_a: Vec2,
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_force: f32,

    // Solver cache.
    axis: Vec2,
    perp: Vec2,
    s1: f32,
    s2: f32,
    a1: f32,
    a2: f32,
    translation: f32,
    axial_mass: f32,
    k11: f32,
    k12: f32,
    k22: f32,
    /// Perpendicular and angular impulses.
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
}

impl PrismaticJoint {
    pub fn new(
        body_a: EntityId,
        body_b: EntityId,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        local_axis_a: Vec2,
    ) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            local_anchor_a,
            local_anchor_b,
            local_axis_a: local_axis_a.normalize_or_zero(),
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_force: 0.0,
            axis: Vec2::ZERO,
            perp: Vec2::ZERO,
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            translation: 0.0,
            axial_mass: 0.0,
            k11: 0.0,
            k12: 0.0,
            k22: 0.0,
            impulse: Vec2::ZERO,
            motor_impulse: 0.0,
            lower_impulse: 0.0,
            upper_impulse: 0.0,
        }
    }

    pub fn body_a(&self) -> EntityId {
        self.body_a
    }

    pub fn body_b(&self) -> EntityId {
        self.body_b
    }

    /// Current translation along the joint axis.
    pub fn joint_translation(&self) -> f32 {
        self.translation
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);
        let (m_a, m_b) = (a.inv_mass, b.inv_mass);
        let (i_a, i_b) = (a.inv_inertia, b.inv_inertia);

        let q_a = body_rot(&a);
        let r_a = anchor_arm(q_a, self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let d = (b.position.linear + r_b) - (a.position.linear + r_a);

        self.axis = q_a.rotate(self.local_axis_a);
        self.a1 = cross(d + r_a, self.axis);
        self.a2 = cross(r_b, self.axis);
        let axial = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        self.axial_mass = if axial > 0.0 { 1.0 / axial } else { 0.0 };

        self.perp = q_a.rotate(Vec2::new(-self.local_axis_a.y, self.local_axis_a.x));
        self.s1 = cross(d + r_a, self.perp);
        self.s2 = cross(r_b, self.perp);

        self.k11 = m_a + m_b + i_a * self.s1 * self.s1 + i_b * self.s2 * self.s2;
        self.k12 = i_a * self.s1 + i_b * self.s2;
        self.k22 = i_a + i_b;
        if self.k22 == 0.0 {
            // Both bodies have fixed rotation.
            self.k22 = 1.0;
        }

        self.translation = self.axis.dot(d);

        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }
        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.motor_impulse *= conf.dt_ratio;
            self.lower_impulse *= conf.dt_ratio;
            self.upper_impulse *= conf.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse.x * self.perp + axial_impulse * self.axis;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial_impulse * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial_impulse * self.a2;

            a.velocity.linear -= m_a * p;
            a.velocity.angular -= i_a * l_a;
            b.velocity.linear += m_b * p;
            b.velocity.angular += i_b * l_b;
        } else {
            self.impulse = Vec2::ZERO;
            self.motor_impulse = 0.0;
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
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

        if self.enable_motor {
            let cdot = self.axis.dot(b.velocity.linear - a.velocity.linear)
                + self.a2 * b.velocity.angular
                - self.a1 * a.velocity.angular;
            let mut impulse = self.axial_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_force * h;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = impulse * self.axis;
            a.velocity.linear -= m_a * p;
            a.velocity.angular -= i_a * impulse * self.a1;
            b.velocity.linear += m_b * p;
            b.velocity.angular += i_b * impulse * self.a2;
        }

        if self.enable_limit {
            // Lower translation limit: brake approach speed so the limit
            // is reached, not crossed, by the end of the step.
            {
                let c = self.translation - self.lower_translation;
                let cdot = self.axis.dot(b.velocity.linear - a.velocity.linear)
                    + self.a2 * b.velocity.angular
                    - self.a1 * a.velocity.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old_impulse;

                let p = impulse * self.axis;
                a.velocity.linear -= m_a * p;
                a.velocity.angular -= i_a * impulse * self.a1;
                b.velocity.linear += m_b * p;
                b.velocity.angular += i_b * impulse * self.a2;
            }
            // Upper translation limit.
            {
                let c = self.upper_translation - self.translation;
                let cdot = self.a1 * a.velocity.angular
                    + self.axis.dot(a.velocity.linear - b.velocity.linear)
                    - self.a2 * b.velocity.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old_impulse;

                let p = impulse * self.axis;
                a.velocity.linear += m_a * p;
                a.velocity.angular += i_a * impulse * self.a1;
                b.velocity.linear -= m_b * p;
                b.velocity.angular -= i_b * impulse * self.a2;
            }
        }

        // Perpendicular translation and relative rotation lock.
        let cdot = Vec2::new(
            self.perp.dot(b.velocity.linear - a.velocity.linear) + self.s2 * b.velocity.angular
                - self.s1 * a.velocity.angular,
            b.velocity.angular - a.velocity.angular,
        );
        let impulse = solve22(self.k11, self.k12, self.k22, -cdot);
        self.impulse += impulse;

        let p = impulse.x * self.perp;
        let l_a = impulse.x * self.s1 + impulse.y;
        let l_b = impulse.x * self.s2 + impulse.y;

        a.velocity.linear -= m_a * p;
        a.velocity.angular -= i_a * l_a;
        b.velocity.linear += m_b * p;
        b.velocity.angular += i_b * l_b;

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

        let q_a = body_rot(&a);
        let r_a = anchor_arm(q_a, self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let d = (b.position.linear + r_b) - (a.position.linear + r_a);

        let axis = q_a.rotate(self.local_axis_a);
        let a1 = cross(d + r_a, axis);
        let a2 = cross(r_b, axis);
        let perp = q_a.rotate(Vec2::new(-self.local_axis_a.y, self.local_axis_a.x));
        let s1 = cross(d + r_a, perp);
        let s2 = cross(r_b, perp);

        let c1 = Vec2::new(
            perp.dot(d),
            b.position.angular - a.position.angular - self.reference_angle,
        );
        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        // Axial limit correction.
        let mut axial_impulse = 0.0;
        if self.enable_limit {
            let translation = axis.dot(d);
            let mut c2 = 0.0;
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * conf.linear_slop {
                c2 = translation.clamp(-conf.max_linear_correction, conf.max_linear_correction);
            } else if translation <= self.lower_translation {
                c2 = (translation - self.lower_translation + conf.linear_slop)
                    .clamp(-conf.max_linear_correction, 0.0);
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation - conf.linear_slop)
                    .clamp(0.0, conf.max_linear_correction);
            }
            if c2 != 0.0 {
                let axial = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;
                axial_impulse = if axial > 0.0 { -c2 / axial } else { 0.0 };
                linear_error = linear_error.max(c2.abs());
            }
        }

        let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
        let k12 = i_a * s1 + i_b * s2;
        let mut k22 = i_a + i_b;
        if k22 == 0.0 {
            k22 = 1.0;
        }
        let impulse = -solve22(k11, k12, k22, c1);

        let p = impulse.x * perp + axial_impulse * axis;
        let l_a = impulse.x * s1 + impulse.y + axial_impulse * a1;
        let l_b = impulse.x * s2 + impulse.y + axial_impulse * a2;

        a.position.linear -= m_a * p;
        a.position.angular -= i_a * l_a;
        b.position.linear += m_b * p;
        b.position.angular += i_b * l_b;

        bodies.set_position(ia, a.position);
        bodies.set_position(ib, b.position);
        linear_error <= conf.linear_slop && angular_error <= conf.angular_slop
    }
}
