use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot, solve22};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::{cross, cross_sv};

/// Pin joint: the two local anchors share a world point while relative
/// rotation stays free, optionally motorized and angle-limited.
#[derive(Debug, Clone)]
pub struct RevoluteJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    /// Rest angle of B relative to A.
    pub reference_angle: f32,
    pub enable_limit: bool,
    pub lower_angle: f32,
    pub upper_angle: f32,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,

    // Solver cache.
    r_a: Vec2,
    r_b: Vec2,
    k11: f32,
    k12: f32,
    k22: f32,
    axial_mass: f32,
    angle: f32,
    impulse: Vec2,
    motor_impulse: f32,
    lower_impulse: f32,
    upper_impulse: f32,
}

impl RevoluteJoint {
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
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            k11: 0.0,
            k12: 0.0,
            k22: 0.0,
            axial_mass: 0.0,
            angle: 0.0,
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

    /// Current joint angle.
    pub fn joint_angle(&self) -> f32 {
        self.angle
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        self.r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        self.r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);

        let (m_a, m_b) = (a.inv_mass, b.inv_mass);
        let (i_a, i_b) = (a.inv_inertia, b.inv_inertia);

        self.k11 = m_a + m_b + i_a * self.r_a.y * self.r_a.y + i_b * self.r_b.y * self.r_b.y;
        self.k12 = -i_a * self.r_a.x * self.r_a.y - i_b * self.r_b.x * self.r_b.y;
        self.k22 = m_a + m_b + i_a * self.r_a.x * self.r_a.x + i_b * self.r_b.x * self.r_b.x;

        let axial = i_a + i_b;
        self.axial_mass = if axial > 0.0 { 1.0 / axial } else { 0.0 };
        self.angle = b.position.angular - a.position.angular - self.reference_angle;

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }
        if !self.enable_limit {
            self.lower_impulse = 0.0;
            self.upper_impulse = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.motor_impulse *= conf.dt_ratio;
            self.lower_impulse *= conf.dt_ratio;
            self.upper_impulse *= conf.dt_ratio;

            let axial_impulse = self.motor_impulse + self.lower_impulse - self.upper_impulse;
            let p = self.impulse;
            a.velocity.linear -= m_a * p;
            a.velocity.angular -= i_a * (cross(self.r_a, p) + axial_impulse);
            b.velocity.linear += m_b * p;
            b.velocity.angular += i_b * (cross(self.r_b, p) + axial_impulse);
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
        let fixed_rotation = i_a + i_b == 0.0;
        let h = conf.delta_time;
        let inv_h = conf.inv_time();

        if self.enable_motor && !fixed_rotation {
            let cdot = b.velocity.angular - a.velocity.angular - self.motor_speed;
            let mut impulse = -self.axial_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_torque * h;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            a.velocity.angular -= i_a * impulse;
            b.velocity.angular += i_b * impulse;
        }

        if self.enable_limit && !fixed_rotation {
            // Lower limit: brake approach speed so the limit is reached,
            // not crossed, by the end of the step.
            {
                let c = self.angle - self.lower_angle;
                let cdot = b.velocity.angular - a.velocity.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old_impulse = self.lower_impulse;
                self.lower_impulse = (self.lower_impulse + impulse).max(0.0);
                impulse = self.lower_impulse - old_impulse;
                a.velocity.angular -= i_a * impulse;
                b.velocity.angular += i_b * impulse;
            }
            // Upper limit, with the constraint sign inverted.
            {
                let c = self.upper_angle - self.angle;
                let cdot = a.velocity.angular - b.velocity.angular;
                let mut impulse = -self.axial_mass * (cdot + c.max(0.0) * inv_h);
                let old_impulse = self.upper_impulse;
                self.upper_impulse = (self.upper_impulse + impulse).max(0.0);
                impulse = self.upper_impulse - old_impulse;
                a.velocity.angular += i_a * impulse;
                b.velocity.angular -= i_b * impulse;
            }
        }

        // Point-to-point.
        let cdot = (b.velocity.linear + cross_sv(b.velocity.angular, self.r_b))
            - (a.velocity.linear + cross_sv(a.velocity.angular, self.r_a));
        let impulse = solve22(self.k11, self.k12, self.k22, -cdot);
        self.impulse += impulse;

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

        let mut angular_error = 0.0_f32;
        let fixed_rotation = a.inv_inertia + b.inv_inertia == 0.0;

        if self.enable_limit && !fixed_rotation {
            let angle = b.position.angular - a.position.angular - self.reference_angle;
            let mut c = 0.0;
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * conf.angular_slop {
                c = (angle - self.lower_angle)
                    .clamp(-conf.max_angular_correction, conf.max_angular_correction);
            } else if angle <= self.lower_angle {
                c = (angle - self.lower_angle + conf.angular_slop)
                    .clamp(-conf.max_angular_correction, 0.0);
            } else if angle >= self.upper_angle {
                c = (angle - self.upper_angle - conf.angular_slop)
                    .clamp(0.0, conf.max_angular_correction);
            }
            let impulse = -self.axial_mass * c;
            a.position.angular -= a.inv_inertia * impulse;
            b.position.angular += b.inv_inertia * impulse;
            angular_error = c.abs();
        }

        // Point-to-point position error.
        let r_a = anchor_arm(body_rot(&a), self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let c = (b.position.linear + r_b) - (a.position.linear + r_a);
        let position_error = c.length();

        let (m_a, m_b) = (a.inv_mass, b.inv_mass);
        let (i_a, i_b) = (a.inv_inertia, b.inv_inertia);

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
