use glam::Vec2;

use crate::dynamics::joints::{anchor_arm, body_rot};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::cross;

/// Suspension joint: B slides along an axis in A's frame on a damped
/// spring, rotates freely, and can be driven by a rotational motor.
#[derive(Debug, Clone)]
pub struct WheelJoint {
    pub body_a: EntityId,
    pub body_b: EntityId,
    pub collide_connected: bool,
    pub local_anchor_a: Vec2,
    pub local_anchor_b: Vec2,
    pub local_axis_a: Vec2,
    pub enable_motor: bool,
    pub motor_speed: f32,
    pub max_motor_torque: f32,
    /// Suspension frequency in Hz; 0 disables the spring entirely.
    pub frequency: f32,
    pub damping_ratio: f32,

    // Solver cache.
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    spring_mass: f32,
    motor_mass: f32,
    impulse: f32,
    spring_impulse: f32,
    motor_impulse: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
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
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            frequency: 2.0,
            damping_ratio: 0.7,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            spring_mass: 0.0,
            motor_mass: 0.0,
            impulse: 0.0,
            spring_impulse: 0.0,
            motor_impulse: 0.0,
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

        let q_a = body_rot(&a);
        let r_a = anchor_arm(q_a, self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let d = (b.position.linear + r_b) - (a.position.linear + r_a);

        // Rigid constraint perpendicular to the slide axis.
        self.ay = q_a.rotate(Vec2::new(-self.local_axis_a.y, self.local_axis_a.x));
        self.s_ay = cross(d + r_a, self.ay);
        self.s_by = cross(r_b, self.ay);
        let inv_mass =
            m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        // Spring along the axis.
        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency > 0.0 {
            self.ax = q_a.rotate(self.local_axis_a);
            self.s_ax = cross(d + r_a, self.ax);
            self.s_bx = cross(r_b, self.ax);
            let inv_mass =
                m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;
            if inv_mass > 0.0 {
                self.spring_mass = 1.0 / inv_mass;
                let c = d.dot(self.ax);
                let omega = 2.0 * std::f32::consts::PI * self.frequency;
                let damp = 2.0 * self.spring_mass * self.damping_ratio * omega;
                let k = self.spring_mass * omega * omega;
                let h = conf.delta_time;
                self.gamma = h * (damp + h * k);
                if self.gamma > 0.0 {
                    self.gamma = 1.0 / self.gamma;
                }
                self.bias = c * h * k * self.gamma;
                self.spring_mass = 1.0 / (inv_mass + self.gamma);
            }
        } else {
            self.spring_impulse = 0.0;
        }

        // Rotational motor.
        if self.enable_motor {
            let inv = i_a + i_b;
            self.motor_mass = if inv > 0.0 { 1.0 / inv } else { 0.0 };
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            self.spring_impulse *= conf.dt_ratio;
            self.motor_impulse *= conf.dt_ratio;

            let p = self.impulse * self.ay + self.spring_impulse * self.ax;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax
                + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx
                + self.motor_impulse;

            a.velocity.linear -= m_a * p;
            a.velocity.angular -= i_a * l_a;
            b.velocity.linear += m_b * p;
            b.velocity.angular += i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
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

        // Spring.
        {
            let cdot = self.ax.dot(b.velocity.linear - a.velocity.linear)
                + self.s_bx * b.velocity.angular
                - self.s_ax * a.velocity.angular;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = impulse * self.ax;
            a.velocity.linear -= m_a * p;
            a.velocity.angular -= i_a * impulse * self.s_ax;
            b.velocity.linear += m_b * p;
            b.velocity.angular += i_b * impulse * self.s_bx;
        }

        // Motor.
        if self.enable_motor {
            let cdot = b.velocity.angular - a.velocity.angular - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = self.max_motor_torque * h;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            a.velocity.angular -= i_a * impulse;
            b.velocity.angular += i_b * impulse;
        }

        // Rigid perpendicular constraint.
        let cdot = self.ay.dot(b.velocity.linear - a.velocity.linear)
            + self.s_by * b.velocity.angular
            - self.s_ay * a.velocity.angular;
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p = impulse * self.ay;
        a.velocity.linear -= m_a * p;
        a.velocity.angular -= i_a * impulse * self.s_ay;
        b.velocity.linear += m_b * p;
        b.velocity.angular += i_b * impulse * self.s_by;

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        impulse.abs() <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);

        let q_a = body_rot(&a);
        let r_a = anchor_arm(q_a, self.local_anchor_a, a.local_center);
        let r_b = anchor_arm(body_rot(&b), self.local_anchor_b, b.local_center);
        let d = (b.position.linear + r_b) - (a.position.linear + r_a);

        let ay = q_a.rotate(Vec2::new(-self.local_axis_a.y, self.local_axis_a.x));
        let s_ay = cross(d + r_a, ay);
        let s_by = cross(r_b, ay);

        let c = d.dot(ay);
        let k = a.inv_mass + b.inv_mass
            + a.inv_inertia * s_ay * s_ay
            + b.inv_inertia * s_by * s_by;
        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = impulse * ay;
        a.position.linear -= a.inv_mass * p;
        a.position.angular -= a.inv_inertia * impulse * s_ay;
        b.position.linear += b.inv_mass * p;
        b.position.angular += b.inv_inertia * impulse * s_by;

        bodies.set_position(ia, a.position);
        bodies.set_position(ib, b.position);
        c.abs() <= conf.linear_slop
    }
}
