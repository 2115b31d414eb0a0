use glam::Vec2;

use crate::core::types::{Position, Rot};
use crate::dynamics::joints::{anchor_arm, body_rot, Joint};
use crate::dynamics::solver::SolverBodies;
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;
use crate::utils::math::cross;

/// Geometry snapshot of one referenced joint leg: which coordinate the leg
/// measures and the frames needed to evaluate it.
#[derive(Debug, Clone)]
enum GearLeg {
    /// Revolute leg: the coordinate is a relative angle.
    Revolute { reference_angle: f32 },
    /// Prismatic leg: the coordinate is a translation along an axis fixed
    /// in the ground body.
    Prismatic {
        local_anchor_ground: Vec2,
        local_anchor_body: Vec2,
        local_axis: Vec2,
    },
}

/// Couples the coordinates of two revolute/prismatic joints so that
/// `coord1 + ratio · coord2` stays constant.
///
/// The referenced joints' geometry is snapshotted at creation, the way the
/// original joints defined it; destroying either referenced joint leaves
/// the gear operating on the snapshot.
#[derive(Debug, Clone)]
pub struct GearJoint {
    /// Driven body of the first referenced joint.
    pub body_a: EntityId,
    /// Driven body of the second referenced joint.
    pub body_b: EntityId,
    /// Ground body of the first referenced joint.
    pub body_c: EntityId,
    /// Ground body of the second referenced joint.
    pub body_d: EntityId,
    pub collide_connected: bool,
    pub ratio: f32,
    constant: f32,
    leg1: GearLeg,
    leg2: GearLeg,

    // Solver cache.
    jv_ac: Vec2,
    jv_bd: Vec2,
    jw_a: f32,
    jw_b: f32,
    jw_c: f32,
    jw_d: f32,
    mass: f32,
    impulse: f32,
}

impl GearJoint {
    /// Builds a gear from two existing revolute or prismatic joints.
    ///
    /// Returns `None` when either joint is of an unsupported type. The
    /// coordinate constant is captured from the bodies' current poses by
    /// the world at creation time via [`GearJoint::reset_constant`].
    pub fn from_joints(joint1: &Joint, joint2: &Joint, ratio: f32) -> Option<Self> {
        let (body_c, body_a, leg1) = Self::leg_of(joint1)?;
        let (body_d, body_b, leg2) = Self::leg_of(joint2)?;
        Some(Self {
            body_a,
            body_b,
            body_c,
            body_d,
            collide_connected: false,
            ratio: if ratio != 0.0 { ratio } else { 1.0 },
            constant: 0.0,
            leg1,
            leg2,
            jv_ac: Vec2::ZERO,
            jv_bd: Vec2::ZERO,
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
            impulse: 0.0,
        })
    }

    fn leg_of(joint: &Joint) -> Option<(EntityId, EntityId, GearLeg)> {
        match joint {
            Joint::Revolute(j) => Some((
                j.body_a,
                j.body_b,
                GearLeg::Revolute {
                    reference_angle: j.reference_angle,
                },
            )),
            Joint::Prismatic(j) => Some((
                j.body_a,
                j.body_b,
                GearLeg::Prismatic {
                    local_anchor_ground: j.local_anchor_a,
                    local_anchor_body: j.local_anchor_b,
                    local_axis: j.local_axis_a,
                },
            )),
            _ => None,
        }
    }

    pub fn body_a(&self) -> EntityId {
        self.body_a
    }

    pub fn body_b(&self) -> EntityId {
        self.body_b
    }

    /// Joint coordinate of a leg given `(center-of-mass position, local
    /// center)` poses for the ground and driven bodies.
    fn coordinate(leg: &GearLeg, ground: (Position, Vec2), body: (Position, Vec2)) -> f32 {
        match leg {
            GearLeg::Revolute { reference_angle } => {
                body.0.angular - ground.0.angular - reference_angle
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let q_g = Rot::from_angle(ground.0.angular);
                let r_g = q_g.rotate(*local_anchor_ground - ground.1);
                let r_b = Rot::from_angle(body.0.angular).rotate(*local_anchor_body - body.1);
                let d = (body.0.linear + r_b) - (ground.0.linear + r_g);
                d.dot(q_g.rotate(*local_axis))
            }
        }
    }

    /// Captures the gear constant from the current body poses, given as
    /// `(center-of-mass position, local center)` per body.
    pub fn reset_constant(
        &mut self,
        a: (Position, Vec2),
        b: (Position, Vec2),
        c: (Position, Vec2),
        d: (Position, Vec2),
    ) {
        self.constant =
            Self::coordinate(&self.leg1, c, a) + self.ratio * Self::coordinate(&self.leg2, d, b);
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let ic = bodies.slot(self.body_c);
        let id = bodies.slot(self.body_d);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);
        let mut c = bodies.get(ic);
        let mut d = bodies.get(id);

        let mut inv_mass = 0.0;

        match &self.leg1 {
            GearLeg::Revolute { .. } => {
                self.jv_ac = Vec2::ZERO;
                self.jw_a = 1.0;
                self.jw_c = 1.0;
                inv_mass += a.inv_inertia + c.inv_inertia;
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let q_c = body_rot(&c);
                let u = q_c.rotate(*local_axis);
                let r_c = anchor_arm(q_c, *local_anchor_ground, c.local_center);
                let r_a = anchor_arm(body_rot(&a), *local_anchor_body, a.local_center);
                self.jv_ac = u;
                self.jw_c = cross((a.position.linear + r_a) - c.position.linear, u);
                self.jw_a = cross(r_a, u);
                inv_mass += c.inv_mass + a.inv_mass
                    + c.inv_inertia * self.jw_c * self.jw_c
                    + a.inv_inertia * self.jw_a * self.jw_a;
            }
        }

        match &self.leg2 {
            GearLeg::Revolute { .. } => {
                self.jv_bd = Vec2::ZERO;
                self.jw_b = self.ratio;
                self.jw_d = self.ratio;
                inv_mass += self.ratio * self.ratio * (b.inv_inertia + d.inv_inertia);
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let q_d = body_rot(&d);
                let u = q_d.rotate(*local_axis);
                let r_d = anchor_arm(q_d, *local_anchor_ground, d.local_center);
                let r_b = anchor_arm(body_rot(&b), *local_anchor_body, b.local_center);
                self.jv_bd = self.ratio * u;
                self.jw_d = self.ratio * cross((b.position.linear + r_b) - d.position.linear, u);
                self.jw_b = self.ratio * cross(r_b, u);
                inv_mass += self.ratio * self.ratio * (d.inv_mass + b.inv_mass)
                    + d.inv_inertia * self.jw_d * self.jw_d
                    + b.inv_inertia * self.jw_b * self.jw_b;
            }
        }

        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };

        if conf.do_warm_start {
            self.impulse *= conf.dt_ratio;
            a.velocity.linear += a.inv_mass * self.impulse * self.jv_ac;
            a.velocity.angular += a.inv_inertia * self.impulse * self.jw_a;
            b.velocity.linear += b.inv_mass * self.impulse * self.jv_bd;
            b.velocity.angular += b.inv_inertia * self.impulse * self.jw_b;
            c.velocity.linear -= c.inv_mass * self.impulse * self.jv_ac;
            c.velocity.angular -= c.inv_inertia * self.impulse * self.jw_c;
            d.velocity.linear -= d.inv_mass * self.impulse * self.jv_bd;
            d.velocity.angular -= d.inv_inertia * self.impulse * self.jw_d;
        } else {
            self.impulse = 0.0;
        }

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        bodies.set_velocity(ic, c.velocity);
        bodies.set_velocity(id, d.velocity);
    }

    pub fn solve_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let ic = bodies.slot(self.body_c);
        let id = bodies.slot(self.body_d);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);
        let mut c = bodies.get(ic);
        let mut d = bodies.get(id);

        let cdot = self.jv_ac.dot(a.velocity.linear - c.velocity.linear)
            + self.jv_bd.dot(b.velocity.linear - d.velocity.linear)
            + self.jw_a * a.velocity.angular
            - self.jw_c * c.velocity.angular
            + self.jw_b * b.velocity.angular
            - self.jw_d * d.velocity.angular;

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        a.velocity.linear += a.inv_mass * impulse * self.jv_ac;
        a.velocity.angular += a.inv_inertia * impulse * self.jw_a;
        b.velocity.linear += b.inv_mass * impulse * self.jv_bd;
        b.velocity.angular += b.inv_inertia * impulse * self.jw_b;
        c.velocity.linear -= c.inv_mass * impulse * self.jv_ac;
        c.velocity.angular -= c.inv_inertia * impulse * self.jw_c;
        d.velocity.linear -= d.inv_mass * impulse * self.jv_bd;
        d.velocity.angular -= d.inv_inertia * impulse * self.jw_d;

        bodies.set_velocity(ia, a.velocity);
        bodies.set_velocity(ib, b.velocity);
        bodies.set_velocity(ic, c.velocity);
        bodies.set_velocity(id, d.velocity);
        impulse.abs() <= conf.reg_min_momentum
    }

    pub fn solve_position(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        let ia = bodies.slot(self.body_a);
        let ib = bodies.slot(self.body_b);
        let ic = bodies.slot(self.body_c);
        let id = bodies.slot(self.body_d);
        let mut a = bodies.get(ia);
        let mut b = bodies.get(ib);
        let c = bodies.get(ic);
        let d = bodies.get(id);

        let coord1 = Self::coordinate(
            &self.leg1,
            (c.position, c.local_center),
            (a.position, a.local_center),
        );
        let coord2 = Self::coordinate(
            &self.leg2,
            (d.position, d.local_center),
            (b.position, b.local_center),
        );
        let error = coord1 + self.ratio * coord2 - self.constant;

        let impulse = if self.mass > 0.0 { -self.mass * error } else { 0.0 };

        a.position.linear += a.inv_mass * impulse * self.jv_ac;
        a.position.angular += a.inv_inertia * impulse * self.jw_a;
        b.position.linear += b.inv_mass * impulse * self.jv_bd;
        b.position.angular += b.inv_inertia * impulse * self.jw_b;

        bodies.set_position(ia, a.position);
        bodies.set_position(ib, b.position);
        error.abs() < conf.linear_slop
    }
}
