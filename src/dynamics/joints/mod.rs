//! Joint constraints, one module per joint family.
//!
//! Every variant provides the same three solver hooks: initialize velocity
//! constraints (Jacobians, effective masses, warm-start application), solve
//! velocity constraints, and solve position constraints. The island solver
//! drives them through the [`Joint`] enum.

use glam::Vec2;

use crate::core::types::Rot;
use crate::dynamics::solver::{BodyConstraint, SolverBodies};
use crate::dynamics::step_conf::StepConf;
use crate::utils::allocator::EntityId;

pub mod distance;
pub mod friction;
pub mod gear;
pub mod motor;
pub mod prismatic;
pub mod pulley;
pub mod revolute;
pub mod rope;
pub mod target;
pub mod weld;
pub mod wheel;

pub use distance::DistanceJoint;
pub use friction::FrictionJoint;
pub use gear::GearJoint;
pub use motor::MotorJoint;
pub use prismatic::PrismaticJoint;
pub use pulley::PulleyJoint;
pub use revolute::RevoluteJoint;
pub use rope::RopeJoint;
pub use target::TargetJoint;
pub use weld::WeldJoint;
pub use wheel::WheelJoint;

/// Discriminant of a joint variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JointType {
    Distance,
    Revolute,
    Prismatic,
    Wheel,
    Weld,
    Friction,
    Motor,
    Gear,
    Pulley,
    Rope,
    Target,
}

/// Tagged union of all joint variants.
#[derive(Debug, Clone)]
pub enum Joint {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Wheel(WheelJoint),
    Weld(WeldJoint),
    Friction(FrictionJoint),
    Motor(MotorJoint),
    Gear(GearJoint),
    Pulley(PulleyJoint),
    Rope(RopeJoint),
    Target(TargetJoint),
}

macro_rules! dispatch {
    ($self:expr, $j:ident => $body:expr) => {
        match $self {
            Joint::Distance($j) => $body,
            Joint::Revolute($j) => $body,
            Joint::Prismatic($j) => $body,
            Joint::Wheel($j) => $body,
            Joint::Weld($j) => $body,
            Joint::Friction($j) => $body,
            Joint::Motor($j) => $body,
            Joint::Gear($j) => $body,
            Joint::Pulley($j) => $body,
            Joint::Rope($j) => $body,
            Joint::Target($j) => $body,
        }
    };
}

impl Joint {
    pub fn joint_type(&self) -> JointType {
        match self {
            Joint::Distance(_) => JointType::Distance,
            Joint::Revolute(_) => JointType::Revolute,
            Joint::Prismatic(_) => JointType::Prismatic,
            Joint::Wheel(_) => JointType::Wheel,
            Joint::Weld(_) => JointType::Weld,
            Joint::Friction(_) => JointType::Friction,
            Joint::Motor(_) => JointType::Motor,
            Joint::Gear(_) => JointType::Gear,
            Joint::Pulley(_) => JointType::Pulley,
            Joint::Rope(_) => JointType::Rope,
            Joint::Target(_) => JointType::Target,
        }
    }

    /// First endpoint; null for target joints.
    pub fn body_a(&self) -> EntityId {
        dispatch!(self, j => j.body_a())
    }

    pub fn body_b(&self) -> EntityId {
        dispatch!(self, j => j.body_b())
    }

    /// Whether the endpoint bodies may still collide with each other.
    pub fn collide_connected(&self) -> bool {
        dispatch!(self, j => j.collide_connected)
    }

    pub fn init_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) {
        dispatch!(self, j => j.init_velocity(bodies, conf))
    }

    /// One velocity iteration. Returns true when the joint applied no
    /// meaningful corrective impulse.
    pub fn solve_velocity(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        dispatch!(self, j => j.solve_velocity(bodies, conf))
    }

    /// One position iteration. Returns true when position errors are within
    /// tolerance.
    pub fn solve_position(&mut self, bodies: &mut SolverBodies<'_>, conf: &StepConf) -> bool {
        dispatch!(self, j => j.solve_position(bodies, conf))
    }

    /// Translates any world-frame data when the world origin shifts.
    pub fn shift_origin(&mut self, delta: Vec2) {
        match self {
            Joint::Pulley(j) => j.shift_origin(delta),
            Joint::Target(j) => j.shift_origin(delta),
            _ => {}
        }
    }
}

/// Anchor arm: a local anchor expressed relative to the center of mass,
/// rotated into world orientation.
pub(crate) fn anchor_arm(q: Rot, local_anchor: Vec2, local_center: Vec2) -> Vec2 {
    q.rotate(local_anchor - local_center)
}

/// Rotation of a body constraint's current angle.
pub(crate) fn body_rot(bc: &BodyConstraint) -> Rot {
    Rot::from_angle(bc.position.angular)
}

/// Inverse of a 2×2 built from `[[a, b], [b, c]]`, solving `K x = rhs`.
pub(crate) fn solve22(k11: f32, k12: f32, k22: f32, rhs: Vec2) -> Vec2 {
    let det = k11 * k22 - k12 * k12;
    if det.abs() <= f32::EPSILON {
        return Vec2::ZERO;
    }
    let inv_det = 1.0 / det;
    Vec2::new(
        inv_det * (k22 * rhs.x - k12 * rhs.y),
        inv_det * (k11 * rhs.y - k12 * rhs.x),
    )
}
