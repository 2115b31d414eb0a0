//! Dynamics: constraint solving, islands, joints, and step configuration.

pub mod island;
pub mod joints;
#[cfg(feature = "parallel")]
pub mod parallel;
pub mod solver;
pub mod step_conf;

pub use island::Island;
pub use joints::{Joint, JointType};
pub use solver::{BodyConstraint, PositionConstraint, VelocityConstraint};
pub use step_conf::{IslandStats, PreStepStats, RegStepStats, StepConf, StepStats, ToiStepStats};
