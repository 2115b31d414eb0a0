//! Kinetic2D – an impulse-based 2D rigid body physics engine for Rust.
//!
//! The crate is built around a [`World`] that owns arenas of bodies,
//! shapes, contacts, and joints, plus a dynamic AABB tree broad phase.
//! Each [`World::step`] runs the full pipeline: proxy synchronization,
//! pair discovery, narrow-phase manifold updates, island-based
//! sequential-impulse solving, continuous collision handling for
//! impenetrable ("bullet") bodies, and sleep management.

pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod errors;
pub mod utils;
pub mod world;

pub use glam::Vec2;

pub use collision::{
    aabb::Aabb,
    broadphase::{DynamicTree, LeafData},
    ccd::{time_of_impact, ToiConf, ToiOutput, ToiState},
    contact::{Contact, ContactKey},
    distance::{distance, max_separation, DistanceConf, SimplexCache},
    manifold::{collide_shapes, ContactFeature, Manifold, ManifoldKind, WorldManifold},
    queries::{RayCastInput, RayCastOutput},
};
pub use self::core::{
    body::{Body, BodyBuilder, BodyType},
    shapes::{Chain, Disk, DistanceProxy, Edge, Filter, Polygon, Shape, ShapeGeometry},
    types::{MassData, Position, Rot, Sweep, Transform, Velocity},
};
pub use dynamics::{
    joints::{
        DistanceJoint, FrictionJoint, GearJoint, Joint, JointType, MotorJoint, PrismaticJoint,
        PulleyJoint, RevoluteJoint, RopeJoint, TargetJoint, WeldJoint, WheelJoint,
    },
    step_conf::{IslandStats, PreStepStats, RegStepStats, StepConf, StepStats, ToiStepStats},
};
pub use errors::{WorldError, WorldResult};
pub use utils::allocator::{Arena, EntityId, GenerationalId};
pub use world::{ContactImpulse, RayCastHit, World, WorldBuilder};
