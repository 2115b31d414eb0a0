//! Collision detection: broad phase, distance queries, manifolds, and
//! continuous collision.

pub mod aabb;
pub mod broadphase;
pub mod ccd;
pub mod clipping;
pub mod contact;
pub mod distance;
pub mod manifold;
pub mod queries;

pub use aabb::Aabb;
pub use broadphase::{DynamicTree, LeafData};
pub use ccd::{time_of_impact, ToiConf, ToiOutput, ToiState};
pub use contact::{Contact, ContactKey};
pub use manifold::{collide_shapes, ContactFeature, Manifold, ManifoldKind};
pub use queries::{RayCastInput, RayCastOutput};
