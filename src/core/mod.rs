pub mod body;
pub mod shapes;
pub mod types;

pub use body::{Body, BodyBuilder, BodyType};
pub use shapes::{DistanceProxy, Filter, Shape};
pub use types::{MassData, Position, Rot, Sweep, Transform, Velocity};
