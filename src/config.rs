//! Global configuration constants for the Kinetic2D engine.

/// Default gravity vector applied in the physics world (Y-up).
pub const DEFAULT_GRAVITY: [f32; 2] = [0.0, -9.81];

/// Default integration timestep (in seconds).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 60.0;

/// Default velocity iterations for the regular-phase solver.
pub const DEFAULT_REG_VELOCITY_ITERATIONS: u32 = 8;

/// Default position iterations for the regular-phase solver.
pub const DEFAULT_REG_POSITION_ITERATIONS: u32 = 3;

/// Default velocity iterations for the TOI-phase solver.
pub const DEFAULT_TOI_VELOCITY_ITERATIONS: u32 = 8;

/// Default position iterations for the TOI-phase solver.
pub const DEFAULT_TOI_POSITION_ITERATIONS: u32 = 20;

/// Length below which two points are considered coincident.
///
/// Collision and position resolution try to keep bodies within this
/// distance of exact contact rather than exactly touching.
pub const LINEAR_SLOP: f32 = 0.005;

/// Angular analog of [`LINEAR_SLOP`] (radians).
pub const ANGULAR_SLOP: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Target overlap depth maintained between touching shapes.
pub const DEFAULT_TARGET_DEPTH: f32 = LINEAR_SLOP * 3.0;

/// Tolerance band around the target depth accepted as "touching".
pub const DEFAULT_TOLERANCE: f32 = LINEAR_SLOP / 4.0;

/// Broad-phase AABB fattening margin.
pub const DEFAULT_AABB_EXTENSION: f32 = LINEAR_SLOP * 20.0;

/// Multiplier applied to per-step displacement when predictively
/// growing a moved leaf's AABB.
pub const DEFAULT_DISPLACE_MULTIPLIER: f32 = 2.0;

/// Default vertex radius given to polygon and edge shapes.
pub const DEFAULT_VERTEX_RADIUS: f32 = LINEAR_SLOP * 2.0;

/// Maximum vertices a polygon shape may carry.
pub const MAX_SHAPE_VERTICES: usize = 8;

/// Relative velocity along the normal below which restitution is ignored.
pub const DEFAULT_VELOCITY_THRESHOLD: f32 = 1.0;

/// Fraction of penetration error corrected per position iteration.
pub const DEFAULT_RESOLUTION_RATE: f32 = 0.2;

/// Largest linear position correction applied in one iteration.
pub const MAX_LINEAR_CORRECTION: f32 = 0.2;

/// Largest angular position correction applied in one iteration (radians).
pub const MAX_ANGULAR_CORRECTION: f32 = 8.0 / 180.0 * std::f32::consts::PI;

/// Largest translation a body may make in a single step.
pub const MAX_TRANSLATION: f32 = 4.0;

/// Largest rotation a body may make in a single step (radians).
pub const MAX_ROTATION: f32 = std::f32::consts::FRAC_PI_2;

/// Linear speed below which a body accrues under-active time.
pub const DEFAULT_LINEAR_SLEEP_TOLERANCE: f32 = 0.01;

/// Angular speed below which a body accrues under-active time (rad/s).
pub const DEFAULT_ANGULAR_SLEEP_TOLERANCE: f32 = 2.0 / 180.0 * std::f32::consts::PI;

/// Seconds of continuous under-activity before an island may sleep.
pub const DEFAULT_MIN_STILL_TIME_TO_SLEEP: f32 = 0.5;

/// Default sub-step budget per contact for continuous collision handling.
pub const DEFAULT_MAX_SUB_STEPS: u32 = 8;

/// Iteration cap for the TOI outer loop.
pub const DEFAULT_MAX_TOI_ITERS: u32 = 20;

/// Iteration cap for the TOI bisection root finder.
pub const DEFAULT_MAX_ROOT_ITERS: u32 = 30;

/// Iteration cap for GJK distance refinement.
pub const DEFAULT_MAX_DIST_ITERS: u32 = 20;

/// Maximum live bodies a world will allocate.
pub const MAX_BODIES: usize = u16::MAX as usize - 1;

/// Maximum live joints a world will allocate.
pub const MAX_JOINTS: usize = u16::MAX as usize - 1;

/// Maximum live contacts a world will track.
pub const MAX_CONTACTS: usize = (u16::MAX as usize - 1) * 2;

/// Maximum live shapes a world will allocate.
pub const MAX_SHAPES: usize = u16::MAX as usize - 1;

/// Initial dynamic-tree node capacity.
pub const DEFAULT_INITIAL_TREE_SIZE: usize = 256;

/// Smallest vertex radius a world accepts on shape creation.
pub const DEFAULT_MIN_VERTEX_RADIUS: f32 = LINEAR_SLOP / 2.0;

/// Largest vertex radius a world accepts on shape creation.
pub const DEFAULT_MAX_VERTEX_RADIUS: f32 = 255.0;
