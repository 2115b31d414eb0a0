//! Typed error values surfaced at the world API boundary.

use thiserror::Error;

/// Errors returned by mutating and querying world operations.
///
/// Solver internals never produce these; every solver loop is bounded by an
/// iteration budget and reports diagnostics through step statistics instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    /// Bad input at the API boundary. Nothing was mutated.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// An id did not resolve to a live entry in its arena or tree.
    #[error("out of range: {0}")]
    OutOfRange(&'static str),

    /// A per-kind entity cap was reached.
    #[error("length limit reached: {0}")]
    LengthError(&'static str),

    /// A mutating call arrived while the world was mid-step.
    #[error("wrong state: world is locked")]
    WrongState,
}

/// Convenience alias used throughout the world API.
pub type WorldResult<T> = Result<T, WorldError>;
