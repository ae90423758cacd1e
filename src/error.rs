//! Error taxonomy for the labeling-and-enumeration engine.
//!
//! `InvariantViolation` is the only variant that aborts a query; `NoPath` is
//! a normal, expected outcome surfaced through `Err` only when a caller asks
//! for strict signaling (see [`crate::pathfinder::Pathfinder::find_path_strict`]).
//! `DataWarning` conditions are logged at the call site and never constructed
//! as an error value, per the propagation policy in the design notes.

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PathfindingError {
    #[error("label queue invariant violated: {0}")]
    InvariantViolation(&'static str),

    #[error("no path found between the requested zones")]
    NoPath,

    #[error("query cancelled")]
    Cancelled,
}

pub type PathfindingResult<T> = Result<T, PathfindingError>;
