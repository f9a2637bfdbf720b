use thiserror::Error;

/// Error for the differential IK stack
#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("[Model] {reason}")]
    InvalidModel { reason: String },
    #[error("[Model] {what} has length {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("[Model] robot description \"{name}\" not found: {reason}")]
    ModelNotFound { name: String, reason: String },
    #[error("[Task] {reason}")]
    InvalidTask { reason: String },
    #[error("[IK] Cannot build a problem without any task")]
    EmptyTaskList,
    #[error("[IK] Timestep must be strictly positive, got {dt}")]
    InvalidTimestep { dt: f64 },
    #[error("[QP] Problem is infeasible: {reason}")]
    Infeasible { reason: String },
    #[error("[QP] Solver \"{name}\" is not available (available: {available:?})")]
    SolverUnavailable {
        name: String,
        available: Vec<String>,
    },
    #[error("[QP] Solver \"{name}\" failed: {reason}")]
    Solver { name: String, reason: String },
    #[error("[Settings] {reason}")]
    Settings { reason: String },
    #[error("[Viz] {reason}")]
    Visualization { reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Checks a vector length against what the model expects.
pub(crate) fn check_dim(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch {
            what,
            expected,
            actual,
        });
    }
    Ok(())
}
