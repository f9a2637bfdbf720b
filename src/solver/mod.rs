pub mod backend;
pub mod kkt;
pub mod panoc;
pub mod problem;

pub use backend::{solve_ik, QpBackend, QpRegistry, DEFAULT_SOLVER};
pub use problem::{build_ik, IkSettings, QpProblem};
