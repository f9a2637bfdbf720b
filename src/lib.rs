pub mod control_loop;
pub mod errors;
pub mod loader;
pub mod solver;
pub mod spacetime;
pub mod tasks;
pub mod utils;
pub mod visualization;

pub use control_loop::{CancelToken, ControlLoop, LoopState};
pub use errors::{Error, Result};
pub use loader::{ModelLoader, RobotDescription, UrdfLoader};
pub use solver::{solve_ik, IkSettings, QpBackend, QpRegistry};
pub use spacetime::{Configuration, RobotModel, RootJoint};
pub use tasks::{FrameTask, PostureTask, Target, Task};
pub use utils::rate_limiter::RateLimiter;
pub use visualization::{LogVisualizer, Visualizer};
