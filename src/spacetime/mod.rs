pub mod configuration;
pub mod lie;
pub mod model;

pub use configuration::{custom_configuration_vector, Configuration};
pub use model::{RobotModel, RootJoint};
