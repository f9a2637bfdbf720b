use crate::errors::{check_dim, Error, Result};
use crate::solver::IkSettings;
use crate::spacetime::model::{RobotModel, RootJoint};
use crate::tasks::{FrameTask, PostureTask, Task};
use nalgebra::DVector;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

fn default_gain() -> f64 {
    1.0
}

fn default_damping() -> f64 {
    1e-12
}

fn default_true() -> bool {
    true
}

/// One task entry of the settings file
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskSettings {
    Frame {
        frame: String,
        position_cost: f64,
        orientation_cost: f64,
        #[serde(default = "default_gain")]
        gain: f64,
        #[serde(default)]
        lm_damping: f64,
    },
    Posture {
        cost: f64,
        #[serde(default = "default_gain")]
        gain: f64,
        #[serde(default)]
        lm_damping: f64,
    },
}

impl TaskSettings {
    pub fn build(&self) -> Result<Box<dyn Task + Send>> {
        let task: Box<dyn Task + Send> = match self {
            TaskSettings::Frame {
                frame,
                position_cost,
                orientation_cost,
                gain,
                lm_damping,
            } => Box::new(
                FrameTask::new(frame, *position_cost, *orientation_cost)?
                    .with_gain(*gain)?
                    .with_lm_damping(*lm_damping)?,
            ),
            TaskSettings::Posture { cost, gain, lm_damping } => {
                Box::new(PostureTask::new(*cost)?.with_gain(*gain)?.with_lm_damping(*lm_damping)?)
            }
        };
        Ok(task)
    }
}

/// Settings of a control loop, read from a TOML file.
///
/// ```toml
/// urdf = "../assets/two_link_arm.urdf"
/// root_joint = "fixed"
/// frequency = 100.0
///
/// [[tasks]]
/// type = "frame"
/// frame = "tool"
/// position_cost = 1.0
/// orientation_cost = 1e-3
/// ```
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Robot description, relative paths are resolved from the settings file
    pub urdf: PathBuf,
    #[serde(default)]
    pub root_joint: RootJoint,
    pub frequency: f64,
    #[serde(default)]
    pub solver: Option<String>,
    #[serde(default = "default_damping")]
    pub damping: f64,
    #[serde(default = "default_true")]
    pub limits: bool,
    /// Initial configuration, neutral when absent
    #[serde(default)]
    pub starting_config: Option<Vec<f64>>,
    pub tasks: Vec<TaskSettings>,
}

impl Settings {
    pub fn from_settings_file<P: AsRef<Path>>(path_to_setting: P) -> Result<Self> {
        let path = path_to_setting.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| Error::Settings {
            reason: format!("cannot read {}: {e}", path.display()),
        })?;
        let mut settings = Self::from_toml_str(&contents)?;
        if settings.urdf.is_relative() {
            if let Some(dir) = path.parent() {
                settings.urdf = dir.join(&settings.urdf);
            }
        }
        log::debug!("Parsing successful {settings:?}");
        Ok(settings)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents).map_err(|e| Error::Settings {
            reason: format!("invalid settings: {e}"),
        })?;
        if settings.tasks.is_empty() {
            return Err(Error::EmptyTaskList);
        }
        Ok(settings)
    }

    pub fn ik_settings(&self) -> IkSettings {
        IkSettings {
            damping: self.damping,
            limits: self.limits,
            solver: self.solver.clone(),
        }
    }

    pub fn load_model(&self) -> Result<RobotModel> {
        if !self.urdf.is_file() {
            return Err(Error::ModelNotFound {
                name: self.urdf.display().to_string(),
                reason: "no such file".to_string(),
            });
        }
        RobotModel::from_urdf_file(&self.urdf, self.root_joint)
    }

    pub fn initial_configuration(&self, model: &RobotModel) -> Result<DVector<f64>> {
        match &self.starting_config {
            Some(q) => {
                check_dim("starting_config", model.nq(), q.len())?;
                Ok(DVector::from_column_slice(q))
            }
            None => {
                log::warn!("No starting config provided, using the neutral configuration");
                Ok(model.neutral())
            }
        }
    }

    pub fn build_tasks(&self) -> Result<Vec<Box<dyn Task + Send>>> {
        self.tasks.iter().map(TaskSettings::build).collect()
    }
}
