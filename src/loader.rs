use crate::errors::{Error, Result};
use crate::spacetime::model::{RobotModel, RootJoint};
use nalgebra::DVector;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A loaded robot: kinematic model and its initial configuration.
#[derive(Debug, Clone)]
pub struct RobotDescription {
    pub model: Arc<RobotModel>,
    pub q0: DVector<f64>,
}

/// Supplies robot models from a description identifier.
pub trait ModelLoader {
    fn load(&self, name: &str, root_joint: RootJoint) -> Result<RobotDescription>;
}

/// Looks up URDF files in a list of directories, trying
/// `<dir>/<name>.urdf`, `<dir>/<name>/<name>.urdf` and
/// `<dir>/<name>/urdf/<name>.urdf` in that order.
#[derive(Debug, Clone, Default)]
pub struct UrdfLoader {
    pub search_paths: Vec<PathBuf>,
}

impl UrdfLoader {
    pub fn new<P: AsRef<Path>>(search_paths: &[P]) -> Self {
        Self {
            search_paths: search_paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        }
    }

    fn candidates(&self, name: &str) -> Vec<PathBuf> {
        let file = format!("{name}.urdf");
        self.search_paths
            .iter()
            .flat_map(|dir| {
                [
                    dir.join(&file),
                    dir.join(name).join(&file),
                    dir.join(name).join("urdf").join(&file),
                ]
            })
            .collect()
    }
}

impl ModelLoader for UrdfLoader {
    fn load(&self, name: &str, root_joint: RootJoint) -> Result<RobotDescription> {
        let candidates = self.candidates(name);
        let path = candidates.iter().find(|p| p.is_file()).ok_or_else(|| Error::ModelNotFound {
            name: name.to_string(),
            reason: format!("searched {candidates:?}"),
        })?;
        log::info!("Using robot description {}", path.display());
        let model = RobotModel::from_urdf_file(path, root_joint)?;
        let q0 = model.neutral();
        Ok(RobotDescription {
            model: Arc::new(model),
            q0,
        })
    }
}
