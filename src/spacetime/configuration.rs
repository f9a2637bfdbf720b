use crate::errors::{Error, Result};
use crate::spacetime::model::RobotModel;
use crate::utils::vector_space::VectorSpace;
use nalgebra::{DMatrix, DVector, Isometry3};
use std::sync::Arc;

/// A robot model together with a configuration vector and its forward
/// kinematics.
///
/// Joint placements are computed once at construction, so frame queries are
/// cheap. Integration returns a new vector; [`Configuration::integrate_inplace`]
/// replaces the configuration and refreshes the kinematics.
#[derive(Debug, Clone)]
pub struct Configuration {
    model: Arc<RobotModel>,
    q: DVector<f64>,
    joint_placements: Vec<Isometry3<f64>>,
    tangent: VectorSpace,
}

impl Configuration {
    pub fn new(model: Arc<RobotModel>, q: DVector<f64>) -> Result<Self> {
        let joint_placements = model.forward_kinematics(&q)?;
        let tangent = VectorSpace::new(model.nv());
        Ok(Self {
            model,
            q,
            joint_placements,
            tangent,
        })
    }

    pub fn neutral(model: Arc<RobotModel>) -> Result<Self> {
        let q = model.neutral();
        Self::new(model, q)
    }

    pub fn model(&self) -> &Arc<RobotModel> {
        &self.model
    }

    pub fn q(&self) -> &DVector<f64> {
        &self.q
    }

    pub fn nq(&self) -> usize {
        self.model.nq()
    }

    pub fn nv(&self) -> usize {
        self.model.nv()
    }

    pub fn tangent(&self) -> &VectorSpace {
        &self.tangent
    }

    pub fn get_transform_frame_to_world(&self, frame: &str) -> Result<Isometry3<f64>> {
        let frame = self.model.frame(frame)?;
        Ok(self.model.frame_placement(frame, &self.joint_placements))
    }

    /// Jacobian of the frame velocity expressed in the frame, `6 x nv`.
    pub fn get_frame_jacobian(&self, frame: &str) -> Result<DMatrix<f64>> {
        let frame = self.model.frame(frame)?;
        Ok(self.model.frame_jacobian(frame, &self.joint_placements))
    }

    pub fn integrate(&self, velocity: &DVector<f64>, dt: f64) -> Result<DVector<f64>> {
        self.model.integrate(&self.q, velocity, dt)
    }

    pub fn integrate_inplace(&mut self, velocity: &DVector<f64>, dt: f64) -> Result<()> {
        let q = self.integrate(velocity, dt)?;
        self.joint_placements = self.model.forward_kinematics(&q)?;
        self.q = q;
        Ok(())
    }

    /// Tangent vector leading from `self` to `q`.
    pub fn difference(&self, q: &DVector<f64>) -> Result<DVector<f64>> {
        self.model.difference(&self.q, q)
    }

    /// True when every single-dof coordinate lies within its limits.
    pub fn within_limits(&self, tol: f64) -> bool {
        let lower = self.model.lower_position_limits();
        let upper = self.model.upper_position_limits();
        self.q
            .iter()
            .zip(lower.iter().zip(upper.iter()))
            .all(|(q, (l, u))| *q >= l - tol && *q <= u + tol)
    }
}

/// Neutral configuration of `model` with the listed single-dof joints set.
pub fn custom_configuration_vector(model: &RobotModel, joint_values: &[(&str, f64)]) -> Result<DVector<f64>> {
    let mut q = model.neutral();
    for (name, value) in joint_values {
        let joint = model.joint(name)?;
        if joint.kind.nq() != 1 {
            return Err(Error::InvalidModel {
                reason: format!("joint \"{name}\" has {} coordinates, expected 1", joint.kind.nq()),
            });
        }
        q[joint.idx_q] = *value;
    }
    Ok(q)
}
