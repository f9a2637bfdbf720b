//! Weighted task objectives of the differential IK.
//!
//! A task contributes a residual `e(q)` and its Jacobian `J(q)` w.r.t. a
//! tangent displacement. The solver seeks `J Δq ≈ -gain · e`, summing the
//! squared weighted residuals of every task.

pub mod frame_task;
pub mod posture_task;

pub use frame_task::FrameTask;
pub use posture_task::PostureTask;

use crate::errors::{Error, Result};
use crate::spacetime::configuration::Configuration;
use nalgebra::{DMatrix, DVector, Isometry3};

/// Target accepted by a task
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// Transform from the target frame to the world frame
    Pose(Isometry3<f64>),
    /// Configuration vector
    Posture(DVector<f64>),
}

pub trait Task {
    /// Short identifier for logs
    fn name(&self) -> String;

    /// Frame driven by this task, if any
    fn frame(&self) -> Option<&str> {
        None
    }

    fn target(&self) -> Option<Target>;

    fn set_target(&mut self, target: Target) -> Result<()>;

    /// Uses the current pose or posture of `configuration` as target.
    fn set_target_from_configuration(&mut self, configuration: &Configuration) -> Result<()>;

    /// Unweighted residual in the tangent space of the task.
    fn compute_error(&self, configuration: &Configuration) -> Result<DVector<f64>>;

    /// Derivative of [`Task::compute_error`] w.r.t. a tangent displacement,
    /// `error_dim x nv`.
    fn compute_jacobian(&self, configuration: &Configuration) -> Result<DMatrix<f64>>;

    /// Per-row cost weights, one per residual component.
    fn cost(&self, configuration: &Configuration) -> DVector<f64>;

    fn gain(&self) -> f64 {
        1.0
    }

    fn lm_damping(&self) -> f64 {
        0.0
    }

    /// Weighted residual `W e` and Jacobian `W J`.
    fn compute_residual_and_jacobian(&self, configuration: &Configuration) -> Result<(DVector<f64>, DMatrix<f64>)> {
        let error = self.compute_error(configuration)?;
        let jacobian = self.compute_jacobian(configuration)?;
        let weight = DMatrix::from_diagonal(&self.cost(configuration));
        Ok((&weight * error, &weight * jacobian))
    }

    /// Hessian and linear term of `||W (J Δq + gain e)||²`, with
    /// Levenberg-Marquardt damping on the diagonal.
    fn compute_qp_objective(&self, configuration: &Configuration) -> Result<(DMatrix<f64>, DVector<f64>)> {
        let (residual, jacobian) = self.compute_residual_and_jacobian(configuration)?;
        let minus_gain_error = residual * -self.gain();
        let mu = self.lm_damping() * minus_gain_error.norm_squared();
        let nv = jacobian.ncols();
        let hessian = jacobian.transpose() * &jacobian + DMatrix::identity(nv, nv) * mu;
        let c = -(jacobian.transpose() * minus_gain_error);
        Ok((hessian, c))
    }
}

pub(crate) fn check_cost(task: &str, cost: f64) -> Result<()> {
    if !cost.is_finite() || cost < 0.0 {
        return Err(Error::InvalidTask {
            reason: format!("{task}: cost must be finite and non-negative, got {cost}"),
        });
    }
    Ok(())
}

pub(crate) fn check_gain(task: &str, gain: f64) -> Result<()> {
    if !(gain > 0.0 && gain <= 1.0) {
        return Err(Error::InvalidTask {
            reason: format!("{task}: gain must be in (0, 1], got {gain}"),
        });
    }
    Ok(())
}
