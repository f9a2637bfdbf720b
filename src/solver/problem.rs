use crate::errors::{check_dim, Error, Result};
use crate::spacetime::configuration::Configuration;
use crate::tasks::Task;
use nalgebra::{DMatrix, DVector};

/// Convex quadratic program in standard form:
///
/// ```text
/// minimize    ½ xᵀ P x + qᵀ x
/// subject to  G x <= h
///             A x == b
///             lb <= x <= ub
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QpProblem {
    pub p: DMatrix<f64>,
    pub q: DVector<f64>,
    pub inequality: Option<(DMatrix<f64>, DVector<f64>)>,
    pub equality: Option<(DMatrix<f64>, DVector<f64>)>,
    pub bounds: Option<(DVector<f64>, DVector<f64>)>,
}

impl QpProblem {
    pub fn new(p: DMatrix<f64>, q: DVector<f64>) -> Result<Self> {
        check_dim("cost matrix rows", q.len(), p.nrows())?;
        check_dim("cost matrix columns", q.len(), p.ncols())?;
        Ok(Self {
            p,
            q,
            inequality: None,
            equality: None,
            bounds: None,
        })
    }

    pub fn with_inequality(mut self, g: DMatrix<f64>, h: DVector<f64>) -> Result<Self> {
        check_dim("inequality matrix columns", self.dim(), g.ncols())?;
        check_dim("inequality vector", g.nrows(), h.len())?;
        self.inequality = Some((g, h));
        Ok(self)
    }

    pub fn with_equality(mut self, a: DMatrix<f64>, b: DVector<f64>) -> Result<Self> {
        check_dim("equality matrix columns", self.dim(), a.ncols())?;
        check_dim("equality vector", a.nrows(), b.len())?;
        self.equality = Some((a, b));
        Ok(self)
    }

    pub fn with_bounds(mut self, lb: DVector<f64>, ub: DVector<f64>) -> Result<Self> {
        check_dim("lower bound", self.dim(), lb.len())?;
        check_dim("upper bound", self.dim(), ub.len())?;
        self.bounds = Some((lb, ub));
        Ok(self)
    }

    pub fn dim(&self) -> usize {
        self.q.len()
    }

    /// Box bounds, infinite where absent.
    pub fn box_bounds(&self) -> (DVector<f64>, DVector<f64>) {
        match &self.bounds {
            Some((lb, ub)) => (lb.clone(), ub.clone()),
            None => (
                DVector::from_element(self.dim(), f64::NEG_INFINITY),
                DVector::from_element(self.dim(), f64::INFINITY),
            ),
        }
    }

    /// Fails with [`Error::Infeasible`] if some box is empty.
    pub fn check_bounds(&self) -> Result<()> {
        if let Some((lb, ub)) = &self.bounds {
            if let Some(i) = (0..self.dim()).find(|&i| lb[i] > ub[i] || lb[i].is_nan() || ub[i].is_nan()) {
                return Err(Error::Infeasible {
                    reason: format!("empty box on coordinate {i}: [{}, {}]", lb[i], ub[i]),
                });
            }
        }
        Ok(())
    }

    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        0.5 * x.dot(&(&self.p * x)) + self.q.dot(x)
    }

    /// Largest violation over every constraint, zero when feasible.
    pub fn max_violation(&self, x: &DVector<f64>) -> f64 {
        let mut violation: f64 = 0.0;
        if let Some((g, h)) = &self.inequality {
            violation = (g * x - h).iter().fold(violation, |acc, r| acc.max(*r));
        }
        if let Some((a, b)) = &self.equality {
            violation = (a * x - b).iter().fold(violation, |acc, r| acc.max(r.abs()));
        }
        if let Some((lb, ub)) = &self.bounds {
            for i in 0..self.dim() {
                violation = violation.max(lb[i] - x[i]).max(x[i] - ub[i]);
            }
        }
        violation
    }
}

/// Parameters of the differential IK problem.
#[derive(Debug, Clone, PartialEq)]
pub struct IkSettings {
    /// Tikhonov regularization added to the Hessian diagonal
    pub damping: f64,
    /// Add configuration and velocity limits as box constraints
    pub limits: bool,
    /// Backend name, registry default when `None`
    pub solver: Option<String>,
}

impl Default for IkSettings {
    fn default() -> Self {
        Self {
            damping: 1e-12,
            limits: true,
            solver: None,
        }
    }
}

/// Builds the QP over the displacement `Δq = v dt` that minimizes the sum of
/// weighted task residuals `Σ ||W (J Δq + gain e)||²`.
pub fn build_ik(
    configuration: &Configuration,
    tasks: &[Box<dyn Task + Send>],
    dt: f64,
    settings: &IkSettings,
) -> Result<QpProblem> {
    if tasks.is_empty() {
        return Err(Error::EmptyTaskList);
    }
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(Error::InvalidTimestep { dt });
    }
    let nv = configuration.nv();
    let mut p = DMatrix::identity(nv, nv) * settings.damping;
    let mut q = DVector::zeros(nv);
    for task in tasks {
        let (h_task, c_task) = task.compute_qp_objective(configuration)?;
        check_dim("task Hessian", nv, h_task.nrows())?;
        p += h_task;
        q += c_task;
    }
    let problem = QpProblem::new(p, q)?;
    if !settings.limits {
        return Ok(problem);
    }
    let (lb, ub) = displacement_bounds(configuration, dt);
    problem.with_bounds(lb, ub)
}

/// Box on `Δq` from configuration limits and velocity limits over `dt`.
pub fn displacement_bounds(configuration: &Configuration, dt: f64) -> (DVector<f64>, DVector<f64>) {
    let model = configuration.model();
    let nv = model.nv();
    let q = configuration.q();
    let v_max = model.velocity_limits();
    let mut lb = DVector::from_fn(nv, |i, _| -v_max[i] * dt);
    let mut ub = DVector::from_fn(nv, |i, _| v_max[i] * dt);
    for joint in model.joints().iter().filter(|j| j.kind.nq() == 1) {
        let (iq, iv) = (joint.idx_q, joint.idx_v);
        lb[iv] = lb[iv].max(joint.limits.lower - q[iq]);
        ub[iv] = ub[iv].min(joint.limits.upper - q[iq]);
    }
    (lb, ub)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spacetime::model::{JointKind, JointLimits, RobotModel, RootJoint};
    use crate::tasks::PostureTask;
    use approx::assert_relative_eq;
    use nalgebra::{Isometry3, Vector3};
    use std::sync::Arc;

    fn hinge(lower: f64, upper: f64, velocity: f64) -> Arc<RobotModel> {
        let mut model = RobotModel::new("hinge", RootJoint::Fixed);
        let limits = JointLimits { lower, upper, velocity };
        let axis = Vector3::z_axis();
        model
            .add_joint("hinge", JointKind::Revolute { axis }, None, Isometry3::identity(), limits)
            .unwrap();
        Arc::new(model)
    }

    #[test]
    fn empty_task_list_is_an_error() {
        let configuration = Configuration::neutral(hinge(-1.0, 1.0, 1.0)).unwrap();
        let err = build_ik(&configuration, &[], 0.1, &IkSettings::default()).unwrap_err();
        assert_eq!(err, Error::EmptyTaskList);
    }

    #[test]
    fn non_positive_timestep_is_an_error() {
        let configuration = Configuration::neutral(hinge(-1.0, 1.0, 1.0)).unwrap();
        let mut task = PostureTask::new(1.0).unwrap();
        task.set_target_from_configuration(&configuration).unwrap();
        let tasks: Vec<Box<dyn Task + Send>> = vec![Box::new(task)];
        let err = build_ik(&configuration, &tasks, 0.0, &IkSettings::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidTimestep { .. }));
    }

    #[test]
    fn bounds_combine_position_and_velocity_limits() {
        let q = DVector::from_element(1, 0.95);
        let configuration = Configuration::new(hinge(-1.0, 1.0, 2.0), q).unwrap();
        let (lb, ub) = displacement_bounds(&configuration, 0.1);
        assert_relative_eq!(lb[0], -0.2, epsilon = 1e-12);
        assert_relative_eq!(ub[0], 0.05, epsilon = 1e-12);
    }

    #[test]
    fn summed_tasks_do_not_depend_on_order() {
        let configuration = Configuration::new(hinge(-3.0, 3.0, 10.0), DVector::from_element(1, 0.2)).unwrap();
        let mut first = PostureTask::new(1.0).unwrap();
        first.set_target(crate::tasks::Target::Posture(DVector::from_element(1, 0.5))).unwrap();
        let mut second = PostureTask::new(0.3).unwrap();
        second.set_target(crate::tasks::Target::Posture(DVector::from_element(1, -0.4))).unwrap();

        let forward: Vec<Box<dyn Task + Send>> = vec![Box::new(first.clone()), Box::new(second.clone())];
        let backward: Vec<Box<dyn Task + Send>> = vec![Box::new(second), Box::new(first)];
        let settings = IkSettings::default();
        let a = build_ik(&configuration, &forward, 0.1, &settings).unwrap();
        let b = build_ik(&configuration, &backward, 0.1, &settings).unwrap();
        assert_relative_eq!(a.p, b.p, epsilon = 1e-15);
        assert_relative_eq!(a.q, b.q, epsilon = 1e-15);
    }

    #[test]
    fn violation_of_box_and_rows() {
        let problem = QpProblem::new(DMatrix::identity(2, 2), DVector::zeros(2))
            .unwrap()
            .with_inequality(DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), DVector::from_element(1, 1.0))
            .unwrap()
            .with_bounds(DVector::from_element(2, -1.0), DVector::from_element(2, 1.0))
            .unwrap();
        assert_relative_eq!(problem.max_violation(&DVector::from_vec(vec![0.5, 0.25])), 0.0);
        assert_relative_eq!(problem.max_violation(&DVector::from_vec(vec![0.9, 0.6])), 0.5, epsilon = 1e-12);
        assert_relative_eq!(problem.max_violation(&DVector::from_vec(vec![-1.5, 0.0])), 0.5, epsilon = 1e-12);
    }
}
