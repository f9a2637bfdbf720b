use crate::errors::{check_dim, Error, Result};
use crate::spacetime::configuration::Configuration;
use crate::tasks::{check_cost, check_gain, Target, Task};
use nalgebra::{DMatrix, DVector};

/// Regulate the actuated joints towards a reference configuration.
///
/// Coordinates of a planar or free-flyer root are left free: their rows are
/// zero in both the residual and the Jacobian.
///
/// The configuration dimension is fixed by [`PostureTask::with_nq`], by
/// [`Task::set_target_from_configuration`] or by the first target, and later
/// targets of another length are rejected.
#[derive(Debug, Clone)]
pub struct PostureTask {
    /// [cost] / [rad]
    pub cost: f64,
    gain: f64,
    lm_damping: f64,
    nq: Option<usize>,
    target_q: Option<DVector<f64>>,
}

impl PostureTask {
    pub fn new(cost: f64) -> Result<Self> {
        check_cost("PostureTask", cost)?;
        Ok(Self {
            cost,
            gain: 1.0,
            lm_damping: 0.0,
            nq: None,
            target_q: None,
        })
    }

    pub fn with_gain(mut self, gain: f64) -> Result<Self> {
        check_gain("PostureTask", gain)?;
        self.gain = gain;
        Ok(self)
    }

    pub fn with_lm_damping(mut self, lm_damping: f64) -> Result<Self> {
        check_cost("PostureTask", lm_damping)?;
        self.lm_damping = lm_damping;
        Ok(self)
    }

    /// Expects targets and configurations of length `nq`.
    pub fn with_nq(mut self, nq: usize) -> Self {
        self.nq = Some(nq);
        self
    }

    pub fn nq(&self) -> Option<usize> {
        self.nq
    }

    pub fn target_q(&self) -> Option<&DVector<f64>> {
        self.target_q.as_ref()
    }

    /// Tangent rows regulated by this task.
    fn free_rows(configuration: &Configuration) -> std::ops::Range<usize> {
        let model = configuration.model();
        match model.root_joint_index() {
            Some(root) => 0..model.joints()[root].kind.nv(),
            None => 0..0,
        }
    }
}

impl Task for PostureTask {
    fn name(&self) -> String {
        "PostureTask".to_string()
    }

    fn target(&self) -> Option<Target> {
        self.target_q.clone().map(Target::Posture)
    }

    fn set_target(&mut self, target: Target) -> Result<()> {
        match target {
            Target::Posture(q) => {
                if let Some(nq) = self.nq {
                    check_dim("posture target", nq, q.len())?;
                }
                self.nq = Some(q.len());
                self.target_q = Some(q);
                Ok(())
            }
            Target::Pose(_) => Err(Error::InvalidTask {
                reason: "PostureTask expects a configuration target".to_string(),
            }),
        }
    }

    fn set_target_from_configuration(&mut self, configuration: &Configuration) -> Result<()> {
        self.nq = Some(configuration.nq());
        self.set_target(Target::Posture(configuration.q().clone()))
    }

    fn compute_error(&self, configuration: &Configuration) -> Result<DVector<f64>> {
        let target = self.target_q.as_ref().ok_or_else(|| Error::InvalidTask {
            reason: "no target set for PostureTask".to_string(),
        })?;
        check_dim("posture target", configuration.nq(), target.len())?;
        let mut error = configuration.model().difference(target, configuration.q())?;
        for i in Self::free_rows(configuration) {
            error[i] = 0.0;
        }
        Ok(error)
    }

    fn compute_jacobian(&self, configuration: &Configuration) -> Result<DMatrix<f64>> {
        let mut jacobian = configuration.tangent().eye.clone();
        for i in Self::free_rows(configuration) {
            jacobian[(i, i)] = 0.0;
        }
        Ok(jacobian)
    }

    fn cost(&self, configuration: &Configuration) -> DVector<f64> {
        DVector::from_element(configuration.nv(), self.cost)
    }

    fn gain(&self) -> f64 {
        self.gain
    }

    fn lm_damping(&self) -> f64 {
        self.lm_damping
    }
}
