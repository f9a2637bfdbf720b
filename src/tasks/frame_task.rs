use crate::errors::{Error, Result};
use crate::spacetime::configuration::Configuration;
use crate::spacetime::lie;
use crate::tasks::{check_cost, check_gain, Target, Task};
use nalgebra::{DMatrix, DVector, Isometry3, Matrix6, Vector3};

/// Regulate the pose of a frame towards a target transform.
///
/// The residual is `log6(T_target⁻¹ T_frame)`, a twist in the target frame
/// with rows `[linear; angular]`.
#[derive(Debug, Clone)]
pub struct FrameTask {
    pub frame: String,
    /// [cost] / [m]
    pub position_cost: Vector3<f64>,
    /// [cost] / [rad]
    pub orientation_cost: Vector3<f64>,
    gain: f64,
    lm_damping: f64,
    transform_target_to_world: Option<Isometry3<f64>>,
}

impl FrameTask {
    pub fn new(frame: &str, position_cost: f64, orientation_cost: f64) -> Result<Self> {
        check_cost(frame, position_cost)?;
        check_cost(frame, orientation_cost)?;
        Ok(Self {
            frame: frame.to_string(),
            position_cost: Vector3::repeat(position_cost),
            orientation_cost: Vector3::repeat(orientation_cost),
            gain: 1.0,
            lm_damping: 0.0,
            transform_target_to_world: None,
        })
    }

    pub fn with_gain(mut self, gain: f64) -> Result<Self> {
        check_gain(&self.frame, gain)?;
        self.gain = gain;
        Ok(self)
    }

    pub fn with_lm_damping(mut self, lm_damping: f64) -> Result<Self> {
        check_cost(&self.frame, lm_damping)?;
        self.lm_damping = lm_damping;
        Ok(self)
    }

    /// Per-axis position cost, in the target frame.
    pub fn set_position_cost(&mut self, cost: Vector3<f64>) -> Result<()> {
        for c in cost.iter() {
            check_cost(&self.frame, *c)?;
        }
        self.position_cost = cost;
        Ok(())
    }

    /// Per-axis orientation cost, in the target frame.
    pub fn set_orientation_cost(&mut self, cost: Vector3<f64>) -> Result<()> {
        for c in cost.iter() {
            check_cost(&self.frame, *c)?;
        }
        self.orientation_cost = cost;
        Ok(())
    }

    pub fn transform_target_to_world(&self) -> Option<&Isometry3<f64>> {
        self.transform_target_to_world.as_ref()
    }

    /// Mutable access for targets updated in place every tick.
    pub fn transform_target_to_world_mut(&mut self) -> Option<&mut Isometry3<f64>> {
        self.transform_target_to_world.as_mut()
    }

    fn transform_frame_to_target(&self, configuration: &Configuration) -> Result<Isometry3<f64>> {
        let target = self.transform_target_to_world.as_ref().ok_or_else(|| Error::InvalidTask {
            reason: format!("no target set for frame \"{}\"", self.frame),
        })?;
        let frame_to_world = configuration.get_transform_frame_to_world(&self.frame)?;
        Ok(target.inv_mul(&frame_to_world))
    }
}

impl Task for FrameTask {
    fn name(&self) -> String {
        format!("FrameTask({})", self.frame)
    }

    fn frame(&self) -> Option<&str> {
        Some(&self.frame)
    }

    fn target(&self) -> Option<Target> {
        self.transform_target_to_world.map(Target::Pose)
    }

    fn set_target(&mut self, target: Target) -> Result<()> {
        match target {
            Target::Pose(transform) => {
                self.transform_target_to_world = Some(transform);
                Ok(())
            }
            Target::Posture(_) => Err(Error::InvalidTask {
                reason: format!("{} expects a pose target", self.name()),
            }),
        }
    }

    fn set_target_from_configuration(&mut self, configuration: &Configuration) -> Result<()> {
        let transform = configuration.get_transform_frame_to_world(&self.frame)?;
        self.set_target(Target::Pose(transform))
    }

    fn compute_error(&self, configuration: &Configuration) -> Result<DVector<f64>> {
        let error = lie::log6(&self.transform_frame_to_target(configuration)?);
        Ok(DVector::from_column_slice(error.as_slice()))
    }

    fn compute_jacobian(&self, configuration: &Configuration) -> Result<DMatrix<f64>> {
        let jlog: Matrix6<f64> = lie::jlog6(&self.transform_frame_to_target(configuration)?);
        let frame_jacobian = configuration.get_frame_jacobian(&self.frame)?;
        Ok(DMatrix::from_column_slice(6, 6, jlog.as_slice()) * frame_jacobian)
    }

    fn cost(&self, _configuration: &Configuration) -> DVector<f64> {
        let (p, o) = (self.position_cost, self.orientation_cost);
        DVector::from_vec(vec![p.x, p.y, p.z, o.x, o.y, o.z])
    }

    fn gain(&self) -> f64 {
        self.gain
    }

    fn lm_damping(&self) -> f64 {
        self.lm_damping
    }
}
