use crate::errors::{Error, Result};
use nalgebra::{DVector, Isometry3};

/// Sink receiving configurations and marker frames from the control loop.
///
/// Rendering is best-effort: the loop logs and ignores returned errors.
pub trait Visualizer {
    fn display(&mut self, q: &DVector<f64>) -> Result<()>;

    /// Places the marker `name` at `transform` (frame to world).
    fn set_transform(&mut self, name: &str, transform: &Isometry3<f64>) -> Result<()>;
}

/// Visualizer writing configurations to the debug log.
#[derive(Debug, Default)]
pub struct LogVisualizer {
    pub frames_displayed: usize,
}

impl Visualizer for LogVisualizer {
    fn display(&mut self, q: &DVector<f64>) -> Result<()> {
        if q.iter().any(|x| !x.is_finite()) {
            return Err(Error::Visualization {
                reason: "configuration is not finite".to_string(),
            });
        }
        self.frames_displayed += 1;
        log::debug!("q = {:.4?}", q.as_slice());
        Ok(())
    }

    fn set_transform(&mut self, name: &str, transform: &Isometry3<f64>) -> Result<()> {
        let t = transform.translation.vector;
        log::trace!("{name}: [{:.4}, {:.4}, {:.4}]", t.x, t.y, t.z);
        Ok(())
    }
}
