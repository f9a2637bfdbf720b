use crate::errors::{Error, Result};
use crate::solver::kkt::KktBackend;
use crate::solver::panoc::PanocBackend;
use crate::solver::problem::{build_ik, IkSettings, QpProblem};
use crate::spacetime::configuration::Configuration;
use crate::tasks::Task;
use nalgebra::DVector;

pub const DEFAULT_SOLVER: &str = "panoc";

/// A solver for convex quadratic programs in [`QpProblem`] form.
pub trait QpBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Returns the minimizer, or [`Error::Infeasible`] when the constraints
    /// cannot be satisfied.
    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>>;
}

/// Named QP backends.
pub struct QpRegistry {
    backends: Vec<Box<dyn QpBackend>>,
}

impl Default for QpRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(PanocBackend::default()));
        registry.register(Box::new(KktBackend::default()));
        registry
    }
}

impl QpRegistry {
    pub fn empty() -> Self {
        Self { backends: Vec::new() }
    }

    /// Adds a backend, replacing any backend with the same name.
    pub fn register(&mut self, backend: Box<dyn QpBackend>) {
        self.backends.retain(|b| b.name() != backend.name());
        self.backends.push(backend);
    }

    pub fn available_solvers(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.name().to_string()).collect()
    }

    /// [`DEFAULT_SOLVER`] when registered, otherwise the first backend.
    pub fn default_solver(&self) -> Option<&str> {
        self.backends
            .iter()
            .find(|b| b.name() == DEFAULT_SOLVER)
            .or_else(|| self.backends.first())
            .map(|b| b.name())
    }

    pub fn get(&self, name: Option<&str>) -> Result<&dyn QpBackend> {
        let name = match name.or_else(|| self.default_solver()) {
            Some(name) => name,
            None => {
                return Err(Error::SolverUnavailable {
                    name: "<default>".to_string(),
                    available: Vec::new(),
                })
            }
        };
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .map(|b| b.as_ref())
            .ok_or_else(|| Error::SolverUnavailable {
                name: name.to_string(),
                available: self.available_solvers(),
            })
    }
}

/// Solves the differential IK at `configuration` and returns the velocity to
/// integrate over `dt`.
pub fn solve_ik(
    configuration: &Configuration,
    tasks: &[Box<dyn Task + Send>],
    dt: f64,
    registry: &QpRegistry,
    settings: &IkSettings,
) -> Result<DVector<f64>> {
    let backend = registry.get(settings.solver.as_deref())?;
    let problem = build_ik(configuration, tasks, dt, settings)?;
    let displacement = backend.solve(&problem)?;
    if displacement.iter().any(|x| !x.is_finite()) {
        return Err(Error::Solver {
            name: backend.name().to_string(),
            reason: "non-finite solution".to_string(),
        });
    }
    log::trace!("{} solved IK, |Δq| = {:.3e}", backend.name(), displacement.norm());
    Ok(displacement / dt)
}
