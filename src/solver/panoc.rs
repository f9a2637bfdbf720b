use crate::errors::{Error, Result};
use crate::solver::backend::QpBackend;
use crate::solver::problem::QpProblem;
use nalgebra::DVector;
use optimization_engine::{constraints::*, panoc::*, *};

/// QP backend running PANOC from `optimization_engine`.
///
/// Box bounds are handled as the PANOC constraint set. Inequality and
/// equality rows are folded into the cost as quadratic penalties, and the
/// solution is rejected as infeasible if they remain violated. An iterate
/// that did not reach `tolerance` within `max_iter` is an error.
#[derive(Debug, Clone)]
pub struct PanocBackend {
    pub max_iter: usize,
    pub tolerance: f64,
    pub lbfgs_memory: usize,
    pub penalty: f64,
    pub feasibility_tolerance: f64,
}

impl Default for PanocBackend {
    fn default() -> Self {
        Self {
            max_iter: 500,
            tolerance: 1e-10,
            lbfgs_memory: 10,
            penalty: 1e6,
            feasibility_tolerance: 1e-5,
        }
    }
}

impl PanocBackend {
    fn penalized_cost(&self, problem: &QpProblem, x: &DVector<f64>) -> f64 {
        let mut cost = problem.objective(x);
        if let Some((g, h)) = &problem.inequality {
            let excess: f64 = (g * x - h).iter().map(|r| r.max(0.0).powi(2)).sum();
            cost += 0.5 * self.penalty * excess;
        }
        if let Some((a, b)) = &problem.equality {
            cost += 0.5 * self.penalty * (a * x - b).norm_squared();
        }
        cost
    }

    fn penalized_gradient(&self, problem: &QpProblem, x: &DVector<f64>) -> DVector<f64> {
        let mut grad = &problem.p * x + &problem.q;
        if let Some((g, h)) = &problem.inequality {
            let excess = (g * x - h).map(|r| r.max(0.0));
            grad += g.transpose() * excess * self.penalty;
        }
        if let Some((a, b)) = &problem.equality {
            grad += a.transpose() * (a * x - b) * self.penalty;
        }
        grad
    }
}

impl QpBackend for PanocBackend {
    fn name(&self) -> &str {
        "panoc"
    }

    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>> {
        problem.check_bounds()?;
        let dim = problem.dim();
        let (lb, ub) = problem.box_bounds();

        let df = |u: &[f64], grad: &mut [f64]| -> std::result::Result<(), SolverError> {
            let my_grad = self.penalized_gradient(problem, &DVector::from_column_slice(u));
            grad.copy_from_slice(my_grad.as_slice());
            Ok(())
        };
        let f = |u: &[f64], c: &mut f64| -> std::result::Result<(), SolverError> {
            *c = self.penalized_cost(problem, &DVector::from_column_slice(u));
            Ok(())
        };

        let bounds = Rectangle::new(Option::from(lb.as_slice()), Option::from(ub.as_slice()));
        let panoc_problem = Problem::new(&bounds, df, f);
        let mut cache = PANOCCache::new(dim, 1e-14, self.lbfgs_memory);
        let mut panoc = PANOCOptimizer::new(panoc_problem, &mut cache)
            .with_max_iter(self.max_iter)
            .with_tolerance(self.tolerance);

        // start from the point of the box closest to zero
        let mut x: Vec<f64> = (0..dim).map(|i| 0.0_f64.max(lb[i]).min(ub[i])).collect();
        let status = panoc.solve(&mut x).map_err(|e| Error::Solver {
            name: self.name().to_string(),
            reason: format!("{e:?}"),
        })?;
        let x = DVector::from_vec(x);
        let violation = problem.max_violation(&x);
        if violation > self.feasibility_tolerance {
            return Err(Error::Infeasible {
                reason: format!("constraints violated by {violation:.3e} at the penalized optimum"),
            });
        }
        if !status.has_converged() {
            log::warn!(
                "PANOC stopped after {} iterations without converging (cost {:.3e})",
                status.iterations(),
                status.cost_value()
            );
            return Err(Error::Solver {
                name: self.name().to_string(),
                reason: format!("not converged after {} iterations", status.iterations()),
            });
        }
        Ok(x)
    }
}
