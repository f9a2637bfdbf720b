use crate::errors::{Error, Result};
use crate::solver::backend::QpBackend;
use crate::solver::problem::QpProblem;
use nalgebra::{DMatrix, DVector};

/// Dense backend solving the KKT system of the equality-constrained problem,
/// with an active-set loop over the box bounds.
///
/// General inequality rows are not supported.
#[derive(Debug, Clone)]
pub struct KktBackend {
    pub max_iter: usize,
    pub tolerance: f64,
}

impl Default for KktBackend {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Free,
    Lower,
    Upper,
}

impl KktBackend {
    fn failure(&self, reason: &str) -> Error {
        Error::Solver {
            name: self.name().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Solves with every non-free coordinate pinned to its bound. Returns the
    /// primal solution and the equality multipliers.
    fn solve_pinned(
        &self,
        problem: &QpProblem,
        active: &[Bound],
        lb: &DVector<f64>,
        ub: &DVector<f64>,
    ) -> Result<(DVector<f64>, DVector<f64>)> {
        let n = problem.dim();
        let free: Vec<usize> = (0..n).filter(|&i| active[i] == Bound::Free).collect();
        let mut x = DVector::zeros(n);
        for i in 0..n {
            match active[i] {
                Bound::Lower => x[i] = lb[i],
                Bound::Upper => x[i] = ub[i],
                Bound::Free => {}
            }
        }
        let m = problem.equality.as_ref().map_or(0, |(a, _)| a.nrows());
        let nf = free.len();

        // [P_ff A_fᵀ; A_f 0] [x_f; λ] = [-q_f - P_fp x_p; b - A_p x_p]
        let mut kkt = DMatrix::zeros(nf + m, nf + m);
        let mut rhs = DVector::zeros(nf + m);
        let p_x = &problem.p * &x;
        for (r, &i) in free.iter().enumerate() {
            for (c, &j) in free.iter().enumerate() {
                kkt[(r, c)] = problem.p[(i, j)];
            }
            rhs[r] = -problem.q[i] - p_x[i];
        }
        if let Some((a, b)) = &problem.equality {
            let a_x = a * &x;
            for k in 0..m {
                for (c, &j) in free.iter().enumerate() {
                    kkt[(nf + k, c)] = a[(k, j)];
                    kkt[(c, nf + k)] = a[(k, j)];
                }
                rhs[nf + k] = b[k] - a_x[k];
            }
        }
        if nf + m == 0 {
            return Ok((x, DVector::zeros(0)));
        }
        let solution = kkt
            .lu()
            .solve(&rhs)
            .ok_or_else(|| self.failure("singular KKT system"))?;
        for (r, &i) in free.iter().enumerate() {
            x[i] = solution[r];
        }
        Ok((x, solution.rows(nf, m).into_owned()))
    }
}

impl QpBackend for KktBackend {
    fn name(&self) -> &str {
        "kkt"
    }

    fn solve(&self, problem: &QpProblem) -> Result<DVector<f64>> {
        if problem.inequality.is_some() {
            return Err(self.failure("general inequality constraints are not supported"));
        }
        problem.check_bounds()?;
        let n = problem.dim();
        let (lb, ub) = problem.box_bounds();
        let mut active = vec![Bound::Free; n];

        for _ in 0..self.max_iter {
            let (x, lambda) = self.solve_pinned(problem, &active, &lb, &ub)?;

            // most violated free coordinate gets pinned
            let violated = (0..n)
                .filter(|&i| active[i] == Bound::Free)
                .map(|i| (i, lb[i] - x[i], x[i] - ub[i]))
                .filter(|&(_, below, above)| below > self.tolerance || above > self.tolerance)
                .max_by(|a, b| a.1.max(a.2).total_cmp(&b.1.max(b.2)));
            if let Some((i, below, _)) = violated {
                active[i] = if below > 0.0 { Bound::Lower } else { Bound::Upper };
                continue;
            }

            // pinned coordinates whose multiplier has the wrong sign are released
            let mut grad = &problem.p * &x + &problem.q;
            if let Some((a, _)) = &problem.equality {
                grad += a.transpose() * &lambda;
            }
            let release = (0..n)
                .filter_map(|i| match active[i] {
                    Bound::Lower if grad[i] < -self.tolerance => Some((i, -grad[i])),
                    Bound::Upper if grad[i] > self.tolerance => Some((i, grad[i])),
                    _ => None,
                })
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match release {
                Some((i, _)) => active[i] = Bound::Free,
                None => {
                    if let Some((a, b)) = &problem.equality {
                        let residual = (a * &x - b).amax();
                        if residual > 1e3 * self.tolerance.max(1e-9) {
                            return Err(Error::Infeasible {
                                reason: format!("equality constraints violated by {residual:.3e} within the box"),
                            });
                        }
                    }
                    return Ok(x);
                }
            }
        }
        Err(self.failure("active set did not settle"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn equality_constrained_minimum() {
        // minimize ½|x|² s.t. x0 + x1 = 1
        let problem = QpProblem::new(DMatrix::identity(2, 2), DVector::zeros(2))
            .unwrap()
            .with_equality(DMatrix::from_row_slice(1, 2, &[1.0, 1.0]), DVector::from_element(1, 1.0))
            .unwrap();
        let x = KktBackend::default().solve(&problem).unwrap();
        assert_relative_eq!(x, DVector::from_vec(vec![0.5, 0.5]), epsilon = 1e-12);
    }

    #[test]
    fn box_bounds_become_active() {
        // unconstrained minimum at (2, -3)
        let problem = QpProblem::new(DMatrix::identity(2, 2), DVector::from_vec(vec![-2.0, 3.0]))
            .unwrap()
            .with_bounds(DVector::from_element(2, -1.0), DVector::from_element(2, 1.0))
            .unwrap();
        let x = KktBackend::default().solve(&problem).unwrap();
        assert_relative_eq!(x, DVector::from_vec(vec![1.0, -1.0]), epsilon = 1e-12);
    }

    #[test]
    fn rejects_inequality_rows() {
        let problem = QpProblem::new(DMatrix::identity(1, 1), DVector::zeros(1))
            .unwrap()
            .with_inequality(DMatrix::identity(1, 1), DVector::zeros(1))
            .unwrap();
        assert!(matches!(KktBackend::default().solve(&problem), Err(Error::Solver { .. })));
    }
}
