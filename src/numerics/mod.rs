pub mod dual;
pub mod evaluation;
pub mod linear;
pub mod solver;
pub mod sparse;
pub mod timing;

use nalgebra::DVector;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tolerance {
    Absolute(f64),
    Relative(f64),
    Combined(f64, f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceMetric {
    L2Norm,
    MaxNorm,
}

/// Convergence criteria for iterative solvers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConvergenceCriteria {
    Residual,
    Update,
    /// Stop as soon as either the residual or the increment is small.
    Either,
}

#[derive(Clone, Copy, Debug)]
pub struct Convergence {
    pub criteria: ConvergenceCriteria,
    pub tolerance: Tolerance,
    pub metric: ConvergenceMetric,
}

impl Default for Convergence {
    fn default() -> Self {
        Self {
            criteria: ConvergenceCriteria::Either,
            tolerance: Tolerance::Combined(1e-12, 1e-10),
            metric: ConvergenceMetric::L2Norm,
        }
    }
}

impl Convergence {
    pub fn norm(&self, vector: &DVector<f64>) -> f64 {
        match self.metric {
            ConvergenceMetric::L2Norm => vector.norm(),
            ConvergenceMetric::MaxNorm => vector.amax(),
        }
    }

    pub fn check_tolerance(&self, norm: f64, initial_norm: f64) -> bool {
        let relative = if initial_norm > 0.0 { norm / initial_norm } else { 0.0 };
        match self.tolerance {
            Tolerance::Absolute(tol) => norm < tol,
            Tolerance::Relative(tol) => relative < tol,
            Tolerance::Combined(abs_tol, rel_tol) => norm < abs_tol || relative < rel_tol,
        }
    }

    pub fn residual_converged(&self, norm: f64, initial_norm: f64) -> bool {
        match self.criteria {
            ConvergenceCriteria::Residual | ConvergenceCriteria::Either => {
                self.check_tolerance(norm, initial_norm)
            }
            ConvergenceCriteria::Update => false,
        }
    }

    pub fn increment_converged(&self, norm: f64, initial_norm: f64) -> bool {
        match self.criteria {
            ConvergenceCriteria::Update | ConvergenceCriteria::Either => {
                self.check_tolerance(norm, initial_norm)
            }
            ConvergenceCriteria::Residual => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_tolerance_handles_zero_initial_norm() {
        let conv = Convergence {
            tolerance: Tolerance::Relative(1e-6),
            ..Default::default()
        };
        assert!(conv.check_tolerance(0.0, 0.0));
        assert!(!conv.check_tolerance(1.0, 10.0));
        assert!(conv.check_tolerance(1e-8, 10.0));
    }

    #[test]
    fn criteria_select_which_norm_counts() {
        let conv = Convergence {
            criteria: ConvergenceCriteria::Residual,
            tolerance: Tolerance::Absolute(1e-3),
            metric: ConvergenceMetric::MaxNorm,
        };
        assert!(conv.residual_converged(1e-4, 1.0));
        assert!(!conv.increment_converged(1e-4, 1.0));
        assert_eq!(conv.norm(&DVector::from_vec(vec![1.0, -4.0, 2.0])), 4.0);
    }
}
