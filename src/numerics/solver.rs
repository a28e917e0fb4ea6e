use nalgebra::DVector;
use thiserror::Error;

use crate::numerics::Convergence;
use crate::numerics::linear::{LinearSolveError, LinearSolver};
use crate::numerics::timing::{Phase, record, reset_timing, snapshot};
use crate::physics::bc::{BoundaryConditionError, EssentialBCs};
use crate::physics::{AssemblyError, ResidualFunction};

/// What to do when the iteration budget runs out before convergence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NonConvergencePolicy {
    /// Log a warning and return the last iterate.
    #[default]
    Warn,
    /// Return [`SolverError::NonConvergence`].
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NewtonStatus {
    Converged,
    MaxIterationsReached,
}

#[derive(Clone, Copy, Debug)]
pub struct NewtonSolver {
    pub max_iterations: u32,
    pub convergence: Convergence,
    pub on_budget_exhausted: NonConvergencePolicy,
    pub logging: bool,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            max_iterations: 25,
            convergence: Convergence::default(),
            on_budget_exhausted: NonConvergencePolicy::Warn,
            logging: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("initial guess has {found} entries, the system has {expected} unknowns")]
    InitialGuess { expected: usize, found: usize },
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    BoundaryCondition(#[from] BoundaryConditionError),
    #[error("linear solve failed")]
    LinearSolve(#[from] LinearSolveError),
    #[error("Newton's method failed to converge in {iterations} iterations (residual {residual:.3e})")]
    NonConvergence { iterations: u32, residual: f64 },
}

/// One row of the iteration table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IterationRecord {
    pub iteration: u32,
    pub residual: f64,
    /// Residual relative to the first one.
    pub fraction: f64,
    /// Residual reduction against the previous iteration, in percent.
    pub step_percent: f64,
    /// `None` when the iteration stopped before solving for an update.
    pub increment: Option<f64>,
}

#[derive(Clone, Debug)]
pub struct NewtonResult {
    pub solution: DVector<f64>,
    /// Completed linear solves.
    pub iterations: u32,
    pub residual_norm: f64,
    pub increment_norm: f64,
    pub status: NewtonStatus,
    pub history: Vec<IterationRecord>,
}

impl NewtonResult {
    pub fn converged(&self) -> bool {
        self.status == NewtonStatus::Converged
    }
}

impl NewtonSolver {
    /// One Newton step, i.e. a single linear solve.
    pub fn linear() -> Self {
        Self {
            max_iterations: 1,
            ..Self::default()
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_convergence(mut self, convergence: Convergence) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_policy(mut self, policy: NonConvergencePolicy) -> Self {
        self.on_budget_exhausted = policy;
        self
    }

    pub fn with_logging(mut self, logging: bool) -> Self {
        self.logging = logging;
        self
    }

    /// Solve `R(u, z) = 0` for `u` starting from `initial_guess`.
    ///
    /// Iteration `i` solves `J Δu = -R` with the essential rows eliminated;
    /// the prescribed values enter through the first update only.
    pub fn solve<R>(
        &self,
        system: &R,
        constraints: &EssentialBCs,
        linear_solver: &dyn LinearSolver,
        control: &DVector<f64>,
        initial_guess: DVector<f64>,
    ) -> Result<NewtonResult, SolverError>
    where
        R: ResidualFunction + ?Sized,
    {
        let n = system.num_dofs();
        if initial_guess.len() != n {
            return Err(SolverError::InitialGuess {
                expected: n,
                found: initial_guess.len(),
            });
        }
        constraints.validate(n)?;
        reset_timing();

        let mut u = initial_guess;
        let mut history = Vec::new();
        let mut initial_residual = None;
        let mut initial_increment = None;
        let mut previous_residual = None;
        let mut increment_norm = 0.0;
        let mut completed = 0;

        if self.logging {
            log::info!("{n} unknowns, {} constrained", constraints.len());
            log::info!("    Iter   | Residual  |  Fraction |  Step % | Increment");
        }

        for i in 0..self.max_iterations {
            let rhs = self.constrained_rhs(system, constraints, control, &u, i == 0)?;
            let res_norm = self.convergence.norm(&rhs);
            let init = *initial_residual.get_or_insert(res_norm);
            let fraction = if init > 0.0 { res_norm / init } else { 0.0 };
            let step_percent = previous_residual
                .filter(|&prev: &f64| prev > 0.0)
                .map_or(0.0, |prev| (prev - res_norm) / prev * 100.0);
            previous_residual = Some(res_norm);

            if self.convergence.residual_converged(res_norm, init) {
                let row = IterationRecord {
                    iteration: i,
                    residual: res_norm,
                    fraction,
                    step_percent,
                    increment: None,
                };
                self.log_iteration(&row);
                history.push(row);
                return Ok(self.finish(u, completed, res_norm, increment_norm, NewtonStatus::Converged, history));
            }

            let mut jacobian = system.gradient_u(&u, control)?;
            constraints.apply_to_matrix(&mut jacobian)?;
            let mut delta = DVector::zeros(n);
            record(Phase::LinearSolve, || linear_solver.solve(&jacobian, &mut delta, &rhs, false))?;
            u += &delta;
            completed = i + 1;

            increment_norm = self.convergence.norm(&delta);
            let init_increment = *initial_increment.get_or_insert(increment_norm);
            let row = IterationRecord {
                iteration: i,
                residual: res_norm,
                fraction,
                step_percent,
                increment: Some(increment_norm),
            };
            self.log_iteration(&row);
            history.push(row);

            if self.convergence.increment_converged(increment_norm, init_increment) {
                let rhs = self.constrained_rhs(system, constraints, control, &u, false)?;
                let res_norm = self.convergence.norm(&rhs);
                return Ok(self.finish(u, completed, res_norm, increment_norm, NewtonStatus::Converged, history));
            }
        }

        // budget spent: judge the final iterate by its residual
        let rhs = self.constrained_rhs(system, constraints, control, &u, completed == 0)?;
        let res_norm = self.convergence.norm(&rhs);
        let init = initial_residual.unwrap_or(res_norm);
        if self.convergence.residual_converged(res_norm, init) {
            return Ok(self.finish(u, completed, res_norm, increment_norm, NewtonStatus::Converged, history));
        }

        match self.on_budget_exhausted {
            NonConvergencePolicy::Fail => Err(SolverError::NonConvergence {
                iterations: completed,
                residual: res_norm,
            }),
            NonConvergencePolicy::Warn => {
                log::warn!(
                    "Newton stopped after {completed} iterations without converging \
                     (residual {res_norm:.3e}); continuing with the last iterate"
                );
                Ok(self.finish(
                    u,
                    completed,
                    res_norm,
                    increment_norm,
                    NewtonStatus::MaxIterationsReached,
                    history,
                ))
            }
        }
    }

    /// `-R(u)` with the essential rows replaced by the distance to their
    /// prescribed values on the first iteration and by zero afterwards.
    fn constrained_rhs<R>(
        &self,
        system: &R,
        constraints: &EssentialBCs,
        control: &DVector<f64>,
        u: &DVector<f64>,
        first: bool,
    ) -> Result<DVector<f64>, SolverError>
    where
        R: ResidualFunction + ?Sized,
    {
        let mut rhs = -system.value(u, control)?;
        let scale = if first { 1.0 } else { 0.0 };
        constraints.apply_to_vector(&mut rhs, scale)?;
        if first {
            // the initial guess may already carry part of the prescribed value
            for (&dof, &value) in constraints.dofs().iter().zip(constraints.values()) {
                rhs[dof] = value - u[dof];
            }
        }
        Ok(rhs)
    }

    fn finish(
        &self,
        solution: DVector<f64>,
        iterations: u32,
        residual_norm: f64,
        increment_norm: f64,
        status: NewtonStatus,
        history: Vec<IterationRecord>,
    ) -> NewtonResult {
        if self.logging {
            log::info!("Newton finished after {iterations} iterations: {status:?}, residual {residual_norm:.3e}");
            snapshot().log_summary();
        }
        NewtonResult {
            solution,
            iterations,
            residual_norm,
            increment_norm,
            status,
            history,
        }
    }

    fn log_iteration(&self, row: &IterationRecord) {
        if !self.logging {
            return;
        }
        let IterationRecord {
            iteration: i,
            residual,
            fraction,
            step_percent,
            increment,
        } = *row;
        let max_iter = self.max_iterations;
        match increment {
            Some(inc) => log::info!(
                "{i:>4}/{max_iter} | {residual:>8.3e} | {fraction:>9.3e} | {step_percent:>6.2}% | {inc:>8.3e}"
            ),
            None => log::info!("{i:>4}/{max_iter} | {residual:>8.3e} | {fraction:>9.3e} | {step_percent:>6.2}% |"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear::DenseLuSolver;
    use crate::numerics::sparse::assemble_csr;
    use approx::assert_relative_eq;
    use nalgebra_sparse::CsrMatrix;

    /// Decoupled `R_i = u_i³ + u_i - b_i`.
    struct Cubic {
        b: DVector<f64>,
    }

    impl ResidualFunction for Cubic {
        fn num_dofs(&self) -> usize {
            self.b.len()
        }

        fn num_controls(&self) -> usize {
            0
        }

        fn num_config(&self) -> usize {
            0
        }

        fn value(&self, state: &DVector<f64>, _control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
            Ok(state.map(|u| u * u * u + u) - &self.b)
        }

        fn gradient_u(&self, state: &DVector<f64>, _control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
            let triplets: Vec<_> = state.iter().enumerate().map(|(i, u)| (i, i, 3.0 * u * u + 1.0)).collect();
            Ok(assemble_csr(self.b.len(), self.b.len(), &triplets, true))
        }

        fn gradient_z(&self, _state: &DVector<f64>, _control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
            Ok(CsrMatrix::zeros(self.b.len(), 0))
        }

        fn gradient_x(&self, _state: &DVector<f64>, _control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
            Ok(CsrMatrix::zeros(self.b.len(), 0))
        }
    }

    fn cubic() -> Cubic {
        // roots 1 and 2
        Cubic {
            b: DVector::from_vec(vec![2.0, 10.0]),
        }
    }

    #[test]
    fn converges_to_the_root() {
        let solver = NewtonSolver::default().with_logging(false);
        let result = solver
            .solve(&cubic(), &EssentialBCs::default(), &DenseLuSolver, &DVector::zeros(0), DVector::zeros(2))
            .unwrap();
        assert!(result.converged());
        assert!(result.iterations < 15);
        assert_relative_eq!(result.solution[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(result.solution[1], 2.0, epsilon = 1e-8);
        assert_eq!(result.history.first().map(|r| r.residual), Some(DVector::from_vec(vec![2.0, 10.0]).norm()));
    }

    #[test]
    fn prescribed_dofs_are_honoured() {
        let solver = NewtonSolver::default().with_logging(false);
        let bcs = EssentialBCs::new(vec![1], vec![0.5]).unwrap();
        let result = solver
            .solve(&cubic(), &bcs, &DenseLuSolver, &DVector::zeros(0), DVector::zeros(2))
            .unwrap();
        assert!(result.converged());
        assert_eq!(result.solution[1], 0.5);
        assert_relative_eq!(result.solution[0], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn exhausted_budget_follows_the_policy() {
        let solver = NewtonSolver::default().with_max_iterations(2).with_logging(false);
        let warned = solver
            .solve(&cubic(), &EssentialBCs::default(), &DenseLuSolver, &DVector::zeros(0), DVector::zeros(2))
            .unwrap();
        assert_eq!(warned.status, NewtonStatus::MaxIterationsReached);
        assert_eq!(warned.iterations, 2);
        assert!(warned.residual_norm > 1e-3);

        let failing = solver.with_policy(NonConvergencePolicy::Fail);
        let err = failing
            .solve(&cubic(), &EssentialBCs::default(), &DenseLuSolver, &DVector::zeros(0), DVector::zeros(2))
            .unwrap_err();
        assert!(matches!(err, SolverError::NonConvergence { iterations: 2, .. }));
    }

    #[test]
    fn wrong_initial_guess_is_rejected() {
        let err = NewtonSolver::default()
            .solve(&cubic(), &EssentialBCs::default(), &DenseLuSolver, &DVector::zeros(0), DVector::zeros(3))
            .unwrap_err();
        assert!(matches!(err, SolverError::InitialGuess { expected: 2, found: 3 }));
    }
}
