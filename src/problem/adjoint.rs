//! Discrete adjoint gradients.
//!
//! For a criterion `f(u, z)` constrained by `R(u, z) = 0`, the total
//! derivative is `df/dz = ∂f/∂z + (∂R/∂z)ᵀ λ` with `(∂R/∂u)ᵀ λ = -∂f/∂u`.
//! The configuration gradient uses the same `λ` with `∂R/∂x`, so an adjoint
//! computed for one request is reused by the next one as long as the
//! criterion, control and states are unchanged.

use nalgebra::DVector;

use crate::numerics::linear::LinearSolver;
use crate::numerics::sparse::transpose_mul_add;
use crate::numerics::timing::{Phase, record};
use crate::physics::bc::EssentialBCs;
use crate::physics::{ResidualFunction, check_len};

use super::criterion::Criterion;
use super::{ProblemError, Solution};

/// How the last adjoint was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdjointSource {
    /// `λ = -u`, no linear solve.
    SelfAdjoint,
    Solved,
    Cached,
}

/// Collaborators the engine borrows for one gradient request.
#[derive(Clone, Copy)]
pub struct AdjointContext<'a> {
    pub residual: &'a dyn ResidualFunction,
    pub constraints: &'a EssentialBCs,
    pub linear_solver: &'a dyn LinearSolver,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Sensitivity {
    Control,
    Configuration,
}

struct AdjointCache {
    criterion: String,
    control: DVector<f64>,
    states: Vec<DVector<f64>>,
    adjoints: Vec<DVector<f64>>,
}

impl AdjointCache {
    fn matches(&self, criterion: &str, control: &DVector<f64>, solution: &Solution) -> bool {
        self.criterion == criterion && &self.control == control && self.states.as_slice() == solution.states()
    }
}

#[derive(Default)]
pub struct AdjointEngine {
    cache: Option<AdjointCache>,
    last_source: Option<AdjointSource>,
}

impl AdjointEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_source(&self) -> Option<AdjointSource> {
        self.last_source
    }

    pub fn clear(&mut self) {
        self.cache = None;
    }

    /// Total derivative of `criterion` with respect to the control.
    pub fn criterion_gradient(
        &mut self,
        context: AdjointContext,
        name: &str,
        criterion: &dyn Criterion,
        self_adjoint: bool,
        solution: &Solution,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, ProblemError> {
        self.gradient(context, name, criterion, self_adjoint, solution, control, Sensitivity::Control)
    }

    /// Total derivative of `criterion` with respect to the nodal coordinates.
    pub fn criterion_gradient_x(
        &mut self,
        context: AdjointContext,
        name: &str,
        criterion: &dyn Criterion,
        self_adjoint: bool,
        solution: &Solution,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, ProblemError> {
        self.gradient(context, name, criterion, self_adjoint, solution, control, Sensitivity::Configuration)
    }

    #[allow(clippy::too_many_arguments)]
    fn gradient(
        &mut self,
        context: AdjointContext,
        name: &str,
        criterion: &dyn Criterion,
        self_adjoint: bool,
        solution: &Solution,
        control: &DVector<f64>,
        wrt: Sensitivity,
    ) -> Result<DVector<f64>, ProblemError> {
        if solution.is_empty() {
            return Err(ProblemError::EmptySolution);
        }
        let residual = context.residual;
        check_len("control", residual.num_controls(), control.len())?;

        let (mut total, columns) = match wrt {
            Sensitivity::Control => (criterion.gradient_z(solution, control)?, residual.num_controls()),
            Sensitivity::Configuration => (criterion.gradient_x(solution, control)?, residual.num_config()),
        };
        check_len("criterion partial gradient", columns, total.len())?;

        let adjoints = self.adjoints(context, name, criterion, self_adjoint, solution, control)?;
        for (cycle, lambda) in adjoints.iter().enumerate() {
            let state = solution.state(cycle)?;
            let operator = match wrt {
                Sensitivity::Control => residual.gradient_z(state, control)?,
                Sensitivity::Configuration => residual.gradient_x(state, control)?,
            };
            check_len("residual sensitivity rows", residual.num_dofs(), operator.nrows())?;
            check_len("residual sensitivity columns", columns, operator.ncols())?;
            total = transpose_mul_add(&operator, lambda, &total);
        }
        Ok(total)
    }

    /// One adjoint per cycle of `solution`.
    fn adjoints(
        &mut self,
        context: AdjointContext,
        name: &str,
        criterion: &dyn Criterion,
        self_adjoint: bool,
        solution: &Solution,
        control: &DVector<f64>,
    ) -> Result<Vec<DVector<f64>>, ProblemError> {
        if self_adjoint {
            log::debug!("criterion '{name}': self-adjoint, λ = -u");
            self.last_source = Some(AdjointSource::SelfAdjoint);
            return Ok(solution.states().iter().map(|u| -u).collect());
        }

        if let Some(cache) = self.cache.as_ref().filter(|c| c.matches(name, control, solution)) {
            log::debug!("criterion '{name}': reusing cached adjoint");
            self.last_source = Some(AdjointSource::Cached);
            return Ok(cache.adjoints.clone());
        }

        let residual = context.residual;
        let n = residual.num_dofs();
        let homogeneous = context.constraints.homogeneous();
        let mut adjoints = Vec::with_capacity(solution.num_cycles());

        for cycle in 0..solution.num_cycles() {
            let state = solution.state(cycle)?;
            let mut rhs = -criterion.gradient_u(solution, control, cycle)?;
            check_len("criterion state gradient", n, rhs.len())?;

            let mut operator = residual.gradient_u(state, control)?.transpose();
            homogeneous.apply(&mut operator, &mut rhs, 1.0)?;

            let mut lambda = DVector::zeros(n);
            record(Phase::AdjointSolve, || {
                context.linear_solver.solve(&operator, &mut lambda, &rhs, true)
            })?;
            adjoints.push(lambda);
        }
        log::debug!("criterion '{name}': solved {} adjoint system(s)", adjoints.len());

        self.cache = Some(AdjointCache {
            criterion: name.to_string(),
            control: control.clone(),
            states: solution.states().to_vec(),
            adjoints: adjoints.clone(),
        });
        self.last_source = Some(AdjointSource::Solved);
        Ok(adjoints)
    }
}
