//! Outer surface used by an optimizer: solve for the state, evaluate named
//! criteria and their adjoint gradients.

pub mod adjoint;
pub mod criterion;

use std::collections::HashMap;

use nalgebra::DVector;
use thiserror::Error;

use crate::numerics::linear::{DenseLuSolver, LinearSolveError, LinearSolver};
use crate::numerics::solver::{NewtonResult, NewtonSolver, SolverError};
use crate::physics::bc::{BoundaryConditionError, EssentialBCs};
use crate::physics::{AssemblyError, ResidualFunction};

use adjoint::{AdjointContext, AdjointEngine, AdjointSource};
use criterion::Criterion;

#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("unknown criterion '{0}'")]
    UnknownCriterion(String),
    #[error("no state has been computed yet")]
    EmptySolution,
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),
    #[error(transparent)]
    Assembly(#[from] AssemblyError),
    #[error(transparent)]
    BoundaryCondition(#[from] BoundaryConditionError),
    #[error(transparent)]
    Solver(#[from] SolverError),
    #[error("adjoint solve failed")]
    LinearSolve(#[from] LinearSolveError),
}

/// Solved states, one per cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Solution {
    states: Vec<DVector<f64>>,
}

impl Solution {
    pub fn new(states: Vec<DVector<f64>>) -> Self {
        Self { states }
    }

    pub fn single(state: DVector<f64>) -> Self {
        Self { states: vec![state] }
    }

    pub fn num_cycles(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, cycle: usize) -> Result<&DVector<f64>, AssemblyError> {
        self.states.get(cycle).ok_or(AssemblyError::MissingCycle {
            cycle,
            available: self.states.len(),
        })
    }

    pub fn states(&self) -> &[DVector<f64>] {
        &self.states
    }

    pub fn push(&mut self, state: DVector<f64>) {
        self.states.push(state);
    }
}

struct CriterionEntry {
    criterion: Box<dyn Criterion>,
    self_adjoint: bool,
}

pub struct ProblemBuilder<R: ResidualFunction> {
    residual: R,
    constraints: Option<EssentialBCs>,
    newton: NewtonSolver,
    linear_solver: Box<dyn LinearSolver>,
    criteria: HashMap<String, CriterionEntry>,
}

impl<R: ResidualFunction> ProblemBuilder<R> {
    pub fn essential_bcs(mut self, constraints: EssentialBCs) -> Self {
        self.constraints = Some(constraints);
        self
    }

    pub fn newton(mut self, newton: NewtonSolver) -> Self {
        self.newton = newton;
        self
    }

    pub fn linear_solver(mut self, solver: impl LinearSolver + 'static) -> Self {
        self.linear_solver = Box::new(solver);
        self
    }

    /// Register a criterion. `self_adjoint` declares that `λ = -u` solves
    /// its adjoint system, which holds for the internal energy of a linear
    /// symmetric physics with homogeneous essential conditions.
    pub fn criterion(mut self, name: impl Into<String>, criterion: impl Criterion + 'static, self_adjoint: bool) -> Self {
        self.criteria.insert(
            name.into(),
            CriterionEntry {
                criterion: Box::new(criterion),
                self_adjoint,
            },
        );
        self
    }

    pub fn build(self) -> Result<Problem<R>, ProblemError> {
        let constraints = self.constraints.ok_or(ProblemError::MissingParameter("essential boundary conditions"))?;
        constraints.validate(self.residual.num_dofs())?;
        Ok(Problem {
            residual: self.residual,
            constraints,
            newton: self.newton,
            linear_solver: self.linear_solver,
            criteria: self.criteria,
            adjoint: AdjointEngine::new(),
            solution: Solution::default(),
            last_newton: None,
        })
    }
}

pub struct Problem<R: ResidualFunction> {
    residual: R,
    constraints: EssentialBCs,
    newton: NewtonSolver,
    linear_solver: Box<dyn LinearSolver>,
    criteria: HashMap<String, CriterionEntry>,
    adjoint: AdjointEngine,
    solution: Solution,
    last_newton: Option<NewtonResult>,
}

impl<R: ResidualFunction> Problem<R> {
    pub fn builder(residual: R) -> ProblemBuilder<R> {
        ProblemBuilder {
            residual,
            constraints: None,
            newton: NewtonSolver::default(),
            linear_solver: Box::new(DenseLuSolver),
            criteria: HashMap::new(),
        }
    }

    pub fn residual(&self) -> &R {
        &self.residual
    }

    pub fn constraints(&self) -> &EssentialBCs {
        &self.constraints
    }

    /// The states computed by the last [`solution`](Self::solution) call.
    pub fn current_solution(&self) -> &Solution {
        &self.solution
    }

    pub fn last_newton(&self) -> Option<&NewtonResult> {
        self.last_newton.as_ref()
    }

    pub fn last_adjoint_source(&self) -> Option<AdjointSource> {
        self.adjoint.last_source()
    }

    pub fn clear_adjoint_cache(&mut self) {
        self.adjoint.clear();
    }

    pub fn criterion_names(&self) -> impl Iterator<Item = &str> {
        self.criteria.keys().map(String::as_str)
    }

    pub fn add_criterion(&mut self, name: impl Into<String>, criterion: impl Criterion + 'static, self_adjoint: bool) {
        let name = name.into();
        // a cached adjoint may belong to the criterion being replaced
        if self.criteria.contains_key(&name) {
            self.adjoint.clear();
        }
        self.criteria.insert(
            name,
            CriterionEntry {
                criterion: Box::new(criterion),
                self_adjoint,
            },
        );
    }

    /// Solve `R(u, z) = 0` from a zero initial guess and store the state.
    pub fn solution(&mut self, control: &DVector<f64>) -> Result<&Solution, ProblemError> {
        let initial = DVector::zeros(self.residual.num_dofs());
        let result = self.newton.solve(
            &self.residual,
            &self.constraints,
            self.linear_solver.as_ref(),
            control,
            initial,
        )?;
        self.solution = Solution::single(result.solution.clone());
        self.last_newton = Some(result);
        Ok(&self.solution)
    }

    /// Value of a criterion at the stored solution.
    pub fn criterion_value(&self, control: &DVector<f64>, name: &str) -> Result<f64, ProblemError> {
        let entry = self.entry(name)?;
        if self.solution.is_empty() {
            return Err(ProblemError::EmptySolution);
        }
        Ok(entry.criterion.value(&self.solution, control)?)
    }

    /// Total derivative of a criterion with respect to the control.
    pub fn criterion_gradient(&mut self, control: &DVector<f64>, name: &str) -> Result<DVector<f64>, ProblemError> {
        let entry = self
            .criteria
            .get(name)
            .ok_or_else(|| ProblemError::UnknownCriterion(name.to_string()))?;
        let context = AdjointContext {
            residual: &self.residual,
            constraints: &self.constraints,
            linear_solver: self.linear_solver.as_ref(),
        };
        self.adjoint.criterion_gradient(
            context,
            name,
            entry.criterion.as_ref(),
            entry.self_adjoint,
            &self.solution,
            control,
        )
    }

    /// Total derivative of a criterion with respect to the nodal coordinates.
    pub fn criterion_gradient_x(&mut self, control: &DVector<f64>, name: &str) -> Result<DVector<f64>, ProblemError> {
        let entry = self
            .criteria
            .get(name)
            .ok_or_else(|| ProblemError::UnknownCriterion(name.to_string()))?;
        let context = AdjointContext {
            residual: &self.residual,
            constraints: &self.constraints,
            linear_solver: self.linear_solver.as_ref(),
        };
        self.adjoint.criterion_gradient_x(
            context,
            name,
            entry.criterion.as_ref(),
            entry.self_adjoint,
            &self.solution,
            control,
        )
    }

    fn entry(&self, name: &str) -> Result<&CriterionEntry, ProblemError> {
        self.criteria
            .get(name)
            .ok_or_else(|| ProblemError::UnknownCriterion(name.to_string()))
    }
}
