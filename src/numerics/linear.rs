//! Linear-solver collaborators.
//!
//! The Newton loop and the adjoint engine only see [`LinearSolver`]. The
//! default [`DenseLuSolver`] factors a dense copy of the operator and is meant
//! for small and medium problems; the `kryst` feature adds a Jacobi-scaled
//! BiCGStab solver for larger sparse systems.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

use crate::numerics::sparse::to_dense;

#[derive(Debug, Error)]
pub enum LinearSolveError {
    #[error("matrix is singular")]
    Singular,
    #[error("linear system sizes disagree: matrix {rows}x{cols}, rhs {rhs}, unknown {unknown}")]
    Shape {
        rows: usize,
        cols: usize,
        rhs: usize,
        unknown: usize,
    },
    #[error("linear solve produced non-finite values")]
    NonFinite,
    #[error("iterative solver failed: {0}")]
    Krylov(String),
}

/// Solves `A x = b`. `is_adjoint` marks solves with an already transposed
/// operator, for solvers that treat adjoint systems differently.
pub trait LinearSolver: Send + Sync {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        unknown: &mut DVector<f64>,
        rhs: &DVector<f64>,
        is_adjoint: bool,
    ) -> Result<(), LinearSolveError>;
}

pub(crate) fn check_shape(
    matrix: &CsrMatrix<f64>,
    unknown: &DVector<f64>,
    rhs: &DVector<f64>,
) -> Result<(), LinearSolveError> {
    let n = matrix.nrows();
    if matrix.ncols() != n || rhs.len() != n || unknown.len() != n {
        return Err(LinearSolveError::Shape {
            rows: n,
            cols: matrix.ncols(),
            rhs: rhs.len(),
            unknown: unknown.len(),
        });
    }
    if !rhs.iter().all(|v| v.is_finite()) {
        return Err(LinearSolveError::NonFinite);
    }
    Ok(())
}

/// Direct LU factorisation of a dense copy of the operator.
#[derive(Clone, Copy, Debug, Default)]
pub struct DenseLuSolver;

impl LinearSolver for DenseLuSolver {
    fn solve(
        &self,
        matrix: &CsrMatrix<f64>,
        unknown: &mut DVector<f64>,
        rhs: &DVector<f64>,
        is_adjoint: bool,
    ) -> Result<(), LinearSolveError> {
        check_shape(matrix, unknown, rhs)?;
        log::trace!(
            "dense LU solve: {} unknowns, {} nonzeros, adjoint = {is_adjoint}",
            rhs.len(),
            matrix.nnz()
        );

        let x = to_dense(matrix)
            .lu()
            .solve(rhs)
            .ok_or(LinearSolveError::Singular)?;

        if !x.iter().all(|v| v.is_finite()) {
            return Err(LinearSolveError::NonFinite);
        }
        unknown.copy_from(&x);
        Ok(())
    }
}

#[cfg(feature = "kryst")]
pub use self::krylov::BiCgStab;

#[cfg(feature = "kryst")]
mod krylov {
    use std::sync::Arc;

    use kryst::solver::LinearSolver as _;
    use kryst::{
        parallel::{NoComm, UniverseComm},
        preconditioner::PcSide,
    };
    use nalgebra::DVector;
    use nalgebra_sparse::CsrMatrix;

    use super::{LinearSolveError, LinearSolver, check_shape};

    /// Row-scaled BiCGStab from `kryst`.
    #[derive(Clone, Copy, Debug)]
    pub struct BiCgStab {
        pub tolerance: f64,
        pub max_iterations: usize,
    }

    impl Default for BiCgStab {
        fn default() -> Self {
            Self {
                tolerance: 1e-12,
                max_iterations: 2000,
            }
        }
    }

    impl LinearSolver for BiCgStab {
        fn solve(
            &self,
            matrix: &CsrMatrix<f64>,
            unknown: &mut DVector<f64>,
            rhs: &DVector<f64>,
            is_adjoint: bool,
        ) -> Result<(), LinearSolveError> {
            check_shape(matrix, unknown, rhs)?;
            let n = rhs.len();

            // Jacobi row scaling: A' = D^{-1} A, b' = D^{-1} b
            let d_inv: Vec<f64> = matrix
                .row_iter()
                .enumerate()
                .map(|(i, row)| {
                    let diag = row
                        .col_indices()
                        .iter()
                        .position(|&j| j == i)
                        .map(|k| row.values()[k])
                        .unwrap_or(1.0);
                    if diag.abs() < 1e-14 { 1.0 } else { 1.0 / diag }
                })
                .collect();

            let mut values = matrix.values().to_vec();
            for (i, window) in matrix.row_offsets().windows(2).enumerate() {
                for v in &mut values[window[0]..window[1]] {
                    *v *= d_inv[i];
                }
            }
            let b: Vec<f64> = rhs.iter().zip(&d_inv).map(|(r, d)| r * d).collect();

            let scaled = kryst::matrix::sparse::CsrMatrix::from_csr(
                n,
                n,
                matrix.row_offsets().to_vec(),
                matrix.col_indices().to_vec(),
                values,
            );
            let op = kryst::matrix::op::CsrOp::new(Arc::new(scaled));

            let mut solver =
                kryst::solver::bicgstab::BiCgStabSolver::new(self.tolerance, self.max_iterations);
            let mut workspace = kryst::context::ksp_context::Workspace::new(n);
            solver.setup_workspace(&mut workspace);

            unknown.fill(0.0);
            let stats = solver
                .solve(
                    &op,
                    None,
                    &b,
                    unknown.as_mut_slice(),
                    PcSide::Left,
                    &UniverseComm::NoComm(NoComm {}),
                    None,
                    Some(&mut workspace),
                )
                .map_err(|e| LinearSolveError::Krylov(format!("{e:?}")))?;

            log::debug!(
                "BiCGStab finished in {} iterations (adjoint = {is_adjoint})",
                stats.iterations
            );

            if !unknown.iter().all(|v| v.is_finite()) {
                return Err(LinearSolveError::NonFinite);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::sparse::assemble_csr;
    use approx::assert_relative_eq;

    #[test]
    fn dense_lu_solves_small_system() {
        let a = assemble_csr(2, 2, &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, 2.0), (1, 1, 3.0)], false);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let mut x = DVector::zeros(2);
        DenseLuSolver.solve(&a, &mut x, &b, false).unwrap();
        assert_relative_eq!(x[0], 0.1, epsilon = 1e-14);
        assert_relative_eq!(x[1], 0.6, epsilon = 1e-14);
    }

    #[test]
    fn singular_and_misshapen_systems_are_rejected() {
        let a = assemble_csr(2, 2, &[(0, 0, 1.0), (1, 0, 1.0)], true);
        let b = DVector::from_vec(vec![1.0, 2.0]);
        let mut x = DVector::zeros(2);
        assert!(matches!(
            DenseLuSolver.solve(&a, &mut x, &b, false),
            Err(LinearSolveError::Singular)
        ));

        let mut short = DVector::zeros(1);
        assert!(matches!(
            DenseLuSolver.solve(&a, &mut short, &b, false),
            Err(LinearSolveError::Shape { .. })
        ));
    }
}
