//! Essential (Dirichlet) boundary conditions, imposed by row elimination.
//!
//! A constrained row of the operator is zeroed and its diagonal set to one;
//! the matching right-hand side entry becomes `scale * value`. Newton passes
//! `scale = 1` on its first iteration and `0` afterwards, once the prescribed
//! values are already part of the iterate. Adjoint solves use the
//! [`homogeneous`](EssentialBCs::homogeneous) copy of the same dofs.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

use crate::discretization::Mesh;
use crate::numerics::sparse::BlockCsrMatrix;

#[derive(Debug, Error, PartialEq)]
pub enum BoundaryConditionError {
    #[error("{dofs} constrained dofs but {values} prescribed values")]
    LengthMismatch { dofs: usize, values: usize },
    #[error("constrained dof {dof} is outside the {num_dofs} unknowns of the system")]
    DofOutOfRange { dof: usize, num_dofs: usize },
    #[error("unknown node set '{0}'")]
    UnknownNodeSet(String),
    #[error("component {component} does not exist with {dofs_per_node} dofs per node")]
    ComponentOutOfRange { component: usize, dofs_per_node: usize },
    #[error("row {0} has no diagonal entry in the sparsity pattern")]
    MissingDiagonal(usize),
}

/// A fixed list of `(global dof, prescribed value)` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EssentialBCs {
    dofs: Vec<usize>,
    values: Vec<f64>,
}

impl EssentialBCs {
    pub fn new(dofs: Vec<usize>, values: Vec<f64>) -> Result<Self, BoundaryConditionError> {
        if dofs.len() != values.len() {
            return Err(BoundaryConditionError::LengthMismatch {
                dofs: dofs.len(),
                values: values.len(),
            });
        }
        Ok(Self { dofs, values })
    }

    /// Prescribe `value` on one component of every node in a node set.
    pub fn with_node_set(
        mut self,
        mesh: &Mesh,
        node_set: &str,
        component: usize,
        dofs_per_node: usize,
        value: f64,
    ) -> Result<Self, BoundaryConditionError> {
        if component >= dofs_per_node {
            return Err(BoundaryConditionError::ComponentOutOfRange {
                component,
                dofs_per_node,
            });
        }
        let nodes = mesh
            .node_sets
            .get(node_set)
            .ok_or_else(|| BoundaryConditionError::UnknownNodeSet(node_set.to_string()))?;
        for &node in nodes {
            self.dofs.push(node * dofs_per_node + component);
            self.values.push(value);
        }
        Ok(self)
    }

    /// Clamp every component of a node set to zero.
    pub fn with_fixed_node_set(
        self,
        mesh: &Mesh,
        node_set: &str,
        dofs_per_node: usize,
    ) -> Result<Self, BoundaryConditionError> {
        (0..dofs_per_node).try_fold(self, |bcs, k| bcs.with_node_set(mesh, node_set, k, dofs_per_node, 0.0))
    }

    pub fn dofs(&self) -> &[usize] {
        &self.dofs
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.dofs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dofs.is_empty()
    }

    /// Same dofs, all values zero.
    pub fn homogeneous(&self) -> Self {
        Self {
            dofs: self.dofs.clone(),
            values: vec![0.0; self.dofs.len()],
        }
    }

    pub fn validate(&self, num_dofs: usize) -> Result<(), BoundaryConditionError> {
        match self.dofs.iter().find(|&&dof| dof >= num_dofs) {
            Some(&dof) => Err(BoundaryConditionError::DofOutOfRange { dof, num_dofs }),
            None => Ok(()),
        }
    }

    /// `rhs[dof] = scale * value` on every constrained dof.
    pub fn apply_to_vector(&self, rhs: &mut DVector<f64>, scale: f64) -> Result<(), BoundaryConditionError> {
        self.validate(rhs.len())?;
        for (&dof, &value) in self.dofs.iter().zip(&self.values) {
            rhs[dof] = scale * value;
        }
        Ok(())
    }

    /// Zero every constrained row and put one on its diagonal.
    pub fn apply_to_matrix(&self, matrix: &mut CsrMatrix<f64>) -> Result<(), BoundaryConditionError> {
        self.validate(matrix.nrows())?;
        for &dof in &self.dofs {
            let mut row = matrix.row_mut(dof);
            let (cols, values) = row.cols_and_values_mut();
            let mut diagonal = None;
            for (k, (&col, v)) in cols.iter().zip(values.iter_mut()).enumerate() {
                *v = 0.0;
                if col == dof {
                    diagonal = Some(k);
                }
            }
            let k = diagonal.ok_or(BoundaryConditionError::MissingDiagonal(dof))?;
            values[k] = 1.0;
        }
        Ok(())
    }

    pub fn apply(
        &self,
        matrix: &mut CsrMatrix<f64>,
        rhs: &mut DVector<f64>,
        scale: f64,
    ) -> Result<(), BoundaryConditionError> {
        self.apply_to_matrix(matrix)?;
        self.apply_to_vector(rhs, scale)
    }

    /// Row elimination on a matrix stored in per-node dense blocks.
    pub fn apply_block(
        &self,
        matrix: &mut BlockCsrMatrix,
        rhs: &mut DVector<f64>,
        scale: f64,
    ) -> Result<(), BoundaryConditionError> {
        let b = matrix.block_size;
        self.validate(matrix.num_block_rows() * b)?;
        for &dof in &self.dofs {
            let (brow, r) = (dof / b, dof % b);
            let mut found = false;
            for k in matrix.row_offsets[brow]..matrix.row_offsets[brow + 1] {
                let on_diagonal = matrix.block_cols[k] == brow;
                let block = matrix.block_mut(k);
                block[r * b..(r + 1) * b].fill(0.0);
                if on_diagonal {
                    block[r * b + r] = 1.0;
                    found = true;
                }
            }
            if !found {
                return Err(BoundaryConditionError::MissingDiagonal(dof));
            }
        }
        self.apply_to_vector(rhs, scale)
    }
}
