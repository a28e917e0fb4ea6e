//! Residual assembly.
//!
//! Cells are processed in batches: each batch gathers a [`Workset`] in the
//! scalar types of the requested evaluation kind, runs the cell kernel, and
//! scatters its local rows into a [`Contribution`]. Batches run in parallel
//! and their contributions are merged in batch order before the final,
//! sequential accumulation into the global vector or matrix, so results do
//! not depend on the thread schedule.

use std::sync::Arc;

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use num_traits::Zero;
use rayon::prelude::*;

use crate::discretization::{Mesh, Side};
use crate::numerics::dual::{FieldScalar, promote_slice, value_of};
use crate::numerics::evaluation::{
    EvaluationKind, EvaluationType, JacobianConfig, JacobianControl, JacobianNodeState, JacobianState,
    Value,
};
use crate::numerics::sparse::{Triplet, assemble_csr};
use crate::numerics::timing::{Phase, record};

use super::geometry::side_measure;
use super::kernel;
use super::loads::{Load, subtract_lumped};
use super::penalty::SimpPenalty;
use super::workset::{GlobalFields, Workset, local_columns, num_columns};
use super::{AssemblyError, ElementConstants, Physics, ResidualFunction, check_len};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AssemblyOptions {
    /// Cells per workset.
    pub batch_size: usize,
}

impl Default for AssemblyOptions {
    fn default() -> Self {
        Self { batch_size: 256 }
    }
}

/// Scattered output of one or more batches: `(row, value)` pairs for value
/// evaluations, `(row, col, value)` triplets for Jacobians.
#[derive(Debug, Default)]
pub(crate) struct Contribution {
    pub entries: Vec<(usize, f64)>,
    pub triplets: Vec<Triplet>,
}

impl Contribution {
    pub fn merge(mut self, mut other: Self) -> Self {
        self.entries.append(&mut other.entries);
        self.triplets.append(&mut other.triplets);
        self
    }

    pub fn into_vector(self, len: usize) -> DVector<f64> {
        let mut out = DVector::zeros(len);
        for (row, value) in self.entries {
            out[row] += value;
        }
        out
    }

    /// Sum the Jacobian triplets of a scalar-valued evaluation into a
    /// gradient vector.
    pub fn into_gradient(self, len: usize) -> DVector<f64> {
        let mut out = DVector::zeros(len);
        for (_, col, value) in self.triplets {
            out[col] += value;
        }
        out
    }
}

/// Anything that names the cell it is evaluated on.
pub(crate) trait CellItem: Sync {
    fn cell(&self) -> usize;
}

impl CellItem for usize {
    fn cell(&self) -> usize {
        *self
    }
}

impl CellItem for Side {
    fn cell(&self) -> usize {
        self.cell
    }
}

/// How a cell's local result maps onto global rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum RowLayout {
    /// One row per local dof, node-major.
    NodalDofs,
    /// A single scalar accumulated into row 0.
    Scalar,
}

impl RowLayout {
    fn width(self, c: &ElementConstants) -> usize {
        match self {
            RowLayout::NodalDofs => c.dofs_per_cell(),
            RowLayout::Scalar => 1,
        }
    }

    fn global_row(self, c: &ElementConstants, nodes: &[usize], local: usize) -> usize {
        match self {
            RowLayout::NodalDofs => {
                nodes[local / c.dofs_per_node] * c.dofs_per_node + local % c.dofs_per_node
            }
            RowLayout::Scalar => 0,
        }
    }
}

/// Inputs shared by every batch of one assembly call.
pub(crate) struct BatchAssembly<'a> {
    pub mesh: &'a Mesh,
    pub constants: ElementConstants,
    pub fields: GlobalFields<'a>,
    pub options: AssemblyOptions,
    pub layout: RowLayout,
}

impl BatchAssembly<'_> {
    /// Gather, evaluate and scatter `items` batch by batch. `evaluate`
    /// receives the item, the batch workset, the item's index in it and the
    /// zeroed local result row.
    pub fn run<E, I, F>(&self, items: &[I], evaluate: F) -> Result<Contribution, AssemblyError>
    where
        E: EvaluationType,
        I: CellItem,
        F: Fn(&I, &Workset<E>, usize, &mut [E::ResultScalar]) -> Result<(), AssemblyError> + Sync,
    {
        let width = self.layout.width(&self.constants);
        let batch_size = self.options.batch_size.max(1);
        log::debug!(
            "{:?} assembly: {} items in {} batches",
            E::KIND,
            items.len(),
            items.len().div_ceil(batch_size)
        );
        items
            .par_chunks(batch_size)
            .map(|batch| -> Result<Contribution, AssemblyError> {
                let cells = batch.iter().map(CellItem::cell).collect();
                let workset = Workset::<E>::gather(self.mesh, self.constants, cells, &self.fields);

                let mut result = vec![E::ResultScalar::zero(); batch.len() * width];
                for (i, (item, row)) in batch.iter().zip(result.chunks_mut(width)).enumerate() {
                    evaluate(item, &workset, i, row)?;
                }
                Ok(self.scatter(&workset, &result))
            })
            .try_reduce(Contribution::default, |a, b| Ok(a.merge(b)))
    }

    fn scatter<E: EvaluationType>(&self, workset: &Workset<E>, result: &[E::ResultScalar]) -> Contribution {
        let c = &self.constants;
        let width = self.layout.width(c);
        let mut out = Contribution::default();
        let mut columns = Vec::new();

        for (cell, local_result) in workset.cells.iter().zip(result.chunks(width)) {
            let nodes = self.mesh.cell_nodes(*cell);
            local_columns(E::KIND, c, nodes, &mut columns);

            for (local, value) in local_result.iter().enumerate() {
                let row = self.layout.global_row(c, nodes, local);
                if E::KIND == EvaluationKind::Value {
                    out.entries.push((row, value_of(value)));
                } else {
                    let partials = value.partials(columns.len());
                    out.triplets
                        .extend(columns.iter().zip(partials).map(|(&col, d)| (row, col, d)));
                }
            }
        }
        out
    }
}

/// The discretized residual `R(u, z; x) = F_int(u, z; x) - F_ext` of one
/// physics over a mesh.
pub struct VectorFunction<P: Physics> {
    mesh: Arc<Mesh>,
    physics: P,
    penalty: SimpPenalty,
    loads: Vec<Load>,
    load_scale: f64,
    node_state: DVector<f64>,
    options: AssemblyOptions,
}

impl<P: Physics> VectorFunction<P> {
    pub fn new(mesh: Arc<Mesh>, physics: P) -> Self {
        let node_state = DVector::zeros(mesh.num_nodes() * physics.constants().node_state_dofs);
        Self {
            mesh,
            physics,
            penalty: SimpPenalty::default(),
            loads: Vec::new(),
            load_scale: 1.0,
            node_state,
            options: AssemblyOptions::default(),
        }
    }

    pub fn with_penalty(mut self, penalty: SimpPenalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_load(mut self, load: Load) -> Self {
        self.loads.push(load);
        self
    }

    pub fn with_options(mut self, options: AssemblyOptions) -> Self {
        self.options = options;
        self
    }

    /// Multiply every external load, e.g. for load stepping.
    pub fn with_load_scale(mut self, scale: f64) -> Self {
        self.load_scale = scale;
        self
    }

    pub fn with_node_state(mut self, node_state: DVector<f64>) -> Result<Self, AssemblyError> {
        self.set_node_state(node_state)?;
        Ok(self)
    }

    pub fn set_node_state(&mut self, node_state: DVector<f64>) -> Result<(), AssemblyError> {
        check_len("node state", self.node_state.len(), node_state.len())?;
        self.node_state = node_state;
        Ok(())
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn physics(&self) -> &P {
        &self.physics
    }

    pub fn penalty(&self) -> SimpPenalty {
        self.penalty
    }

    pub fn options(&self) -> AssemblyOptions {
        self.options
    }

    pub fn node_state(&self) -> &DVector<f64> {
        &self.node_state
    }

    pub fn loads(&self) -> &[Load] {
        &self.loads
    }

    pub fn constants(&self) -> ElementConstants {
        self.physics.constants()
    }

    pub fn num_dofs(&self) -> usize {
        self.mesh.num_nodes() * self.constants().dofs_per_node
    }

    pub fn num_controls(&self) -> usize {
        self.mesh.num_nodes()
    }

    pub fn num_config(&self) -> usize {
        self.mesh.num_nodes() * self.mesh.spatial_dim
    }

    /// Residual vector.
    pub fn value(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        record(Phase::Residual, || -> Result<DVector<f64>, AssemblyError> {
            let mut residual = self.evaluate::<Value>(state, control)?.into_vector(self.num_dofs());
            self.nodal_contribution(&mut residual)?;
            Ok(residual)
        })
    }

    /// `∂R/∂u` with every diagonal entry present in the sparsity pattern.
    pub fn gradient_u(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        record(Phase::Jacobian, || self.jacobian::<JacobianState>(state, control))
    }

    pub fn gradient_z(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        self.jacobian::<JacobianControl>(state, control)
    }

    pub fn gradient_x(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        self.jacobian::<JacobianConfig>(state, control)
    }

    /// `∂R/∂n` with respect to the node-state field.
    pub fn gradient_n(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        self.jacobian::<JacobianNodeState>(state, control)
    }

    fn jacobian<E: EvaluationType>(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<CsrMatrix<f64>, AssemblyError> {
        let contribution = self.evaluate::<E>(state, control)?;
        let ncols = num_columns(E::KIND, &self.constants(), &self.mesh);
        Ok(assemble_csr(
            self.num_dofs(),
            ncols,
            &contribution.triplets,
            E::KIND == EvaluationKind::JacobianState,
        ))
    }

    fn check_inputs(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<(), AssemblyError> {
        let c = self.constants();
        check_len("mesh spatial dimension", c.spatial_dim, self.mesh.spatial_dim)?;
        check_len("state", self.num_dofs(), state.len())?;
        check_len("control", self.num_controls(), control.len())?;
        for load in &self.loads {
            check_len("load values", c.dofs_per_node, load.values().len())?;
        }
        Ok(())
    }

    pub(crate) fn fields<'a>(&'a self, state: &'a DVector<f64>, control: &'a DVector<f64>) -> GlobalFields<'a> {
        GlobalFields {
            state,
            control,
            node_state: &self.node_state,
        }
    }

    /// Domain and boundary passes for one evaluation kind.
    pub(crate) fn evaluate<E: EvaluationType>(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Contribution, AssemblyError> {
        self.check_inputs(state, control)?;
        let assembly = BatchAssembly {
            mesh: &self.mesh,
            constants: self.constants(),
            fields: self.fields(state, control),
            options: self.options,
            layout: RowLayout::NodalDofs,
        };

        let domain = self.domain_contribution::<E>(&assembly)?;
        let boundary = self.boundary_contribution::<E>(&assembly)?;
        Ok(domain.merge(boundary))
    }

    fn domain_contribution<E: EvaluationType>(&self, assembly: &BatchAssembly) -> Result<Contribution, AssemblyError> {
        let c = assembly.constants;
        let mut total = Contribution::default();

        for domain in &self.mesh.domains {
            let part = assembly.run::<E, _, _>(&domain.cells, |_, workset, i, result| {
                let q = kernel::cell_quantities(&self.physics, &self.penalty, workset, i).map_err(|source| {
                    AssemblyError::Geometry {
                        domain: domain.name.clone(),
                        source,
                    }
                })?;
                kernel::residual(&self.physics, &q, result);

                // body loads act on the material present in the cell
                let mass = q.density.clone() * q.gradient.volume.clone();
                for load in &self.loads {
                    if let Load::Body { values } = load {
                        subtract_lumped(&c, values, &mass, self.load_scale, 0..c.nodes_per_cell, result);
                    }
                }
                Ok(())
            })?;
            total = total.merge(part);
        }
        Ok(total)
    }

    fn boundary_contribution<E: EvaluationType>(&self, assembly: &BatchAssembly) -> Result<Contribution, AssemblyError> {
        let c = assembly.constants;
        let mut total = Contribution::default();

        for load in &self.loads {
            let Load::Surface { side_set, values } = load else {
                continue;
            };
            let sides = self
                .mesh
                .side_sets
                .get(side_set)
                .ok_or_else(|| AssemblyError::UnknownSideSet(side_set.clone()))?;

            let part = assembly.run::<E, _, _>(sides, |side: &Side, workset, i, result| {
                let coords: Vec<E::ResultScalar> = promote_slice(workset.config_of(i));
                let measure = side_measure(c.spatial_dim, &coords, side.face);
                let on_side = (0..c.nodes_per_cell).filter(|&a| a != side.face);
                subtract_lumped(&c, values, &measure, self.load_scale, on_side, result);
                Ok(())
            })?;
            total = total.merge(part);
        }
        Ok(total)
    }

    /// Point loads depend on no input field, so they only enter the value.
    fn nodal_contribution(&self, residual: &mut DVector<f64>) -> Result<(), AssemblyError> {
        let dofs = self.constants().dofs_per_node;
        for load in &self.loads {
            let Load::Nodal { node_set, values } = load else {
                continue;
            };
            let nodes = self
                .mesh
                .node_sets
                .get(node_set)
                .ok_or_else(|| AssemblyError::UnknownNodeSet(node_set.clone()))?;
            for &node in nodes {
                for (k, v) in values.iter().enumerate() {
                    residual[node * dofs + k] -= self.load_scale * v;
                }
            }
        }
        Ok(())
    }
}

impl<P: Physics> ResidualFunction for VectorFunction<P> {
    fn num_dofs(&self) -> usize {
        VectorFunction::num_dofs(self)
    }

    fn num_controls(&self) -> usize {
        VectorFunction::num_controls(self)
    }

    fn num_config(&self) -> usize {
        VectorFunction::num_config(self)
    }

    fn value(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        VectorFunction::value(self, state, control)
    }

    fn gradient_u(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        VectorFunction::gradient_u(self, state, control)
    }

    fn gradient_z(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        VectorFunction::gradient_z(self, state, control)
    }

    fn gradient_x(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError> {
        VectorFunction::gradient_x(self, state, control)
    }
}
