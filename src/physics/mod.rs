pub mod bc;
pub mod conduction;
pub mod functional;
pub mod geometry;
pub mod kernel;
pub mod loads;
pub mod material;
pub mod mechanics;
pub mod penalty;
pub mod scalar;
pub mod thermomechanics;
pub mod workset;

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use thiserror::Error;

use crate::numerics::dual::FieldScalar;
use geometry::{GeometryError, GradientOperator};

/// Topology constants of one physics/element pairing, fixed at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementConstants {
    pub spatial_dim: usize,
    pub nodes_per_cell: usize,
    pub dofs_per_node: usize,
    /// Node-state values per node (0 when the physics reads no node-state).
    pub node_state_dofs: usize,
    /// Length of the kinematics and kinetics vectors at a point.
    pub num_kinematics: usize,
}

impl ElementConstants {
    /// Linear simplex with `spatial_dim + 1` nodes.
    pub fn simplex(
        spatial_dim: usize,
        dofs_per_node: usize,
        node_state_dofs: usize,
        num_kinematics: usize,
    ) -> Self {
        Self {
            spatial_dim,
            nodes_per_cell: spatial_dim + 1,
            dofs_per_node,
            node_state_dofs,
            num_kinematics,
        }
    }

    #[inline]
    pub fn dofs_per_cell(&self) -> usize {
        self.nodes_per_cell * self.dofs_per_node
    }

    #[inline]
    pub fn config_per_cell(&self) -> usize {
        self.nodes_per_cell * self.spatial_dim
    }

    #[inline]
    pub fn node_state_per_cell(&self) -> usize {
        self.nodes_per_cell * self.node_state_dofs
    }
}

/// Kinematics and kinetics of one physics, written once against
/// [`FieldScalar`] so the same code yields values and any Jacobian.
pub trait Physics: Send + Sync {
    fn name(&self) -> &'static str;

    fn constants(&self) -> ElementConstants;

    /// Kinematic quantities (strain, temperature gradient, ...) from the
    /// cell's nodal state.
    fn kinematics<T: FieldScalar>(&self, gradient: &GradientOperator<T>, state: &[T], out: &mut [T]);

    /// Constitutive response. `point_state` and `point_node_state` are the
    /// nodal fields interpolated to the integration point.
    fn kinetics<T: FieldScalar>(
        &self,
        kinematics: &[T],
        point_state: &[T],
        point_node_state: &[T],
        out: &mut [T],
    );

    /// Add `scale * ∫ ∇N · kinetics` into the cell's result row.
    fn divergence<T: FieldScalar>(
        &self,
        gradient: &GradientOperator<T>,
        kinetics: &[T],
        scale: &T,
        result: &mut [T],
    );
}

/// Contract the Newton solver and the adjoint engine need from a
/// discretized PDE `R(u, z; x) = 0`.
pub trait ResidualFunction: Send + Sync {
    fn num_dofs(&self) -> usize;

    fn num_controls(&self) -> usize;

    fn num_config(&self) -> usize;

    fn value(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError>;

    /// `∂R/∂u`, square.
    fn gradient_u(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError>;

    /// `∂R/∂z`, dofs × controls.
    fn gradient_z(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError>;

    /// `∂R/∂x`, dofs × configuration entries.
    fn gradient_x(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<CsrMatrix<f64>, AssemblyError>;
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("geometry error in domain '{domain}'")]
    Geometry {
        domain: String,
        #[source]
        source: GeometryError,
    },
    #[error("{what} has {found} entries, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("unknown side set '{0}'")]
    UnknownSideSet(String),
    #[error("unknown node set '{0}'")]
    UnknownNodeSet(String),
    #[error("solution has {available} cycles, cycle {cycle} requested")]
    MissingCycle { cycle: usize, available: usize },
}

pub(crate) fn check_len(what: &'static str, expected: usize, found: usize) -> Result<(), AssemblyError> {
    if expected != found {
        return Err(AssemblyError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}
