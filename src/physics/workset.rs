//! Per-batch gathered input arrays.
//!
//! A [`Workset`] holds every cell-local input of one batch of cells in the
//! scalar types fixed by the evaluation kind. The category that is dual in a
//! Jacobian kind is seeded so each local entry is its own independent
//! variable; everything else carries plain values. Worksets live only for the
//! duration of one assembly call.

use nalgebra::DVector;

use crate::discretization::Mesh;
use crate::numerics::dual::FieldScalar;
use crate::numerics::evaluation::{EvaluationKind, EvaluationType};

use super::ElementConstants;

/// Global input fields an assembly reads from.
#[derive(Clone, Copy)]
pub struct GlobalFields<'a> {
    pub state: &'a DVector<f64>,
    pub control: &'a DVector<f64>,
    pub node_state: &'a DVector<f64>,
}

pub struct Workset<E: EvaluationType> {
    pub constants: ElementConstants,
    pub cells: Vec<usize>,
    pub config: Vec<E::ConfigScalar>,
    pub state: Vec<E::StateScalar>,
    pub control: Vec<E::ControlScalar>,
    pub node_state: Vec<E::NodeStateScalar>,
}

impl<E: EvaluationType> Workset<E> {
    pub fn gather(mesh: &Mesh, constants: ElementConstants, cells: Vec<usize>, fields: &GlobalFields) -> Self {
        let c = constants;
        let n = cells.len();
        let mut config = Vec::with_capacity(n * c.config_per_cell());
        let mut state = Vec::with_capacity(n * c.dofs_per_cell());
        let mut control = Vec::with_capacity(n * c.nodes_per_cell);
        let mut node_state = Vec::with_capacity(n * c.node_state_per_cell());

        let mut local = Vec::new();
        for &cell in &cells {
            let nodes = mesh.cell_nodes(cell);

            local.clear();
            for &node in nodes {
                local.extend_from_slice(mesh.node_coords(node));
            }
            config.extend(E::ConfigScalar::seed(&local));

            local.clear();
            for &node in nodes {
                local.extend((0..c.dofs_per_node).map(|k| fields.state[node * c.dofs_per_node + k]));
            }
            state.extend(E::StateScalar::seed(&local));

            local.clear();
            local.extend(nodes.iter().map(|&node| fields.control[node]));
            control.extend(E::ControlScalar::seed(&local));

            local.clear();
            for &node in nodes {
                local.extend((0..c.node_state_dofs).map(|k| fields.node_state[node * c.node_state_dofs + k]));
            }
            node_state.extend(E::NodeStateScalar::seed(&local));
        }

        Self {
            constants,
            cells,
            config,
            state,
            control,
            node_state,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn config_of(&self, i: usize) -> &[E::ConfigScalar] {
        let w = self.constants.config_per_cell();
        &self.config[i * w..(i + 1) * w]
    }

    pub fn state_of(&self, i: usize) -> &[E::StateScalar] {
        let w = self.constants.dofs_per_cell();
        &self.state[i * w..(i + 1) * w]
    }

    pub fn control_of(&self, i: usize) -> &[E::ControlScalar] {
        let w = self.constants.nodes_per_cell;
        &self.control[i * w..(i + 1) * w]
    }

    pub fn node_state_of(&self, i: usize) -> &[E::NodeStateScalar] {
        let w = self.constants.node_state_per_cell();
        &self.node_state[i * w..(i + 1) * w]
    }
}

/// Global column of every local independent variable of a Jacobian kind,
/// in seeding order. `Value` has none.
pub fn local_columns(kind: EvaluationKind, c: &ElementConstants, nodes: &[usize], out: &mut Vec<usize>) {
    out.clear();
    let per_node = match kind {
        EvaluationKind::Value => return,
        EvaluationKind::JacobianState => c.dofs_per_node,
        EvaluationKind::JacobianControl => 1,
        EvaluationKind::JacobianConfig => c.spatial_dim,
        EvaluationKind::JacobianNodeState => c.node_state_dofs,
    };
    for &node in nodes {
        out.extend((0..per_node).map(|k| node * per_node + k));
    }
}

/// Column count of the global operator produced by a Jacobian kind.
pub fn num_columns(kind: EvaluationKind, c: &ElementConstants, mesh: &Mesh) -> usize {
    let n = mesh.num_nodes();
    match kind {
        EvaluationKind::Value => 1,
        EvaluationKind::JacobianState => n * c.dofs_per_node,
        EvaluationKind::JacobianControl => n,
        EvaluationKind::JacobianConfig => n * c.spatial_dim,
        EvaluationKind::JacobianNodeState => n * c.node_state_dofs,
    }
}
