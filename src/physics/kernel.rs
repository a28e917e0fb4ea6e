//! Cell-level evaluation shared by the residual and the scalar criteria.

use num_traits::Zero;

use crate::numerics::dual::{FieldScalar, promote_slice};
use crate::numerics::evaluation::EvaluationType;

use super::Physics;
use super::geometry::{GeometryError, GradientOperator};
use super::penalty::SimpPenalty;
use super::workset::Workset;

/// Everything known about one cell at its quadrature point.
pub struct CellQuantities<T> {
    pub gradient: GradientOperator<T>,
    pub density: T,
    pub penalty: T,
    pub point_state: Vec<T>,
    pub point_node_state: Vec<T>,
    pub kinematics: Vec<T>,
    pub kinetics: Vec<T>,
}

/// Interpolate component `offset` of a node-major field with `stride`
/// components per node.
pub fn interpolate<T: FieldScalar>(basis: &[f64], nodal: &[T], stride: usize, offset: usize) -> T {
    basis
        .iter()
        .enumerate()
        .fold(T::zero(), |acc, (a, &n)| acc + nodal[a * stride + offset].clone() * n)
}

/// Geometry, penalized density and constitutive response of cell `i` of a
/// workset, in the evaluation kind's result scalar.
pub fn cell_quantities<P, E>(
    physics: &P,
    penalty: &SimpPenalty,
    workset: &Workset<E>,
    i: usize,
) -> Result<CellQuantities<E::ResultScalar>, GeometryError>
where
    P: Physics,
    E: EvaluationType,
{
    let c = workset.constants;
    let gradient = GradientOperator::new(c.spatial_dim, workset.config_of(i), workset.cells[i])?
        .promote::<E::ResultScalar>();

    let state: Vec<E::ResultScalar> = promote_slice(workset.state_of(i));
    let control: Vec<E::ResultScalar> = promote_slice(workset.control_of(i));
    let node_state: Vec<E::ResultScalar> = promote_slice(workset.node_state_of(i));

    let density = interpolate(&gradient.basis, &control, 1, 0);
    let weight = penalty.weight(&density);
    let point_state: Vec<_> = (0..c.dofs_per_node)
        .map(|k| interpolate(&gradient.basis, &state, c.dofs_per_node, k))
        .collect();
    let point_node_state: Vec<_> = (0..c.node_state_dofs)
        .map(|k| interpolate(&gradient.basis, &node_state, c.node_state_dofs, k))
        .collect();

    let mut kinematics = vec![E::ResultScalar::zero(); c.num_kinematics];
    physics.kinematics(&gradient, &state, &mut kinematics);
    let mut kinetics = vec![E::ResultScalar::zero(); c.num_kinematics];
    physics.kinetics(&kinematics, &point_state, &point_node_state, &mut kinetics);

    Ok(CellQuantities {
        gradient,
        density,
        penalty: weight,
        point_state,
        point_node_state,
        kinematics,
        kinetics,
    })
}

/// Penalized internal-force residual of one cell.
pub fn residual<P: Physics, T: FieldScalar>(physics: &P, q: &CellQuantities<T>, result: &mut [T]) {
    let scale = q.penalty.clone() * q.gradient.volume.clone();
    physics.divergence(&q.gradient, &q.kinetics, &scale, result);
}
