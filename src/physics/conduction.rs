use num_traits::Zero;

use crate::numerics::dual::FieldScalar;

use super::geometry::GradientOperator;
use super::material::IsotropicConduction;
use super::{ElementConstants, Physics};

/// Which potential a [`Conduction`] physics solves for. Both share the same
/// steady diffusion operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConductionField {
    Temperature,
    ElectricPotential,
}

/// Steady scalar diffusion `-∇·(k ∇φ) = f` with one dof per node.
#[derive(Clone, Debug)]
pub struct Conduction {
    dim: usize,
    material: IsotropicConduction,
    field: ConductionField,
}

impl Conduction {
    pub fn thermal(spatial_dim: usize, material: IsotropicConduction) -> Self {
        Self {
            dim: spatial_dim,
            material,
            field: ConductionField::Temperature,
        }
    }

    pub fn electrical(spatial_dim: usize, material: IsotropicConduction) -> Self {
        Self {
            dim: spatial_dim,
            material,
            field: ConductionField::ElectricPotential,
        }
    }

    pub fn field(&self) -> ConductionField {
        self.field
    }
}

/// Gradient of the scalar at `offset` of a node-major local state.
pub(crate) fn scalar_gradient<T: FieldScalar>(
    gradient: &GradientOperator<T>,
    state: &[T],
    stride: usize,
    offset: usize,
    out: &mut [T],
) {
    for (d, g) in out.iter_mut().enumerate().take(gradient.spatial_dim) {
        *g = T::zero();
        for a in 0..gradient.nodes {
            *g += state[a * stride + offset].clone() * gradient.grad(a, d).clone();
        }
    }
}

/// `result[a] += scale * Σ_d q_d ∂N_a/∂x_d`.
pub(crate) fn flux_divergence<T: FieldScalar>(
    gradient: &GradientOperator<T>,
    flux: &[T],
    scale: &T,
    stride: usize,
    offset: usize,
    result: &mut [T],
) {
    for (d, q) in flux.iter().enumerate().take(gradient.spatial_dim) {
        let q = q.clone() * scale.clone();
        for a in 0..gradient.nodes {
            result[a * stride + offset] += q.clone() * gradient.grad(a, d).clone();
        }
    }
}

impl Physics for Conduction {
    fn name(&self) -> &'static str {
        match self.field {
            ConductionField::Temperature => "thermal conduction",
            ConductionField::ElectricPotential => "electrical conduction",
        }
    }

    fn constants(&self) -> ElementConstants {
        ElementConstants::simplex(self.dim, 1, 0, self.dim)
    }

    fn kinematics<T: FieldScalar>(&self, gradient: &GradientOperator<T>, state: &[T], out: &mut [T]) {
        scalar_gradient(gradient, state, 1, 0, out);
    }

    fn kinetics<T: FieldScalar>(&self, kinematics: &[T], _point_state: &[T], _point_node_state: &[T], out: &mut [T]) {
        self.material.flux(kinematics, out);
    }

    fn divergence<T: FieldScalar>(
        &self,
        gradient: &GradientOperator<T>,
        kinetics: &[T],
        scale: &T,
        result: &mut [T],
    ) {
        flux_divergence(gradient, kinetics, scale, 1, 0, result);
    }
}
