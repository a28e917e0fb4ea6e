use crate::numerics::dual::FieldScalar;

use super::geometry::GradientOperator;
use super::material::{ElasticModel, LinearElastic, ThermalExpansion, voigt_pairs, voigt_size};
use super::{ElementConstants, Physics};

/// Small-strain linear elastostatics with displacement dofs.
///
/// With [`Mechanics::with_thermal_expansion`] the physics reads a nodal
/// temperature field as node-state and subtracts the resulting thermal
/// strain before applying the stiffness.
#[derive(Clone, Debug)]
pub struct Mechanics {
    dim: usize,
    elastic: ElasticModel,
    expansion: Option<ThermalExpansion>,
}

impl Mechanics {
    pub fn new(spatial_dim: usize, material: LinearElastic) -> Self {
        Self {
            dim: spatial_dim,
            elastic: material.model(spatial_dim),
            expansion: None,
        }
    }

    pub fn with_thermal_expansion(mut self, expansion: ThermalExpansion) -> Self {
        self.expansion = Some(expansion);
        self
    }
}

/// Voigt strain of the displacement components `offset..offset + dim` of a
/// node-major local state with `stride` dofs per node.
pub(crate) fn strain<T: FieldScalar>(
    gradient: &GradientOperator<T>,
    state: &[T],
    stride: usize,
    offset: usize,
    out: &mut [T],
) {
    let dim = gradient.spatial_dim;
    for (component, pairs) in voigt_pairs(dim).iter().enumerate() {
        let mut e = T::zero();
        for &(i, j) in pairs.iter() {
            for a in 0..gradient.nodes {
                e += state[a * stride + offset + i].clone() * gradient.grad(a, j).clone();
            }
        }
        out[component] = e;
    }
}

/// `result[a, i] += scale * Σ_j σ_ij ∂N_a/∂x_j`.
pub(crate) fn stress_divergence<T: FieldScalar>(
    gradient: &GradientOperator<T>,
    stress: &[T],
    scale: &T,
    stride: usize,
    offset: usize,
    result: &mut [T],
) {
    let dim = gradient.spatial_dim;
    for (component, pairs) in voigt_pairs(dim).iter().enumerate() {
        let s = stress[component].clone() * scale.clone();
        for &(i, j) in pairs.iter() {
            for a in 0..gradient.nodes {
                result[a * stride + offset + i] += s.clone() * gradient.grad(a, j).clone();
            }
        }
    }
}

impl Physics for Mechanics {
    fn name(&self) -> &'static str {
        "mechanics"
    }

    fn constants(&self) -> ElementConstants {
        let node_state = usize::from(self.expansion.is_some());
        ElementConstants::simplex(self.dim, self.dim, node_state, voigt_size(self.dim))
    }

    fn kinematics<T: FieldScalar>(&self, gradient: &GradientOperator<T>, state: &[T], out: &mut [T]) {
        strain(gradient, state, self.dim, 0, out);
    }

    fn kinetics<T: FieldScalar>(
        &self,
        kinematics: &[T],
        _point_state: &[T],
        point_node_state: &[T],
        out: &mut [T],
    ) {
        let thermal = self
            .expansion
            .as_ref()
            .map(|e| e.strain(&point_node_state[0]));
        self.elastic.stress(kinematics, thermal.as_ref(), out);
    }

    fn divergence<T: FieldScalar>(
        &self,
        gradient: &GradientOperator<T>,
        kinetics: &[T],
        scale: &T,
        result: &mut [T],
    ) {
        stress_divergence(gradient, kinetics, scale, self.dim, 0, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn uniform_stretch_strain_and_stress() {
        // u_x = 0.1 x on the unit right triangle
        let op = GradientOperator::new(2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], 0).unwrap();
        let state = [0.0, 0.0, 0.1, 0.0, 0.0, 0.0];
        let physics = Mechanics::new(2, LinearElastic::new(1.0, 0.0));

        let mut e = [0.0; 3];
        physics.kinematics(&op, &state, &mut e);
        assert_relative_eq!(e[0], 0.1);
        assert_relative_eq!(e[1], 0.0);
        assert_relative_eq!(e[2], 0.0);

        let mut s = [0.0; 3];
        physics.kinetics(&e, &[], &[], &mut s);
        assert_relative_eq!(s[0], 0.1);
    }

    #[test]
    fn rigid_rotation_is_strain_free() {
        let op = GradientOperator::new(2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], 0).unwrap();
        // u = θ (-y, x)
        let state = [0.0, 0.0, 0.0, 0.01, -0.01, 0.0];
        let mut e = [1.0; 3];
        strain(&op, &state, 2, 0, &mut e);
        for v in e {
            assert_relative_eq!(v, 0.0, epsilon = 1e-15);
        }
    }

    #[test]
    fn divergence_of_constant_stress_balances() {
        let op = GradientOperator::new(3, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], 0)
            .unwrap();
        let physics = Mechanics::new(3, LinearElastic::new(1.0, 0.3));
        let stress = [1.0, 2.0, 3.0, 0.4, 0.5, 0.6];
        let mut r = [0.0; 12];
        physics.divergence(&op, &stress, &1.0, &mut r);
        for i in 0..3 {
            let total: f64 = (0..4).map(|a| r[a * 3 + i]).sum();
            assert_relative_eq!(total, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn thermal_expansion_reads_node_state() {
        let physics = Mechanics::new(1, LinearElastic::new(10.0, 0.0)).with_thermal_expansion(ThermalExpansion {
            coefficient: 0.01,
            reference_temperature: 0.0,
        });
        assert_eq!(physics.constants().node_state_dofs, 1);
        let mut s = [0.0];
        physics.kinetics(&[0.0], &[0.0], &[2.0], &mut s);
        assert_relative_eq!(s[0], -0.2);
    }
}
