use crate::numerics::dual::FieldScalar;

use super::conduction::{flux_divergence, scalar_gradient};
use super::geometry::GradientOperator;
use super::material::{ElasticModel, IsotropicConduction, LinearElastic, ThermalExpansion, voigt_size};
use super::mechanics::{strain, stress_divergence};
use super::{ElementConstants, Physics};

/// One-way coupled thermoelasticity: displacements then temperature at
/// every node. The temperature drives a thermal strain in the mechanics
/// block while the heat equation ignores the displacements, so the Jacobian
/// is block triangular and not symmetric.
#[derive(Clone, Debug)]
pub struct Thermomechanics {
    dim: usize,
    elastic: ElasticModel,
    conduction: IsotropicConduction,
    expansion: ThermalExpansion,
}

impl Thermomechanics {
    pub fn new(
        spatial_dim: usize,
        elastic: LinearElastic,
        conduction: IsotropicConduction,
        expansion: ThermalExpansion,
    ) -> Self {
        Self {
            dim: spatial_dim,
            elastic: elastic.model(spatial_dim),
            conduction,
            expansion,
        }
    }

    fn num_strains(&self) -> usize {
        voigt_size(self.dim)
    }
}

impl Physics for Thermomechanics {
    fn name(&self) -> &'static str {
        "thermomechanics"
    }

    fn constants(&self) -> ElementConstants {
        ElementConstants::simplex(self.dim, self.dim + 1, 0, self.num_strains() + self.dim)
    }

    fn kinematics<T: FieldScalar>(&self, gradient: &GradientOperator<T>, state: &[T], out: &mut [T]) {
        let (strains, temperature_gradient) = out.split_at_mut(self.num_strains());
        strain(gradient, state, self.dim + 1, 0, strains);
        scalar_gradient(gradient, state, self.dim + 1, self.dim, temperature_gradient);
    }

    fn kinetics<T: FieldScalar>(&self, kinematics: &[T], point_state: &[T], _point_node_state: &[T], out: &mut [T]) {
        let n = self.num_strains();
        let thermal = self.expansion.strain(&point_state[self.dim]);
        let (stress, flux) = out.split_at_mut(n);
        self.elastic.stress(&kinematics[..n], Some(&thermal), stress);
        self.conduction.flux(&kinematics[n..], flux);
    }

    fn divergence<T: FieldScalar>(
        &self,
        gradient: &GradientOperator<T>,
        kinetics: &[T],
        scale: &T,
        result: &mut [T],
    ) {
        let n = self.num_strains();
        let stride = self.dim + 1;
        stress_divergence(gradient, &kinetics[..n], scale, stride, 0, result);
        flux_divergence(gradient, &kinetics[n..], scale, stride, self.dim, result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn layout_and_heating_in_a_bar() {
        let physics = Thermomechanics::new(
            1,
            LinearElastic::new(100.0, 0.0),
            IsotropicConduction::linear(2.0),
            ThermalExpansion {
                coefficient: 0.01,
                reference_temperature: 0.0,
            },
        );
        let c = physics.constants();
        assert_eq!((c.dofs_per_node, c.num_kinematics), (2, 2));

        let op = GradientOperator::new(1, &[0.0, 1.0], 0).unwrap();
        // (u, T) per node, no displacement, T = 1 → 3
        let state = [0.0, 1.0, 0.0, 3.0];
        let mut k = [0.0; 2];
        physics.kinematics(&op, &state, &mut k);
        assert_relative_eq!(k[0], 0.0);
        assert_relative_eq!(k[1], 2.0);

        let mut s = [0.0; 2];
        physics.kinetics(&k, &[0.0, 2.0], &[], &mut s);
        assert_relative_eq!(s[0], -100.0 * 0.01 * 2.0);
        assert_relative_eq!(s[1], 4.0);

        let mut r = [0.0; 4];
        physics.divergence(&op, &s, &1.0, &mut r);
        assert_relative_eq!(r[0], 2.0);
        assert_relative_eq!(r[1], -4.0);
        assert_relative_eq!(r[2], -2.0);
        assert_relative_eq!(r[3], 4.0);
    }
}
