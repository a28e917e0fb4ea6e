//! Constitutive models and the Voigt conventions they share.

use crate::numerics::dual::FieldScalar;

/// Number of Voigt strain components in `dim` dimensions.
pub fn voigt_size(dim: usize) -> usize {
    dim * (dim + 1) / 2
}

/// Tensor index pairs summed into each Voigt component. Shear components
/// list both orderings, so they hold engineering shear strains.
pub fn voigt_pairs(dim: usize) -> &'static [&'static [(usize, usize)]] {
    match dim {
        1 => &[&[(0, 0)]],
        2 => &[&[(0, 0)], &[(1, 1)], &[(0, 1), (1, 0)]],
        _ => &[
            &[(0, 0)],
            &[(1, 1)],
            &[(2, 2)],
            &[(1, 2), (2, 1)],
            &[(0, 2), (2, 0)],
            &[(0, 1), (1, 0)],
        ],
    }
}

/// Isotropic linear elasticity, plane strain in 2D.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearElastic {
    pub youngs_modulus: f64,
    pub poissons_ratio: f64,
}

impl LinearElastic {
    pub fn new(youngs_modulus: f64, poissons_ratio: f64) -> Self {
        Self {
            youngs_modulus,
            poissons_ratio,
        }
    }

    pub fn lame(&self) -> (f64, f64) {
        let (e, nu) = (self.youngs_modulus, self.poissons_ratio);
        let lambda = e * nu / ((1.0 + nu) * (1.0 - 2.0 * nu));
        let mu = e / (2.0 * (1.0 + nu));
        (lambda, mu)
    }

    /// Voigt stiffness for `dim`, frozen into an [`ElasticModel`].
    pub fn model(&self, dim: usize) -> ElasticModel {
        let n = voigt_size(dim);
        let mut stiffness = vec![0.0; n * n];
        if dim == 1 {
            stiffness[0] = self.youngs_modulus;
        } else {
            let (lambda, mu) = self.lame();
            for i in 0..dim {
                for j in 0..dim {
                    stiffness[i * n + j] = lambda;
                }
                stiffness[i * n + i] += 2.0 * mu;
            }
            for i in dim..n {
                stiffness[i * n + i] = mu;
            }
        }
        ElasticModel {
            dim,
            size: n,
            stiffness,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ElasticModel {
    pub dim: usize,
    pub size: usize,
    /// Row-major `size × size` Voigt stiffness.
    pub stiffness: Vec<f64>,
}

impl ElasticModel {
    /// `σ = C (ε - ε_th)`, where the thermal strain `thermal_strain` acts on
    /// the normal components only.
    pub fn stress<T: FieldScalar>(&self, strain: &[T], thermal_strain: Option<&T>, out: &mut [T]) {
        let n = self.size;
        let elastic: Vec<T> = strain
            .iter()
            .enumerate()
            .map(|(i, e)| match thermal_strain {
                Some(th) if i < self.dim => e.clone() - th.clone(),
                _ => e.clone(),
            })
            .collect();
        for (i, s) in out.iter_mut().enumerate().take(n) {
            *s = T::zero();
            for (j, e) in elastic.iter().enumerate() {
                let c = self.stiffness[i * n + j];
                if c != 0.0 {
                    *s += e.clone() * c;
                }
            }
        }
    }
}

/// Isotropic conductivity `k (1 + β |∇φ|²)`; `β = 0` gives linear
/// conduction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct IsotropicConduction {
    pub conductivity: f64,
    pub nonlinear_coefficient: f64,
}

impl IsotropicConduction {
    pub fn linear(conductivity: f64) -> Self {
        Self {
            conductivity,
            nonlinear_coefficient: 0.0,
        }
    }

    pub fn nonlinear(conductivity: f64, nonlinear_coefficient: f64) -> Self {
        Self {
            conductivity,
            nonlinear_coefficient,
        }
    }

    pub fn flux<T: FieldScalar>(&self, gradient: &[T], out: &mut [T]) {
        let mut k = T::from(self.conductivity);
        if self.nonlinear_coefficient != 0.0 {
            let g2 = gradient
                .iter()
                .fold(T::zero(), |acc, g| acc + g.clone() * g.clone());
            k = k * (g2 * self.nonlinear_coefficient + 1.0);
        }
        for (q, g) in out.iter_mut().zip(gradient) {
            *q = k.clone() * g.clone();
        }
    }
}

/// Linear thermal expansion about a reference temperature.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ThermalExpansion {
    pub coefficient: f64,
    pub reference_temperature: f64,
}

impl ThermalExpansion {
    pub fn strain<T: FieldScalar>(&self, temperature: &T) -> T {
        (temperature.clone() - self.reference_temperature) * self.coefficient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::DualDVec64;

    #[test]
    fn plane_strain_stiffness() {
        let m = LinearElastic::new(1.0, 0.25).model(2);
        let (lambda, mu) = LinearElastic::new(1.0, 0.25).lame();
        assert_relative_eq!(m.stiffness[0], lambda + 2.0 * mu);
        assert_relative_eq!(m.stiffness[1], lambda);
        assert_relative_eq!(m.stiffness[8], mu);
        assert_eq!(m.stiffness[2], 0.0);
    }

    #[test]
    fn uniaxial_stress_in_1d() {
        let m = LinearElastic::new(200.0, 0.3).model(1);
        let mut s = [0.0];
        m.stress(&[0.01], None, &mut s);
        assert_relative_eq!(s[0], 2.0);
        m.stress(&[0.01], Some(&0.01), &mut s);
        assert_relative_eq!(s[0], 0.0);
    }

    #[test]
    fn thermal_strain_skips_shear() {
        let m = LinearElastic::new(1.0, 0.0).model(2);
        let mut s = [0.0; 3];
        m.stress(&[0.0, 0.0, 0.2], Some(&0.1), &mut s);
        assert_relative_eq!(s[0], -0.1);
        assert_relative_eq!(s[1], -0.1);
        assert_relative_eq!(s[2], 0.1);
    }

    #[test]
    fn nonlinear_flux_derivative() {
        let c = IsotropicConduction::nonlinear(2.0, 0.5);
        let g = DualDVec64::seed(&[1.0, 2.0]);
        let mut q = vec![DualDVec64::from(0.0); 2];
        c.flux(&g, &mut q);
        // q_x = 2 (1 + 0.5 (gx² + gy²)) gx
        assert_relative_eq!(q[0].re, 2.0 * 3.5);
        let p = q[0].partials(2);
        assert_relative_eq!(p[0], 2.0 * 3.5 + 2.0 * 1.0, max_relative = 1e-14);
        assert_relative_eq!(p[1], 2.0 * 2.0, max_relative = 1e-14);
    }

    #[test]
    fn expansion_strain() {
        let e = ThermalExpansion {
            coefficient: 1e-5,
            reference_temperature: 20.0,
        };
        assert_relative_eq!(e.strain(&120.0), 1e-3, max_relative = 1e-12);
    }
}
