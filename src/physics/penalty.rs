use crate::numerics::dual::FieldScalar;

/// SIMP material interpolation `w(ρ) = w_min + (1 - w_min) ρ^p`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SimpPenalty {
    pub exponent: f64,
    pub minimum_value: f64,
}

impl Default for SimpPenalty {
    fn default() -> Self {
        Self {
            exponent: 3.0,
            minimum_value: 1e-9,
        }
    }
}

impl SimpPenalty {
    /// No penalization: the control density scales the material linearly.
    pub fn linear() -> Self {
        Self {
            exponent: 1.0,
            minimum_value: 0.0,
        }
    }

    pub fn weight<T: FieldScalar>(&self, density: &T) -> T {
        density.powf(self.exponent) * (1.0 - self.minimum_value) + self.minimum_value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::DualDVec64;

    #[test]
    fn bounds_and_slope() {
        let p = SimpPenalty {
            exponent: 3.0,
            minimum_value: 1e-3,
        };
        assert_relative_eq!(p.weight(&1.0), 1.0);
        assert_relative_eq!(p.weight(&0.0), 1e-3);

        let rho = DualDVec64::seed(&[0.5]);
        let w = p.weight(&rho[0]);
        assert_relative_eq!(w.re, 1e-3 + 0.999 * 0.125, max_relative = 1e-14);
        assert_relative_eq!(w.partials(1)[0], 0.999 * 3.0 * 0.25, max_relative = 1e-12);
    }
}
