//! Dual-scalar algebra shared by every evaluation kind.
//!
//! Kernels are written once against [`FieldScalar`]. Plain `f64` carries a
//! value only; [`DualDVec64`] carries a value plus one partial per local
//! independent variable, and the arithmetic overloads in `num_dual` propagate
//! those partials by the chain rule. Combining a dual with a plain scalar
//! treats the plain scalar as having all-zero partials.

use nalgebra::{Dyn, U1};
use num_dual::{Derivative, DualDVec64, DualNum};

/// Scalar capability every cell-local kernel is generic over.
pub trait FieldScalar: DualNum<f64> + nalgebra::Scalar + Send + Sync {
    /// Whether values of this type carry partial derivatives.
    const IS_DUAL: bool;

    /// Lift a cell-local array into this scalar type.
    ///
    /// Dual implementations tag entry `i` as independent variable `i`, so the
    /// partial vector has length `values.len()`.
    fn seed(values: &[f64]) -> Vec<Self>;

    /// Partials with respect to `n` local independent variables. Scalars that
    /// never depended on a seeded variable yield zeros.
    fn partials(&self, n: usize) -> Vec<f64>;
}

impl FieldScalar for f64 {
    const IS_DUAL: bool = false;

    #[inline]
    fn seed(values: &[f64]) -> Vec<Self> {
        values.to_vec()
    }

    #[inline]
    fn partials(&self, n: usize) -> Vec<f64> {
        vec![0.0; n]
    }
}

impl FieldScalar for DualDVec64 {
    const IS_DUAL: bool = true;

    fn seed(values: &[f64]) -> Vec<Self> {
        let n = values.len();
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| DualDVec64::new(v, Derivative::derivative_generic(Dyn(n), U1, i)))
            .collect()
    }

    fn partials(&self, n: usize) -> Vec<f64> {
        let eps = self.eps.clone().unwrap_generic(Dyn(n), U1);
        eps.iter().copied().collect()
    }
}

/// Primal value of any field scalar.
#[inline]
pub fn value_of<T: FieldScalar>(x: &T) -> f64 {
    x.re()
}

/// Convert a slice into another scalar type that can represent it exactly.
pub fn promote_slice<S, T>(values: &[S]) -> Vec<T>
where
    S: Clone,
    T: From<S>,
{
    values.iter().cloned().map(<T as From<S>>::from).collect()
}

/// Sum of `a[i] * b[i]` carried out in the scalar type.
pub fn dot<T: FieldScalar>(a: &[T], b: &[T]) -> T {
    a.iter()
        .zip(b)
        .fold(T::from(0.0), |acc, (x, y)| acc + x.clone() * y.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn chain_rule_for_polynomial() {
        // z = x*x + y at (3, 5): dz/dx = 6, dz/dy = 1
        let v = DualDVec64::seed(&[3.0, 5.0]);
        let z = v[0].clone() * v[0].clone() + v[1].clone();
        assert_eq!(z.re, 14.0);
        assert_eq!(z.partials(2), vec![6.0, 1.0]);
    }

    #[test]
    fn chain_rule_for_elementary_functions() {
        // z = sqrt(x) * y^3 / x
        let (x, y) = (4.0_f64, 2.0_f64);
        let v = DualDVec64::seed(&[x, y]);
        let z = v[0].sqrt() * v[1].powi(3) / v[0].clone();
        let dzdx = -0.5 * x.powf(-1.5) * y.powi(3);
        let dzdy = 3.0 * y * y / x.sqrt();
        let p = z.partials(2);
        assert_relative_eq!(z.re, x.sqrt() * y.powi(3) / x, max_relative = 1e-14);
        assert_relative_eq!(p[0], dzdx, max_relative = 1e-14);
        assert_relative_eq!(p[1], dzdy, max_relative = 1e-14);
    }

    #[test]
    fn plain_scalars_behave_as_constants() {
        let v = DualDVec64::seed(&[2.0]);
        let c = DualDVec64::from(7.0);
        let z = v[0].clone() * c + DualDVec64::from(1.0);
        assert_eq!(z.re, 15.0);
        assert_eq!(z.partials(1), vec![7.0]);

        let scaled = v[0].clone() * 0.5;
        assert_eq!(scaled.partials(1), vec![0.5]);
    }

    #[test]
    fn unseeded_scalars_report_zero_partials() {
        let c = DualDVec64::from(3.0);
        assert_eq!(c.partials(4), vec![0.0; 4]);
        assert_eq!(3.0_f64.partials(2), vec![0.0, 0.0]);
        assert!(!<f64 as FieldScalar>::IS_DUAL);
    }

    #[test]
    fn powf_and_dot_propagate() {
        let v = DualDVec64::seed(&[0.5, 2.0]);
        let z = v[0].powf(3.0);
        assert_relative_eq!(z.partials(2)[0], 3.0 * 0.25, max_relative = 1e-14);

        let d = dot(&v, &v);
        assert_eq!(d.partials(2), vec![1.0, 4.0]);
    }
}
