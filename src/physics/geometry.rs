//! Linear-simplex geometry with one-point quadrature.
//!
//! All quantities are computed in the configuration scalar type so that
//! configuration Jacobians pick up the derivatives of gradients, volumes and
//! side measures with respect to nodal coordinates.

use num_dual::DualNum;
use num_traits::Zero;
use thiserror::Error;

use crate::numerics::dual::FieldScalar;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("cell {cell} has non-positive volume {volume:e}")]
    NonPositiveVolume { cell: usize, volume: f64 },
    #[error("unsupported spatial dimension {0}")]
    UnsupportedDimension(usize),
}

/// Basis gradients and integration weight of one cell at its single
/// quadrature point (the centroid).
#[derive(Clone, Debug)]
pub struct GradientOperator<T> {
    pub spatial_dim: usize,
    pub nodes: usize,
    /// `∂N_a/∂x_d` stored at `a * spatial_dim + d`.
    pub gradients: Vec<T>,
    /// Basis values at the quadrature point.
    pub basis: Vec<f64>,
    /// Cell volume, which is also the quadrature weight.
    pub volume: T,
}

impl<T: FieldScalar> GradientOperator<T> {
    /// Build from cell-local coordinates stored as `a * spatial_dim + d`.
    ///
    /// Fails before any downstream use if the mapping determinant is not
    /// strictly positive.
    pub fn new(spatial_dim: usize, coords: &[T], cell: usize) -> Result<Self, GeometryError> {
        let dim = spatial_dim;
        if !(1..=3).contains(&dim) {
            return Err(GeometryError::UnsupportedDimension(dim));
        }
        let nodes = dim + 1;

        // jac[d * dim + i] = x_{i+1, d} - x_{0, d}
        let mut jac = Vec::with_capacity(dim * dim);
        for d in 0..dim {
            for i in 0..dim {
                jac.push(coords[(i + 1) * dim + d].clone() - coords[d].clone());
            }
        }

        let det = determinant(dim, &jac);
        let weight = 1.0 / factorial(dim);
        if !(det.re() > 0.0) {
            return Err(GeometryError::NonPositiveVolume {
                cell,
                volume: det.re() * weight,
            });
        }

        let inv = inverse(dim, &jac, &det);
        let mut gradients = vec![T::zero(); nodes * dim];
        for k in 0..dim {
            for d in 0..dim {
                let g = inv[k * dim + d].clone();
                gradients[d] -= g.clone();
                gradients[(k + 1) * dim + d] = g;
            }
        }

        Ok(Self {
            spatial_dim: dim,
            nodes,
            gradients,
            basis: vec![1.0 / nodes as f64; nodes],
            volume: det * weight,
        })
    }

    #[inline]
    pub fn grad(&self, node: usize, d: usize) -> &T {
        &self.gradients[node * self.spatial_dim + d]
    }

    /// Convert into a wider scalar type, e.g. plain values into duals.
    pub fn promote<R>(self) -> GradientOperator<R>
    where
        R: FieldScalar + From<T>,
    {
        GradientOperator {
            spatial_dim: self.spatial_dim,
            nodes: self.nodes,
            gradients: self
                .gradients
                .into_iter()
                .map(<R as From<T>>::from)
                .collect(),
            basis: self.basis,
            volume: <R as From<T>>::from(self.volume),
        }
    }
}

/// Measure of side `face` of a cell: 1 for a point, the length of an edge,
/// or the area of a triangle.
pub fn side_measure<T: FieldScalar>(spatial_dim: usize, coords: &[T], face: usize) -> T {
    let dim = spatial_dim;
    let corners: Vec<usize> = (0..=dim).filter(|&a| a != face).collect();
    let edge = |a: usize, b: usize, d: usize| coords[b * dim + d].clone() - coords[a * dim + d].clone();

    match dim {
        2 => {
            let (dx, dy) = (edge(corners[0], corners[1], 0), edge(corners[0], corners[1], 1));
            (dx.clone() * dx + dy.clone() * dy).sqrt()
        }
        3 => {
            let u: Vec<T> = (0..3).map(|d| edge(corners[0], corners[1], d)).collect();
            let v: Vec<T> = (0..3).map(|d| edge(corners[0], corners[2], d)).collect();
            let n = [
                u[1].clone() * v[2].clone() - u[2].clone() * v[1].clone(),
                u[2].clone() * v[0].clone() - u[0].clone() * v[2].clone(),
                u[0].clone() * v[1].clone() - u[1].clone() * v[0].clone(),
            ];
            let norm2 = n.iter().fold(T::zero(), |acc, c| acc + c.clone() * c.clone());
            norm2.sqrt() * 0.5
        }
        _ => T::one(),
    }
}

fn factorial(n: usize) -> f64 {
    (1..=n).map(|k| k as f64).product()
}

fn determinant<T: FieldScalar>(dim: usize, j: &[T]) -> T {
    let j = |r: usize, c: usize| j[r * dim + c].clone();
    match dim {
        1 => j(0, 0),
        2 => j(0, 0) * j(1, 1) - j(0, 1) * j(1, 0),
        _ => {
            j(0, 0) * (j(1, 1) * j(2, 2) - j(1, 2) * j(2, 1))
                - j(0, 1) * (j(1, 0) * j(2, 2) - j(1, 2) * j(2, 0))
                + j(0, 2) * (j(1, 0) * j(2, 1) - j(1, 1) * j(2, 0))
        }
    }
}

/// Inverse by adjugate, row-major.
fn inverse<T: FieldScalar>(dim: usize, jac: &[T], det: &T) -> Vec<T> {
    let j = |r: usize, c: usize| jac[r * dim + c].clone();
    let adj = match dim {
        1 => vec![T::one()],
        2 => vec![j(1, 1), -j(0, 1), -j(1, 0), j(0, 0)],
        _ => vec![
            j(1, 1) * j(2, 2) - j(1, 2) * j(2, 1),
            j(0, 2) * j(2, 1) - j(0, 1) * j(2, 2),
            j(0, 1) * j(1, 2) - j(0, 2) * j(1, 1),
            j(1, 2) * j(2, 0) - j(1, 0) * j(2, 2),
            j(0, 0) * j(2, 2) - j(0, 2) * j(2, 0),
            j(0, 2) * j(1, 0) - j(0, 0) * j(1, 2),
            j(1, 0) * j(2, 1) - j(1, 1) * j(2, 0),
            j(0, 1) * j(2, 0) - j(0, 0) * j(2, 1),
            j(0, 0) * j(1, 1) - j(0, 1) * j(1, 0),
        ],
    };
    adj.into_iter().map(|a| a / det.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_dual::DualDVec64;

    fn gradient_sums(op: &GradientOperator<f64>) -> Vec<f64> {
        (0..op.spatial_dim)
            .map(|d| (0..op.nodes).map(|a| *op.grad(a, d)).sum())
            .collect()
    }

    #[test]
    fn bar_gradients() {
        let op = GradientOperator::new(1, &[1.0, 3.0], 0).unwrap();
        assert_relative_eq!(op.volume, 2.0);
        assert_relative_eq!(*op.grad(0, 0), -0.5);
        assert_relative_eq!(*op.grad(1, 0), 0.5);
        assert_eq!(op.basis, vec![0.5, 0.5]);
    }

    #[test]
    fn triangle_gradients_reproduce_linear_field() {
        let coords = [0.0, 0.0, 2.0, 0.5, 0.3, 1.5];
        let op = GradientOperator::new(2, &coords, 0).unwrap();
        let area = 0.5 * (2.0 * 1.5 - 0.5 * 0.3);
        assert_relative_eq!(op.volume, area, max_relative = 1e-14);

        // f = 3x - 2y
        let f: Vec<f64> = (0..3).map(|a| 3.0 * coords[2 * a] - 2.0 * coords[2 * a + 1]).collect();
        for (d, expected) in [(0, 3.0), (1, -2.0)] {
            let g: f64 = (0..3).map(|a| f[a] * op.grad(a, d)).sum();
            assert_relative_eq!(g, expected, max_relative = 1e-12);
        }
        for s in gradient_sums(&op) {
            assert_relative_eq!(s, 0.0, epsilon = 1e-14);
        }
    }

    #[test]
    fn tetrahedron_gradients_reproduce_linear_field() {
        let coords = [0.0, 0.0, 0.0, 1.0, 0.1, 0.0, 0.2, 1.1, 0.0, 0.1, 0.3, 0.9];
        let op = GradientOperator::new(3, &coords, 4).unwrap();
        let f: Vec<f64> = (0..4)
            .map(|a| coords[3 * a] + 2.0 * coords[3 * a + 1] - coords[3 * a + 2])
            .collect();
        for (d, expected) in [(0, 1.0), (1, 2.0), (2, -1.0)] {
            let g: f64 = (0..4).map(|a| f[a] * op.grad(a, d)).sum();
            assert_relative_eq!(g, expected, max_relative = 1e-12);
        }
        // det = 1 * (1.1 * 0.9) - 0.2 * (0.1 * 0.9) = 0.972
        assert_relative_eq!(op.volume, 0.972 / 6.0, max_relative = 1e-12);
    }

    #[test]
    fn inverted_cell_is_rejected() {
        let err = GradientOperator::new(2, &[0.0, 0.0, 0.0, 1.0, 1.0, 0.0], 7).unwrap_err();
        assert_eq!(
            err,
            GeometryError::NonPositiveVolume {
                cell: 7,
                volume: -0.5
            }
        );
        assert!(GradientOperator::new(1, &[1.0, 1.0], 0).is_err());
    }

    #[test]
    fn volume_derivative_matches_finite_difference() {
        let coords = [0.0, 0.0, 2.0, 0.5, 0.3, 1.5];
        let duals = DualDVec64::seed(&coords);
        let op = GradientOperator::new(2, &duals, 0).unwrap();
        let partials = op.volume.partials(6);

        let h = 1e-7;
        for k in 0..6 {
            let mut plus = coords;
            let mut minus = coords;
            plus[k] += h;
            minus[k] -= h;
            let vp = GradientOperator::new(2, &plus, 0).unwrap().volume;
            let vm = GradientOperator::new(2, &minus, 0).unwrap().volume;
            assert_relative_eq!(partials[k], (vp - vm) / (2.0 * h), epsilon = 1e-7);
        }
    }

    #[test]
    fn side_measures() {
        let tri = [0.0, 0.0, 3.0, 0.0, 0.0, 4.0];
        assert_relative_eq!(side_measure(2, &tri, 0), 5.0);
        assert_relative_eq!(side_measure(2, &tri, 1), 4.0);

        let tet = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0];
        assert_relative_eq!(side_measure(3, &tet, 3), 2.0, max_relative = 1e-14);
        assert_relative_eq!(side_measure(1, &[0.0, 1.0], 0), 1.0);
    }
}
