//! Scalar functions of the state, assembled on the same cell skeleton as the
//! residual. Every cell adds one value into row 0, so a Jacobian kind yields a
//! gradient vector instead of a matrix.

use std::sync::Arc;

use nalgebra::DVector;

use crate::discretization::Mesh;
use crate::numerics::dual::{FieldScalar, dot};
use crate::numerics::evaluation::{EvaluationType, JacobianConfig, JacobianControl, JacobianState, Value};

use super::functional::{AssemblyOptions, BatchAssembly, Contribution, RowLayout, VectorFunction};
use super::kernel::{self, CellQuantities};
use super::penalty::SimpPenalty;
use super::workset::{GlobalFields, num_columns};
use super::{AssemblyError, Physics, check_len};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarKind {
    /// `½ ∫ w(ρ) kinetics · kinematics dV`; half the compliance for linear
    /// elasticity.
    InternalEnergy,
    /// `∫ ρ dV`.
    Volume,
    /// `∫ |u_h|² dV`.
    StateSquaredNorm,
}

fn integrand<T: FieldScalar>(kind: ScalarKind, q: &CellQuantities<T>) -> T {
    let volume = q.gradient.volume.clone();
    match kind {
        ScalarKind::InternalEnergy => dot(&q.kinetics, &q.kinematics) * q.penalty.clone() * volume * 0.5,
        ScalarKind::Volume => q.density.clone() * volume,
        ScalarKind::StateSquaredNorm => dot(&q.point_state, &q.point_state) * volume,
    }
}

pub struct ScalarFunction<P: Physics> {
    mesh: Arc<Mesh>,
    physics: P,
    penalty: SimpPenalty,
    kind: ScalarKind,
    node_state: DVector<f64>,
    options: AssemblyOptions,
}

impl<P: Physics> ScalarFunction<P> {
    pub fn new(mesh: Arc<Mesh>, physics: P, kind: ScalarKind) -> Self {
        let node_state = DVector::zeros(mesh.num_nodes() * physics.constants().node_state_dofs);
        Self {
            mesh,
            physics,
            penalty: SimpPenalty::default(),
            kind,
            node_state,
            options: AssemblyOptions::default(),
        }
    }

    /// Share mesh, physics, penalty and node-state with a residual.
    pub fn from_residual(residual: &VectorFunction<P>, kind: ScalarKind) -> Self
    where
        P: Clone,
    {
        Self {
            mesh: residual.mesh().clone(),
            physics: residual.physics().clone(),
            penalty: residual.penalty(),
            kind,
            node_state: residual.node_state().clone(),
            options: residual.options(),
        }
    }

    pub fn with_penalty(mut self, penalty: SimpPenalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_node_state(mut self, node_state: DVector<f64>) -> Result<Self, AssemblyError> {
        check_len("node state", self.node_state.len(), node_state.len())?;
        self.node_state = node_state;
        Ok(self)
    }

    pub fn with_options(mut self, options: AssemblyOptions) -> Self {
        self.options = options;
        self
    }

    pub fn kind(&self) -> ScalarKind {
        self.kind
    }

    pub fn mesh(&self) -> &Arc<Mesh> {
        &self.mesh
    }

    pub fn num_dofs(&self) -> usize {
        self.mesh.num_nodes() * self.physics.constants().dofs_per_node
    }

    pub fn value_of_state(&self, state: &DVector<f64>, control: &DVector<f64>) -> Result<f64, AssemblyError> {
        Ok(self.evaluate::<Value>(state, control)?.into_vector(1)[0])
    }

    pub fn gradient_u_of_state(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, AssemblyError> {
        self.gradient::<JacobianState>(state, control)
    }

    pub fn gradient_z_of_state(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, AssemblyError> {
        self.gradient::<JacobianControl>(state, control)
    }

    pub fn gradient_x_of_state(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, AssemblyError> {
        self.gradient::<JacobianConfig>(state, control)
    }

    fn gradient<E: EvaluationType>(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<DVector<f64>, AssemblyError> {
        let len = num_columns(E::KIND, &self.physics.constants(), &self.mesh);
        Ok(self.evaluate::<E>(state, control)?.into_gradient(len))
    }

    fn evaluate<E: EvaluationType>(
        &self,
        state: &DVector<f64>,
        control: &DVector<f64>,
    ) -> Result<Contribution, AssemblyError> {
        let c = self.physics.constants();
        check_len("mesh spatial dimension", c.spatial_dim, self.mesh.spatial_dim)?;
        check_len("state", self.num_dofs(), state.len())?;
        check_len("control", self.mesh.num_nodes(), control.len())?;

        let assembly = BatchAssembly {
            mesh: &self.mesh,
            constants: c,
            fields: GlobalFields {
                state,
                control,
                node_state: &self.node_state,
            },
            options: self.options,
            layout: RowLayout::Scalar,
        };

        let mut total = Contribution::default();
        for domain in &self.mesh.domains {
            let part = assembly.run::<E, _, _>(&domain.cells, |_, workset, i, result| {
                let q = kernel::cell_quantities(&self.physics, &self.penalty, workset, i).map_err(|source| {
                    AssemblyError::Geometry {
                        domain: domain.name.clone(),
                        source,
                    }
                })?;
                result[0] = integrand(self.kind, &q);
                Ok(())
            })?;
            total = total.merge(part);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::{create_bar, create_rectangle};
    use crate::physics::conduction::Conduction;
    use crate::physics::loads::Load;
    use crate::physics::material::{IsotropicConduction, LinearElastic};
    use crate::physics::mechanics::Mechanics;
    use approx::assert_relative_eq;

    const H: f64 = 1e-6;

    fn fd_gradient(p: &DVector<f64>, f: impl Fn(&DVector<f64>) -> f64) -> DVector<f64> {
        DVector::from_fn(p.len(), |j, _| {
            let mut plus = p.clone();
            let mut minus = p.clone();
            plus[j] += H;
            minus[j] -= H;
            (f(&plus) - f(&minus)) / (2.0 * H)
        })
    }

    fn assert_vector_close(a: &DVector<f64>, b: &DVector<f64>, tol: f64) {
        assert_eq!(a.len(), b.len());
        let scale = b.amax().max(1.0);
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() <= tol * scale, "{x} vs {y}");
        }
    }

    #[test]
    fn bar_energy_is_half_u_k_u() {
        let mesh = Arc::new(create_bar(2.0, 2));
        let energy = ScalarFunction::new(mesh, Mechanics::new(1, LinearElastic::new(3.0, 0.0)), ScalarKind::InternalEnergy)
            .with_penalty(SimpPenalty::linear());
        let state = DVector::from_vec(vec![0.0, 0.1, 0.3]);
        let control = DVector::from_element(3, 1.0);

        assert_relative_eq!(energy.value_of_state(&state, &control).unwrap(), 0.075, max_relative = 1e-13);
        let du = energy.gradient_u_of_state(&state, &control).unwrap();
        assert_relative_eq!(du[0], -0.3, epsilon = 1e-13);
        assert_relative_eq!(du[1], -0.3, epsilon = 1e-13);
        assert_relative_eq!(du[2], 0.6, epsilon = 1e-13);
    }

    #[test]
    fn volume_ignores_the_state() {
        let mesh = Arc::new(create_rectangle([2.0, 1.0], 2, 2));
        let n = mesh.num_nodes();
        let volume = ScalarFunction::new(mesh, Mechanics::new(2, LinearElastic::new(1.0, 0.3)), ScalarKind::Volume);
        let state = DVector::from_fn(2 * n, |i, _| i as f64);
        let control = DVector::from_element(n, 0.5);

        assert_relative_eq!(volume.value_of_state(&state, &control).unwrap(), 1.0, max_relative = 1e-13);
        assert_eq!(volume.gradient_u_of_state(&state, &control).unwrap().amax(), 0.0);
        assert_relative_eq!(volume.gradient_z_of_state(&state, &control).unwrap().sum(), 2.0, max_relative = 1e-13);
    }

    #[test]
    fn gradients_match_finite_differences() {
        let mesh = Arc::new(create_rectangle([1.0, 1.0], 2, 2));
        let n = mesh.num_nodes();
        let physics = Conduction::thermal(2, IsotropicConduction::nonlinear(1.5, 0.4));
        let state = DVector::from_fn(n, |i, _| (0.7 * i as f64).cos());
        let control = DVector::from_fn(n, |i, _| 0.3 + 0.06 * i as f64);

        for kind in [ScalarKind::InternalEnergy, ScalarKind::StateSquaredNorm] {
            let f = ScalarFunction::new(mesh.clone(), physics.clone(), kind);

            let du = f.gradient_u_of_state(&state, &control).unwrap();
            let fd = fd_gradient(&state, |u| f.value_of_state(u, &control).unwrap());
            assert_vector_close(&du, &fd, 1e-7);

            let dz = f.gradient_z_of_state(&state, &control).unwrap();
            let fd = fd_gradient(&control, |z| f.value_of_state(&state, z).unwrap());
            assert_vector_close(&dz, &fd, 1e-7);

            let dx = f.gradient_x_of_state(&state, &control).unwrap();
            let coords = DVector::from_vec(mesh.coordinates.clone());
            let fd = fd_gradient(&coords, |x| {
                let moved = Arc::new(mesh.with_coordinates(x.as_slice().to_vec()));
                ScalarFunction::new(moved, physics.clone(), kind)
                    .value_of_state(&state, &control)
                    .unwrap()
            });
            assert_vector_close(&dx, &fd, 1e-6);
        }
    }

    #[test]
    fn from_residual_shares_the_setup() {
        let mesh = Arc::new(create_bar(1.0, 4));
        let residual = VectorFunction::new(mesh, Mechanics::new(1, LinearElastic::new(2.0, 0.0)))
            .with_penalty(SimpPenalty::linear())
            .with_load(Load::nodal("x+", [1.0]));
        let energy = ScalarFunction::from_residual(&residual, ScalarKind::InternalEnergy);
        assert_eq!(energy.kind(), ScalarKind::InternalEnergy);
        assert_eq!(energy.num_dofs(), 5);

        let state = DVector::from_fn(5, |i, _| 0.1 * i as f64);
        let control = DVector::from_element(5, 0.5);
        // uniform strain 0.4 over unit length, linear penalty
        assert_relative_eq!(
            energy.value_of_state(&state, &control).unwrap(),
            0.5 * 0.5 * 2.0 * 0.16,
            max_relative = 1e-12
        );
    }
}
