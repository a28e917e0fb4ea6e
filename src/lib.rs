//! Finite element residuals whose Jacobians come from forward-mode dual
//! numbers, a Newton state solver, and discrete-adjoint gradients of scalar
//! criteria with respect to a control field and the nodal coordinates.

pub mod discretization;
pub mod numerics;
pub mod physics;
pub mod problem;
pub mod processing;
