//! Evaluation-type selector.
//!
//! Each evaluation kind is a zero-sized type that fixes, at compile time, the
//! scalar type of every input category (state, control, configuration,
//! node-state) and of the result. Exactly one category is dual in a Jacobian
//! kind; `Value` keeps everything plain. The kernels never branch on the kind:
//! substituting the scalar types is what selects the derivative.

use num_dual::DualDVec64;

use super::dual::FieldScalar;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvaluationKind {
    Value,
    JacobianState,
    JacobianControl,
    JacobianConfig,
    JacobianNodeState,
}

impl EvaluationKind {
    pub fn is_jacobian(self) -> bool {
        !matches!(self, EvaluationKind::Value)
    }
}

/// Scalar-type assignment for one evaluation kind.
pub trait EvaluationType: Send + Sync + 'static {
    const KIND: EvaluationKind;

    type StateScalar: FieldScalar;
    type ControlScalar: FieldScalar;
    type ConfigScalar: FieldScalar;
    type NodeStateScalar: FieldScalar;
    type ResultScalar: FieldScalar
        + From<Self::StateScalar>
        + From<Self::ControlScalar>
        + From<Self::ConfigScalar>
        + From<Self::NodeStateScalar>;
}

/// Residual or criterion value only.
pub struct Value;

/// Partials with respect to the cell's state dofs.
pub struct JacobianState;

/// Partials with respect to the cell's nodal control values.
pub struct JacobianControl;

/// Partials with respect to the cell's nodal coordinates.
pub struct JacobianConfig;

/// Partials with respect to the cell's nodal node-state values.
pub struct JacobianNodeState;

impl EvaluationType for Value {
    const KIND: EvaluationKind = EvaluationKind::Value;
    type StateScalar = f64;
    type ControlScalar = f64;
    type ConfigScalar = f64;
    type NodeStateScalar = f64;
    type ResultScalar = f64;
}

impl EvaluationType for JacobianState {
    const KIND: EvaluationKind = EvaluationKind::JacobianState;
    type StateScalar = DualDVec64;
    type ControlScalar = f64;
    type ConfigScalar = f64;
    type NodeStateScalar = f64;
    type ResultScalar = DualDVec64;
}

impl EvaluationType for JacobianControl {
    const KIND: EvaluationKind = EvaluationKind::JacobianControl;
    type StateScalar = f64;
    type ControlScalar = DualDVec64;
    type ConfigScalar = f64;
    type NodeStateScalar = f64;
    type ResultScalar = DualDVec64;
}

impl EvaluationType for JacobianConfig {
    const KIND: EvaluationKind = EvaluationKind::JacobianConfig;
    type StateScalar = f64;
    type ControlScalar = f64;
    type ConfigScalar = DualDVec64;
    type NodeStateScalar = f64;
    type ResultScalar = DualDVec64;
}

impl EvaluationType for JacobianNodeState {
    const KIND: EvaluationKind = EvaluationKind::JacobianNodeState;
    type StateScalar = f64;
    type ControlScalar = f64;
    type ConfigScalar = f64;
    type NodeStateScalar = DualDVec64;
    type ResultScalar = DualDVec64;
}
