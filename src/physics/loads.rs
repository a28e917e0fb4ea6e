//! External loads. Loads enter the residual `R = F_int - F_ext` with a
//! negative sign and are lumped equally to the nodes they act on, which is
//! exact for constant loads on linear simplices.

use crate::numerics::dual::FieldScalar;

use super::ElementConstants;

#[derive(Clone, Debug, PartialEq)]
pub enum Load {
    /// Load per unit volume of material; scaled by the cell density.
    Body { values: Vec<f64> },
    /// Traction or flux per unit area on a side set.
    Surface { side_set: String, values: Vec<f64> },
    /// Point load on every node of a node set.
    Nodal { node_set: String, values: Vec<f64> },
}

impl Load {
    pub fn body(values: impl Into<Vec<f64>>) -> Self {
        Load::Body {
            values: values.into(),
        }
    }

    pub fn surface(side_set: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        Load::Surface {
            side_set: side_set.into(),
            values: values.into(),
        }
    }

    pub fn nodal(node_set: impl Into<String>, values: impl Into<Vec<f64>>) -> Self {
        Load::Nodal {
            node_set: node_set.into(),
            values: values.into(),
        }
    }

    /// One value per dof of a node.
    pub fn values(&self) -> &[f64] {
        match self {
            Load::Body { values } | Load::Surface { values, .. } | Load::Nodal { values, .. } => values,
        }
    }
}

/// Subtract `scale * measure * values / nodes.len()` from every node of
/// `nodes` in a cell-local result row.
pub(crate) fn subtract_lumped<T: FieldScalar>(
    c: &ElementConstants,
    values: &[f64],
    measure: &T,
    scale: f64,
    nodes: impl Iterator<Item = usize> + Clone,
    result: &mut [T],
) {
    let count = nodes.clone().count();
    if count == 0 {
        return;
    }
    let share = measure.clone() * (scale / count as f64);
    for a in nodes {
        for (k, &v) in values.iter().enumerate() {
            if v != 0.0 {
                result[a * c.dofs_per_node + k] -= share.clone() * v;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_load_skips_the_opposite_node() {
        let c = ElementConstants::simplex(2, 2, 0, 3);
        let mut r = vec![0.0; 6];
        subtract_lumped(&c, &[0.0, -4.0], &2.0, 1.0, (0..3).filter(|&a| a != 1), &mut r);
        assert_eq!(r, vec![0.0, 4.0, 0.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn values_accessor() {
        assert_eq!(Load::nodal("x+", [1.0, 2.0]).values(), &[1.0, 2.0]);
        assert_eq!(Load::body(vec![3.0]).values(), &[3.0]);
    }
}
