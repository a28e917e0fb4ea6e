//! Criterion evaluators: scalar objectives or constraints of the solved state
//! and the control, summed over every cycle of a [`Solution`].

use nalgebra::DVector;

use crate::physics::scalar::ScalarFunction;
use crate::physics::{AssemblyError, Physics, check_len};

use super::Solution;

pub trait Criterion: Send + Sync {
    fn value(&self, solution: &Solution, control: &DVector<f64>) -> Result<f64, AssemblyError>;

    /// `∂f/∂u` of one cycle, holding the control fixed.
    fn gradient_u(&self, solution: &Solution, control: &DVector<f64>, cycle: usize) -> Result<DVector<f64>, AssemblyError>;

    /// `∂f/∂z`, holding the states fixed.
    fn gradient_z(&self, solution: &Solution, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError>;

    /// `∂f/∂x`, holding the states fixed.
    fn gradient_x(&self, solution: &Solution, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError>;
}

fn sum_over_cycles(
    solution: &Solution,
    len: usize,
    mut per_state: impl FnMut(&DVector<f64>) -> Result<DVector<f64>, AssemblyError>,
) -> Result<DVector<f64>, AssemblyError> {
    let mut total = DVector::zeros(len);
    for state in solution.states() {
        let part = per_state(state)?;
        check_len("criterion gradient", len, part.len())?;
        total += part;
    }
    Ok(total)
}

impl<P: Physics> Criterion for ScalarFunction<P> {
    fn value(&self, solution: &Solution, control: &DVector<f64>) -> Result<f64, AssemblyError> {
        solution
            .states()
            .iter()
            .map(|state| self.value_of_state(state, control))
            .sum()
    }

    fn gradient_u(&self, solution: &Solution, control: &DVector<f64>, cycle: usize) -> Result<DVector<f64>, AssemblyError> {
        self.gradient_u_of_state(solution.state(cycle)?, control)
    }

    fn gradient_z(&self, solution: &Solution, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        sum_over_cycles(solution, self.mesh().num_nodes(), |state| {
            self.gradient_z_of_state(state, control)
        })
    }

    fn gradient_x(&self, solution: &Solution, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        let mesh = self.mesh();
        sum_over_cycles(solution, mesh.num_nodes() * mesh.spatial_dim, |state| {
            self.gradient_x_of_state(state, control)
        })
    }
}

/// `Σ w_i f_i` over other criteria.
pub struct WeightedSum {
    terms: Vec<(f64, Box<dyn Criterion>)>,
}

impl WeightedSum {
    pub fn new(weight: f64, criterion: impl Criterion + 'static) -> Self {
        Self {
            terms: vec![(weight, Box::new(criterion) as Box<dyn Criterion>)],
        }
    }

    pub fn and(mut self, weight: f64, criterion: impl Criterion + 'static) -> Self {
        self.terms.push((weight, Box::new(criterion)));
        self
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    fn combine(
        &self,
        mut gradient: impl FnMut(&dyn Criterion) -> Result<DVector<f64>, AssemblyError>,
    ) -> Result<DVector<f64>, AssemblyError> {
        let mut total: Option<DVector<f64>> = None;
        for (weight, criterion) in &self.terms {
            let part = gradient(criterion.as_ref())? * *weight;
            match total.as_mut() {
                Some(sum) => {
                    check_len("weighted criterion gradient", sum.len(), part.len())?;
                    *sum += part;
                }
                None => total = Some(part),
            }
        }
        Ok(total.unwrap_or_else(|| DVector::zeros(0)))
    }
}

impl Criterion for WeightedSum {
    fn value(&self, solution: &Solution, control: &DVector<f64>) -> Result<f64, AssemblyError> {
        self.terms
            .iter()
            .map(|(weight, criterion)| -> Result<f64, AssemblyError> {
                Ok(weight * criterion.value(solution, control)?)
            })
            .sum()
    }

    fn gradient_u(&self, solution: &Solution, control: &DVector<f64>, cycle: usize) -> Result<DVector<f64>, AssemblyError> {
        self.combine(|c| c.gradient_u(solution, control, cycle))
    }

    fn gradient_z(&self, solution: &Solution, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        self.combine(|c| c.gradient_z(solution, control))
    }

    fn gradient_x(&self, solution: &Solution, control: &DVector<f64>) -> Result<DVector<f64>, AssemblyError> {
        self.combine(|c| c.gradient_x(solution, control))
    }
}
