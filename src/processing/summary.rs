use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

use crate::discretization::Mesh;
use crate::numerics::solver::{NewtonResult, NewtonStatus};
use crate::problem::adjoint::AdjointSource;

pub struct CriterionSummary {
    pub name: String,
    pub value: f64,
    pub gradient_norm: f64,
    pub adjoint: Option<AdjointSource>,
}

pub struct RunSummary {
    // Mesh info
    pub spatial_dim: usize,
    pub num_cells: usize,
    pub num_nodes: usize,
    pub bounding_box: (Vec<f64>, Vec<f64>),
    pub total_volume: f64,

    // Problem info
    pub physics: String,
    pub num_dofs: usize,
    pub num_constrained: usize,

    // Solver info
    pub newton_iterations: Option<u32>,
    pub newton_residual: Option<f64>,
    pub newton_status: Option<NewtonStatus>,

    pub criteria: Vec<CriterionSummary>,
}

impl RunSummary {
    pub fn new(mesh: &Mesh, physics: &str, num_dofs: usize, num_constrained: usize) -> Self {
        let dim = mesh.spatial_dim;
        let mut lo = vec![f64::INFINITY; dim];
        let mut hi = vec![f64::NEG_INFINITY; dim];
        for node in 0..mesh.num_nodes() {
            for (d, &x) in mesh.node_coords(node).iter().enumerate() {
                lo[d] = lo[d].min(x);
                hi[d] = hi[d].max(x);
            }
        }

        Self {
            spatial_dim: dim,
            num_cells: mesh.num_cells(),
            num_nodes: mesh.num_nodes(),
            bounding_box: (lo, hi),
            total_volume: total_volume(mesh),
            physics: physics.to_string(),
            num_dofs,
            num_constrained,
            newton_iterations: None,
            newton_residual: None,
            newton_status: None,
            criteria: Vec::new(),
        }
    }

    pub fn add_newton_info(&mut self, result: &NewtonResult) {
        self.newton_iterations = Some(result.iterations);
        self.newton_residual = Some(result.residual_norm);
        self.newton_status = Some(result.status);
    }

    pub fn add_criterion(&mut self, name: &str, value: f64, gradient: &DVector<f64>, adjoint: Option<AdjointSource>) {
        self.criteria.push(CriterionSummary {
            name: name.to_string(),
            value,
            gradient_norm: gradient.norm(),
            adjoint,
        });
    }

    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out, "TOPOLOGY OPTIMIZATION RUN SUMMARY")?;
        writeln!(out, "{}", "=".repeat(60))?;
        writeln!(out)?;

        writeln!(out, "MESH STATISTICS")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Spatial dimension:   {}", self.spatial_dim)?;
        writeln!(out, "Number of cells:     {}", self.num_cells)?;
        writeln!(out, "Number of nodes:     {}", self.num_nodes)?;
        writeln!(out, "Bounding box min:    {:?}", self.bounding_box.0)?;
        writeln!(out, "Bounding box max:    {:?}", self.bounding_box.1)?;
        writeln!(out, "Total volume:        {:.6e}", self.total_volume)?;
        writeln!(out)?;

        writeln!(out, "PROBLEM")?;
        writeln!(out, "{}", "-".repeat(60))?;
        writeln!(out, "Physics:             {}", self.physics)?;
        writeln!(out, "Unknowns:            {}", self.num_dofs)?;
        writeln!(out, "Constrained dofs:    {}", self.num_constrained)?;
        writeln!(out)?;

        if let (Some(iter), Some(res), Some(status)) =
            (self.newton_iterations, self.newton_residual, self.newton_status)
        {
            writeln!(out, "SOLVER PERFORMANCE")?;
            writeln!(out, "{}", "-".repeat(60))?;
            writeln!(out, "Newton iterations:   {iter}")?;
            writeln!(out, "Final residual:      {res:.6e}")?;
            writeln!(out, "Status:              {status:?}")?;
            writeln!(out)?;
        }

        if !self.criteria.is_empty() {
            writeln!(out, "CRITERIA")?;
            writeln!(out, "{}", "-".repeat(60))?;
            for c in &self.criteria {
                writeln!(out, "{}:", c.name)?;
                writeln!(out, "  value:             {:.6e}", c.value)?;
                writeln!(out, "  |gradient|:        {:.6e}", c.gradient_norm)?;
                if let Some(source) = c.adjoint {
                    writeln!(out, "  adjoint:           {source:?}")?;
                }
            }
            writeln!(out)?;
        }

        writeln!(out, "{}", "=".repeat(60))
    }

    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        self.render(&mut file)?;
        file.flush()
    }

    pub fn print_to_console(&self) {
        println!("\n{}", "=".repeat(60));
        println!("RUN SUMMARY");
        println!("{}", "=".repeat(60));
        println!(
            "Mesh:          {} cells, {} nodes ({}D)",
            self.num_cells, self.num_nodes, self.spatial_dim
        );
        println!("Physics:       {} ({} unknowns)", self.physics, self.num_dofs);
        if let (Some(iter), Some(res)) = (self.newton_iterations, self.newton_residual) {
            println!("Newton:        {iter} iterations, residual {res:.3e}");
        }
        for c in &self.criteria {
            println!("{:<14} {:.6e} (|grad| {:.3e})", format!("{}:", c.name), c.value, c.gradient_norm);
        }
        println!("{}\n", "=".repeat(60));
    }
}

/// Sum of simplex measures `|det J| / d!`.
fn total_volume(mesh: &Mesh) -> f64 {
    let dim = mesh.spatial_dim;
    let factorial: f64 = (1..=dim).map(|k| k as f64).product();
    (0..mesh.num_cells())
        .map(|cell| {
            let nodes = mesh.cell_nodes(cell);
            let origin = mesh.node_coords(nodes[0]);
            let jacobian = nalgebra::DMatrix::from_fn(dim, dim, |d, a| mesh.node_coords(nodes[a + 1])[d] - origin[d]);
            jacobian.determinant().abs() / factorial
        })
        .sum()
}
