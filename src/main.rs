use std::error::Error;
use std::fs;
use std::sync::Arc;

use nalgebra::DVector;

use topofem_rs::discretization::generator::create_rectangle;
use topofem_rs::numerics::solver::NewtonSolver;
use topofem_rs::physics::bc::EssentialBCs;
use topofem_rs::physics::functional::VectorFunction;
use topofem_rs::physics::loads::Load;
use topofem_rs::physics::material::LinearElastic;
use topofem_rs::physics::mechanics::Mechanics;
use topofem_rs::physics::scalar::{ScalarFunction, ScalarKind};
use topofem_rs::physics::Physics;
use topofem_rs::problem::Problem;
use topofem_rs::processing::csv_writer::{self, NodalField};
use topofem_rs::processing::summary::RunSummary;

const OUTPUT_DIR: &str = "output/main";

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    fs::create_dir_all(OUTPUT_DIR)?;

    // cantilever clamped on the left, shear traction on the right edge
    let mesh = Arc::new(create_rectangle([2.0, 1.0], 40, 20));
    let physics = Mechanics::new(2, LinearElastic::new(1.0, 0.3));
    let residual = VectorFunction::new(mesh.clone(), physics).with_load(Load::surface("x+", [0.0, -1.0]));
    let dofs_per_node = residual.constants().dofs_per_node;
    let bcs = EssentialBCs::default().with_fixed_node_set(&mesh, "x-", dofs_per_node)?;

    let compliance = ScalarFunction::from_residual(&residual, ScalarKind::InternalEnergy);
    let volume = ScalarFunction::from_residual(&residual, ScalarKind::Volume);

    let mut summary = RunSummary::new(&mesh, residual.physics().name(), residual.num_dofs(), bcs.len());
    let mut problem = Problem::builder(residual)
        .essential_bcs(bcs)
        .newton(NewtonSolver::linear())
        .criterion("compliance", compliance, true)
        .criterion("volume", volume, false)
        .build()?;

    let control = DVector::from_element(mesh.num_nodes(), 0.5);
    let state = problem.solution(&control)?.state(0)?.clone();
    if let Some(result) = problem.last_newton() {
        summary.add_newton_info(result);
        csv_writer::write_newton_history(format!("{OUTPUT_DIR}/newton_history.csv"), &result.history)?;
    }

    let mut gradients = Vec::new();
    for name in ["compliance", "volume"] {
        let value = problem.criterion_value(&control, name)?;
        let gradient = problem.criterion_gradient(&control, name)?;
        summary.add_criterion(name, value, &gradient, problem.last_adjoint_source());
        gradients.push(gradient);
    }
    let shape_gradient = problem.criterion_gradient_x(&control, "compliance")?;
    log::info!("compliance shape gradient norm {:.6e}", shape_gradient.norm());

    csv_writer::write_nodal_fields(
        format!("{OUTPUT_DIR}/nodal_fields.csv"),
        &mesh,
        &[
            NodalField {
                name: "displacement",
                values: &state,
                components: dofs_per_node,
            },
            NodalField {
                name: "control",
                values: &control,
                components: 1,
            },
            NodalField {
                name: "dcompliance_dz",
                values: &gradients[0],
                components: 1,
            },
            NodalField {
                name: "dcompliance_dx",
                values: &shape_gradient,
                components: mesh.spatial_dim,
            },
        ],
    )?;

    summary.write_to_file(format!("{OUTPUT_DIR}/run_summary.txt"))?;
    summary.print_to_console();
    println!("Summary saved to {OUTPUT_DIR}/run_summary.txt");
    Ok(())
}
