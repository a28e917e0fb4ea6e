use std::sync::Arc;

use criterion::{BatchSize, BenchmarkId, Criterion, criterion_group, criterion_main};
use nalgebra::DVector;
use topofem_rs::discretization::generator::create_rectangle;
use topofem_rs::numerics::linear::DenseLuSolver;
use topofem_rs::numerics::solver::NewtonSolver;
use topofem_rs::physics::bc::EssentialBCs;
use topofem_rs::physics::functional::VectorFunction;
use topofem_rs::physics::loads::Load;
use topofem_rs::physics::material::LinearElastic;
use topofem_rs::physics::mechanics::Mechanics;
use topofem_rs::physics::scalar::{ScalarFunction, ScalarKind};
use topofem_rs::problem::Problem;

fn assembly_sizes() -> Vec<usize> {
    vec![16, 48]
}

fn solver_sizes() -> Vec<usize> {
    vec![8, 16]
}

fn cantilever(cells: usize) -> (VectorFunction<Mechanics>, EssentialBCs) {
    let mesh = Arc::new(create_rectangle([2.0, 1.0], 2 * cells, cells));
    let residual = VectorFunction::new(mesh.clone(), Mechanics::new(2, LinearElastic::new(1.0, 0.3)))
        .with_load(Load::surface("x+", [0.0, -1.0]));
    let bcs = EssentialBCs::default()
        .with_fixed_node_set(&mesh, "x-", 2)
        .expect("x- is tagged by the generator");
    (residual, bcs)
}

fn inputs(residual: &VectorFunction<Mechanics>) -> (DVector<f64>, DVector<f64>) {
    let state = DVector::from_fn(residual.num_dofs(), |i, _| 1e-3 * (i as f64).sin());
    let control = DVector::from_element(residual.num_controls(), 0.5);
    (state, control)
}

fn bench_residual(c: &mut Criterion) {
    let mut group = c.benchmark_group("residual");
    for &size in &assembly_sizes() {
        let (residual, _) = cantilever(size);
        let (state, control) = inputs(&residual);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let r = residual.value(&state, &control).expect("residual");
                std::hint::black_box(r);
            });
        });
    }
    group.finish();
}

fn bench_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("jacobian");
    for &size in &assembly_sizes() {
        let (residual, _) = cantilever(size);
        let (state, control) = inputs(&residual);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let jac = residual.gradient_u(&state, &control).expect("jacobian");
                std::hint::black_box(jac.nnz());
            });
        });
    }
    group.finish();
}

fn bench_control_jacobian(c: &mut Criterion) {
    let mut group = c.benchmark_group("control_jacobian");
    for &size in &assembly_sizes() {
        let (residual, _) = cantilever(size);
        let (state, control) = inputs(&residual);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                let jac = residual.gradient_z(&state, &control).expect("control jacobian");
                std::hint::black_box(jac.nnz());
            });
        });
    }
    group.finish();
}

fn bench_newton(c: &mut Criterion) {
    let mut group = c.benchmark_group("newton_linear");
    for &size in &solver_sizes() {
        let (residual, bcs) = cantilever(size);
        let (_, control) = inputs(&residual);
        let solver = NewtonSolver::linear().with_logging(false);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter_batched(
                || DVector::zeros(residual.num_dofs()),
                |u| {
                    let _ = solver.solve(&residual, &bcs, &DenseLuSolver, &control, u);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_adjoint_gradient(c: &mut Criterion) {
    let mut group = c.benchmark_group("adjoint_gradient");
    for &size in &solver_sizes() {
        let (residual, bcs) = cantilever(size);
        let (_, control) = inputs(&residual);
        let compliance = ScalarFunction::from_residual(&residual, ScalarKind::InternalEnergy);
        let mut problem = Problem::builder(residual)
            .essential_bcs(bcs)
            .newton(NewtonSolver::linear().with_logging(false))
            .criterion("compliance", compliance, false)
            .build()
            .expect("problem");
        problem.solution(&control).expect("forward solve");
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &_| {
            b.iter(|| {
                // clearing forces a fresh adjoint solve each iteration
                problem.clear_adjoint_cache();
                let g = problem.criterion_gradient(&control, "compliance").expect("gradient");
                std::hint::black_box(g);
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_residual,
    bench_jacobian,
    bench_control_jacobian,
    bench_newton,
    bench_adjoint_gradient
);
criterion_main!(benches);
