//! Exploration and merge benchmarks
//!
//! Measures product enumeration, the per-run bookkeeping of a sequential
//! sweep, and signature-based merging of two overlapping sweeps.
//!
//! Run with: cargo bench --bench exploration_benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use paramsweep::environment::{Environment, ExploreOptions};
use paramsweep::exploration::ParameterSpace;
use paramsweep::merge::{merge_trajectories, MergeOptions};
use paramsweep::trajectory::{Parameter, ResultItem, Trajectory};

fn square_space(side: i64) -> ParameterSpace {
    ParameterSpace::new()
        .axis("x", 0..side)
        .axis("y", 0..side)
}

fn swept(name: &str, side: i64, offset: i64) -> Trajectory {
    let mut traj = Trajectory::new(name);
    traj.add_parameter(Parameter::new("x", 0));
    traj.add_parameter(Parameter::new("y", 0));
    let mut env = Environment::builder(traj).build();
    let space = ParameterSpace::new()
        .axis("x", offset..offset + side)
        .axis("y", 0..side);
    env.run_exploration(
        |traj| {
            let x = traj.parameter_value("x")?.as_i64().unwrap_or_default();
            let y = traj.parameter_value("y")?.as_i64().unwrap_or_default();
            traj.add_result(ResultItem::new("z", x * y));
            Ok(None)
        },
        &space,
        &ExploreOptions::new(),
    )
    .expect("sweep");
    env.into_trajectory()
}

/// Benchmark lazy cartesian product enumeration
fn bench_cartesian(c: &mut Criterion) {
    let mut group = c.benchmark_group("cartesian_product");
    for side in [10_i64, 100] {
        let space = square_space(side);
        group.bench_with_input(BenchmarkId::new("enumerate", side * side), &space, |b, space| {
            b.iter(|| black_box(space).iter().count());
        });
    }
    group.finish();
}

/// Benchmark a sequential sweep with a trivial callback (engine overhead)
fn bench_sequential_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sequential_sweep");
    group.sample_size(20);
    for side in [10_i64, 30] {
        group.bench_with_input(BenchmarkId::new("runs", side * side), &side, |b, &side| {
            b.iter(|| swept("bench", side, 0).run_count());
        });
    }
    group.finish();
}

/// Benchmark merging two half-overlapping sweeps with dedup
fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_dedup");
    group.sample_size(20);
    let side = 30;
    let a = swept("a", side, 0);
    let b = swept("b", side, side / 2);
    group.bench_function(BenchmarkId::new("runs", a.run_count() + b.run_count()), |bench| {
        bench.iter(|| {
            let mut target = a.clone();
            merge_trajectories(&mut target, black_box(&b), &MergeOptions::default())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_cartesian, bench_sequential_sweep, bench_merge);
criterion_main!(benches);
