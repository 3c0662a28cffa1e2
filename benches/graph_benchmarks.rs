use cascade_core::config::PropagationConfig;
use cascade_core::graph::DependencyGraph;
use cascade_core::models::{TaskId, TaskRecord};
use cascade_core::propagation::StatusPropagationEngine;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const NODES: TaskId = 10_000;

/// Layered graph: each task depends on up to three tasks from the previous 50
fn layered_records() -> Vec<TaskRecord> {
    let mut rng = fastrand::Rng::with_seed(7);
    (1..=NODES)
        .map(|id| {
            let dependencies: Vec<TaskId> = if id == 1 {
                Vec::new()
            } else {
                (0..rng.usize(0..=3))
                    .map(|_| rng.i64((id - 50).max(1)..id))
                    .collect()
            };
            let mut record = TaskRecord::new(id, dependencies);
            record.dependencies.sort_unstable();
            record.dependencies.dedup();
            record.closed = rng.f64() < 0.3;
            record
        })
        .collect()
}

fn benchmark_graph_build(c: &mut Criterion) {
    let records = layered_records();
    c.bench_function("graph_build_10k", |b| {
        b.iter(|| DependencyGraph::build(black_box(records.clone())))
    });
}

fn benchmark_analysis(c: &mut Criterion) {
    let graph = DependencyGraph::build(layered_records()).unwrap();
    c.bench_function("detect_cycles_10k", |b| b.iter(|| black_box(&graph).detect_cycles()));
    c.bench_function("resolution_order_10k", |b| {
        b.iter(|| black_box(&graph).resolution_order())
    });
    c.bench_function("critical_path_10k", |b| b.iter(|| black_box(&graph).critical_path()));
}

fn benchmark_propagation(c: &mut Criterion) {
    let graph = DependencyGraph::build(layered_records()).unwrap();
    let engine = StatusPropagationEngine::new(&PropagationConfig::default());
    c.bench_function("find_unblockable_10k", |b| {
        b.iter(|| black_box(&graph).find_unblockable(&[5_000]))
    });
    c.bench_function("plan_full_scan_10k", |b| {
        b.iter(|| engine.plan_full_scan(black_box(&graph)))
    });
}

criterion_group!(
    benches,
    benchmark_graph_build,
    benchmark_analysis,
    benchmark_propagation
);
criterion_main!(benches);
