use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use hyperpath::trace::NullTraceSink;
use hyperpath::{PathfinderParams, Pathfinder};

fn deterministic_benchmark(c: &mut Criterion) {
    let (supply, spec) = dev_utils::build_benchmark_scenario(40, 6);
    let params = PathfinderParams::default();
    let pathfinder = Pathfinder::new(&supply, params);

    c.bench_function("labeling_deterministic", |b| {
        b.iter(|| {
            let mut trace = NullTraceSink;
            pathfinder.find_path(black_box(&spec), &mut trace).unwrap()
        })
    });
}

fn hyperpath_benchmark(c: &mut Criterion) {
    let (supply, mut spec) = dev_utils::build_benchmark_scenario(40, 6);
    spec.hyperpath = true;
    let mut params = PathfinderParams::default();
    params.time_window = 45.0;
    params.stoch_dispersion = 3.0;
    params.stoch_pathset_size = 50;
    let pathfinder = Pathfinder::new(&supply, params);

    c.bench_function("labeling_hyperpath", |b| {
        b.iter(|| {
            let mut trace = NullTraceSink;
            pathfinder.find_path(black_box(&spec), &mut trace).unwrap()
        })
    });
}

criterion_group!(benches, deterministic_benchmark, hyperpath_benchmark);
criterion_main!(benches);
