use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hmsketch::Registry;

/// Builds a registry with `instances` distinct instance labels spread over
/// a handful of jobs and regions.
fn populated(instances: usize) -> Registry {
    let registry = Registry::new(2);
    for i in 0..instances {
        let instance = format!("instance-{}", i);
        let job = format!("job-{}", i % 16);
        let region = if i % 2 == 0 { "eu" } else { "us" };
        for j in 0..32 {
            registry.insert(
                [
                    ("instance", instance.as_str()),
                    ("job", job.as_str()),
                    ("region", region),
                ],
                (1 + j * 7) as f64,
                1.0,
            );
        }
    }
    registry
}

fn bench_sketch(c: &mut Criterion) {
    let mut group = c.benchmark_group("sketch");

    for instances in [16usize, 256, 4096] {
        let registry = populated(instances);

        group.bench_with_input(
            BenchmarkId::new("one label", instances),
            &registry,
            |b, registry| b.iter(|| black_box(registry.sketch([("job", "job-3")]))),
        );

        group.bench_with_input(
            BenchmarkId::new("three labels", instances),
            &registry,
            |b, registry| {
                b.iter(|| {
                    black_box(registry.count([
                        ("job", "job-3"),
                        ("region", "us"),
                        ("instance", "instance-3"),
                    ]))
                })
            },
        );
    }

    group.finish();
}

fn bench_algebra(c: &mut Criterion) {
    let mut group = c.benchmark_group("algebra");
    group.sample_size(20);

    for instances in [16usize, 256, 4096] {
        let start = populated(instances / 2);
        let end = populated(instances);

        group.bench_with_input(
            BenchmarkId::new("combine", instances),
            &(&start, &end),
            |b, (start, end)| b.iter(|| black_box(end.combine(start))),
        );

        group.bench_with_input(
            BenchmarkId::new("cancel", instances),
            &(&start, &end),
            |b, (start, end)| b.iter(|| black_box(end.cancel(start))),
        );

        group.bench_with_input(
            BenchmarkId::new("serialize", instances),
            &end,
            |b, end| b.iter(|| black_box(end.serialize().unwrap())),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_sketch, bench_algebra);
criterion_main!(benches);
