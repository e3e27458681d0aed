//! Benchmarks for the name-keyed container's registration and resolution paths.

use armature_core::{Container, DefinitionBuilder, RuntimeConfig, Scope};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
#[derive(Clone)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
#[derive(Clone)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("singleton_small_eager", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .register(
                    DefinitionBuilder::new("small")
                        .typed_factory::<SmallService, _>(|_c| Ok(SmallService { value: 42 }))
                        .eager(true)
                        .build(),
                )
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("prototype", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .register(
                    DefinitionBuilder::new("small")
                        .typed_factory::<SmallService, _>(|_c| Ok(SmallService { value: 42 }))
                        .scope(Scope::Prototype)
                        .build(),
                )
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("four_dependent_singletons", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .register(DefinitionBuilder::new("a").typed_factory::<i32, _>(|_c| Ok(1)).eager(true).build())
                .unwrap();
            container
                .register(
                    DefinitionBuilder::new("b")
                        .typed_factory::<i64, _>(|_c| Ok(2))
                        .eager(true)
                        .depends_on("a")
                        .build(),
                )
                .unwrap();
            container
                .register(
                    DefinitionBuilder::new("c")
                        .typed_factory::<u32, _>(|_c| Ok(3))
                        .eager(true)
                        .depends_on("b")
                        .build(),
                )
                .unwrap();
            container
                .register(
                    DefinitionBuilder::new("d")
                        .typed_factory::<u64, _>(|_c| Ok(4))
                        .eager(true)
                        .depends_on("c")
                        .build(),
                )
                .unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = Container::new();
    container
        .register(
            DefinitionBuilder::new("small")
                .typed_factory::<SmallService, _>(|_c| Ok(SmallService { value: 42 }))
                .eager(true)
                .build(),
        )
        .unwrap();
    container
        .register(
            DefinitionBuilder::new("medium")
                .typed_factory::<MediumService, _>(|_c| {
                    Ok(MediumService { name: "test".to_string(), values: vec![1, 2, 3, 4, 5] })
                })
                .eager(true)
                .build(),
        )
        .unwrap();
    container.refresh(RuntimeConfig::default()).unwrap();

    group.bench_function("get_singleton", |b| {
        b.iter(|| black_box(container.get("small").unwrap()))
    });

    group.bench_function("get_medium", |b| {
        b.iter(|| black_box(container.get("medium").unwrap()))
    });

    group.bench_function("has_check", |b| {
        b.iter(|| black_box(container.has("small")))
    });

    group.bench_function("try_get_not_found", |b| {
        b.iter(|| black_box(container.try_get("missing")))
    });

    group.finish();
}

fn bench_prototype_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("prototype");
    group.throughput(Throughput::Elements(1));

    let container = Container::new();
    container
        .register(
            DefinitionBuilder::new("small")
                .typed_factory::<SmallService, _>(|_c| Ok(SmallService { value: 42 }))
                .scope(Scope::Prototype)
                .build(),
        )
        .unwrap();
    container.refresh(RuntimeConfig::default()).unwrap();

    group.bench_function("get_prototype", |b| {
        b.iter(|| black_box(container.get("small").unwrap()))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_singleton_reads_4", |b| {
        let container = Container::new();
        container
            .register(
                DefinitionBuilder::new("small")
                    .typed_factory::<SmallService, _>(|_c| Ok(SmallService { value: 42 }))
                    .eager(true)
                    .build(),
            )
            .unwrap();
        container.refresh(RuntimeConfig::default()).unwrap();
        let container = Arc::new(container);

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = Arc::clone(&container);
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.get("small").unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(benches, bench_registration, bench_resolution, bench_prototype_resolution, bench_concurrent);
criterion_main!(benches);
