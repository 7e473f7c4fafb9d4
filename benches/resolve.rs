//! Planning and size-inference throughput over a synthetic type model.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use dotbridge::prelude::*;

fn synthetic_registry(types: usize) -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry
        .insert(TypeBuilder::class(TypeIdentity::plain("System", "Object")).build())
        .unwrap();
    registry
        .insert(
            TypeBuilder::value_type(TypeIdentity::plain("System", "ValueType"))
                .parent(TypeIdentity::plain("System", "Object"))
                .build(),
        )
        .unwrap();
    for name in ["Int32", "Int64"] {
        registry
            .insert(TypeBuilder::value_type(TypeIdentity::plain("System", name)).build())
            .unwrap();
    }
    for i in 0..types {
        let name = format!("Entity{i}");
        let mut builder = TypeBuilder::class(TypeIdentity::plain("Game", &name))
            .parent(TypeIdentity::plain("System", "Object"))
            .field("id", TypeIdentity::plain("System", "Int32"), 0x10)
            .field("flags", TypeIdentity::plain("System", "Int64"), 0x18);
        if i > 0 {
            let previous = TypeIdentity::plain("Game", &format!("Entity{}", i - 1));
            builder = builder
                .field("previous", previous.clone(), 0x20)
                .method("Link", TypeIdentity::plain("System", "Void"), vec![(
                    "other".to_string(),
                    previous,
                )]);
        }
        registry.insert(builder.build()).unwrap();
    }
    registry
}

fn bench_plan_resolution(c: &mut Criterion) {
    let registry = synthetic_registry(256);
    c.bench_function("plan_256_types", |b| {
        b.iter(|| {
            let mut graph = ContextGraph::build(&registry, EmitConfig::default()).unwrap();
            let mut planner = Planner::new();
            black_box(planner.resolve_all(&mut graph).unwrap())
        });
    });
}

fn bench_size_precompute(c: &mut Criterion) {
    let registry = synthetic_registry(1024);
    c.bench_function("size_precompute_1024_types", |b| {
        b.iter(|| {
            let tracker = SizeTracker::new(8);
            tracker.precompute(&registry);
            black_box(tracker)
        });
    });
}

criterion_group!(benches, bench_plan_resolution, bench_size_precompute);
criterion_main!(benches);
