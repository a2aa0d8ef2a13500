//! Resolver Benchmarks
//!
//! Locator resolution against device capabilities, and the retry ledger.
//!
//! Run with: `cargo bench --bench resolver_ops`

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use strata::prelude::*;
use strata::{resolve, Charge, RetryLedger};

fn nested_declaration(depth: usize) -> LocatorDeclaration {
    (0..depth).fold(LocatorDeclaration::css("#leaf"), |inner, level| {
        match level % 3 {
            0 => LocatorDeclaration::dimensioned()
                .viewport("default", inner)
                .viewport("xs", Selector::css("#narrow"))
                .build(),
            1 => LocatorDeclaration::dimensioned()
                .os("android", Selector::css("#droid"))
                .os("linux", inner)
                .build(),
            _ => LocatorDeclaration::dimensioned()
                .platform("web", inner)
                .platform("ios", Selector::accessibility_id("leaf"))
                .build(),
        }
    })
}

fn bench_static_resolution(c: &mut Criterion) {
    let decl = LocatorDeclaration::css("#submit");
    let caps = Capabilities::new("web").with_viewport("xl");
    c.bench_function("resolve_static", |bench| {
        bench.iter(|| {
            let selector = resolve(black_box(&decl), black_box(&caps)).unwrap();
            black_box(selector);
        });
    });
}

fn bench_nested_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_nested");
    let caps = Capabilities::new("web").with_os("linux").with_viewport("xl");

    for depth in [1, 3, 6, 9] {
        let decl = nested_declaration(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &decl, |bench, d| {
            bench.iter(|| {
                let selector = resolve(black_box(d), &caps).unwrap();
                black_box(selector);
            });
        });
    }

    group.finish();
}

fn bench_breakpoint_classification(c: &mut Criterion) {
    let table = BreakpointTable::default();
    c.bench_function("classify_viewport", |bench| {
        bench.iter(|| {
            for width in [320, 600, 800, 1000, 1280, 1920] {
                black_box(table.classify(black_box(width)));
            }
        });
    });
}

fn bench_retry_ledger(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_ledger");
    let config = EngineConfig::default();

    for depth in [2usize, 4, 6] {
        let mut tree = StructureTree::new("app");
        let mut parent = NodeId::ROOT;
        for i in 0..depth {
            parent = tree
                .component(parent, format!("c{i}"), Selector::css(format!("#c{i}")))
                .unwrap();
        }
        let target = tree.target(parent, "leaf", "#leaf").unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(depth), &target, |bench, &t| {
            bench.iter(|| {
                let mut ledger = RetryLedger::new(&tree, t, &config);
                let mut charges = 0u64;
                while ledger.charge(t) != Charge::Exhausted {
                    charges += 1;
                }
                black_box(charges);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_static_resolution,
    bench_nested_resolution,
    bench_breakpoint_classification,
    bench_retry_ledger,
);
criterion_main!(benches);
