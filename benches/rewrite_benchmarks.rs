// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for Indexa query rewriting

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use indexa_rewrite::builder::{build_comparison, build_eq, create_and};
use indexa_rewrite::expand::expand;
use indexa_rewrite::{CompareOp, ContainerType, IndexLookupMap, Node, RangeConfig, RangeFinder};

fn lookup_with(fields: usize, values_per_field: usize) -> IndexLookupMap {
    let mut map = IndexLookupMap::new();
    for f in 0..fields {
        for v in 0..values_per_field {
            map.put(&format!("FIELD_{f}"), format!("value-{v}"));
        }
    }
    map
}

// ============================================================================
// Expansion Benchmarks
// ============================================================================

fn bench_expand_fields(c: &mut Criterion) {
    let original = build_eq("_ANYFIELD_", "value-0");
    let mut group = c.benchmark_group("expand");

    for fields in [1usize, 10, 100] {
        let map = lookup_with(fields, 4);
        group.throughput(Throughput::Elements((fields * 4) as u64));
        group.bench_with_input(BenchmarkId::new("fields", fields), &map, |b, map| {
            b.iter(|| {
                let node = expand(
                    ContainerType::Or,
                    false,
                    black_box(&original),
                    map.clone(),
                    true,
                    true,
                    false,
                )
                .unwrap();
                black_box(node)
            });
        });
    }

    group.finish();
}

fn bench_expand_keep_original(c: &mut Criterion) {
    let original = build_eq("FIELD_0", "value-0");
    let map = lookup_with(10, 10);

    c.bench_function("expand_keep_original", |b| {
        b.iter(|| {
            let node = expand(
                ContainerType::Or,
                false,
                black_box(&original),
                map.clone(),
                true,
                true,
                true,
            )
            .unwrap();
            black_box(node)
        });
    });
}

// ============================================================================
// Range Benchmarks
// ============================================================================

fn bench_decompose(c: &mut Criterion) {
    let finder = RangeFinder::new(RangeConfig::default());
    let mut group = c.benchmark_group("ranges");

    for fields in [1usize, 8, 64] {
        let mut children: Vec<Node> = Vec::with_capacity(fields * 3);
        for f in 0..fields {
            let field = format!("N{f}");
            children.push(build_comparison(CompareOp::Ge, &field, 10i64).unwrap());
            children.push(build_comparison(CompareOp::Ge, &field, 20i64).unwrap());
            children.push(build_comparison(CompareOp::Lt, &field, 90i64).unwrap());
        }
        let root = create_and(children);

        group.bench_with_input(BenchmarkId::new("decompose", fields), &root, |b, root| {
            b.iter(|| black_box(finder.decompose(black_box(root)).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(
    expansion_benches,
    bench_expand_fields,
    bench_expand_keep_original
);

criterion_group!(
    range_benches,
    bench_decompose
);

criterion_main!(
    expansion_benches,
    range_benches
);
