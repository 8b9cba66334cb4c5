//! Benchmarks for the keystroke path: cursor parsing and field-caps normalization
//! Run: cargo bench -p searchbar-core --bench parsing

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use searchbar_core::parser::{parse_cursor, parse_cursor_at, parse_expression, DEFAULT_CURSOR_MARKER};
use searchbar_core::{normalize_field_caps_value, FieldAbstraction, FieldAbstractionMap};
use serde_json::{json, Map, Value};
use std::hint::black_box;

const SHORT_QUERY: &str = "response:200 and @kuery-cursor@";
const LONG_QUERY: &str = r#"(response:(200 or 304) and extension:php) or (message:"connection refused" and not host.name:web-0*) and bytes >= 1000 and user:{ first:jo@kuery-cursor@ }"#;

fn bench_cursor_parser(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_parser");

    group.bench_function("short", |b| {
        b.iter(|| parse_cursor(black_box(SHORT_QUERY), DEFAULT_CURSOR_MARKER))
    });

    group.bench_function("long", |b| {
        b.iter(|| parse_cursor(black_box(LONG_QUERY), DEFAULT_CURSOR_MARKER))
    });

    // every caret position, like a user arrowing through the query
    let clean = LONG_QUERY.replace(DEFAULT_CURSOR_MARKER, "");
    group.bench_function("every_caret", |b| {
        b.iter(|| {
            (0..=clean.len())
                .map(|caret| parse_cursor_at(black_box(&clean), caret).suggestion_types.len())
                .sum::<usize>()
        })
    });

    group.finish();
}

fn bench_strict_parser(c: &mut Criterion) {
    let clean = LONG_QUERY.replace(DEFAULT_CURSOR_MARKER, "");
    c.bench_function("parse_expression", |b| {
        b.iter(|| parse_expression(black_box(&clean)))
    });
}

fn field_caps(count: usize) -> Value {
    let mut fields = Map::new();
    for i in 0..count {
        fields.insert(
            format!("service.field_{i}"),
            json!({ "text": { "type": "text", "searchable": true, "aggregatable": false } }),
        );
        fields.insert(
            format!("service.field_{i}.keyword"),
            json!({ "keyword": { "type": "keyword", "searchable": true, "aggregatable": true } }),
        );
    }
    fields.insert(
        "service".to_string(),
        json!({ "object": { "type": "object", "searchable": false, "aggregatable": false } }),
    );
    json!({ "indices": ["logs"], "fields": fields })
}

fn bench_normalizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize_field_caps");

    for size in [10, 100, 1000] {
        let raw = field_caps(size);
        group.throughput(Throughput::Elements((size * 2) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &raw, |b, raw| {
            b.iter(|| normalize_field_caps_value(black_box(raw)))
        });
    }

    group.finish();
}

fn bench_abstraction_rewrite(c: &mut Criterion) {
    let map = FieldAbstractionMap::new(
        (0..500).map(|i| FieldAbstraction::new(format!("f{i}"), format!("attributes.f{i}"))),
    );
    let node = parse_cursor("f250:@kuery-cursor@", DEFAULT_CURSOR_MARKER);

    c.bench_function("rewrite_cursor", |b| {
        b.iter(|| map.rewrite_cursor(black_box(node.clone())))
    });
}

criterion_group!(
    benches,
    bench_cursor_parser,
    bench_strict_parser,
    bench_normalizer,
    bench_abstraction_rewrite,
);

criterion_main!(benches);
