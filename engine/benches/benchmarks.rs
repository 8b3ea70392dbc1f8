//! Performance benchmarks for rowmirror-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rowmirror_engine::{
    classify, compile_where, format_resource, parse_params, ResourceQuery, ResourceSchema, Row,
};
use serde_json::json;

fn create_test_schema() -> ResourceSchema {
    ResourceSchema::from_value(json!({
        "attributes": ["uid", "name", "email", "mobile", "is_active"],
        "properties": {
            "id": {"primary": true, "alias": {"rcsredb.accounts": "source_id"}},
            "uid": {"alias": {"rcsredb.accounts": "external_id"}},
            "name": {"alias": {"rcsredb.accounts": "title"}},
            "email": {"alias": {"rcsredb.accounts": "email"}},
            "mobile": {"alias": {"rcsredb.accounts": "phone"}},
            "is_active": {"alias": {"rcsredb.accounts": "is_active"}}
        }
    }))
    .unwrap()
}

fn source_row(id: u64) -> Row {
    json!({
        "id": id,
        "uid": id + 1000,
        "name": format!("Customer {}", id),
        "email": format!("c{}@example.com", id),
        "mobile": "+7 921 1234567",
        "is_active": "2"
    })
    .as_object()
    .unwrap()
    .clone()
}

fn bench_filters(c: &mut Criterion) {
    let mut group = c.benchmark_group("filters");

    for size in [1usize, 10, 100] {
        let params: Vec<(String, Vec<String>)> = (0..size)
            .map(|i| (format!("filter[field_{}][gte]", i), vec![i.to_string()]))
            .collect();

        group.bench_with_input(BenchmarkId::new("parse_and_compile", size), &params, |b, p| {
            b.iter(|| compile_where(&parse_params(black_box(p)).unwrap()))
        });
    }

    group.bench_function("query_string", |b| {
        b.iter(|| {
            ResourceQuery::parse(black_box(
                "filter[name][like]=foo&filter[id]=1,2,3&sort=-title,id&page[number]=2&page[size]=50",
            ))
            .unwrap()
        })
    });

    group.finish();
}

fn bench_format(c: &mut Criterion) {
    let schema = create_test_schema();
    let rows: Vec<Row> = (0..1000).map(source_row).collect();

    c.bench_function("format_1000_rows", |b| {
        b.iter(|| {
            rows.iter()
                .map(|r| format_resource(black_box(r), "customers", &schema))
                .count()
        })
    });
}

fn bench_classify(c: &mut Criterion) {
    let schema = create_test_schema();
    let source = source_row(1);
    let mirror = json!({
        "id": 10,
        "source_id": 1,
        "external_id": "1001",
        "title": "Customer 1",
        "email": "c1@example.com",
        "phone": "+7 921 1234567",
        "is_active": 1
    })
    .as_object()
    .unwrap()
    .clone();

    c.bench_function("classify_existing", |b| {
        b.iter(|| classify(black_box(&source), Some(&mirror), &schema, "rcsredb.accounts"))
    });
}

criterion_group!(benches, bench_filters, bench_format, bench_classify);
criterion_main!(benches);
