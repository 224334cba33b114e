use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use hoverfly::config::Config;
use hoverfly::matching::{select, MatchingStrategy};
use hoverfly::model::RequestDetails;
use hoverfly::simulation::{import, Simulation};
use hoverfly::Hoverfly;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

fn simulation_document(count: usize) -> Vec<u8> {
    let pairs: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "request": {
                    "path": [{"matcher": "glob", "value": format!("/api/v1/endpoint{i}/*")}],
                    "method": [{"matcher": "exact", "value": "GET"}],
                    "query": {"page": [{"matcher": "regex", "value": "^[0-9]+$"}]},
                    "body": [{"matcher": "jsonpath", "value": "$.id"}]
                },
                "response": {"status": 200, "body": format!("endpoint {i}")}
            })
        })
        .collect();
    serde_json::to_vec(&json!({
        "data": {"pairs": pairs},
        "meta": {"schemaVersion": "v5.1"}
    }))
    .unwrap()
}

fn simulation(count: usize) -> Simulation {
    let view = import::parse_simulation(&simulation_document(count)).unwrap();
    let prepared = import::prepare(view).unwrap();
    Simulation {
        pairs: prepared.pairs.into_iter().map(Arc::new).collect(),
        ..Simulation::default()
    }
}

fn request(i: usize) -> RequestDetails {
    RequestDetails {
        path: format!("/api/v1/endpoint{i}/items"),
        method: "GET".to_string(),
        destination: "bench.local".to_string(),
        scheme: "http".to_string(),
        query: RequestDetails::parse_query("page=3"),
        body: r#"{"id": 7}"#.to_string(),
        ..RequestDetails::default()
    }
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("pair_selection");
    let state = HashMap::new();

    for count in [10, 100, 500] {
        let pairs = simulation(count);
        let last = request(count - 1);

        group.throughput(Throughput::Elements(1));
        for strategy in [MatchingStrategy::First, MatchingStrategy::Strongest] {
            group.bench_with_input(
                BenchmarkId::new(strategy.as_str(), count),
                &count,
                |b, _| b.iter(|| select(strategy, black_box(&pairs.pairs), &last, false, &state)),
            );
        }
    }
    group.finish();
}

fn bench_cached_lookup(c: &mut Criterion) {
    let hoverfly = Hoverfly::new(&Config::default());
    hoverfly.put_simulation(&simulation_document(500)).unwrap();
    let req = request(499);
    hoverfly.get_response(&req).unwrap();

    c.bench_function("cached_lookup", |b| {
        b.iter(|| hoverfly.get_response(black_box(&req)).is_ok())
    });
}

fn bench_fingerprint(c: &mut Criterion) {
    let req = request(1);
    c.bench_function("fingerprint", |b| {
        b.iter(|| black_box(&req).fingerprint(false, &[]))
    });
}

criterion_group!(benches, bench_selection, bench_cached_lookup, bench_fingerprint);
criterion_main!(benches);
