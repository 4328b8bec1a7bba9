//! Benchmarks for the batching hot path
//!
//! This benchmark measures:
//! - Packing identifiers into combined requests and serializing them
//! - Decoding combined response bodies
//! - A full in-memory stream (pack, send, decode, yield)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use graph_batch_fetch::batch::{CombinedRequest, CombinedResponse, RequestFull};
use graph_batch_fetch::transport::HttpResponse;
use graph_batch_fetch::{BatchClient, FetchStream, MemoryTransport};
use serde_json::{json, Value};
use std::sync::Arc;

fn pack(ids: &[String], max_batches: usize) -> usize {
    let mut calls = 0;
    let mut request = CombinedRequest::new("/", max_batches, 20);
    for id in ids {
        if let Err(RequestFull(id)) = request.append(id.clone()) {
            black_box(request.serialize().unwrap());
            calls += 1;
            request = CombinedRequest::new("/", max_batches, 20);
            let _ = request.append(id);
        }
    }
    if request.any() {
        black_box(request.serialize().unwrap());
        calls += 1;
    }
    calls
}

fn response_body(batches: usize, per_batch: usize) -> String {
    let subs: Vec<Value> = (0..batches)
        .map(|b| {
            let map: serde_json::Map<String, Value> = (0..per_batch)
                .map(|i| {
                    let id = format!("{}", b * per_batch + i);
                    (id.clone(), json!({"id": id, "name": "node", "likes": {"count": i}}))
                })
                .collect();
            json!({"code": 200, "headers": [], "body": Value::Object(map).to_string()})
        })
        .collect();
    Value::Array(subs).to_string()
}

fn bench_pack_and_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack_and_serialize");
    for n in [1_000usize, 10_000, 100_000] {
        let ids: Vec<String> = (0..n).map(|i| (10_000_000 + i).to_string()).collect();
        group.throughput(Throughput::Elements(n as u64));
        for max_batches in [5usize, 20] {
            group.bench_with_input(
                BenchmarkId::new(format!("max_batches_{}", max_batches), n),
                &ids,
                |b, ids| b.iter(|| pack(black_box(ids), max_batches)),
            );
        }
    }
    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let request = CombinedRequest::with_defaults("/");
    let mut group = c.benchmark_group("decode");
    for batches in [5usize, 20] {
        let body = response_body(batches, 20);
        group.throughput(Throughput::Bytes(body.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(batches), &body, |b, body| {
            b.iter(|| {
                let mut response = CombinedResponse::new(&request, body.as_str());
                response.parse().unwrap();
                black_box(response.into_nodes())
            })
        });
    }
    group.finish();
}

fn bench_stream(c: &mut Criterion) {
    let body = response_body(20, 20);
    c.bench_function("stream_10k_ids", |b| {
        b.iter(|| {
            let canned = body.clone();
            let transport = MemoryTransport::from_fn(move |_| Ok(HttpResponse::new(200, canned.clone())));
            let client = Arc::new(BatchClient::new(transport, "bench"));
            let stream = FetchStream::new(0..10_000u64, "/", client);
            black_box(stream.count())
        })
    });
}

criterion_group!(benches, bench_pack_and_serialize, bench_decode, bench_stream);
criterion_main!(benches);
