//! Benchmarks for envelope decoding and stats normalization
//!
//! Covers the per-message cost paid on the driver task before fan-out:
//! - stats-only payloads in each known layout
//! - frame payloads (base64 decode of a realistic JPEG size)

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use serde_json::json;
use std::hint::black_box;
use trafficwatch::Envelope;
use trafficwatch::test_utils::{stats_message, vehicle_stats_message};

fn nested_stats_message() -> String {
    let regions: serde_json::Map<String, serde_json::Value> = trafficwatch::RegionCode::ALL
        .iter()
        .enumerate()
        .map(|(i, code)| (code.as_str().to_string(), json!({ "Car": i * 3, "Bus": i % 4, "Truck": i % 2 })))
        .collect();
    stats_message(json!({ "DirectionCounts": regions, "TotalVehicles": 420, "AvgSpeed": 33.1, "PeakHour": "17:00" }))
}

fn bench_stats_decoding(c: &mut Criterion) {
    let flat = vehicle_stats_message(120, 8, 14, 150);
    let nested = nested_stats_message();

    let mut group = c.benchmark_group("stats_decoding");

    group.throughput(Throughput::Bytes(flat.len() as u64));
    group.bench_function("flat", |b| b.iter(|| black_box(Envelope::decode(black_box(flat.as_bytes())))));

    group.throughput(Throughput::Bytes(nested.len() as u64));
    group.bench_function("nested_16_regions", |b| {
        b.iter(|| black_box(Envelope::decode(black_box(nested.as_bytes()))))
    });

    group.finish();
}

fn bench_frame_decoding(c: &mut Criterion) {
    // Roughly the size of a 640x360 camera JPEG.
    let jpeg: Vec<u8> = (0..48 * 1024).map(|i| (i % 251) as u8).collect();
    let message = json!({ "frame": STANDARD.encode(&jpeg), "stats": { "TotalVehicles": 3 } }).to_string();

    let mut group = c.benchmark_group("frame_decoding");
    group.throughput(Throughput::Bytes(message.len() as u64));
    group.bench_function("base64_48k", |b| b.iter(|| black_box(Envelope::decode(black_box(message.as_bytes())))));
    group.finish();
}

criterion_group!(benches, bench_stats_decoding, bench_frame_decoding);
criterion_main!(benches);
