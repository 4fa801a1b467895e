//! Criterion benchmarks for log decoding and capacity integration.
//!
//! Run with: cargo bench --bench log_codec

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use batcon::capacity;
use batcon::protocol::{decode, CapacitySummary, LogRecord, Reading, TestHeader};

fn record(readings: u32) -> LogRecord {
    let readings: Vec<Reading> = (0..readings)
        .map(|i| Reading::from_voltage(12_600 - (i % 2_000), 6100, i * 100))
        .collect();
    LogRecord {
        header: TestHeader {
            fingerprint: 0xABCD_1234,
            team_id: 1076,
            battery_id: "BENCH".to_string(),
            start_timestamp: 1_727_539_212,
            load_milliohms: 6100,
            poll_interval_ms: 100,
            min_volts_milli: 10_500,
            log_volts_milli: 0,
        },
        summary: CapacitySummary::from_readings(&readings),
        readings,
    }
}

/// Decode throughput for logs of one minute to several hours at 10 Hz.
fn decode_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");

    for count in [600u32, 36_000, 144_000] {
        let bytes = record(count).encode().unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &bytes, |b, bytes| {
            b.iter(|| decode(black_box(bytes)).unwrap());
        });
    }

    group.finish();
}

/// Simpson integration over the same series sizes.
fn integration(c: &mut Criterion) {
    let mut group = c.benchmark_group("ampere_seconds");

    for count in [600u32, 36_000, 144_000] {
        let readings = record(count).readings;
        group.throughput(Throughput::Elements(u64::from(count)));
        group.bench_with_input(BenchmarkId::from_parameter(count), &readings, |b, readings| {
            b.iter(|| capacity::ampere_seconds(black_box(readings)));
        });
    }

    group.finish();
}

criterion_group!(benches, decode_throughput, integration);
criterion_main!(benches);
