// SPDX-License-Identifier: PMPL-1.0-or-later
//! Performance benchmarks for recording, loading and replaying RPC logs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use std::sync::Arc;
use tokio::runtime::Runtime;

use rpcreplay::{
    read_entry, write_entry, write_header, Entry, EntryKind, FlushMode, Payload, Recorder,
    RecorderOptions, Replayer, ReplayerOptions,
};
use rpcreplay_intstore::{methods, registry, GetRequest, InMemoryIntStore, IntStoreClient, Item};

/// Build an in-memory log of `calls` recorded Set calls.
fn build_log(calls: u32) -> Vec<u8> {
    let mut log = Vec::new();
    write_header(&mut log, b"bench").unwrap();
    for i in 0..calls {
        let request_index = 2 * i + 1;
        write_entry(
            &mut log,
            &Entry::new(
                EntryKind::Request,
                methods::SET,
                Payload::message(Item::new(format!("key-{i}"), i as i32)),
            ),
        )
        .unwrap();
        write_entry(
            &mut log,
            &Entry::new(
                EntryKind::Response,
                methods::SET,
                Payload::message(rpcreplay_intstore::SetResponse { prev_value: 0 }),
            )
            .with_ref(request_index),
        )
        .unwrap();
    }
    log
}

// ============================================================================
// Codec Benchmarks
// ============================================================================

fn bench_entry_codec(c: &mut Criterion) {
    let registry = registry();
    let entry = Entry::new(
        EntryKind::Request,
        methods::GET,
        Payload::message(GetRequest {
            name: "benchmark-key".to_string(),
        }),
    );
    let mut encoded = Vec::new();
    write_entry(&mut encoded, &entry).unwrap();

    let mut group = c.benchmark_group("codec");

    group.bench_function("write_entry", |b| {
        let mut buf = Vec::with_capacity(256);
        b.iter(|| {
            buf.clear();
            write_entry(&mut buf, black_box(&entry)).unwrap();
        });
    });

    group.bench_function("read_entry", |b| {
        b.iter(|| {
            let mut cursor = Cursor::new(black_box(&encoded[..]));
            black_box(read_entry(&mut cursor, &registry, 1).unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Recorder Benchmarks
// ============================================================================

fn bench_record_unary(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("recorder");

    for flush in [FlushMode::EveryEntry, FlushMode::OnClose] {
        let label = format!("{flush:?}");
        group.bench_with_input(BenchmarkId::new("set", label), &flush, |b, &flush| {
            let options = RecorderOptions {
                flush,
                ..Default::default()
            };
            let recorder =
                Recorder::from_writer(std::io::sink(), Arc::new(InMemoryIntStore::new()), options)
                    .unwrap();
            let client = IntStoreClient::new(Arc::new(recorder));
            b.to_async(&rt)
                .iter(|| async { black_box(client.set("key", 7).await.unwrap()) });
        });
    }

    group.finish();
}

// ============================================================================
// Replayer Benchmarks
// ============================================================================

fn bench_load_log(c: &mut Criterion) {
    let registry = registry();
    let mut group = c.benchmark_group("replayer_load");

    for calls in [100u32, 1_000, 10_000] {
        let log = build_log(calls);
        group.throughput(Throughput::Elements(u64::from(calls) * 2));
        group.bench_with_input(BenchmarkId::new("from_reader", calls), &log, |b, log| {
            b.iter(|| {
                black_box(
                    Replayer::from_reader(Cursor::new(&log[..]), &registry, ReplayerOptions::default())
                        .unwrap(),
                )
            });
        });
    }

    group.finish();
}

fn bench_replay_unary(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let registry = registry();
    let calls = 1_000u32;
    let log = build_log(calls);

    let mut group = c.benchmark_group("replayer_calls");
    group.throughput(Throughput::Elements(u64::from(calls)));

    for match_requests in [false, true] {
        group.bench_with_input(
            BenchmarkId::new("set", if match_requests { "content" } else { "fifo" }),
            &match_requests,
            |b, &match_requests| {
                b.to_async(&rt).iter(|| async {
                    let options = ReplayerOptions {
                        match_requests,
                        ..Default::default()
                    };
                    let replayer =
                        Replayer::from_reader(Cursor::new(&log[..]), &registry, options).unwrap();
                    let client = IntStoreClient::new(Arc::new(replayer));
                    for i in 0..calls {
                        black_box(client.set(&format!("key-{i}"), i as i32).await.unwrap());
                    }
                });
            },
        );
    }

    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(codec_benches, bench_entry_codec);

criterion_group!(recorder_benches, bench_record_unary);

criterion_group!(
    replayer_benches,
    bench_load_log,
    bench_replay_unary
);

criterion_main!(codec_benches, recorder_benches, replayer_benches);
