//! Benchmarks for RelaySockets library
//!
//! Run with: cargo bench -p relaysockets

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use serde_json::json;
use std::time::Duration;

use relaysockets::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use relaysockets::core::send_queue::SendQueue;
use relaysockets::traits::frame::{Frame, WsMessage};
use relaysockets::traits::reconnect::{ExponentialBackoff, ReconnectionStrategy, TieredBackoff};

/// Benchmark frame encoding and parsing
fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("frames");
    group.throughput(Throughput::Elements(1));

    let text = r#"{"type":"tab_event","message":{"event":"tab_activated","timestamp":"2024-01-01T00:00:00.000Z","details":{"tabId":42,"url":"https://example.com/page"}}}"#;

    group.bench_function("parse_text", |b| {
        let message = WsMessage::Text(text.to_string());
        b.iter(|| black_box(Frame::parse(black_box(&message)).is_ok()))
    });

    group.bench_function("parse_malformed", |b| {
        let message = WsMessage::Text("{not json".to_string());
        b.iter(|| black_box(Frame::parse(black_box(&message)).is_err()))
    });

    group.bench_function("to_text", |b| {
        let frame = Frame::new(
            "tab_event",
            json!({ "event": "tab_activated", "details": { "tabId": 42, "url": "https://example.com" } }),
        );
        b.iter(|| black_box(frame.to_text().map(|s| s.len())))
    });

    group.finish();
}

/// Benchmark the outbound backlog
fn bench_send_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("send_queue");

    group.bench_function("push_pop", |b| {
        let mut queue = SendQueue::default();
        let frame = Frame::new("tab_event", json!({ "seq": 1 }));
        b.iter(|| {
            queue.push(frame.clone());
            black_box(queue.pop())
        })
    });

    group.bench_function("push_evicting", |b| {
        let mut queue = SendQueue::new(Some(1_000));
        for seq in 0..1_000 {
            queue.push(Frame::new("tab_event", json!({ "seq": seq })));
        }
        let frame = Frame::new("tab_event", json!({ "seq": 0 }));
        b.iter(|| black_box(queue.push(frame.clone())))
    });

    group.finish();
}

/// Benchmark atomic state and metrics
fn bench_atomics(c: &mut Criterion) {
    let mut group = c.benchmark_group("atomics");

    group.bench_function("state_get", |b| {
        let state = AtomicConnectionState::new(ConnectionState::Open);
        b.iter(|| black_box(state.get()))
    });

    group.bench_function("is_open", |b| {
        let state = AtomicConnectionState::new(ConnectionState::Open);
        b.iter(|| black_box(state.is_open()))
    });

    group.bench_function("increment_sent", |b| {
        let metrics = AtomicMetrics::new();
        b.iter(|| metrics.increment_sent())
    });

    group.finish();
}

/// Benchmark reconnection strategies
fn bench_reconnection_strategies(c: &mut Criterion) {
    let mut group = c.benchmark_group("reconnection");

    group.bench_function("tiered_backoff", |b| {
        let strategy = TieredBackoff::default();
        b.iter(|| {
            for attempts in 0..26 {
                black_box(strategy.next_delay(black_box(attempts)));
            }
        })
    });

    group.bench_function("exponential_backoff", |b| {
        let strategy = ExponentialBackoff::new(
            Duration::from_millis(100),
            Duration::from_secs(60),
            None,
        );
        b.iter(|| black_box(strategy.next_delay(black_box(10))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_frames,
    bench_send_queue,
    bench_atomics,
    bench_reconnection_strategies,
);

criterion_main!(benches);
