/// Benchmarks for parsing incoming WebSocket frames into message envelopes.
///
/// Task progress updates are the hot path: one frame per progress tick per subscribed task.
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use push_socket::ws::Message;
use push_socket::ws::message::parse_messages;

fn bench_parse_messages(c: &mut Criterion) {
    let mut group = c.benchmark_group("websocket/parse_messages");

    let update = r#"{
        "event": "task_update:3f2a",
        "data": { "status": "running", "progress": 42 }
    }"#;
    group.throughput(Throughput::Bytes(update.len() as u64));
    group.bench_function("single", |b| {
        b.iter(|| {
            let _: Vec<Message> = parse_messages(std::hint::black_box(update.as_bytes()))
                .expect("Parsing should succeed");
        });
    });

    let batch = format!(
        "[{}]",
        (0..32)
            .map(|i| format!(
                r#"{{"event":"task_update:{i}","data":{{"status":"running","progress":{i}}}}}"#
            ))
            .collect::<Vec<_>>()
            .join(",")
    );
    group.throughput(Throughput::Bytes(batch.len() as u64));
    group.bench_function("batch_32", |b| {
        b.iter(|| {
            let _: Vec<Message> = parse_messages(std::hint::black_box(batch.as_bytes()))
                .expect("Parsing should succeed");
        });
    });

    let keepalive = "   \n";
    group.bench_function("keepalive", |b| {
        b.iter(|| {
            let _: Vec<Message> = parse_messages(std::hint::black_box(keepalive.as_bytes()))
                .expect("Parsing should succeed");
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse_messages);
criterion_main!(benches);
