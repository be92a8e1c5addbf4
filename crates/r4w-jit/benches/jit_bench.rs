//! JIT Queue Benchmarks
//!
//! Every queue operation holds the lock for a scan over the whole queue, so
//! cost grows with capacity. These benches measure it at the sizes a gateway
//! can be configured with.
//!
//! Run with:
//!   cargo bench -p r4w-jit --bench jit_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use r4w_jit::airtime::{Bandwidth, CodeRate, TxPacket};
use r4w_jit::{Frame, JitConfig, JitQueue};

const NOW: u32 = 0;
const SPACING_US: u32 = 200_000;

fn packet() -> TxPacket {
    TxPacket::lora(7, Bandwidth::Khz125, CodeRate::Cr4_5, vec![0x40; 12])
}

fn new_queue(capacity: usize) -> JitQueue<TxPacket> {
    let config = JitConfig {
        capacity,
        ..Default::default()
    };
    match JitQueue::new(config) {
        Ok(queue) => queue,
        Err(e) => panic!("invalid bench config: {}", e),
    }
}

/// Fill the queue with class A frames spaced clear of each other
fn fill(queue: &JitQueue<TxPacket>, count: usize, pkt: &TxPacket) {
    for i in 0..count as u32 {
        let t = 1_000_000 + i * SPACING_US;
        if let Err(e) = queue.enqueue(NOW, Frame::class_a(t, pkt.clone())) {
            panic!("bench fill rejected frame at {}: {}", t, e);
        }
    }
    assert_eq!(queue.len(), count);
}

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("jit_enqueue");
    let pkt = packet();

    for capacity in [8usize, 32, 128, 255] {
        group.throughput(Throughput::Elements(capacity as u64));

        group.bench_with_input(
            BenchmarkId::new("fill", capacity),
            &capacity,
            |b, &cap| {
                let queue = new_queue(cap);
                b.iter(|| {
                    queue.reset();
                    fill(&queue, cap, &pkt);
                    black_box(queue.len())
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("rejected_full", capacity),
            &capacity,
            |b, &cap| {
                let queue = new_queue(cap);
                fill(&queue, cap, &pkt);
                b.iter(|| black_box(queue.enqueue(NOW, Frame::class_a(500_000, pkt.clone()))));
            },
        );
    }

    group.finish();
}

fn bench_peek(c: &mut Criterion) {
    let mut group = c.benchmark_group("jit_peek");
    let pkt = packet();

    for capacity in [8usize, 32, 128, 255] {
        group.throughput(Throughput::Elements(1));

        group.bench_with_input(
            BenchmarkId::new("nothing_due", capacity),
            &capacity,
            |b, &cap| {
                let queue = new_queue(cap);
                fill(&queue, cap, &pkt);
                b.iter(|| black_box(queue.peek(black_box(NOW))));
            },
        );
    }

    group.finish();
}

fn bench_asap(c: &mut Criterion) {
    let mut group = c.benchmark_group("jit_asap");
    let pkt = packet();

    for capacity in [8usize, 32, 128, 255] {
        group.bench_with_input(
            BenchmarkId::new("place_and_remove", capacity),
            &capacity,
            |b, &cap| {
                let queue = new_queue(cap);
                fill(&queue, cap - 1, &pkt);
                b.iter(|| {
                    if let Err(e) = queue.enqueue(NOW, Frame::immediate(pkt.clone())) {
                        panic!("immediate frame rejected: {}", e);
                    }
                    // appended last
                    if let Err(e) = queue.dequeue(queue.len() - 1) {
                        panic!("dequeue failed: {}", e);
                    }
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_peek, bench_asap);
criterion_main!(benches);
