//! Criterion benchmarks for the acquisition hot paths.
//!
//! Key metrics:
//! - Linearize latency for common ring capacities, before and after wrap
//! - Drain throughput of one poll cycle against the in-memory FIFO
//! - Snapshot latency while the loop thread is writing
//!
//! Run with: cargo bench --bench linearize

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fifo_reader::acquisition::poll_cycle;
use fifo_reader::registers::{FifoRegisters, OccupancyRegister};
use fifo_reader::{FifoReader, MockFifo, SampleRing};
use parking_lot::Mutex;
use std::sync::Arc;

const BASE: usize = 0x4000_0000;

/// Benchmark reordering the ring into oldest-first order.
///
/// The cursor sits mid-buffer so both slice copies are exercised.
fn linearize_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("linearize");

    for capacity in [256usize, 4096, 65_536, 1 << 20] {
        let mut ring = SampleRing::new(capacity).unwrap();
        ring.extend(0..(capacity + capacity / 2) as u32);
        let mut out = vec![0u32; capacity];

        group.throughput(Throughput::Bytes((capacity * 4) as u64));
        group.bench_with_input(BenchmarkId::new("into", capacity), &capacity, |b, _| {
            b.iter(|| {
                ring.linearize_into(black_box(&mut out)).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("to_vec", capacity), &capacity, |b, _| {
            b.iter(|| black_box(ring.to_vec()));
        });
    }

    group.finish();
}

/// Benchmark one occupancy-read-then-drain cycle.
fn drain_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_cycle");

    for batch in [16u32, 256, 4096] {
        let fifo = MockFifo::counting(BASE, batch);
        let ring = Mutex::new(SampleRing::new(4096).unwrap());
        let registers = FifoRegisters::new(BASE, OccupancyRegister::ReceiveLength);

        group.throughput(Throughput::Elements(u64::from(batch)));
        group.bench_with_input(BenchmarkId::new("mock", batch), &batch, |b, _| {
            b.iter(|| poll_cycle(&fifo, &ring, &registers, 0).unwrap());
        });
    }

    group.finish();
}

/// Benchmark snapshots taken while the loop thread is draining.
fn snapshot_under_load(c: &mut Criterion) {
    let fifo = Arc::new(MockFifo::counting(BASE, 64));
    let reader = FifoReader::new(fifo, 4096).unwrap();
    reader.configure(BASE).unwrap();
    reader.start(10).unwrap();

    c.bench_function("snapshot_while_running", |b| {
        b.iter(|| black_box(reader.snapshot()));
    });

    reader.stop_and_wait();
}

criterion_group!(benches, linearize_capacity, drain_cycle, snapshot_under_load);
criterion_main!(benches);
