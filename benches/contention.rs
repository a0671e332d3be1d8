//! Lock manager benchmarks
//!
//! Measures the latch-bound fast paths and the contended handoff:
//! - uncontended lock/unlock on a single record
//! - shared readers piling into one granted group
//! - writer handoff between two threads on one record
//! - fan-out over many distinct records

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use rslock::{Config, ContentionMatrix, LockManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Mode {
    Read,
    Write,
}

fn read_write_matrix() -> ContentionMatrix<Mode> {
    ContentionMatrix::new()
        .with_conflict(Mode::Write, Mode::Write)
        .with_symmetric_conflict(Mode::Read, Mode::Write)
}

fn bench_manager() -> LockManager<u64, u64, Mode> {
    let config = Config::with_tick_interval(Duration::from_millis(300)).unwrap();
    LockManager::with_config(read_write_matrix(), config).unwrap()
}

fn bench_uncontended(c: &mut Criterion) {
    let manager = bench_manager();

    let mut group = c.benchmark_group("uncontended");
    group.throughput(Throughput::Elements(1));
    group.bench_function("write_lock_unlock", |b| {
        b.iter(|| {
            assert!(manager.lock(black_box(&0), &1, &Mode::Write));
            manager.unlock(&0, &1);
        })
    });
    group.bench_function("read_lock_unlock", |b| {
        b.iter(|| {
            assert!(manager.lock(black_box(&0), &1, &Mode::Read));
            manager.unlock(&0, &1);
        })
    });
    group.finish();
}

fn bench_shared_readers(c: &mut Criterion) {
    let manager = bench_manager();
    const READERS: u64 = 16;

    let mut group = c.benchmark_group("shared_readers");
    group.throughput(Throughput::Elements(READERS));
    group.bench_function("join_granted_group", |b| {
        b.iter(|| {
            for tx in 1..=READERS {
                assert!(manager.lock(&0, &tx, &Mode::Read));
            }
            for tx in 1..=READERS {
                manager.unlock(&0, &tx);
            }
        })
    });
    group.finish();
}

fn bench_record_fanout(c: &mut Criterion) {
    let manager = bench_manager();
    const RECORDS: u64 = 128;

    let mut group = c.benchmark_group("record_fanout");
    group.throughput(Throughput::Elements(RECORDS));
    group.bench_function("write_many_records", |b| {
        b.iter(|| {
            for record in 0..RECORDS {
                assert!(manager.lock(&record, &1, &Mode::Write));
            }
            for record in 0..RECORDS {
                manager.unlock(&record, &1);
            }
        })
    });
    group.finish();
}

fn bench_writer_handoff(c: &mut Criterion) {
    const HANDOFFS: u64 = 200;

    let mut group = c.benchmark_group("writer_handoff");
    group.throughput(Throughput::Elements(HANDOFFS * 2));
    group.bench_function("two_writers_one_record", |b| {
        b.iter(|| {
            let manager = Arc::new(bench_manager());
            let mut handles = Vec::new();
            for tx in 1..=2u64 {
                let manager = Arc::clone(&manager);
                handles.push(thread::spawn(move || {
                    for _ in 0..HANDOFFS {
                        while !manager.lock(&0, &tx, &Mode::Write) {}
                        manager.unlock(&0, &tx);
                    }
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_uncontended,
    bench_shared_readers,
    bench_record_fanout,
    bench_writer_handoff
);
criterion_main!(benches);
