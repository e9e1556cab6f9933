use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;
use tiny_lock::{Mutex, SpinLock};

#[cfg(target_os = "linux")]
use tiny_lock::{FutexLock, MutatorState};

fn bench_uncontended(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended");

    let spin = SpinLock::new();
    group.bench_function("spin", |b| {
        b.iter(|| {
            black_box(&spin).acquire();
            unsafe { spin.release() };
        });
    });

    #[cfg(target_os = "linux")]
    {
        let futex = FutexLock::new();
        group.bench_function("futex", |b| {
            b.iter(|| {
                black_box(&futex).acquire();
                unsafe { futex.release() };
            });
        });

        let mutator = MutatorState::<tiny_lock::wait::Futex>::new();
        group.bench_function("futex_allowing_pause", |b| {
            b.iter(|| {
                black_box(&futex).acquire_allowing_collector_pause(&mutator);
                unsafe { futex.release() };
            });
        });
    }

    group.finish();
}

fn hammer<R: tiny_lock::RawMutex + Send + Sync + 'static>(threads: usize, iters: usize) -> u64 {
    let counter = Arc::new(Mutex::<u64, R>::new(0));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let counter = counter.clone();
            thread::spawn(move || {
                for _ in 0..iters {
                    *counter.lock() += 1;
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    let total = *counter.lock();
    total
}

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_4x1000");

    group.bench_function("spin", |b| b.iter(|| hammer::<SpinLock>(4, 1_000)));

    #[cfg(target_os = "linux")]
    group.bench_function("futex", |b| b.iter(|| hammer::<FutexLock>(4, 1_000)));

    group.finish();
}

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
