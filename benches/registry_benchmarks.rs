//! 句柄注册表性能基准测试
//!
//! 测试绑定、查找和并发访问注册表的开销

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use engine_interop::bindings::{NativeApi, ProxyKind, RefCountedExt, Runtime, REF_COUNTED};
use engine_interop::native::NativeHeap;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

static MATERIAL: ProxyKind = ProxyKind::derived("Material", &REF_COUNTED);

fn runtime(shards: usize) -> (Arc<NativeHeap>, Runtime) {
    let heap = Arc::new(NativeHeap::new());
    let native: Arc<dyn NativeApi> = heap.clone();
    let runtime = Runtime::with_registry(
        native,
        engine_interop::HandleRegistry::with_shards(shards),
    );
    runtime.setup();
    runtime.initialize();
    (heap, runtime)
}

fn bench_bind_and_drop(c: &mut Criterion) {
    let mut group = c.benchmark_group("bind_and_drop");

    for count in [100, 1000, 10000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let (heap, runtime) = runtime(16);
            b.iter(|| {
                let objects: Vec<_> = (0..count)
                    .map(|_| runtime.bind(heap.create(), &MATERIAL).unwrap())
                    .collect();
                black_box(&objects);
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let (heap, runtime) = runtime(16);
    let objects: Vec<_> = (0..10000)
        .map(|_| runtime.bind(heap.create(), &MATERIAL).unwrap())
        .collect();
    let handles: Vec<_> = objects.iter().map(|object| object.handle()).collect();

    c.bench_function("lookup_10000", |b| {
        b.iter(|| {
            for handle in &handles {
                black_box(runtime.lookup(*handle));
            }
        });
    });
}

fn bench_sharded_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("parallel_lookup");

    for shards in [1, 16, 64].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(shards), shards, |b, &shards| {
            let (heap, runtime) = runtime(shards);
            let objects: Vec<_> = (0..4096)
                .map(|_| runtime.bind(heap.create(), &MATERIAL).unwrap())
                .collect();
            let handles: Arc<Vec<_>> = Arc::new(objects.iter().map(|o| o.handle()).collect());

            b.iter(|| {
                let workers: Vec<_> = (0..4)
                    .map(|_| {
                        let (runtime, handles) = (runtime.clone(), Arc::clone(&handles));
                        thread::spawn(move || {
                            for handle in handles.iter() {
                                black_box(runtime.lookup(*handle));
                            }
                        })
                    })
                    .collect();
                for worker in workers {
                    worker.join().unwrap();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bind_and_drop, bench_lookup, bench_sharded_lookup);
criterion_main!(benches);
