//! Reference counting benchmarks
//!
//! Measures strong counting, weak locking, capability queries and
//! construction in both control-block layouts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use donut_object::blob::{create_blob, DataBlob};
use donut_object::{AutoPtr, Factory, IDataBlob, IObject, WeakPtr};

fn bench_strong_counting(c: &mut Criterion) {
    let blob = create_blob(64).expect("blob");

    c.bench_function("clone_drop", |b| {
        b.iter(|| {
            let copy = black_box(blob.clone());
            drop(copy);
        });
    });

    c.bench_function("add_ref_release", |b| {
        b.iter(|| {
            blob.add_ref();
            unsafe { black_box(blob.release()) };
        });
    });
}

fn bench_weak_lock(c: &mut Criterion) {
    let blob = create_blob(64).expect("blob");
    let weak = blob.as_weak().expect("weak-capable");

    c.bench_function("weak_lock_alive", |b| {
        b.iter(|| {
            let mut weak = weak.clone();
            black_box(weak.lock());
        });
    });

    let mut expired: WeakPtr<dyn IDataBlob> = {
        let short_lived = create_blob(1).expect("blob");
        WeakPtr::from(&short_lived)
    };
    expired.lock();

    c.bench_function("weak_lock_reset", |b| {
        b.iter(|| black_box(expired.lock()));
    });
}

fn bench_query(c: &mut Criterion) {
    let blob = create_blob(64).expect("blob");

    c.bench_function("query_interface", |b| {
        b.iter(|| black_box(blob.query::<dyn IObject>().expect("base capability")));
    });

    c.bench_function("query_concrete_class", |b| {
        b.iter(|| black_box(blob.query::<DataBlob>().expect("concrete class")));
    });
}

fn bench_construction(c: &mut Criterion) {
    let mut group = c.benchmark_group("construction");

    for packed in [true, false] {
        let name = if packed { "packed" } else { "separate" };
        group.bench_with_input(BenchmarkId::new("create", name), &packed, |b, &packed| {
            b.iter(|| {
                let blob: AutoPtr<DataBlob> = Factory::new()
                    .packed(packed)
                    .create(|init| {
                        Ok::<_, donut_object::ObjectError>(DataBlob::new(init.into_base(), vec![0; 64]))
                    })
                    .expect("blob");
                black_box(blob)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_strong_counting, bench_weak_lock, bench_query, bench_construction);
criterion_main!(benches);
