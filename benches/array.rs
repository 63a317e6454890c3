use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tabulae::alloc::HeapAllocator;
use tabulae::array::Array;

fn bench_append(c: &mut Criterion) {
    c.bench_function("array append 10k", |b| {
        b.iter(|| {
            let mut alloc = HeapAllocator::new();
            let mut arr = Array::create(&mut alloc, false).unwrap();
            for i in 0..10_000i64 {
                arr.add(&mut alloc, black_box(i)).unwrap();
            }
            arr
        })
    });
}

fn bench_random_get(c: &mut Criterion) {
    let mut alloc = HeapAllocator::new();
    let mut arr = Array::create(&mut alloc, false).unwrap();
    for i in 0..10_000i64 {
        arr.add(&mut alloc, i).unwrap();
    }
    c.bench_function("array get 10k sequential", |b| {
        b.iter(|| {
            let mut sum = 0i64;
            for i in 0..10_000 {
                sum = sum.wrapping_add(arr.get(&alloc, black_box(i)));
            }
            sum
        })
    });
}

fn bench_widening_insert(c: &mut Criterion) {
    c.bench_function("array widen on negative insert", |b| {
        b.iter(|| {
            let mut alloc = HeapAllocator::new();
            let mut arr = Array::create(&mut alloc, false).unwrap();
            for i in 0..1_000i64 {
                arr.add(&mut alloc, black_box(i)).unwrap();
            }
            arr.add(&mut alloc, -1).unwrap();
            arr
        })
    });
}

criterion_group!(benches, bench_append, bench_random_get, bench_widening_insert);
criterion_main!(benches);
