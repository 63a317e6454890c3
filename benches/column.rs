use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tabulae::alloc::HeapAllocator;
use tabulae::column::{AdaptiveStringColumn, IntColumn};

fn bench_int_column_append(c: &mut Criterion) {
    c.bench_function("int column append 20k (crosses node split)", |b| {
        b.iter(|| {
            let mut alloc = HeapAllocator::new();
            let mut col = IntColumn::create(&mut alloc).unwrap();
            for i in 0..20_000i64 {
                col.add(&mut alloc, black_box(i)).unwrap();
            }
            col
        })
    });
}

fn bench_int_column_sum(c: &mut Criterion) {
    let mut alloc = HeapAllocator::new();
    let mut col = IntColumn::create(&mut alloc).unwrap();
    for i in 0..20_000i64 {
        col.add(&mut alloc, i).unwrap();
    }
    c.bench_function("int column sum over a split tree", |b| {
        b.iter(|| black_box(col.sum(&alloc)))
    });
}

fn bench_string_column_append(c: &mut Criterion) {
    c.bench_function("string column append 5k short rows", |b| {
        b.iter(|| {
            let mut alloc = HeapAllocator::new();
            let mut col = AdaptiveStringColumn::create(&mut alloc).unwrap();
            for i in 0..5_000 {
                col.add(&mut alloc, format!("row-{i}").as_bytes()).unwrap();
            }
            col
        })
    });
}

fn bench_string_column_promotion(c: &mut Criterion) {
    c.bench_function("string column promotes short to long", |b| {
        b.iter(|| {
            let mut alloc = HeapAllocator::new();
            let mut col = AdaptiveStringColumn::create(&mut alloc).unwrap();
            let long_value = vec![b'x'; 300];
            for _ in 0..200 {
                col.add(&mut alloc, black_box(&long_value)).unwrap();
            }
            col
        })
    });
}

criterion_group!(
    benches,
    bench_int_column_append,
    bench_int_column_sum,
    bench_string_column_append,
    bench_string_column_promotion
);
criterion_main!(benches);
