//! Benchmarks for distance kernels and top-k selection.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sqlvec_core::{kernels, BitVector, TopK, Vector};

fn generate_vectors(dims: usize) -> (Vector, Vector) {
    let a: Vec<f32> = (0..dims).map(|i| (i as f32) * 0.1).collect();
    let b: Vec<f32> = (0..dims).map(|i| (i as f32) * 0.2 + 0.5).collect();
    (Vector::from(a), Vector::from(b))
}

fn bench_l2(c: &mut Criterion) {
    let mut group = c.benchmark_group("l2_distance");

    for dims in [128, 384, 768, 1536].iter() {
        let (a, b) = generate_vectors(*dims);
        group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
            bencher.iter(|| kernels::l2(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

fn bench_cosine(c: &mut Criterion) {
    let mut group = c.benchmark_group("cosine_distance");

    for dims in [128, 384, 768, 1536].iter() {
        let (a, b) = generate_vectors(*dims);
        group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
            bencher.iter(|| kernels::cosine(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

fn bench_hamming(c: &mut Criterion) {
    let mut group = c.benchmark_group("hamming_distance");

    for dims in [256, 1024, 4096].iter() {
        let a = Vector::Bit(BitVector::from_bits(
            &(0..*dims).map(|i| i % 3 == 0).collect::<Vec<_>>(),
        ));
        let b = Vector::Bit(BitVector::from_bits(
            &(0..*dims).map(|i| i % 5 == 0).collect::<Vec<_>>(),
        ));
        group.bench_with_input(BenchmarkId::from_parameter(dims), dims, |bencher, _| {
            bencher.iter(|| kernels::hamming(black_box(&a), black_box(&b)))
        });
    }

    group.finish();
}

fn bench_topk(c: &mut Criterion) {
    let mut group = c.benchmark_group("topk_select");
    let distances: Vec<f64> = (0..10_000).map(|i| ((i * 7919) % 10_007) as f64).collect();

    for k in [10usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(k), k, |bencher, &k| {
            bencher.iter(|| {
                let mut top = TopK::new(k, 1e-6);
                for (rowid, d) in distances.iter().enumerate() {
                    top.push(rowid as i64, *d);
                }
                black_box(top.into_sorted_vec())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_l2, bench_cosine, bench_hamming, bench_topk);
criterion_main!(benches);
