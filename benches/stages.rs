use std::hint::black_box;
use criterion::{criterion_group, criterion_main, Criterion};
use fcnet::{
    bandpass_columns, build_network, compute_metrics, detect_bad_frames, ols_residuals,
};
use ndarray::Array2;

/// Deterministic pseudo-random `[rows, cols]` matrix.
fn matrix(rows: usize, cols: usize, seed: u64) -> Array2<f64> {
    let mut s = seed | 1;
    Array2::from_shape_fn((rows, cols), |_| {
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        (s >> 11) as f64 / (1u64 << 53) as f64 - 0.5
    })
}

fn bench_bandpass(c: &mut Criterion) {
    let data = matrix(200, 1000, 1);
    c.bench_function("bandpass_columns [200×1000]", |b| {
        b.iter(|| {
            let out = bandpass_columns(black_box(&data), 2.0, 0.009, 0.08).unwrap();
            black_box(out[[0, 0]])
        })
    });
}

fn bench_regression(c: &mut Criterion) {
    let x = matrix(200, 33, 2);
    let y = matrix(200, 1000, 3);
    c.bench_function("ols_residuals [200×33] on 1000 columns", |b| {
        b.iter(|| {
            let r = ols_residuals(black_box(&x), black_box(&y)).unwrap();
            black_box(r[[0, 0]])
        })
    });
}

fn bench_network_and_metrics(c: &mut Criterion) {
    let signals = matrix(180, 264, 4);
    let missing = vec![false; 264];
    c.bench_function("build_network 264 ROIs @ 10%", |b| {
        b.iter(|| {
            let net = build_network(black_box(&signals), &missing, 0.1).unwrap();
            black_box(net.graph.edge_count())
        })
    });
    let net = build_network(&signals, &missing, 0.1).unwrap();
    c.bench_function("compute_metrics 264 nodes", |b| {
        b.iter(|| {
            let m = compute_metrics(black_box(&net.graph), 0.85);
            black_box(m.global_efficiency)
        })
    });
}

fn bench_scrub(c: &mut Criterion) {
    let fd: Vec<f64> = (0..1200).map(|t| if t % 97 == 0 { 0.5 } else { 0.05 }).collect();
    c.bench_function("detect_bad_frames 1200 frames", |b| {
        b.iter(|| black_box(detect_bad_frames(black_box(&fd), 0.2).n_good()))
    });
}

criterion_group!(benches, bench_bandpass, bench_regression, bench_network_and_metrics, bench_scrub);
criterion_main!(benches);
