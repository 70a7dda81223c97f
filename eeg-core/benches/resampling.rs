use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eeg_core::resampler::EegResampler;

fn benchmark_resample_chunk(c: &mut Criterion) {
    let mut resampler = EegResampler::new(8, 176.4).unwrap();
    let needed = resampler.input_frames_needed();
    let planar: Vec<Vec<f32>> = (0..8)
        .map(|ch| (0..needed).map(|i| ((i + ch) as f32 * 0.01).sin()).collect())
        .collect();

    c.bench_function("resample_8ch_chunk", |b| {
        b.iter(|| {
            let mut out = Vec::new();
            black_box(resampler.process_interleaved(black_box(&planar), &mut out).unwrap());
        })
    });
}

criterion_group!(benches, benchmark_resample_chunk);
criterion_main!(benches);
