use criterion::{black_box, criterion_group, criterion_main, Criterion};
use eeg_core::decoder::decode_frame;
use eeg_core::filter::{EegFilter, ScalerMode};

fn canonical_frame() -> [u8; 45] {
    let mut f = [0u8; 45];
    f[0] = 0xC0;
    f[1] = 0x00;
    f
}

fn benchmark_decode_frame(c: &mut Criterion) {
    let frame = canonical_frame();
    c.bench_function("decode_frame", |b| {
        b.iter(|| black_box(decode_frame(black_box(&frame))))
    });
}

fn benchmark_filter_process(c: &mut Criterion) {
    let mut filter = EegFilter::new(ScalerMode::Monotonic);
    let eeg = [1.0f32, -1.0, 0.5, -0.5, 0.25, -0.25, 0.1, -0.1];
    c.bench_function("eeg_filter_process", |b| {
        b.iter(|| black_box(filter.process(black_box(&eeg))))
    });
}

criterion_group!(benches, benchmark_decode_frame, benchmark_filter_process);
criterion_main!(benches);
