use criterion::{black_box, criterion_group, criterion_main, Criterion};
use covary_core::format::HeaderFlags;
use covary_core::{
    AnnotationSet, BinaryMatrixDecoder, FilterEngine, MatrixHeader, MatrixWriter, PairStatisticsStore, Thresholds,
};

const NUM_WINDOW: i32 = 601;
const NUM_POS: i32 = 2000;

fn generate_dense(nonzero_every: usize) -> Vec<u8> {
    let header = MatrixHeader { num_window: NUM_WINDOW, num_pos: NUM_POS, flags: HeaderFlags::dense_f32(1) };
    let n = (NUM_WINDOW * NUM_POS) as usize;
    let values: Vec<f64> = (0..n)
        .map(|k| if k % nonzero_every == 0 { (k % 97) as f64 + 1.0 } else { 0.0 })
        .collect();
    MatrixWriter::dense(header, &values).unwrap_or_default()
}

fn generate_sparse(records: usize) -> Vec<u8> {
    let header = MatrixHeader { num_window: NUM_WINDOW, num_pos: NUM_POS, flags: HeaderFlags::sparse_int(4, 4) };
    let step = (NUM_WINDOW * NUM_POS) as usize / records.max(1);
    let rows: Vec<(i32, Vec<f64>)> = (0..records)
        .map(|k| ((k * step) as i32, vec![50.0, (k % 7) as f64, (k % 5) as f64, (k % 3) as f64]))
        .collect();
    MatrixWriter::sparse(header, &rows).unwrap_or_default()
}

fn bench_dense_decode(c: &mut Criterion) {
    let data = generate_dense(50);
    let decoder = BinaryMatrixDecoder::new();

    c.bench_function("dense_f32_601x2000", |b| {
        b.iter(|| {
            let mut store = PairStatisticsStore::new();
            let report = decoder.decode(black_box(&data), "depth", &mut store);
            black_box((report.is_ok(), store.len()))
        })
    });
}

fn bench_sparse_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("sparse_counts");
    let decoder = BinaryMatrixDecoder::new();

    for records in [1_000usize, 10_000, 100_000].iter() {
        let data = generate_sparse(*records);
        group.bench_with_input(format!("records_{}", records), records, |b, _| {
            b.iter(|| {
                let mut store = PairStatisticsStore::new();
                let report = decoder.decode(black_box(&data), "counts", &mut store);
                black_box((report.is_ok(), store.len()))
            })
        });
    }

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let decoder = BinaryMatrixDecoder::new();
    let mut store = PairStatisticsStore::new();
    let _ = decoder.decode(&generate_dense(20), "depth", &mut store);
    let _ = decoder.decode(&generate_dense(20), "metric", &mut store);
    let _ = decoder.decode(&generate_sparse(50_000), "counts", &mut store);
    let annotations = AnnotationSet::default();
    let thresholds = Thresholds::default();

    c.bench_function("filter_default_thresholds", |b| {
        let mut engine = FilterEngine::new();
        b.iter(|| black_box(engine.filter(&store, &annotations, black_box(&thresholds))))
    });
}

criterion_group!(benches, bench_dense_decode, bench_sparse_decode, bench_filter);
criterion_main!(benches);
