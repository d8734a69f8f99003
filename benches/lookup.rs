//! Benchmarks for path resolution over packed directories.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use packfs::{pack, MemFile, MemFs, PackFs, PackOptions, SeekableBuffer};

fn packed_dir(entries: usize) -> PackFs<SeekableBuffer> {
    let mut tree = MemFs::new();
    for i in 0..entries {
        tree.insert(&format!("entry{i:06}.dat"), MemFile::file(vec![0u8; 16]));
    }
    let mut stream = SeekableBuffer::new();
    pack(&tree, &mut stream, PackOptions::default()).unwrap();
    PackFs::load(stream).unwrap()
}

fn benchmark_open_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("open_hit");

    for size in [100usize, 1000, 10000].iter() {
        let fs = packed_dir(*size);
        let target = format!("entry{:06}.dat", size / 2);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(fs.open(black_box(&target)).unwrap());
            });
        });
    }

    group.finish();
}

fn benchmark_open_miss(c: &mut Criterion) {
    let mut group = c.benchmark_group("open_miss");

    for size in [100usize, 1000, 10000].iter() {
        let fs = packed_dir(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                black_box(fs.open(black_box("entry-missing.dat")).is_err());
            });
        });
    }

    group.finish();
}

fn benchmark_read_dir(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_dir_all");

    for size in [100usize, 1000].iter() {
        let fs = packed_dir(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut root = fs.open(".").unwrap();
                black_box(root.read_dir(-1).unwrap());
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_open_hit,
    benchmark_open_miss,
    benchmark_read_dir
);
criterion_main!(benches);
