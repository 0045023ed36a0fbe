use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use facedir::recognition::{rank_candidates, Candidate, Metric};
use facedir::store::ImageStore;
use std::fs;
use std::hint::black_box;
use tempfile::TempDir;

fn create_store(images: usize, artifacts: usize) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..images {
        fs::write(temp_dir.path().join(format!("person_{:05}.jpg", i)), b"face").unwrap();
    }
    for i in 0..artifacts {
        fs::write(temp_dir.path().join(format!("representations_model{}.pkl", i)), b"index").unwrap();
    }
    temp_dir
}

fn open(dir: &TempDir) -> ImageStore {
    let exts = vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()];
    let patterns = vec!["representations_*.pkl".to_string(), "ds_model_*.pkl".to_string()];
    ImageStore::with_root(dir.path(), &exts, &patterns).unwrap()
}

fn benchmark_list(c: &mut Criterion) {
    let mut group = c.benchmark_group("store_list");
    for size in [100usize, 1_000, 10_000].iter() {
        let dir = create_store(*size, 2);
        let store = open(&dir);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(store.list().unwrap()));
        });
    }
    group.finish();
}

fn benchmark_add_with_invalidation(c: &mut Criterion) {
    c.bench_function("add_and_delete_1000_members", |b| {
        let dir = create_store(1_000, 0);
        let mut store = open(&dir);
        b.iter(|| {
            fs::write(dir.path().join("representations_arcface.pkl"), b"index").unwrap();
            store.add("bench.jpg", b"face").unwrap();
            store.delete("bench.jpg").unwrap();
        });
    });
}

fn benchmark_ranking(c: &mut Criterion) {
    let mut group = c.benchmark_group("rank_candidates");
    for size in [10usize, 1_000, 100_000].iter() {
        let candidates: Vec<Candidate> = (0..*size)
            .map(|i| Candidate { identity: format!("person_{}.jpg", i), score: ((i * 7919) % 1000) as f64 / 1000.0 })
            .collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &candidates, |b, candidates| {
            b.iter(|| black_box(rank_candidates(candidates.clone(), Metric::Cosine)));
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_list, benchmark_add_with_invalidation, benchmark_ranking);
criterion_main!(benches);
