//! Dense retrieval benchmarks: brute-force cosine similarity vs HNSW.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fault_retrieve::dense::hnsw::HNSWIndex;
use fault_retrieve::dense::DenseRetriever;

fn generate_embeddings(n_cases: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n_cases)
        .map(|i| {
            let raw: Vec<f32> = (0..dim)
                .map(|j| ((i * 7 + j * 11) % 100) as f32 / 100.0 - 0.5)
                .collect();
            let norm: f32 = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
            raw.iter().map(|v| v / norm.max(1e-6)).collect()
        })
        .collect()
}

fn bench_brute_force_retrieval(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_brute_force_retrieval");

    for (n_cases, dim, k) in [(500, 256, 10), (5_000, 384, 20)].iter() {
        let embeddings = generate_embeddings(*n_cases, *dim);

        let mut retriever = DenseRetriever::new();
        for (i, emb) in embeddings.iter().enumerate() {
            retriever.add_document(i as u32, emb.clone());
        }

        let query = embeddings[0].clone();

        group.bench_with_input(
            BenchmarkId::new("retrieve", format!("{}cases_dim{}", n_cases, dim)),
            &query,
            |b, q| {
                b.iter(|| {
                    let _ = black_box(retriever.retrieve(q, *k));
                })
            },
        );
    }

    group.finish();
}

fn bench_hnsw_retrieval(c: &mut Criterion) {
    let mut group = c.benchmark_group("dense_hnsw_retrieval");

    for (n_cases, dim, k) in [(5_000, 384, 20), (50_000, 384, 20)].iter() {
        let embeddings = generate_embeddings(*n_cases, *dim);

        let mut index = HNSWIndex::new(*dim, 16, 16).unwrap();
        for (i, emb) in embeddings.iter().enumerate() {
            index.add(i as u32, emb.clone()).unwrap();
        }
        index.build().unwrap();

        let query = embeddings[0].clone();

        group.bench_with_input(
            BenchmarkId::new("search", format!("{}cases_dim{}", n_cases, dim)),
            &query,
            |b, q| {
                b.iter(|| {
                    let _ = black_box(index.search(q, *k, 64));
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_brute_force_retrieval, bench_hnsw_retrieval);
criterion_main!(benches);
