//! BM25 keyword retrieval benchmarks over knowledge-base-sized corpora.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fault_retrieve::bm25::{Bm25Params, InvertedIndex};

fn generate_cases(n_cases: usize, terms_per_case: usize, vocab_size: usize) -> Vec<Vec<String>> {
    (0..n_cases)
        .map(|_| {
            (0..terms_per_case)
                .map(|i| format!("term{}", (i * 7) % vocab_size))
                .collect()
        })
        .collect()
}

fn bench_indexing(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_indexing");

    for (n_cases, terms_per_case) in [(1_000, 30), (10_000, 40), (50_000, 50)].iter() {
        let vocab_size = 2_000;
        let cases = generate_cases(*n_cases, *terms_per_case, vocab_size);

        group.bench_with_input(
            BenchmarkId::new("add_document", format!("{}cases", n_cases)),
            &cases,
            |b, cases| {
                b.iter(|| {
                    let mut index = InvertedIndex::new();
                    for (i, case) in cases.iter().enumerate() {
                        index.add_document(i as u32, case);
                    }
                    black_box(index);
                })
            },
        );
    }

    group.finish();
}

fn bench_retrieval(c: &mut Criterion) {
    let mut group = c.benchmark_group("bm25_retrieval");

    for (n_cases, terms_per_case, query_len, k) in
        [(1_000, 30, 6, 10), (10_000, 40, 8, 20), (50_000, 50, 10, 50)].iter()
    {
        let vocab_size = 2_000;
        let cases = generate_cases(*n_cases, *terms_per_case, vocab_size);

        let mut index = InvertedIndex::new();
        for (i, case) in cases.iter().enumerate() {
            index.add_document(i as u32, case);
        }

        let query: Vec<String> = (0..*query_len)
            .map(|i| format!("term{}", (i * 11) % vocab_size))
            .collect();

        let params = Bm25Params::default();

        group.bench_with_input(
            BenchmarkId::new("retrieve", format!("{}cases_k{}", n_cases, k)),
            &query,
            |b, q| {
                b.iter(|| {
                    let _ = black_box(index.retrieve(q, *k, params));
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_indexing, bench_retrieval);
criterion_main!(benches);
