//! Multi-source fusion benchmarks over request-sized candidate unions.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fault_fusion::{fuse, CandidatesBySource, FaultCase, Hints, PopularityScale, RawHit, Source, Weights};

fn generate_hits(n: usize, source: Source) -> Vec<RawHit> {
    (0..n)
        .map(|i| {
            let case = FaultCase {
                id: format!("case-{i}"),
                text: format!("fault description {i}"),
                system: Some(if i % 3 == 0 { "制动".to_string() } else { "发动机".to_string() }),
                part: Some(format!("part-{}", i % 20)),
                tags: Vec::new(),
                vehicletype: None,
                faultcode: None,
                popularity: (i % 500) as f64,
                extra: Default::default(),
            };
            let raw_score = match source {
                Source::Rerank => (i % 100) as f32 / 100.0,
                Source::Semantic => (i % 100) as f32 / 100.0,
                _ => (i % 50) as f32,
            };
            RawHit { case, raw_score }
        })
        .collect()
}

fn bench_fuse(c: &mut Criterion) {
    let mut group = c.benchmark_group("fuse");

    for n in [50usize, 200, 1_000].iter() {
        let mut by_source = CandidatesBySource::new();
        by_source.insert(Source::Keyword, generate_hits(*n, Source::Keyword));
        by_source.insert(Source::Semantic, generate_hits(*n, Source::Semantic));
        by_source.insert(Source::Rerank, generate_hits(n / 5, Source::Rerank));

        let hints = Hints { system: Some("制动".to_string()), ..Default::default() };

        group.bench_with_input(BenchmarkId::new("union_and_rank", n), &by_source, |b, by_source| {
            b.iter(|| {
                let results = fuse(by_source, Weights::default(), &hints, PopularityScale::default(), 10);
                black_box(results);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fuse);
criterion_main!(benches);
