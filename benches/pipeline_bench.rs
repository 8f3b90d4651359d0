//! Classify + select hot-path benchmark

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};
use liveops_insight::catalog::Catalogs;
use liveops_insight::domain::DomainKnowledge;
use liveops_insight::engine::InsightEngine;
use liveops_insight::providers::lexical::LexicalSimilarity;
use liveops_insight::repo::{seed_repository, MemoryRepository};
use std::sync::Arc;

fn bench_pipeline(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();

    let catalogs = Arc::new(Catalogs::builtin().unwrap());
    let repo = Arc::new(MemoryRepository::new());
    seed_repository(&repo, 200, 7, Utc::now());
    let similarity = Arc::new(LexicalSimilarity::new(
        repo.clone(),
        DomainKnowledge::new().all_notes(),
    ));
    let engine = Arc::new(InsightEngine::new(catalogs, repo, similarity, None).unwrap());

    c.bench_function("classify", |b| {
        let engine = engine.clone();
        b.iter(|| engine.classify_with_seed("How do BOGO offers perform?", &Default::default()));
    });

    c.bench_function("classify_and_select", |b| {
        let engine = engine.clone();
        b.iter(|| {
            runtime.block_on(async {
                engine
                    .handle_query("How do BOGO offers perform?", None)
                    .await
            })
        });
    });
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
