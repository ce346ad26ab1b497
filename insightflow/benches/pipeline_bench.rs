//! Benchmarks for the per-page text stages.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use insightflow::prelude::*;
use insightflow::testing::article_html;

const PARAGRAPH: &str = "Grid operators are adding battery storage at record pace. \
    Falling cell prices and new market rules reward fast response. \
    Utilities now pair solar farms with four-hour batteries to cover the evening peak. \
    Analysts expect installed capacity to double again within three years.";

fn page_text() -> String {
    std::iter::repeat(PARAGRAPH).take(12).collect::<Vec<_>>().join("\n\n")
}

fn text_stage_benchmark(c: &mut Criterion) {
    let raw = page_text();
    let doc = normalize(&raw);

    c.bench_function("normalize", |b| b.iter(|| normalize(black_box(&raw))));
    c.bench_function("extract_keywords", |b| {
        b.iter(|| extract_keywords(black_box(&doc), 5));
    });
    c.bench_function("extractive_summary", |b| {
        b.iter(|| extractive_summary(black_box(&doc), 3));
    });
}

fn extraction_benchmark(c: &mut Criterion) {
    let paragraphs: Vec<&str> = std::iter::repeat(PARAGRAPH).take(12).collect();
    let html = article_html("Storage", &paragraphs);
    let extractor = ReadableContentExtractor::new(ExtractionConfig::default())
        .expect("default extraction config is valid");

    c.bench_function("extract_readable_text", |b| {
        b.iter(|| extractor.extract(black_box(&html)));
    });
}

criterion_group!(benches, text_stage_benchmark, extraction_benchmark);
criterion_main!(benches);
