// Criterion benchmarks for CV Match

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cv_match::core::{content_key, parse_assessment, strip_code_fence};
use cv_match::services::scoring::{render_prompt, MATCH_PROMPT};

const PAYLOAD: &str = r#"{"match": true, "overall_score": 85, "criteria_scores": {"skills": 90, "experience": 80, "location": 70, "education": 70, "certifications": 60}, "explanation": "Strong match"}"#;

fn document_of_size(bytes: usize) -> String {
    "Senior engineer, 5 years Python, AWS, Kubernetes. "
        .chars()
        .cycle()
        .take(bytes)
        .collect()
}

fn bench_content_key(c: &mut Criterion) {
    let mut group = c.benchmark_group("content_key");

    for size in [1_000, 10_000, 100_000].iter() {
        let cv = document_of_size(*size);
        let job = document_of_size(*size / 2);

        group.bench_with_input(BenchmarkId::new("sha256", size), size, |b, _| {
            b.iter(|| content_key(black_box(&cv), black_box(&job)));
        });
    }

    group.finish();
}

fn bench_assessment_parsing(c: &mut Criterion) {
    let fenced = format!("```json\n{}\n```", PAYLOAD);

    c.bench_function("strip_code_fence", |b| {
        b.iter(|| strip_code_fence(black_box(&fenced)));
    });

    c.bench_function("parse_assessment_bare", |b| {
        b.iter(|| parse_assessment(black_box(PAYLOAD)));
    });

    c.bench_function("parse_assessment_fenced", |b| {
        b.iter(|| parse_assessment(black_box(&fenced)));
    });
}

fn bench_render_prompt(c: &mut Criterion) {
    let cv = document_of_size(10_000);
    let job = document_of_size(5_000);

    c.bench_function("render_prompt_10k", |b| {
        b.iter(|| render_prompt(black_box(MATCH_PROMPT), black_box(&cv), black_box(&job)));
    });
}

criterion_group!(
    benches,
    bench_content_key,
    bench_assessment_parsing,
    bench_render_prompt
);

criterion_main!(benches);
