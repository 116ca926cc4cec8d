use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use watermelon_analyzer::services::extractor::extract_result;

fn completion_with_watermelons(count: usize) -> String {
    let items: Vec<String> = (0..count)
        .map(|i| format!("{{\"id\":{},\"box\":[{},{},{},{}]}}", i, i, i + 1, i + 2, i + 3))
        .collect();
    format!(
        "Sure! Here is what I found:\n```json\n{{\"has_watermelon\":true,\"count\":{},\"watermelons\":[{}]}}\n```\nLet me know if you need anything else.",
        count,
        items.join(",")
    )
}

fn bench_greedy_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("greedy_extraction");

    for count in [1usize, 10, 100].iter() {
        let completion = completion_with_watermelons(*count);
        group.bench_with_input(
            BenchmarkId::new("watermelons", count),
            &completion,
            |b, completion| b.iter(|| extract_result(black_box(completion))),
        );
    }

    group.finish();
}

fn bench_balanced_fallback(c: &mut Criterion) {
    let mut group = c.benchmark_group("balanced_fallback");

    // Two separate objects defeat the greedy span and force the scanner
    let completion = format!(
        "First guess {{\"has_watermelon\":false}} then a correction {}",
        completion_with_watermelons(10).replace("```json", "").replace("```", "")
    );
    group.bench_function("two_objects", |b| {
        b.iter(|| extract_result(black_box(&completion)))
    });

    group.bench_function("no_json", |b| {
        b.iter(|| extract_result(black_box("I could not analyze this image.")))
    });

    group.finish();
}

criterion_group!(benches, bench_greedy_extraction, bench_balanced_fallback);
criterion_main!(benches);
