use criterion::{criterion_group, criterion_main, Criterion};
use search_core::{build, clean_terms, collect, Document, QueryEngine};

const TEXT: &str = "The campus library opens early. Students love the quiet rooms, \
    but some complain about terrible coffee and sad lighting. Great events happen every week, \
    from research talks to wonderful concerts on the lawn.";

fn corpus() -> Vec<Document> {
    let base = clean_terms(TEXT);
    (0..500)
        .map(|i| {
            let mut content = base.clone();
            content.rotate_left(i % base.len());
            content.push(format!("topic{}", i % 37));
            Document::new(format!("https://bench.example/{i}"), content)
        })
        .collect()
}

fn bench_build(c: &mut Criterion) {
    let docs = corpus();
    c.bench_function("collect_and_build_500", |b| {
        b.iter(|| {
            let stats = collect(&docs).expect("non-empty corpus");
            build(&docs, &stats)
        })
    });
}

fn bench_query(c: &mut Criterion) {
    let docs = corpus();
    let stats = collect(&docs).expect("non-empty corpus");
    let engine = QueryEngine::new(build(&docs, &stats), stats);
    c.bench_function("or_query", |b| b.iter(|| engine.execute_or("great coffee topic3 library")));
    c.bench_function("and_query", |b| b.iter(|| engine.execute_and("campus students topic5")));
}

criterion_group!(benches, bench_build, bench_query);
criterion_main!(benches);
