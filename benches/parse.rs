use criterion::{Criterion, criterion_group, criterion_main};

use lucene_expr::{ParseOptions, parse, to_postgres};

const TESTS: [&str; 6] = [
    "a:b",
    "a:b AND c:d OR e:f OR h:i AND j:k",
    r#"("jakarta apache" OR title:foo*) AND NOT body:/b [c]/"#,
    "a OR b AND c:[* to -1] OR d AND NOT +e:f",
    "price:[12.50 TO 150] AND category:(electronics OR computers OR phones)",
    "deeply:(nested OR (groups AND (of OR terms))) AND status:>=3",
];

fn parse_all() {
    let opts = ParseOptions::default();
    for test in TESTS.iter() {
        _ = std::hint::black_box(parse(test, &opts));
    }
}

fn render_all() {
    let opts = ParseOptions::default();
    for test in TESTS.iter() {
        _ = std::hint::black_box(to_postgres(test, &opts));
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("parse", |b| b.iter(parse_all));
    c.bench_function("parse and render", |b| b.iter(render_all));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
