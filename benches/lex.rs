use criterion::{Criterion, criterion_group, criterion_main};

use lucene_expr::lex::{Lexer, TokenKind};

const TESTS: [&str; 6] = [
    "a:b AND c:d",
    r#"("jakarta apache" OR title:foo*) AND NOT body:/b [c]/"#,
    "a OR b AND c:[* to -1] OR d AND NOT +e:f",
    r#"price:[12.50 TO 150] AND category:(electronics OR computers OR phones)"#,
    r"escaped:\(1\+1\)\:2 AND quoted:'it''s fine'",
    "deeply:(nested OR (groups AND (of OR terms))) AND boosted^2.5 fuzzy~3",
];

fn lex_all() {
    for test in TESTS.iter() {
        let mut lexer = Lexer::new(test);
        loop {
            let tok = std::hint::black_box(lexer.next());
            if matches!(tok.kind, TokenKind::Eof | TokenKind::Err) {
                break;
            }
        }
    }
}

fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("lex", |b| b.iter(lex_all));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
