use criterion::{criterion_group, criterion_main, Criterion};
use lispc::{
    lexer::SUGGESTED_TOKENS_CAPACITY,
    parser::parse_program,
    pipeline::{compile, Options},
    token::Token,
    type_checker,
};
use std::hint::black_box;

static INPUT: &str = include_str!("../../demos/big.lisp");

fn parser(input: &str, tokens: &mut Vec<Token>) {
    let program = parse_program(input, tokens).program.unwrap();
    _ = black_box(program);
}

fn checker(input: &str, tokens: &mut Vec<Token>) {
    let program = parse_program(input, tokens).program.unwrap();
    let analysis = type_checker::check(&program);
    assert!(analysis.is_ok());
    _ = black_box(analysis);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);

    c.bench_function("parser", |b| {
        b.iter(|| {
            tokens.clear();
            parser(black_box(INPUT), &mut tokens);
        });
    });

    c.bench_function("checker", |b| {
        b.iter(|| {
            tokens.clear();
            checker(black_box(INPUT), &mut tokens);
        });
    });

    let options = Options::default();
    c.bench_function("compile", |b| {
        b.iter(|| {
            let compilation = compile(black_box(INPUT), &options).unwrap();
            _ = black_box(compilation);
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
