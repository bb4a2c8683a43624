use criterion::{criterion_group, criterion_main, Criterion};
use quill::{lexer, parser, token::Token, util::intern::NameTable};
use std::hint::black_box;

static INPUT: &str = include_str!("../demos/big.q");

fn lexer_bench(input: &str, tokens: &mut Vec<Token>) {
    tokens.clear();
    lexer::lex(input, tokens);
    black_box(tokens.len());
}

fn parser_bench(input: &str, tokens: &mut Vec<Token>) {
    let mut names = NameTable::with_capacity(64);
    let program = parser::parse_program(input, tokens, &mut names).unwrap();
    _ = black_box(program);
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut tokens = Vec::with_capacity(4096);

    c.bench_function("lexer", |b| {
        b.iter(|| lexer_bench(black_box(INPUT), &mut tokens))
    });
    c.bench_function("parser", |b| {
        b.iter(|| parser_bench(black_box(INPUT), &mut tokens))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
