use std::{
    env, fs,
    io::{self, Write},
    process,
};

use anyhow::Context as _;
use quill::{
    emitter, interpreter, parser, resolver,
    token::{Span, Spanned, Token},
    type_checker::Checker,
    util::{
        fmt::{Context, Show},
        intern::NameTable,
    },
};

// sysexits(3) conventions: EX_USAGE, EX_DATAERR, EX_IOERR.
const EXIT_USAGE: i32 = 64;
const EXIT_DATA: i32 = 65;
const EXIT_IO: i32 = 74;

fn main() {
    let mut args = env::args().skip(1);

    match (args.next(), args.next()) {
        (None, _) => {
            if let Err(error) = repl() {
                eprintln!("Error: {error}");
                process::exit(1);
            }
        }
        (Some(arg), None) if arg == "--version" => print_version(),
        (Some(path), None) => compile_file(&path),
        _ => {
            eprintln!("Usage: quillc <file.q>");
            process::exit(EXIT_USAGE);
        }
    }
}

fn print_version() {
    println!("Quill Compiler v{}", env!("CARGO_PKG_VERSION"));
    println!("This compiler translates Quill source files (.q) into C++ code.");
    println!("Run without arguments for an interactive interpreter session.");
}

fn compile_file(path: &str) {
    let src = match fs::read_to_string(path) {
        Ok(src) => src,
        Err(error) => {
            eprintln!("Error: Could not open file '{path}': {error}.");
            process::exit(EXIT_IO);
        }
    };

    match compile(&src) {
        Ok(cpp) => print!("{cpp}"),
        Err(count) => {
            eprintln!("Error: {count} error(s), no output generated.");
            process::exit(EXIT_DATA);
        }
    }
}

/// Runs the front-end passes in order, skipping downstream passes once one
/// fails, and returns the emitted C++ on success or the diagnostic count.
fn compile(src: &str) -> Result<String, usize> {
    let mut tokens: Vec<Token> = Vec::with_capacity(1024);
    let mut names = NameTable::with_capacity(256);

    let program = parser::parse_program(src, &mut tokens, &mut names)
        .map_err(|(_, errors)| report_all(src, &names, &errors))?;
    resolver::resolve(&mut names, &program).map_err(|errors| report_all(src, &names, &errors))?;
    let program = Checker::new()
        .check(&mut names, program)
        .map_err(|(_, errors)| report_all(src, &names, &errors))?;

    Ok(emitter::emit_program(&names, &program))
}

fn report_all<E>(src: &str, names: &NameTable, errors: &[Spanned<E>]) -> usize
where
    Spanned<E>: Show,
{
    for error in errors {
        report(src, names, error);
    }
    errors.len()
}

/// Prints a diagnostic with its line/column and a caret under the
/// offending source region.
fn report<E>(src: &str, names: &NameTable, error: &Spanned<E>)
where
    Spanned<E>: Show,
{
    let Position { line, column } = position(src, error.span);

    let ctx = Context { names };
    eprintln!("Error (line {line}, col {column}): {}", error.display(&ctx));

    if let Some(line_content) = src.lines().nth(line - 1) {
        eprintln!("{line:>4} | {line_content}");
        let padding = column.saturating_sub(1);
        let width = (error.span.len as usize).max(1);
        eprintln!("{:>4} | {}{}", "", " ".repeat(padding), "^".repeat(width));
    }
}

struct Position {
    line: usize,
    column: usize,
}

fn position(src: &str, span: Span) -> Position {
    let lo = span.lo.min(src.len());
    let before = &src[..lo];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    Position {
        line,
        column: lo - line_start + 1,
    }
}

/// Interactive interpreter mode. Enter code, finish with an empty line to
/// evaluate what was accumulated, or send Ctrl+D to exit.
fn repl() -> anyhow::Result<()> {
    println!("Welcome to interactive quillc.");
    println!("Enter code, finish with empty line, or send Ctrl+D to exit.");

    let mut accumulated = String::new();

    loop {
        if accumulated.is_empty() {
            print!("> ");
        } else {
            print!("| ");
        }
        io::stdout().flush().context("failed to flush prompt")?;

        let mut current = String::new();
        let n = io::stdin()
            .read_line(&mut current)
            .context("failed to read input")?;

        if n == 0 {
            println!();
            if !accumulated.trim().is_empty() {
                evaluate(&accumulated);
            }
            return Ok(());
        }

        if current.trim().is_empty() {
            if !accumulated.trim().is_empty() {
                evaluate(&accumulated);
                accumulated.clear();
            }
        } else {
            accumulated.push_str(&current);
        }
    }
}

fn evaluate(src: &str) {
    match interpreter::run_source(src, io::stdout()) {
        // Runtime failures have already been reported by the harness.
        Ok(_) => {}
        Err(errors) => {
            for error in errors {
                eprintln!("Error: {error}");
            }
        }
    }
}
