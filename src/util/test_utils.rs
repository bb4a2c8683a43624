use crate::{
    ast::{Expr, ExprKind, FunctionDecl, Program, Stmt},
    emitter, parser, resolver,
    token::{Spanned, Token},
    type_checker::Checker,
    types::Type,
    util::{fmt::format_errors, intern::NameTable},
};

/// Parses `src`, panicking on failure.
#[track_caller]
pub(crate) fn parse_ok(src: &str) -> (Program, NameTable) {
    let mut tokens: Vec<Token> = Vec::with_capacity(64);
    let mut names = NameTable::with_capacity(16);
    match parser::parse_program(src, &mut tokens, &mut names) {
        Ok(program) => (program, names),
        Err((_, errors)) => panic!("unexpected parse errors: {:?}", errors),
    }
}

/// Parses `src`, panicking unless at least one diagnostic was recorded.
#[track_caller]
pub(crate) fn parse_failure(src: &str) -> (Program, Vec<Spanned<parser::Error>>) {
    let mut tokens: Vec<Token> = Vec::with_capacity(64);
    let mut names = NameTable::with_capacity(16);
    match parser::parse_program(src, &mut tokens, &mut names) {
        Ok(_) => panic!("expected parse errors for {src:?}"),
        Err((program, errors)) => (program, errors),
    }
}

/// Parses and prints `src` as the compact S-expression form used across
/// the parser tests.
#[track_caller]
pub(crate) fn parse_and_print(src: &str) -> String {
    let (program, names) = parse_ok(src);
    print_program(&names, &program)
}

/// Parses and resolves `src`, returning the formatted diagnostics (empty
/// when resolution succeeds).
#[track_caller]
pub(crate) fn resolve_errors(src: &str) -> Vec<String> {
    let (program, mut names) = parse_ok(src);
    match resolver::resolve(&mut names, &program) {
        Ok(()) => Vec::new(),
        Err(errors) => format_errors(&names, &errors),
    }
}

/// Parses and type-checks `src`, panicking on any diagnostic.
#[track_caller]
pub(crate) fn check_ok(src: &str) -> Program<Type> {
    let (program, mut names) = parse_ok(src);
    match Checker::new().check(&mut names, program) {
        Ok(program) => program,
        Err((_, errors)) => {
            panic!("unexpected type errors: {:?}", format_errors(&names, &errors))
        }
    }
}

/// Parses and type-checks `src`, returning the formatted diagnostics.
#[track_caller]
pub(crate) fn check_errors(src: &str) -> Vec<String> {
    let (program, mut names) = parse_ok(src);
    match Checker::new().check(&mut names, program) {
        Ok(_) => panic!("expected type errors for {src:?}"),
        Err((_, errors)) => format_errors(&names, &errors),
    }
}

/// Parses and emits `src`. The emitter never inspects types, so the
/// untyped tree is lowered directly.
#[track_caller]
pub(crate) fn emit_source(src: &str) -> String {
    let (program, names) = parse_ok(src);
    emitter::emit_program(&names, &program)
}

pub(crate) fn print_program<T>(names: &NameTable, program: &Program<T>) -> String {
    let mut out = String::new();
    for stmt in &program.stmts {
        print_stmt(&mut out, names, stmt);
    }
    out
}

fn print_stmt<T>(out: &mut String, names: &NameTable, stmt: &Stmt<T>) {
    match stmt {
        Stmt::Expr(expr) => {
            out.push_str("(expr-stmt ");
            print_expr(out, names, expr);
            out.push_str(";) ");
        }
        Stmt::VarDecl {
            name,
            mutable,
            initializer,
        } => {
            out.push_str("(var-decl ");
            if *mutable {
                out.push_str("mut ");
            }
            out.push_str(names.get(name.name));
            if let Some(init) = initializer {
                out.push_str(" = ");
                print_expr(out, names, init);
            }
            out.push_str(";) ");
        }
        Stmt::Block(stmts) => {
            out.push_str("{ ");
            for stmt in stmts {
                print_stmt(out, names, stmt);
            }
            out.push_str("} ");
        }
        Stmt::If {
            condition,
            then_branch,
            else_branch,
        } => {
            out.push_str("(if ");
            print_expr(out, names, condition);
            out.push(' ');
            print_stmt(out, names, then_branch);
            if let Some(else_branch) = else_branch {
                out.push_str("else ");
                print_stmt(out, names, else_branch);
            }
            out.push_str(") ");
        }
        Stmt::While { condition, body } => {
            out.push_str("(while ");
            print_expr(out, names, condition);
            out.push(' ');
            print_stmt(out, names, body);
            out.push_str(") ");
        }
        Stmt::Function(decl) => print_function(out, names, decl),
        Stmt::Return { value, .. } => {
            out.push_str("(return ");
            if let Some(value) = value {
                print_expr(out, names, value);
            }
            out.push_str(";) ");
        }
    }
}

fn print_function<T>(out: &mut String, names: &NameTable, decl: &FunctionDecl<T>) {
    out.push_str("(fn-decl ");
    out.push_str(names.get(decl.name.name));
    out.push('(');
    for (i, param) in decl.params.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(names.get(param.name));
    }
    out.push_str(") { ");
    for stmt in &decl.body {
        print_stmt(out, names, stmt);
    }
    out.push_str("} ) ");
}

fn print_expr<T>(out: &mut String, names: &NameTable, expr: &Expr<T>) {
    match &expr.kind {
        ExprKind::Int(value) => out.push_str(&value.to_string()),
        ExprKind::Float(value) => out.push_str(&value.to_string()),
        ExprKind::Str(value) => out.push_str(&format!("{value:?}")),
        ExprKind::Bool(value) => out.push_str(&value.to_string()),
        ExprKind::Variable(ident) => out.push_str(names.get(ident.name)),
        ExprKind::Assign { target, value } => {
            out.push('(');
            out.push_str(names.get(target.name));
            out.push_str(" = ");
            print_expr(out, names, value);
            out.push(')');
        }
        ExprKind::Unary { op, right } => {
            out.push('(');
            out.push_str(op.lexeme());
            print_expr(out, names, right);
            out.push(')');
        }
        ExprKind::Binary { op, lhs, rhs } => {
            out.push('(');
            print_expr(out, names, lhs);
            out.push(' ');
            out.push_str(op.lexeme());
            out.push(' ');
            print_expr(out, names, rhs);
            out.push(')');
        }
        ExprKind::Call { callee, args, .. } => {
            out.push_str("(call ");
            print_expr(out, names, callee);
            for arg in args {
                out.push(' ');
                print_expr(out, names, arg);
            }
            out.push(')');
        }
    }
}
