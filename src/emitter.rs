use std::io::{self, Write};

use crate::{
    ast::{Expr, ExprKind, FunctionDecl, Program, Stmt},
    util::intern::NameTable,
};

const INDENT_WIDTH: usize = 4;

/// Lowers a program into C++ source text.
///
/// The lowering is purely syntactic: it never inspects types (and is
/// therefore generic over the AST's annotation parameter), it is total on
/// any well-formed tree, and it is deterministic, so the same input always
/// yields byte-identical output. Compound expressions are emitted fully
/// parenthesized, which preserves evaluation order without tracking
/// precedence.
pub fn emit_program<T>(names: &NameTable, program: &Program<T>) -> String {
    let mut buf = Vec::with_capacity(1024);
    emit(&mut buf, names, program).expect("writing to a Vec cannot fail");
    String::from_utf8(buf).expect("emitted source is valid UTF-8")
}

pub fn emit<W: Write, T>(w: &mut W, names: &NameTable, program: &Program<T>) -> io::Result<()> {
    let mut emitter = Emitter {
        w,
        names,
        indent: 0,
    };
    emitter.program(program)
}

struct Emitter<'a, W> {
    w: &'a mut W,
    names: &'a NameTable,
    indent: usize,
}

impl<W: Write> Emitter<'_, W> {
    fn program<T>(&mut self, program: &Program<T>) -> io::Result<()> {
        writeln!(self.w, "#include <iostream>")?;
        writeln!(self.w, "#include <vector>")?;
        writeln!(self.w)?;

        for stmt in &program.stmts {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    fn stmt<T>(&mut self, stmt: &Stmt<T>) -> io::Result<()> {
        match stmt {
            Stmt::Expr(expr) => {
                self.pad()?;
                self.expr(expr)?;
                writeln!(self.w, ";")
            }
            Stmt::VarDecl {
                name, initializer, ..
            } => {
                self.pad()?;
                write!(self.w, "auto {} = ", self.names.get(name.name))?;
                match initializer {
                    Some(init) => self.expr(init)?,
                    None => write!(self.w, "0")?,
                }
                writeln!(self.w, ";")
            }
            Stmt::Block(stmts) => self.block(stmts),
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.pad()?;
                write!(self.w, "if (")?;
                self.expr(condition)?;
                write!(self.w, ") ")?;
                self.stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.pad()?;
                    write!(self.w, "else ")?;
                    self.stmt(else_branch)?;
                }
                Ok(())
            }
            Stmt::While { condition, body } => {
                self.pad()?;
                write!(self.w, "while (")?;
                self.expr(condition)?;
                write!(self.w, ") ")?;
                self.stmt(body)
            }
            Stmt::Function(decl) => self.function(decl),
            Stmt::Return { value, .. } => {
                self.pad()?;
                write!(self.w, "return ")?;
                if let Some(value) = value {
                    self.expr(value)?;
                }
                writeln!(self.w, ";")
            }
        }
    }

    fn function<T>(&mut self, decl: &FunctionDecl<T>) -> io::Result<()> {
        let name = self.names.get(decl.name.name);
        // `main` keeps the `int` signature the host compiler requires;
        // every other function is fully deduced.
        if name == "main" {
            write!(self.w, "int {name}(")?;
        } else {
            write!(self.w, "auto {name}(")?;
        }
        for (i, param) in decl.params.iter().enumerate() {
            if i > 0 {
                write!(self.w, ", ")?;
            }
            write!(self.w, "auto {}", self.names.get(param.name))?;
        }
        write!(self.w, ") ")?;

        writeln!(self.w, "{{")?;
        self.indent += 1;
        for stmt in &decl.body {
            self.stmt(stmt)?;
        }
        self.indent -= 1;
        self.pad()?;
        writeln!(self.w, "}}")?;
        writeln!(self.w)
    }

    fn block<T>(&mut self, stmts: &[Stmt<T>]) -> io::Result<()> {
        writeln!(self.w, "{{")?;
        self.indent += 1;
        for stmt in stmts {
            self.stmt(stmt)?;
        }
        self.indent -= 1;
        self.pad()?;
        writeln!(self.w, "}}")
    }

    fn expr<T>(&mut self, expr: &Expr<T>) -> io::Result<()> {
        match &expr.kind {
            ExprKind::Int(value) => write!(self.w, "{value}"),
            ExprKind::Float(value) => write!(self.w, "{value}"),
            ExprKind::Str(value) => write!(self.w, "{value:?}"),
            ExprKind::Bool(value) => write!(self.w, "{value}"),
            ExprKind::Variable(ident) => write!(self.w, "{}", self.names.get(ident.name)),
            ExprKind::Assign { target, value } => {
                write!(self.w, "({} = ", self.names.get(target.name))?;
                self.expr(value)?;
                write!(self.w, ")")
            }
            ExprKind::Unary { op, right } => {
                write!(self.w, "({}", op.lexeme())?;
                self.expr(right)?;
                write!(self.w, ")")
            }
            ExprKind::Binary { op, lhs, rhs } => {
                write!(self.w, "(")?;
                self.expr(lhs)?;
                write!(self.w, " {} ", op.lexeme())?;
                self.expr(rhs)?;
                write!(self.w, ")")
            }
            ExprKind::Call { callee, args, .. } => {
                self.expr(callee)?;
                write!(self.w, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(self.w, ", ")?;
                    }
                    self.expr(arg)?;
                }
                write!(self.w, ")")
            }
        }
    }

    fn pad(&mut self) -> io::Result<()> {
        write!(self.w, "{:width$}", "", width = self.indent * INDENT_WIDTH)
    }
}
