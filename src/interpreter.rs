use std::{io, rc::Rc};

use crate::{
    ast::{BinaryOp, Expr, ExprKind, Program, Stmt, UnaryOp},
    parser, resolver,
    runtime::{Callable, CallableKind, EnvRef, Environment, Value},
    token::Token,
    type_checker::Checker,
    types::Type,
    util::{
        fmt::{self, Context, Show},
        intern::{Name, NameTable},
    },
};

/// The tree-walking evaluator.
///
/// Executes a resolved, type-checked program against an environment tree.
/// The output sink is generic so tests (and the harness) can capture what
/// `println` writes.
pub struct Interpreter<W> {
    globals: EnvRef,
    env: EnvRef,
    out: W,
    /// The most recently evaluated expression statement's value, retained
    /// for harness inspection.
    last: Option<Value>,
}

/// The evaluator's non-local control signal.
///
/// `Return` unwinds across block frames to the enclosing call site;
/// `Fail` aborts the program run. Keeping the two as distinct variants
/// guarantees a returned value can never be misreported as a failure.
pub enum Unwind {
    Return(Value),
    Fail(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Unwind {
        Unwind::Fail(error)
    }
}

type Exec = Result<(), Unwind>;
type Eval = Result<Value, Unwind>;

impl<W: io::Write> Interpreter<W> {
    pub fn with_output(names: &mut NameTable, out: W) -> Interpreter<W> {
        let globals = Environment::global(names);
        Interpreter {
            env: Rc::clone(&globals),
            globals,
            out,
            last: None,
        }
    }

    /// Executes the program's statements in order.
    ///
    /// A runtime failure terminates this run and is returned to the caller;
    /// the interpreter itself (environments included) stays usable.
    pub fn interpret(&mut self, program: &Program<Type>) -> Result<(), RuntimeError> {
        for stmt in &program.stmts {
            match self.execute(stmt) {
                Ok(()) => {}
                // The checker rejects top-level returns; a surfacing
                // `Return` can only mean the caller skipped it, so the
                // signal just stops the run.
                Err(Unwind::Return(_)) => break,
                Err(Unwind::Fail(error)) => return Err(error),
            }
        }
        Ok(())
    }

    pub fn globals(&self) -> EnvRef {
        Rc::clone(&self.globals)
    }

    pub fn last_value(&self) -> Option<Value> {
        self.last.clone()
    }

    pub fn into_output(self) -> W {
        self.out
    }

    fn execute(&mut self, stmt: &Stmt<Type>) -> Exec {
        match stmt {
            Stmt::Expr(expr) => {
                let value = self.evaluate(expr)?;
                self.last = Some(value);
            }
            Stmt::VarDecl {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Bool(false),
                };
                self.env.borrow_mut().define(name.name, value);
            }
            Stmt::Block(stmts) => {
                let child = Environment::with_parent(Rc::clone(&self.env));
                self.execute_block(stmts, child)?;
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }
            }
            Stmt::Function(decl) => {
                let callable = Callable {
                    name: decl.name.name,
                    kind: CallableKind::Declared {
                        decl: Rc::clone(decl),
                        closure: Rc::clone(&self.env),
                    },
                };
                self.env
                    .borrow_mut()
                    .define(decl.name.name, Value::Callable(Rc::new(callable)));
            }
            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Bool(false),
                };
                return Err(Unwind::Return(value));
            }
        }
        Ok(())
    }

    /// Executes `stmts` with `env` as the current environment, restoring
    /// the previous environment on every exit path.
    fn execute_block(&mut self, stmts: &[Stmt<Type>], env: EnvRef) -> Exec {
        let previous = std::mem::replace(&mut self.env, env);
        let result = stmts.iter().try_for_each(|stmt| self.execute(stmt));
        self.env = previous;
        result
    }

    fn evaluate(&mut self, expr: &Expr<Type>) -> Eval {
        match &expr.kind {
            ExprKind::Int(value) => Ok(Value::Num(*value as f64)),
            ExprKind::Float(value) => Ok(Value::Num(*value)),
            ExprKind::Str(value) => Ok(Value::Str(Rc::from(&**value))),
            ExprKind::Bool(value) => Ok(Value::Bool(*value)),
            ExprKind::Variable(ident) => Environment::get(&self.env, ident.name)
                .ok_or_else(|| RuntimeError::UndefinedVariable(ident.name).into()),
            ExprKind::Assign { target, value } => {
                let value = self.evaluate(value)?;
                if Environment::assign(&self.env, target.name, value.clone()) {
                    Ok(value)
                } else {
                    Err(RuntimeError::UndefinedVariable(target.name).into())
                }
            }
            ExprKind::Unary { op, right } => {
                let right = self.evaluate(right)?;
                match op {
                    UnaryOp::Neg => match right {
                        Value::Num(n) => Ok(Value::Num(-n)),
                        _ => Err(RuntimeError::UnaryOperand.into()),
                    },
                    UnaryOp::Not => Ok(Value::Bool(!right.is_truthy())),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.evaluate(lhs)?;
                let rhs = self.evaluate(rhs)?;
                self.binary(*op, lhs, rhs)
            }
            ExprKind::Call { callee, args, .. } => {
                let callee = self.evaluate(callee)?;
                let Value::Callable(callable) = callee else {
                    return Err(RuntimeError::NotCallable.into());
                };
                if args.len() != callable.arity() {
                    return Err(RuntimeError::Arity {
                        expected: callable.arity(),
                        got: args.len(),
                    }
                    .into());
                }
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.evaluate(arg)?);
                }
                self.call(&callable, values)
            }
        }
    }

    fn binary(&mut self, op: BinaryOp, lhs: Value, rhs: Value) -> Eval {
        if op.is_equality() {
            let equal = lhs == rhs;
            return Ok(Value::Bool(match op {
                BinaryOp::Eq => equal,
                _ => !equal,
            }));
        }

        let (Value::Num(l), Value::Num(r)) = (lhs, rhs) else {
            return Err(RuntimeError::NumericOperands(op).into());
        };
        Ok(match op {
            BinaryOp::Add => Value::Num(l + r),
            BinaryOp::Sub => Value::Num(l - r),
            BinaryOp::Mul => Value::Num(l * r),
            BinaryOp::Div => {
                if r == 0.0 {
                    return Err(RuntimeError::DivisionByZero.into());
                }
                Value::Num(l / r)
            }
            BinaryOp::Less => Value::Bool(l < r),
            BinaryOp::LessEq => Value::Bool(l <= r),
            BinaryOp::Greater => Value::Bool(l > r),
            BinaryOp::GreaterEq => Value::Bool(l >= r),
            BinaryOp::Eq | BinaryOp::NotEq => unreachable!("handled above"),
        })
    }

    /// The call protocol: a fresh environment parented by the callable's
    /// closure, positional parameters bound in order, and the `Return`
    /// signal caught here and only here.
    fn call(&mut self, callable: &Callable, args: Vec<Value>) -> Eval {
        match &callable.kind {
            CallableKind::Native { func, .. } => {
                func(&mut self.out, &args).map_err(|_| RuntimeError::Output.into())
            }
            CallableKind::Declared { decl, closure } => {
                let env = Environment::with_parent(Rc::clone(closure));
                for (param, value) in decl.params.iter().zip(args) {
                    env.borrow_mut().define(param.name, value);
                }
                match self.execute_block(&decl.body, env) {
                    Ok(()) => Ok(Value::Bool(false)),
                    Err(Unwind::Return(value)) => Ok(value),
                    Err(fail) => Err(fail),
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    UndefinedVariable(Name),
    NotCallable,
    Arity { expected: usize, got: usize },
    UnaryOperand,
    NumericOperands(BinaryOp),
    DivisionByZero,
    Output,
}

/// The state of a finished [`run_source`] invocation, kept around so
/// callers can inspect what the program left behind.
#[derive(Debug)]
pub struct Session<W> {
    pub names: NameTable,
    pub globals: EnvRef,
    pub last_value: Option<Value>,
    pub runtime_error: Option<RuntimeError>,
    pub output: W,
}

impl<W> Session<W> {
    /// Convenience lookup of a global binding by source name.
    pub fn global(&mut self, name: &str) -> Option<Value> {
        let name = self.names.intern(name);
        Environment::get(&self.globals, name)
    }
}

/// The programmatic harness: runs the full pipeline on `src` and evaluates
/// the program, returning the session for inspection.
///
/// Front-end failures (lexical, syntactic, resolution, typing) are
/// returned as formatted diagnostics; downstream passes are skipped once a
/// pass fails. A runtime failure is reported to stderr as
/// `Runtime Error: <message>` and recorded in the session without tearing
/// down the caller.
pub fn run_source<W: io::Write>(src: &str, out: W) -> Result<Session<W>, Vec<String>> {
    let mut tokens: Vec<Token> = Vec::with_capacity(256);
    let mut names = NameTable::with_capacity(64);

    let program = parser::parse_program(src, &mut tokens, &mut names)
        .map_err(|(_, errors)| fmt::format_errors(&names, &errors))?;
    resolver::resolve(&mut names, &program)
        .map_err(|errors| fmt::format_errors(&names, &errors))?;
    let program = Checker::new()
        .check(&mut names, program)
        .map_err(|(_, errors)| fmt::format_errors(&names, &errors))?;

    let mut interpreter = Interpreter::with_output(&mut names, out);
    let runtime_error = interpreter.interpret(&program).err();
    if let Some(error) = &runtime_error {
        let ctx = Context { names: &names };
        eprintln!("Runtime Error: {}", error.display(&ctx));
    }

    Ok(Session {
        globals: interpreter.globals(),
        last_value: interpreter.last_value(),
        output: interpreter.into_output(),
        runtime_error,
        names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(src: &str) -> Session<Vec<u8>> {
        run_source(src, Vec::new()).expect("front-end failure")
    }

    #[test]
    fn while_loop_counts_to_three() {
        let mut session = run("let mut x = 0; while (x < 3) { x = x + 1; }");
        assert_eq!(session.global("x"), Some(Value::Num(3.0)));
    }

    #[test]
    fn block_declarations_do_not_leak() {
        let mut session = run("let a = 1; { let a = 2; }");
        assert_eq!(session.global("a"), Some(Value::Num(1.0)));
    }

    #[test]
    fn if_branches_follow_the_condition() {
        let mut session = run("let mut x = 0; if (true) { x = 1; }");
        assert_eq!(session.global("x"), Some(Value::Num(1.0)));

        let mut session = run("let mut x = 0; if (false) { x = 1; }");
        assert_eq!(session.global("x"), Some(Value::Num(0.0)));

        let mut session = run("let mut x = 0; if (1 > 2) { x = 1; } else { x = 2; }");
        assert_eq!(session.global("x"), Some(Value::Num(2.0)));
    }

    #[test]
    fn expression_statements_retain_their_value() {
        assert_eq!(run("1 < 2;").last_value, Some(Value::Bool(true)));
        assert_eq!(run("1 > 2;").last_value, Some(Value::Bool(false)));
        assert_eq!(run("2 >= 2;").last_value, Some(Value::Bool(true)));
        assert_eq!(run("5 == 5;").last_value, Some(Value::Bool(true)));
        assert_eq!(run("5 != 5;").last_value, Some(Value::Bool(false)));
        assert_eq!(run("2 + 3 * 4;").last_value, Some(Value::Num(14.0)));
    }

    #[test]
    fn uninitialized_bindings_default_to_false() {
        let mut session = run("let x;");
        assert_eq!(session.global("x"), Some(Value::Bool(false)));
    }

    #[test]
    fn functions_return_their_value() {
        let mut session = run("fn add(a, b) { return a + b; } let r = add(5, 3);");
        assert_eq!(session.global("r"), Some(Value::Num(8.0)));
    }

    #[test]
    fn functions_without_return_produce_false() {
        let mut session = run("fn noop() { 1 + 1; } let r = noop();");
        assert_eq!(session.global("r"), Some(Value::Bool(false)));
    }

    #[test]
    fn return_unwinds_out_of_nested_blocks() {
        let src = "
            fn pick(n) {
                if (n > 0) {
                    { return 1; }
                }
                return 2;
            }
            let a = pick(5);
            let b = pick(0);
        ";
        let mut session = run(src);
        assert_eq!(session.global("a"), Some(Value::Num(1.0)));
        assert_eq!(session.global("b"), Some(Value::Num(2.0)));
    }

    #[test]
    fn closures_capture_their_declaration_environment() {
        let src = "
            let mut counter = 0;
            fn bump() {
                counter = counter + 1;
                return counter;
            }
            bump();
            bump();
            let r = bump();
        ";
        let mut session = run(src);
        assert_eq!(session.global("r"), Some(Value::Num(3.0)));
        assert_eq!(session.global("counter"), Some(Value::Num(3.0)));
    }

    #[test]
    fn println_writes_to_the_output_sink() {
        let session = run("println(123);");
        assert_eq!(session.output, b"123\n");
        assert_eq!(session.last_value, Some(Value::Bool(false)));
    }

    #[test]
    fn println_formats_strings_and_bools() {
        let session = run("println(\"hi\"); println(true); println(1.5);");
        assert_eq!(session.output, b"hi\ntrue\n1.5\n");
    }

    #[test]
    fn division_by_zero_is_a_runtime_error() {
        let session = run("let mut x = 1; x = x / 0;");
        assert_eq!(session.runtime_error, Some(RuntimeError::DivisionByZero));
    }

    #[test]
    fn arity_mismatch_is_a_runtime_error() {
        let session = run("fn f(a) { return a; } f(1, 2);");
        assert_eq!(
            session.runtime_error,
            Some(RuntimeError::Arity {
                expected: 1,
                got: 2
            }),
        );
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        let session = run("let f = 1; f();");
        assert_eq!(session.runtime_error, Some(RuntimeError::NotCallable));
    }

    #[test]
    fn a_runtime_error_stops_the_run() {
        let session = run("println(1); let x = 1 / 0; println(2);");
        assert_eq!(session.runtime_error, Some(RuntimeError::DivisionByZero));
        assert_eq!(session.output, b"1\n");
    }

    #[test]
    fn front_end_failures_skip_evaluation() {
        let errors = run_source("let x = ;", Vec::new()).unwrap_err();
        assert!(!errors.is_empty());

        let errors = run_source("undeclared = 1;", Vec::new()).unwrap_err();
        assert_eq!(errors, vec!["assignment to undeclared variable 'undeclared'"]);

        let errors = run_source("let x = 1; x = 2;", Vec::new()).unwrap_err();
        assert_eq!(errors, vec!["cannot assign to immutable variable 'x'"]);
    }

    #[test]
    fn float_arithmetic_flows_through_equality() {
        assert_eq!(run("1.5 == 1.5;").last_value, Some(Value::Bool(true)));
        assert_eq!(run("\"a\" == \"a\";").last_value, Some(Value::Bool(true)));
        assert_eq!(run("\"a\" != \"b\";").last_value, Some(Value::Bool(true)));
    }
}
