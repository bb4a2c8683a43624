use std::{collections::HashMap, rc::Rc};

use crate::{
    ast::{BinaryOp, Expr, ExprKind, FunctionDecl, Ident, Program, Stmt, UnaryOp},
    runtime,
    token::{Span, Spanned},
    types::Type,
    util::intern::{Name, NameTable},
};

/// A per-identifier semantic record during checking.
#[derive(Copy, Clone, Debug)]
pub struct Symbol {
    pub ty: Type,
    pub mutable: bool,
    pub initialized: bool,
}

/// The Quill type checker.
///
/// Consumes an untyped [`Program`] and maps it into `Program<Type>`, in
/// which every expression carries its static type. Checking never aborts:
/// the offending expression is typed [`Type::Error`] and later checks
/// against it are suppressed, so one root cause yields one diagnostic.
pub struct Checker {
    scopes: Vec<HashMap<Name, Symbol>>,
    errors: Vec<Spanned<Error>>,
    /// The expected return type while checking a function body; `None` at
    /// top level.
    ///
    /// Function return and parameter types are currently fixed to
    /// [`Type::Int`]; parameterizing them touches only this field and
    /// [`Checker::check_function`].
    current_return: Option<Type>,
}

impl Checker {
    pub fn new() -> Checker {
        Checker {
            scopes: Vec::with_capacity(8),
            errors: Vec::with_capacity(8),
            current_return: None,
        }
    }

    pub fn check(
        mut self,
        names: &mut NameTable,
        program: Program,
    ) -> Result<Program<Type>, (Program<Type>, Vec<Spanned<Error>>)> {
        self.begin_scope();
        for (native, _) in runtime::NATIVES {
            let symbol = Symbol {
                ty: Type::Void,
                mutable: false,
                initialized: true,
            };
            self.scopes[0].insert(names.intern(native), symbol);
        }

        let stmts = program
            .stmts
            .into_iter()
            .map(|stmt| self.check_stmt(stmt))
            .collect();
        self.end_scope();

        let program = Program { stmts };
        if self.errors.is_empty() {
            Ok(program)
        } else {
            Err((program, self.errors))
        }
    }

    fn check_stmt(&mut self, stmt: Stmt) -> Stmt<Type> {
        match stmt {
            Stmt::Expr(expr) => Stmt::Expr(self.check_expr(expr)),
            Stmt::VarDecl {
                name,
                mutable,
                initializer,
            } => {
                let initializer = initializer.map(|init| self.check_expr(init));
                let ty = initializer.as_ref().map_or(Type::Void, |init| init.ty);
                self.define(
                    name,
                    Symbol {
                        ty,
                        mutable,
                        initialized: initializer.is_some(),
                    },
                );
                Stmt::VarDecl {
                    name,
                    mutable,
                    initializer,
                }
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                let stmts = stmts.into_iter().map(|s| self.check_stmt(s)).collect();
                self.end_scope();
                Stmt::Block(stmts)
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.check_expr(condition);
                self.expect_condition("if", &condition);
                Stmt::If {
                    condition,
                    then_branch: Box::new(self.check_stmt(*then_branch)),
                    else_branch: else_branch.map(|e| Box::new(self.check_stmt(*e))),
                }
            }
            Stmt::While { condition, body } => {
                let condition = self.check_expr(condition);
                self.expect_condition("while", &condition);
                Stmt::While {
                    condition,
                    body: Box::new(self.check_stmt(*body)),
                }
            }
            Stmt::Function(decl) => Stmt::Function(self.check_function(decl)),
            Stmt::Return { keyword, value } => self.check_return(keyword, value),
        }
    }

    fn check_function(&mut self, decl: Rc<FunctionDecl>) -> Rc<FunctionDecl<Type>> {
        // The parser hands over the sole reference to the declaration.
        let decl = match Rc::try_unwrap(decl) {
            Ok(decl) => decl,
            Err(_) => unreachable!("untyped declarations are never shared"),
        };

        // The function's binding is visible to its own body (recursion) and
        // to the rest of the current scope.
        self.define(
            decl.name,
            Symbol {
                ty: Type::Int,
                mutable: false,
                initialized: true,
            },
        );

        let enclosing_return = self.current_return.replace(Type::Int);
        self.begin_scope();
        for param in &decl.params {
            self.define(
                *param,
                Symbol {
                    ty: Type::Int,
                    mutable: false,
                    initialized: true,
                },
            );
        }
        let body = decl.body.into_iter().map(|s| self.check_stmt(s)).collect();
        self.end_scope();
        self.current_return = enclosing_return;

        Rc::new(FunctionDecl {
            name: decl.name,
            params: decl.params,
            body,
        })
    }

    fn check_return(&mut self, keyword: Span, value: Option<Expr>) -> Stmt<Type> {
        let Some(expected) = self.current_return else {
            self.errors.push(keyword.wrap(Error::TopLevelReturn));
            let value = value.map(|v| self.check_expr(v));
            return Stmt::Return { keyword, value };
        };
        let value = value.map(|v| {
            let value = self.check_expr(v);
            if value.ty != expected && !value.ty.is_error() {
                let error = Error::ReturnMismatch {
                    expected,
                    actual: value.ty,
                };
                self.errors.push(value.span.wrap(error));
            }
            value
        });
        Stmt::Return { keyword, value }
    }

    fn check_expr(&mut self, expr: Expr) -> Expr<Type> {
        let span = expr.span;
        let (kind, ty) = match expr.kind {
            ExprKind::Int(value) => (ExprKind::Int(value), Type::Int),
            ExprKind::Float(value) => (ExprKind::Float(value), Type::Float),
            ExprKind::Str(value) => (ExprKind::Str(value), Type::Str),
            ExprKind::Bool(value) => (ExprKind::Bool(value), Type::Bool),
            ExprKind::Variable(ident) => {
                let ty = match self.lookup(ident.name) {
                    Some(symbol) => symbol.ty,
                    None => {
                        let error = Error::Undefined { name: ident.name };
                        self.errors.push(ident.span.wrap(error));
                        Type::Error
                    }
                };
                (ExprKind::Variable(ident), ty)
            }
            ExprKind::Assign { target, value } => {
                let value = Box::new(self.check_expr(*value));
                let ty = self.check_assign(target, &value);
                (ExprKind::Assign { target, value }, ty)
            }
            ExprKind::Unary { op, right } => {
                let right = Box::new(self.check_expr(*right));
                let (expected, result) = match op {
                    UnaryOp::Neg => (Type::Int, Type::Int),
                    UnaryOp::Not => (Type::Bool, Type::Bool),
                };
                if right.ty != expected && !right.ty.is_error() {
                    let error = Error::UnaryOperand {
                        op,
                        expected,
                        actual: right.ty,
                    };
                    self.errors.push(right.span.wrap(error));
                }
                (ExprKind::Unary { op, right }, result)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = Box::new(self.check_expr(*lhs));
                let rhs = Box::new(self.check_expr(*rhs));
                let ty = self.check_binary(op, &lhs, &rhs);
                (ExprKind::Binary { op, lhs, rhs }, ty)
            }
            ExprKind::Call {
                callee,
                args,
                paren,
            } => {
                let callee = Box::new(self.check_expr(*callee));
                let args = args.into_iter().map(|a| self.check_expr(a)).collect();
                // Only a plain variable callee carries a symbol whose type
                // can be propagated as the call's result.
                let ty = match callee.kind {
                    ExprKind::Variable(_) => callee.ty,
                    _ => {
                        self.errors.push(paren.wrap(Error::ComplexCallee));
                        Type::Error
                    }
                };
                (
                    ExprKind::Call {
                        callee,
                        args,
                        paren,
                    },
                    ty,
                )
            }
        };
        Expr { kind, span, ty }
    }

    fn check_assign(&mut self, target: Ident, value: &Expr<Type>) -> Type {
        let Some(symbol) = self.lookup(target.name) else {
            let error = Error::AssignUndeclared { name: target.name };
            self.errors.push(target.span.wrap(error));
            return Type::Error;
        };
        if !symbol.mutable {
            let error = Error::AssignImmutable { name: target.name };
            self.errors.push(target.span.wrap(error));
        }
        if value.ty != symbol.ty && !value.ty.is_error() && !symbol.ty.is_error() {
            let error = Error::AssignMismatch {
                expected: symbol.ty,
                actual: value.ty,
            };
            self.errors.push(value.span.wrap(error));
        }
        symbol.ty
    }

    fn check_binary(&mut self, op: BinaryOp, lhs: &Expr<Type>, rhs: &Expr<Type>) -> Type {
        if op.is_equality() {
            if lhs.ty != rhs.ty && !lhs.ty.is_error() && !rhs.ty.is_error() {
                let error = Error::EqualityMismatch {
                    lhs: lhs.ty,
                    rhs: rhs.ty,
                };
                self.errors.push(lhs.span.to(rhs.span).wrap(error));
            }
            return Type::Bool;
        }

        // Arithmetic and ordering are integer-only.
        for side in [lhs, rhs] {
            if side.ty != Type::Int && !side.ty.is_error() {
                let error = Error::BinaryOperand {
                    op,
                    actual: side.ty,
                };
                self.errors.push(side.span.wrap(error));
            }
        }
        if op.is_comparison() {
            Type::Bool
        } else {
            Type::Int
        }
    }

    fn expect_condition(&mut self, keyword: &'static str, condition: &Expr<Type>) {
        if condition.ty != Type::Bool && !condition.ty.is_error() {
            let error = Error::Condition {
                keyword,
                actual: condition.ty,
            };
            self.errors.push(condition.span.wrap(error));
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn define(&mut self, ident: Ident, symbol: Symbol) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.insert(ident.name, symbol).is_some() {
            let error = Error::AlreadyDeclared { name: ident.name };
            self.errors.push(ident.span.wrap(error));
        }
    }

    fn lookup(&self, name: Name) -> Option<Symbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(&name))
            .copied()
    }
}

impl Default for Checker {
    fn default() -> Self {
        Checker::new()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    AlreadyDeclared { name: Name },
    Undefined { name: Name },
    AssignUndeclared { name: Name },
    AssignImmutable { name: Name },
    AssignMismatch { expected: Type, actual: Type },
    UnaryOperand { op: UnaryOp, expected: Type, actual: Type },
    BinaryOperand { op: BinaryOp, actual: Type },
    EqualityMismatch { lhs: Type, rhs: Type },
    Condition { keyword: &'static str, actual: Type },
    TopLevelReturn,
    ReturnMismatch { expected: Type, actual: Type },
    ComplexCallee,
}

#[cfg(test)]
mod tests {
    use crate::{
        ast::{ExprKind, Stmt},
        types::Type,
        util::test_utils::{check_errors, check_ok},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn accepts_a_valid_program() {
        let src = "
            fn add(a, b) {
                return a + b;
            }
            let mut x = 10;
            if (x > 5) {
                x = add(x, 1);
            }
        ";
        let _ = check_ok(src);
    }

    #[test]
    fn annotates_expression_types() {
        let program = check_ok("let x = 10; 1 < 2; \"s\"; 3.5; true;");
        let types: Vec<Type> = program
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Expr(e) => Some(e.ty),
                _ => None,
            })
            .collect();
        assert_eq!(types, vec![Type::Bool, Type::Str, Type::Float, Type::Bool]);
    }

    #[test]
    fn assignment_takes_the_binding_type() {
        let program = check_ok("let mut x = 1; x = 2;");
        let Stmt::Expr(assign) = &program.stmts[1] else {
            panic!("expected expression statement");
        };
        assert_eq!(assign.ty, Type::Int);
        assert!(matches!(assign.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn rejects_assignment_to_immutable_binding() {
        assert_eq!(
            check_errors("let x = 10; x = 20;"),
            vec!["cannot assign to immutable variable 'x'"],
        );
    }

    #[test]
    fn rejects_assignment_type_mismatch() {
        assert_eq!(
            check_errors("let mut x = 10; x = true;"),
            vec!["type mismatch in assignment: expected int, but got bool"],
        );
    }

    #[test]
    fn rejects_return_type_mismatch() {
        assert_eq!(
            check_errors("fn f() { return true; }"),
            vec!["return value type does not match function's return type: expected int, but got bool"],
        );
    }

    #[test]
    fn rejects_top_level_return() {
        assert_eq!(
            check_errors("return 10;"),
            vec!["cannot return from top-level code"],
        );
    }

    #[test]
    fn rejects_non_boolean_conditions() {
        assert_eq!(
            check_errors("if (1) { }"),
            vec!["if condition must be bool, but got int"],
        );
        assert_eq!(
            check_errors("let mut i = 0; while (i + 1) i = i + 1;"),
            vec!["while condition must be bool, but got int"],
        );
    }

    #[test]
    fn rejects_mixed_arithmetic() {
        assert_eq!(
            check_errors("1 + true;"),
            vec!["operand for '+' must be int, but got bool"],
        );
        assert_eq!(
            check_errors("\"a\" < 2;"),
            vec!["operand for '<' must be int, but got string"],
        );
    }

    #[test]
    fn rejects_mixed_equality() {
        assert_eq!(
            check_errors("1 == true;"),
            vec!["type mismatch in equality comparison: int vs bool"],
        );
    }

    #[test]
    fn rejects_unary_operand_mismatch() {
        assert_eq!(
            check_errors("-true;"),
            vec!["operand for unary '-' must be int, but got bool"],
        );
        assert_eq!(
            check_errors("!1;"),
            vec!["operand for unary '!' must be bool, but got int"],
        );
    }

    #[test]
    fn error_type_does_not_cascade() {
        // `y` is undefined: exactly one diagnostic, not one per use site.
        assert_eq!(
            check_errors("let x = y + 1;"),
            vec!["undefined variable 'y'"],
        );
    }

    #[test]
    fn function_calls_propagate_the_callee_type() {
        let program = check_ok("fn f() { return 1; } let x = f();");
        let Stmt::VarDecl {
            initializer: Some(call),
            ..
        } = &program.stmts[1]
        else {
            panic!("expected var-decl with initializer");
        };
        assert_eq!(call.ty, Type::Int);
    }

    #[test]
    fn rejects_complex_callees() {
        assert_eq!(
            check_errors("fn f() { return 1; } f()();"),
            vec!["cannot determine type of complex callee"],
        );
    }

    #[test]
    fn rejects_redeclaration_in_the_same_scope() {
        assert_eq!(
            check_errors("let a = 1; let a = 2;"),
            vec!["variable 'a' already declared in this scope"],
        );
    }
}
