use std::collections::HashMap;

use crate::{
    ast::{Expr, ExprKind, FunctionDecl, Program, Stmt},
    runtime,
    token::Spanned,
    util::intern::{Name, NameTable},
};

/// Verifies that every variable reference obeys lexical scoping before the
/// program reaches the type checker or the evaluator.
///
/// Scopes are pushed at program entry, at each block, and at each function
/// body. A `let` binding is visible to the rest of its scope only after its
/// initializer has been resolved, so `let a = a;` is caught instead of
/// silently binding to an outer `a`.
pub fn resolve(names: &mut NameTable, program: &Program) -> Result<(), Vec<Spanned<Error>>> {
    let mut resolver = Resolver {
        scopes: Vec::with_capacity(8),
        errors: Vec::new(),
    };

    resolver.begin_scope();
    for (native, _) in runtime::NATIVES {
        resolver.define(names.intern(native));
    }
    for stmt in &program.stmts {
        resolver.resolve_stmt(stmt);
    }
    resolver.end_scope();

    if resolver.errors.is_empty() {
        Ok(())
    } else {
        Err(resolver.errors)
    }
}

struct Resolver {
    /// Innermost scope last. The flag tracks whether the binding's
    /// initializer has finished resolving.
    scopes: Vec<HashMap<Name, bool>>,
    errors: Vec<Spanned<Error>>,
}

impl Resolver {
    fn resolve_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Expr(expr) => self.resolve_expr(expr),
            Stmt::VarDecl {
                name, initializer, ..
            } => {
                self.declare(*name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name.name);
            }
            Stmt::Block(stmts) => {
                self.begin_scope();
                for stmt in stmts {
                    self.resolve_stmt(stmt);
                }
                self.end_scope();
            }
            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_stmt(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_stmt(else_branch);
                }
            }
            Stmt::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_stmt(body);
            }
            Stmt::Function(decl) => self.resolve_function(decl),
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl) {
        self.declare(decl.name);
        self.define(decl.name.name);

        self.begin_scope();
        for param in &decl.params {
            self.declare(*param);
            self.define(param.name);
        }
        for stmt in &decl.body {
            self.resolve_stmt(stmt);
        }
        self.end_scope();
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match &expr.kind {
            ExprKind::Variable(ident) => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&ident.name) == Some(&false) {
                        let error = Error::OwnInitializer { name: ident.name };
                        self.errors.push(ident.span.wrap(error));
                        return;
                    }
                }
                if !self.is_declared(ident.name) {
                    let error = Error::Undefined { name: ident.name };
                    self.errors.push(ident.span.wrap(error));
                }
            }
            ExprKind::Assign { target, value } => {
                self.resolve_expr(value);
                if !self.is_declared(target.name) {
                    let error = Error::AssignUndeclared { name: target.name };
                    self.errors.push(target.span.wrap(error));
                }
            }
            ExprKind::Unary { right, .. } => self.resolve_expr(right),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.resolve_expr(lhs);
                self.resolve_expr(rhs);
            }
            ExprKind::Call { callee, args, .. } => {
                self.resolve_expr(callee);
                for arg in args {
                    self.resolve_expr(arg);
                }
            }
            ExprKind::Int(_) | ExprKind::Float(_) | ExprKind::Str(_) | ExprKind::Bool(_) => {}
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, ident: crate::ast::Ident) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.insert(ident.name, false).is_some() {
            let error = Error::AlreadyDeclared { name: ident.name };
            self.errors.push(ident.span.wrap(error));
        }
    }

    fn define(&mut self, name: Name) {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        scope.insert(name, true);
    }

    fn is_declared(&self, name: Name) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains_key(&name))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    AlreadyDeclared { name: Name },
    Undefined { name: Name },
    AssignUndeclared { name: Name },
    OwnInitializer { name: Name },
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::resolve_errors;
    use pretty_assertions::assert_eq;

    #[test]
    fn shadowing_in_a_nested_scope_is_allowed() {
        let src = "
            let a = 1;
            {
                let a = 2;
                a = 3;
            }
            a = 4;
        ";
        assert_eq!(resolve_errors(src), Vec::<String>::new());
    }

    #[test]
    fn rejects_redeclaration_in_the_same_scope() {
        assert_eq!(
            resolve_errors("{ let a = 1; let a = 2; }"),
            vec!["variable 'a' already declared in this scope"],
        );
    }

    #[test]
    fn rejects_undefined_variables() {
        assert_eq!(resolve_errors("let x = y;"), vec!["undefined variable 'y'"]);
    }

    #[test]
    fn rejects_assignment_to_undeclared_variable() {
        assert_eq!(
            resolve_errors("a = 10;"),
            vec!["assignment to undeclared variable 'a'"],
        );
    }

    #[test]
    fn rejects_reading_a_binding_in_its_own_initializer() {
        assert_eq!(
            resolve_errors("{ let a = 1; { let a = a; } }"),
            vec!["cannot read local variable 'a' in its own initializer"],
        );
    }

    #[test]
    fn function_names_and_params_are_in_scope() {
        let src = "
            fn add(a, b) {
                return a + b;
            }
            let r = add(1, 2);
        ";
        assert_eq!(resolve_errors(src), Vec::<String>::new());
    }

    #[test]
    fn params_do_not_leak_out_of_the_function() {
        assert_eq!(
            resolve_errors("fn f(a) { return a; } let x = a;"),
            vec!["undefined variable 'a'"],
        );
    }

    #[test]
    fn natives_are_preseeded() {
        assert_eq!(resolve_errors("println(1);"), Vec::<String>::new());
    }

    #[test]
    fn recursion_resolves() {
        assert_eq!(
            resolve_errors("fn loop_(n) { return loop_(n - 1); }"),
            Vec::<String>::new(),
        );
    }
}
