use crate::{
    interpreter::RuntimeError,
    parser, resolver,
    token::Spanned,
    type_checker,
    util::intern::NameTable,
};

/// Everything a diagnostic needs beyond its own payload.
pub struct Context<'ident> {
    pub names: &'ident NameTable,
}

/// Analogous to [`std::fmt::Display`], but threaded with the program
/// context so diagnostics can resolve interned names.
pub trait Show {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result;

    /// Returns a type which can be displayed.
    fn display(&self, ctx: &Context<'_>) -> impl std::fmt::Display
    where
        Self: Sized,
    {
        Display(self, ctx)
    }
}

struct Display<'this, 'ctx, 'ident, T: Show>(pub &'this T, pub &'ctx Context<'ident>);

impl<T> std::fmt::Display for Display<'_, '_, '_, T>
where
    T: Show,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Display(this, ctx) = self;
        this.show(f, ctx)
    }
}

/// Renders a diagnostic list into plain messages, one per error.
pub fn format_errors<E>(names: &NameTable, errors: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: Show,
{
    let ctx = Context { names };
    errors
        .iter()
        .map(|error| format!("{}", error.display(&ctx)))
        .collect()
}

impl Show for Spanned<parser::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, _: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use parser::Error::*;
        match error {
            Unexpected { got, want } => {
                write!(f, "expected token {want:?}, but got {got:?}")
            }
            ExpectedExpression { got } => write!(f, "expected expression, but got {got:?}"),
            InvalidAssignmentTarget => write!(f, "invalid assignment target"),
            MalformedNumber => write!(f, "number literal out of range"),
            Lexer(crate::lexer::Error::UnexpectedChar) => write!(f, "unexpected character"),
            Lexer(crate::lexer::Error::UnterminatedString) => write!(f, "unterminated string"),
        }
    }
}

impl Show for Spanned<resolver::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use resolver::Error::*;
        match *error {
            AlreadyDeclared { name } => {
                let name = ctx.names.get(name);
                write!(f, "variable '{name}' already declared in this scope")
            }
            Undefined { name } => {
                let name = ctx.names.get(name);
                write!(f, "undefined variable '{name}'")
            }
            AssignUndeclared { name } => {
                let name = ctx.names.get(name);
                write!(f, "assignment to undeclared variable '{name}'")
            }
            OwnInitializer { name } => {
                let name = ctx.names.get(name);
                write!(f, "cannot read local variable '{name}' in its own initializer")
            }
        }
    }
}

impl Show for Spanned<type_checker::Error> {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        let Spanned { span, inner: error } = self;

        if f.alternate() {
            write!(f, "{span}: ")?;
        }

        use type_checker::Error::*;
        match *error {
            AlreadyDeclared { name } => {
                let name = ctx.names.get(name);
                write!(f, "variable '{name}' already declared in this scope")
            }
            Undefined { name } => {
                let name = ctx.names.get(name);
                write!(f, "undefined variable '{name}'")
            }
            AssignUndeclared { name } => {
                let name = ctx.names.get(name);
                write!(f, "assignment to undeclared variable '{name}'")
            }
            AssignImmutable { name } => {
                let name = ctx.names.get(name);
                write!(f, "cannot assign to immutable variable '{name}'")
            }
            AssignMismatch { expected, actual } => {
                write!(
                    f,
                    "type mismatch in assignment: expected {expected}, but got {actual}"
                )
            }
            UnaryOperand {
                op,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "operand for unary '{}' must be {expected}, but got {actual}",
                    op.lexeme()
                )
            }
            BinaryOperand { op, actual } => {
                write!(
                    f,
                    "operand for '{}' must be int, but got {actual}",
                    op.lexeme()
                )
            }
            EqualityMismatch { lhs, rhs } => {
                write!(f, "type mismatch in equality comparison: {lhs} vs {rhs}")
            }
            Condition { keyword, actual } => {
                write!(f, "{keyword} condition must be bool, but got {actual}")
            }
            TopLevelReturn => write!(f, "cannot return from top-level code"),
            ReturnMismatch { expected, actual } => {
                write!(
                    f,
                    "return value type does not match function's return type: \
                    expected {expected}, but got {actual}"
                )
            }
            ComplexCallee => write!(f, "cannot determine type of complex callee"),
        }
    }
}

// Runtime errors carry no span: evaluation failures are reported at the
// top level of a run, not anchored to a source region.
impl Show for RuntimeError {
    fn show(&self, f: &mut std::fmt::Formatter<'_>, ctx: &Context<'_>) -> std::fmt::Result {
        use RuntimeError::*;
        match *self {
            UndefinedVariable(name) => {
                let name = ctx.names.get(name);
                write!(f, "undefined variable '{name}'")
            }
            NotCallable => write!(f, "can only call functions"),
            Arity { expected, got } => {
                write!(f, "expected {expected} arguments but got {got}")
            }
            UnaryOperand => write!(f, "operand must be a number for unary minus"),
            NumericOperands(op) => {
                write!(f, "operands must be numbers for '{}'", op.lexeme())
            }
            DivisionByZero => write!(f, "division by zero"),
            Output => write!(f, "failed to write output"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Span;
    use pretty_assertions::assert_eq;

    #[test]
    fn alternate_format_prefixes_the_span() {
        let names = NameTable::with_capacity(4);
        let ctx = Context { names: &names };
        let error = Span::new_of_bounds(4..9).wrap(parser::Error::InvalidAssignmentTarget);

        assert_eq!(
            format!("{}", error.display(&ctx)),
            "invalid assignment target"
        );
        assert_eq!(
            format!("{:#}", error.display(&ctx)),
            "4..9: invalid assignment target"
        );
    }

    #[test]
    fn alternate_format_resolves_names_too() {
        let mut names = NameTable::with_capacity(4);
        let name = names.intern("count");
        let ctx = Context { names: &names };
        let error = Span::new_of_length(12, 5).wrap(resolver::Error::Undefined { name });

        assert_eq!(
            format!("{:#}", error.display(&ctx)),
            "12..17: undefined variable 'count'"
        );
    }
}
