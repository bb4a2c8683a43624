// program     ::= declaration*
// declaration ::= function | var_decl | statement
// function    ::= 'fn' IDENT '(' [IDENT (',' IDENT)*] ')' ['->' TYPE_IDENT] block
// var_decl    ::= 'let' ['mut'] IDENT [':' TYPE_IDENT] ['=' expr] ';'
// statement   ::= if | while | return | block | expr_stmt
// if          ::= 'if' '(' expr ')' statement ['else' statement]
// while       ::= 'while' '(' expr ')' statement
// return      ::= 'return' [expr] ';'
// block       ::= '{' declaration* '}'
// expr_stmt   ::= expr ';'
// expr        ::= assignment
// assignment  ::= equality ['=' assignment]
// equality    ::= comparison (('==' | '!=') comparison)*
// comparison  ::= term (('<' | '<=' | '>' | '>=') term)*
// term        ::= factor (('+' | '-') factor)*
// factor      ::= unary (('*' | '/') unary)*
// unary       ::= ('!' | '-') unary | call
// call        ::= primary ('(' [expr (',' expr)*] ')')*
// primary     ::= INT | FLOAT | STRING | 'true' | 'false' | IDENT | '(' expr ')'

use std::rc::Rc;

use crate::{token::Span, util::intern::Name};

/// A parsed program: the ordered list of top-level statements.
///
/// The type parameter `T` is the per-expression type annotation: `()` as
/// produced by the parser, [`crate::types::Type`] once the program has gone
/// through the type checker. The resolver, checker, evaluator, and emitter
/// are all traversals of this one shape.
#[derive(Debug, PartialEq, Default)]
pub struct Program<T = ()> {
    pub stmts: Vec<Stmt<T>>,
}

#[derive(Debug, PartialEq)]
pub enum Stmt<T = ()> {
    Expr(Expr<T>),
    VarDecl {
        name: Ident,
        mutable: bool,
        initializer: Option<Expr<T>>,
    },
    Block(Vec<Stmt<T>>),
    If {
        condition: Expr<T>,
        then_branch: Box<Stmt<T>>,
        else_branch: Option<Box<Stmt<T>>>,
    },
    While {
        condition: Expr<T>,
        body: Box<Stmt<T>>,
    },
    /// Reference-counted so a runtime callable can share the declaration
    /// with the tree instead of cloning the body.
    Function(Rc<FunctionDecl<T>>),
    Return {
        keyword: Span,
        value: Option<Expr<T>>,
    },
}

#[derive(Debug, PartialEq)]
pub struct FunctionDecl<T = ()> {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Vec<Stmt<T>>,
}

#[derive(Debug, PartialEq)]
pub struct Expr<T = ()> {
    pub kind: ExprKind<T>,
    pub span: Span,
    pub ty: T,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind<T = ()> {
    Assign {
        target: Ident,
        value: Box<Expr<T>>,
    },
    Unary {
        op: UnaryOp,
        right: Box<Expr<T>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr<T>>,
        rhs: Box<Expr<T>>,
    },
    Call {
        callee: Box<Expr<T>>,
        args: Vec<Expr<T>>,
        /// Span of the closing parenthesis, the anchor for call-site
        /// diagnostics.
        paren: Span,
    },
    Variable(Ident),
    Int(i64),
    Float(f64),
    Str(Box<str>),
    Bool(bool),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    /// Numeric negation, `-`.
    Neg,
    /// Logical negation of truthiness, `!`.
    Not,
}

impl UnaryOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Less,
    LessEq,
    Greater,
    GreaterEq,
}

impl BinaryOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Less => "<",
            BinaryOp::LessEq => "<=",
            BinaryOp::Greater => ">",
            BinaryOp::GreaterEq => ">=",
        }
    }

    /// Whether both operands must be integers (arithmetic and ordering);
    /// equality is the one family comparing operands of any single type.
    pub fn is_equality(self) -> bool {
        matches!(self, BinaryOp::Eq | BinaryOp::NotEq)
    }

    /// Whether the result is a boolean rather than a number.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::Eq
                | BinaryOp::NotEq
                | BinaryOp::Less
                | BinaryOp::LessEq
                | BinaryOp::Greater
                | BinaryOp::GreaterEq
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ident {
    pub name: Name,
    pub span: Span,
}
