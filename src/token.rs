use std::{fmt, ops::Range};

use crate::lexer;

#[derive(Copy, Clone)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Token {
    pub kind: TokenKind,
    pub line: u32,
    lo: usize,
    len: u32,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span, line: u32) -> Token {
        Token {
            kind,
            line,
            lo: span.lo,
            len: span.len,
        }
    }

    pub fn span(&self) -> Span {
        Span {
            lo: self.lo,
            len: self.len,
        }
    }

    /// Returns the exact source substring this token was scanned from.
    pub fn lexeme<'src>(&self, src: &'src str) -> &'src str {
        &src[self.span().range()]
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {}, line {})", self.kind, self.span(), self.line)
    }
}

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub lo: usize,
    pub len: u32,
}

impl Span {
    pub fn new_of_bounds(Range { start: lo, end: hi }: Range<usize>) -> Span {
        debug_assert!(hi >= lo);
        Self::new_of_length(lo, u32::try_from(hi - lo).unwrap())
    }

    pub fn new_of_length(lo: usize, len: u32) -> Span {
        Span { lo, len }
    }

    pub fn range(&self) -> Range<usize> {
        self.lo..self.lo + self.len as usize
    }

    /// Returns the smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        Span::new_of_bounds(self.lo..other.lo + other.len as usize)
    }

    /// Attaches an error value to this span.
    pub fn wrap<E>(self, inner: E) -> Spanned<E> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self})")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Range { start, end } = self.range();
        write!(f, "{start}..{end}")
    }
}

/// An error value anchored to the source region that produced it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Spanned<E> {
    pub span: Span,
    pub inner: E,
}

// This is not the most compact way of representing a token kind, but it
// suffices for this simple compiler implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TokenKind {
    Fn,
    Let,
    Mut,
    Return,
    If,
    Else,
    While,
    For,
    In,
    Record,
    Type,
    Protocol,
    Impl,
    Pub,
    Use,
    Module,
    Unsafe,
    Match,
    Try,
    Spawn,
    Await,
    Scope,
    Using,
    Const,
    Yield,

    True,
    False,

    Ident,
    /// One of the built-in type names: `int`, `bool`, `string`, `float`.
    TypeIdent,
    Int,
    Float,
    Str,

    Plus,
    Minus,
    Star,
    Slash,
    /// `=`
    Assign,
    /// `==`
    Eq,
    /// `!=`
    NotEq,
    Bang,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    /// `&&`
    AndAnd,
    /// `||`
    OrOr,
    Amp,
    Pipe,
    Caret,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    /// `->`
    Arrow,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semicolon,
    Comma,
    Colon,
    Dot,

    Eof,
    Error(lexer::Error),
}

pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "fn" => TokenKind::Fn,
    "let" => TokenKind::Let,
    "mut" => TokenKind::Mut,
    "return" => TokenKind::Return,
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "while" => TokenKind::While,
    "for" => TokenKind::For,
    "in" => TokenKind::In,
    "record" => TokenKind::Record,
    "type" => TokenKind::Type,
    "protocol" => TokenKind::Protocol,
    "impl" => TokenKind::Impl,
    "pub" => TokenKind::Pub,
    "use" => TokenKind::Use,
    "module" => TokenKind::Module,
    "unsafe" => TokenKind::Unsafe,
    "match" => TokenKind::Match,
    "try" => TokenKind::Try,
    "spawn" => TokenKind::Spawn,
    "await" => TokenKind::Await,
    "scope" => TokenKind::Scope,
    "using" => TokenKind::Using,
    "const" => TokenKind::Const,
    "yield" => TokenKind::Yield,
    "true" => TokenKind::True,
    "false" => TokenKind::False,
    "int" => TokenKind::TypeIdent,
    "bool" => TokenKind::TypeIdent,
    "string" => TokenKind::TypeIdent,
    "float" => TokenKind::TypeIdent,
};
