use std::{iter::Peekable, ops::Range};

use crate::token::{Span, Token, TokenKind, KEYWORDS};

/// The Quill lexer.
///
/// ## Implementation Remarks
///
/// This type implements the [`Iterator`] trait to make the parser walk
/// through the tokens without allocating a collection to hold all of them at
/// once; use [`lex`] to scan eagerly into a buffer.
///
/// Since tokens of type [`TokenKind::Eof`] already serve as an indication of
/// termination (with the addition of having span information), the
/// [`Iterator`] implementation is infinite: instead of returning `None` when
/// the source stream is exhausted, tokens of type [`TokenKind::Eof`] will be
/// continuously returned.
///
/// Lexical failures never abort the scan; they are produced in-band as
/// [`TokenKind::Error`] tokens for the parser to report.
pub struct Lexer<'src> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    current_lo: usize,
    line: u32,
}

/// Scans the whole source into a token buffer, ending with exactly one
/// end-of-file token.
pub fn lex(src: &str, tokens: &mut Vec<Token>) {
    for token in Lexer::new(src) {
        let done = token.is_eof();
        tokens.push(token);
        if done {
            break;
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_trivia();
        self.current_lo = self.cursor;
        let line = self.line;
        let kind = self.scan_token_kind();
        Some(Token::new(kind, self.span(), line))
    }
}

impl Lexer<'_> {
    /// Scans the token starting at the current character.
    fn scan_token_kind(&mut self) -> TokenKind {
        use TokenKind::*;
        match self.advance() {
            '\0' => Eof,
            '(' => LParen,
            ')' => RParen,
            '{' => LBrace,
            '}' => RBrace,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semicolon,
            ',' => Comma,
            ':' => Colon,
            '.' => Dot,
            '^' => Caret,
            '+' => match self.peek() {
                '=' => self.advance_with(PlusAssign),
                _ => Plus,
            },
            '-' => match self.peek() {
                '>' => self.advance_with(Arrow),
                '=' => self.advance_with(MinusAssign),
                _ => Minus,
            },
            '*' => match self.peek() {
                '=' => self.advance_with(StarAssign),
                _ => Star,
            },
            // `//` comments are consumed by `skip_trivia`.
            '/' => match self.peek() {
                '=' => self.advance_with(SlashAssign),
                _ => Slash,
            },
            '=' => match self.peek() {
                '=' => self.advance_with(Eq),
                _ => Assign,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => Bang,
            },
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '&' => match self.peek() {
                '&' => self.advance_with(AndAnd),
                _ => Amp,
            },
            '|' => match self.peek() {
                '|' => self.advance_with(OrOr),
                _ => Pipe,
            },
            '"' => self.string(),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            _ => TokenKind::Error(self::Error::UnexpectedChar),
        }
    }

    fn string(&mut self) -> TokenKind {
        loop {
            match self.peek() {
                '\0' => return TokenKind::Error(self::Error::UnterminatedString),
                '"' => {
                    self.advance();
                    return TokenKind::Str;
                }
                c => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    self.advance();
                }
            }
        }
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        // A fraction is only consumed when a digit follows the dot, so that
        // `1.abs` style input leaves the dot for the next token.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
            return TokenKind::Float;
        }
        TokenKind::Int
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        while matches!(self.peek(), c if c.is_ascii_alphanumeric() || c == '_') {
            self.advance();
        }
        match KEYWORDS.get(self.substr()) {
            Some(&keyword) => keyword,
            None => TokenKind::Ident,
        }
    }

    /// Consumes whitespace and `//` line comments.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                c if c.is_ascii_whitespace() => {
                    self.advance();
                }
                '/' if self.peek_next() == '/' => {
                    while self.peek() != '\n' && self.peek() != '\0' {
                        self.advance();
                    }
                }
                _ => return,
            }
        }
    }
}

impl Lexer<'_> {
    pub fn new(src: &str) -> Lexer<'_> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            current_lo: 0,
            line: 1,
        }
    }

    /// Returns the next character and advances the iterator.
    fn advance(&mut self) -> char {
        self.iter
            .next()
            .inspect(|c| self.cursor += c.len_utf8())
            .unwrap_or('\0')
    }

    /// Advances and returns the provided value.
    fn advance_with<T>(&mut self, value: T) -> T {
        self.advance();
        value
    }

    /// Returns the next character without advancing the iterator.
    fn peek(&mut self) -> char {
        self.iter.peek().copied().unwrap_or('\0')
    }

    /// Returns the character after the next one without advancing.
    fn peek_next(&self) -> char {
        let mut rest = self.src[self.cursor..].chars();
        rest.next();
        rest.next().unwrap_or('\0')
    }

    /// Returns the current range.
    fn range(&self) -> Range<usize> {
        self.current_lo..self.cursor
    }

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.range())
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        &self.src[self.range()]
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar,
    UnterminatedString,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scan(src: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        lex(src, &mut tokens);
        tokens
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        scan(src).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_a_function_header() {
        use TokenKind::*;
        let src = "fn main() -> int { return 0 }";
        assert_eq!(
            kinds(src),
            vec![Fn, Ident, LParen, RParen, Arrow, TypeIdent, LBrace, Return, Int, RBrace, Eof],
        );

        let tokens = scan(src);
        assert_eq!(tokens[1].lexeme(src), "main");
        assert_eq!(tokens[5].lexeme(src), "int");
        assert_eq!(tokens[8].lexeme(src), "0");
    }

    #[test]
    fn scans_operators_with_lookahead() {
        use TokenKind::*;
        assert_eq!(
            kinds("= == ! != < <= > >= + += - -= * *= / /= -> && || & | ^"),
            vec![
                Assign, Eq, Bang, NotEq, Less, LessEq, Greater, GreaterEq, Plus, PlusAssign,
                Minus, MinusAssign, Star, StarAssign, Slash, SlashAssign, Arrow, AndAnd, OrOr,
                Amp, Pipe, Caret, Eof,
            ],
        );
    }

    #[test]
    fn scans_literals() {
        use TokenKind::*;
        let src = r#"12 3.14 "hello" true false 7."#;
        assert_eq!(
            kinds(src),
            vec![Int, Float, Str, True, False, Int, Dot, Eof],
        );

        let tokens = scan(src);
        assert_eq!(tokens[1].lexeme(src), "3.14");
        assert_eq!(tokens[2].lexeme(src), "\"hello\"");
    }

    #[test]
    fn skips_whitespace_and_comments_and_tracks_lines() {
        let src = "// a comment\nlet x = 1;\n// trailing\nx";
        let tokens = scan(src);
        let lines: Vec<u32> = tokens.iter().map(|t| t.line).collect();
        assert_eq!(lines, vec![2, 2, 2, 2, 2, 4, 4]);
    }

    #[test]
    fn unterminated_string_is_an_error_token() {
        use TokenKind::*;
        assert_eq!(
            kinds("\"oops"),
            vec![Error(super::Error::UnterminatedString), Eof],
        );
    }

    #[test]
    fn unexpected_character_is_an_error_token() {
        use TokenKind::*;
        assert_eq!(
            kinds("let @ = 1;"),
            vec![Let, Error(super::Error::UnexpectedChar), Assign, Int, Semicolon, Eof],
        );
    }

    #[test]
    fn ends_with_exactly_one_eof() {
        let tokens = scan("1 + 2");
        assert_eq!(tokens.iter().filter(|t| t.is_eof()).count(), 1);
        assert!(tokens.last().unwrap().is_eof());
    }

    #[test]
    fn iterator_keeps_yielding_eof() {
        let mut lexer = Lexer::new("");
        assert!(lexer.next().unwrap().is_eof());
        assert!(lexer.next().unwrap().is_eof());
    }

    #[test]
    fn keywords_are_exact_case() {
        use TokenKind::*;
        assert_eq!(kinds("while While WHILE"), vec![While, Ident, Ident, Eof]);
    }

    #[test]
    fn lexemes_cover_the_source() {
        let src = "fn add(a, b) { return a + b; }";
        let tokens = scan(src);
        let mut rebuilt = String::new();
        let mut cursor = 0;
        for token in &tokens {
            let span = token.span();
            rebuilt.push_str(&src[cursor..span.lo]);
            rebuilt.push_str(token.lexeme(src));
            cursor = span.range().end;
        }
        assert_eq!(rebuilt, src);
    }
}
