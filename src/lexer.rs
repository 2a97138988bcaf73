use std::{iter::Peekable, num::ParseIntError};

use crate::token::{Span, Spanned, Token, TokenKind, KEYWORDS};

pub const SUGGESTED_TOKENS_CAPACITY: usize = 8_192;

/// Lexes the provided string, producing the tokens into the provided buffer.
///
/// The buffer always ends with a single [`TokenKind::Eof`] token. Unexpected
/// characters never stop the lexer: each one is reported in the returned list
/// and skipped.
pub fn lex(src: &str, tokens: &mut Vec<Token>) -> Vec<Spanned<Error>> {
    Lexer::new(src, tokens).lex()
}

/// A convenience function that allocates a new buffer per lexed input and
/// returns it.
pub fn lex_in_new(src: &str) -> (Vec<Token>, Vec<Spanned<Error>>) {
    let mut tokens = Vec::with_capacity(SUGGESTED_TOKENS_CAPACITY);
    let errors = lex(src, &mut tokens);
    (tokens, errors)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedChar(char),
}

struct Lexer<'src, 'tok> {
    src: &'src str,
    iter: Peekable<std::str::Chars<'src>>,
    cursor: usize,
    line: u32,
    current_lo: usize,
    current_line: u32,
    tokens: &'tok mut Vec<Token>,
    errors: Vec<Spanned<Error>>,
}

impl Lexer<'_, '_> {
    /// Scans the source string until the input is exhausted.
    fn lex(mut self) -> Vec<Spanned<Error>> {
        assert_eq!(self.tokens.len(), 0, "must pass clean tokens buffer");
        loop {
            let Some(next) = self.scan_token_kind() else {
                continue;
            };
            self.produce(next);
            if next == TokenKind::Eof {
                break;
            }
        }
        self.errors
    }

    /// Tries to scan the current character. Returns `None` for input that
    /// doesn't produce a token (trivia and unexpected characters).
    fn scan_token_kind(&mut self) -> Option<TokenKind> {
        use TokenKind::*;
        let kind = match self.mark_advance() {
            '\0' if self.cursor == self.current_lo => Eof,
            '(' => LParen,
            ')' => RParen,
            '\'' => Quote,
            '+' => Plus,
            '-' => Minus,
            '*' => Star,
            '/' => Slash,
            '=' => Eq,
            // Two-character operators must win over their one-character
            // prefixes.
            '<' => match self.peek() {
                '=' => self.advance_with(LessEq),
                _ => Less,
            },
            '>' => match self.peek() {
                '=' => self.advance_with(GreaterEq),
                _ => Greater,
            },
            '!' => match self.peek() {
                '=' => self.advance_with(NotEq),
                _ => return self.unexpected('!'),
            },
            ';' => return self.comment(),
            ' ' | '\t' | '\r' | '\n' => return self.whitespace(),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(),
            '0' => Number,
            c if c.is_ascii_digit() => self.number(),
            c => return self.unexpected(c),
        };
        Some(kind)
    }

    fn identifier_or_keyword(&mut self) -> TokenKind {
        let valid_identifier_suffix = |c: char| c.is_ascii_alphanumeric() || c == '_';

        while valid_identifier_suffix(self.peek()) {
            self.advance();
        }
        KEYWORDS
            .get(self.substr())
            .copied()
            .unwrap_or(TokenKind::Identifier)
    }

    fn number(&mut self) -> TokenKind {
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        TokenKind::Number
    }

    fn whitespace(&mut self) -> Option<TokenKind> {
        while matches!(self.peek(), ' ' | '\t' | '\r' | '\n') {
            self.advance();
        }
        None
    }

    fn comment(&mut self) -> Option<TokenKind> {
        while self.iter.peek().is_some_and(|&c| c != '\n') {
            self.advance();
        }
        None
    }

    fn unexpected(&mut self, c: char) -> Option<TokenKind> {
        let span = Span::new_of_bounds(self.current_lo, self.cursor, self.current_line);
        self.errors.push(span.wrap(Error::UnexpectedChar(c)));
        None
    }
}

impl Lexer<'_, '_> {
    /// Constructs a new lexer with the default state.
    fn new<'src, 'tok>(src: &'src str, tokens: &'tok mut Vec<Token>) -> Lexer<'src, 'tok> {
        Lexer {
            src,
            iter: src.chars().peekable(),
            cursor: 0,
            line: 1,
            current_lo: 0,
            current_line: 1,
            tokens,
            errors: Vec::new(),
        }
    }

    /// Starts a new token "mark" and advances the iterator.
    fn mark_advance(&mut self) -> char {
        self.current_lo = self.cursor;
        self.current_line = self.line;
        self.advance()
    }

    /// Returns the next character and advances the iterator. Line breaks
    /// bump the line counter.
    fn advance(&mut self) -> char {
        let c = self.iter.next();
        if let Some(c) = c {
            self.cursor += c.len_utf8();
            if c == '\n' {
                self.line += 1;
            }
        }
        c.unwrap_or('\0')
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

    /// Returns the current span.
    fn span(&self) -> Span {
        Span::new_of_bounds(self.current_lo, self.cursor, self.current_line)
    }

    /// Returns the substring of the current marked bounds.
    fn substr(&self) -> &str {
        self.span().substr(self.src)
    }

    /// Produces a token using the marked bounds.
    fn produce(&mut self, kind: TokenKind) {
        self.tokens.push(Token::new(kind, self.span()));
    }
}

pub mod extract {
    use super::*;

    pub fn int(token: Token, src: &str) -> Result<i64, ParseIntError> {
        debug_assert_eq!(token.kind, TokenKind::Number);
        token.lexeme(src).parse()
    }

    pub fn ident(token: Token, src: &str) -> Box<str> {
        debug_assert_eq!(token.kind, TokenKind::Identifier);
        token.lexeme(src).into()
    }

    pub fn symbol(token: Token, src: &str) -> Box<str> {
        debug_assert!(token.kind.is_symbol());
        token.lexeme(src).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn tests_with_span() {
        use TokenKind::*;
        let cases = cases!(match .. {
            "(+ 1 2)" => [
                (LParen, 0..1, 1),
                (Plus, 1..2, 1),
                (Number, 3..4, 1),
                (Number, 5..6, 1),
                (RParen, 6..7, 1),
                (Eof, 7..7, 1),
            ],
            "< <= > >= = !=" => [
                (Less, 0..1, 1),
                (LessEq, 2..4, 1),
                (Greater, 5..6, 1),
                (GreaterEq, 7..9, 1),
                (Eq, 10..11, 1),
                (NotEq, 12..14, 1),
                (Eof, 14..14, 1),
            ],
            "<=<>=>" => [
                (LessEq, 0..2, 1),
                (Less, 2..3, 1),
                (GreaterEq, 3..5, 1),
                (Greater, 5..6, 1),
                (Eof, 6..6, 1),
            ],
            "0 7 42 01 1234567890" => [
                (Number, 0..1, 1),
                (Number, 2..3, 1),
                (Number, 4..6, 1),
                (Number, 7..8, 1),
                (Number, 8..9, 1),
                (Number, 10..20, 1),
                (Eof, 20..20, 1),
            ],
            "defun if cond car cdr cons eq nil t div mod exp" => [
                (Defun, 0..5, 1),
                (If, 6..8, 1),
                (Cond, 9..13, 1),
                (Car, 14..17, 1),
                (Cdr, 18..21, 1),
                (Cons, 22..26, 1),
                (EqFn, 27..29, 1),
                (Nil, 30..33, 1),
                (T, 34..35, 1),
                (DivInt, 36..39, 1),
                (Mod, 40..43, 1),
                (Exp, 44..47, 1),
                (Eof, 47..47, 1),
            ],
            "Defun DEFUN defunx _defun x1 f_g" => [
                (Identifier, 0..5, 1),
                (Identifier, 6..11, 1),
                (Identifier, 12..18, 1),
                (Identifier, 19..25, 1),
                (Identifier, 26..28, 1),
                (Identifier, 29..32, 1),
                (Eof, 32..32, 1),
            ],
            "(defun f (x)\n  ; a comment (+ 1 2)\n  x)" => [
                (LParen, 0..1, 1),
                (Defun, 1..6, 1),
                (Identifier, 7..8, 1),
                (LParen, 9..10, 1),
                (Identifier, 10..11, 1),
                (RParen, 11..12, 1),
                (Identifier, 37..38, 3),
                (RParen, 38..39, 3),
                (Eof, 39..39, 3),
            ],
            "'x\r\n\t*/-" => [
                (Quote, 0..1, 1),
                (Identifier, 1..2, 1),
                (Star, 5..6, 2),
                (Slash, 6..7, 2),
                (Minus, 7..8, 2),
                (Eof, 8..8, 2),
            ],
            "; only a comment" => [(Eof, 16..16, 1)],
            "" => [(Eof, 0..0, 1)],
        });

        for (input, tokens) in cases {
            let (lexed, errors) = lex_in_new(input);
            assert!(errors.is_empty());
            assert_eq!(lexed, tokens.as_slice());
        }
    }

    #[test]
    fn unexpected_chars_are_reported_and_skipped() {
        use TokenKind::*;
        let (tokens, errors) = lex_in_new("(+ 1 # 2)\n(! @x)");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [LParen, Plus, Number, Number, RParen, LParen, Identifier, RParen, Eof]
        );
        assert_eq!(
            errors,
            [
                Span::new_of_bounds(5, 6, 1).wrap(Error::UnexpectedChar('#')),
                Span::new_of_bounds(11, 12, 2).wrap(Error::UnexpectedChar('!')),
                Span::new_of_bounds(13, 14, 2).wrap(Error::UnexpectedChar('@')),
            ]
        );
    }

    #[test]
    fn comment_runs_to_the_end_of_the_line() {
        use TokenKind::*;
        let (tokens, errors) = lex_in_new("; comment \0 (defun\n1");
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(kinds, [Number, Eof]);
        assert!(errors.is_empty());
    }

    #[test]
    fn numbers_without_leading_zero_are_one_token() {
        for n in [0_i64, 1, 9, 10, 305, 9_000_000_000] {
            let src = n.to_string();
            let (tokens, errors) = lex_in_new(&src);
            assert!(errors.is_empty());
            assert_eq!(tokens.len(), 2);
            assert_eq!(tokens[0].kind, TokenKind::Number);
            assert_eq!(extract::int(tokens[0], &src), Ok(n));
        }
    }

    #[test]
    fn reserved_word_is_never_an_identifier() {
        for src in ["defun", "(defun)", "x defun y", "(f defun)"] {
            let (tokens, _) = lex_in_new(src);
            let defun = tokens.iter().find(|t| t.lexeme(src) == "defun").unwrap();
            assert_eq!(defun.kind, TokenKind::Defun);
        }
    }

    macro_rules! cases {
        (match .. {
            $($str:expr => [$(($kind:expr, $range:expr, $line:expr)),* $(,)?]),* $(,)?
        }) => {{
            &[$((
                $str,
                vec![
                    $(Token::new($kind, Span::new_of_bounds($range.start, $range.end, $line))),*
                ],
            )),*]
        }};
    }
    use cases;
}
