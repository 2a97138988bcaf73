use std::fmt;

#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    span: Span,
}

impl Token {
    pub fn new(kind: TokenKind, span: Span) -> Token {
        Token { kind, span }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Returns the source text this token was lexed from.
    pub fn lexeme<'src>(&self, src: &'src str) -> &'src str {
        self.span.substr(src)
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({:?}, {})", self.kind, self.span())
    }
}

/// A byte range of the source plus the (1-based) line where it starts.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Span {
    pub lo: usize,
    pub len: u32,
    pub line: u32,
}

impl Span {
    pub fn new_of_bounds(lo: usize, hi: usize, line: u32) -> Span {
        debug_assert!(hi >= lo);
        let len = u32::try_from(hi - lo).expect("token longer than u32::MAX bytes");
        Span { lo, len, line }
    }

    pub fn new_of_length(lo: usize, len: u32, line: u32) -> Span {
        Span { lo, len, line }
    }

    pub fn hi(&self) -> usize {
        self.lo + self.len as usize
    }

    /// Returns a span that starts at `self` and ends at `other`. The line is
    /// the one of the first span.
    pub fn to(self, other: Span) -> Span {
        Span::new_of_bounds(self.lo, other.hi(), self.line)
    }

    pub fn substr(self, src: &str) -> &str {
        &src[self.lo..self.hi()]
    }

    pub fn wrap<T>(self, inner: T) -> Spanned<T> {
        Spanned { span: self, inner }
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Span({self}, line: {})", self.line)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lo = self.lo;
        let hi = self.hi();
        write!(f, "{lo}..{hi}")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Spanned<T> {
    pub span: Span,
    pub inner: T,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LParen,
    RParen,
    Quote,

    Number,
    Identifier,

    Plus,
    Minus,
    Star,
    Slash,
    Less,
    Greater,
    LessEq,
    GreaterEq,
    /// `=`
    Eq,
    /// `!=`
    NotEq,

    Defun,
    If,
    Cond,
    Car,
    Cdr,
    Cons,
    /// The `eq` builtin, not to be confused with the `=` operator.
    EqFn,
    Nil,
    T,
    /// `div`, integer (floor) division.
    DivInt,
    Mod,
    Exp,

    Eof,
}

impl TokenKind {
    /// Whether this token may appear on its own as a symbol atom.
    pub fn is_symbol(self) -> bool {
        !matches!(
            self,
            TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::Quote
                | TokenKind::Number
                | TokenKind::Eof
        )
    }
}

/// Reserved words. Lookup is exact, so matching is case-sensitive.
pub static KEYWORDS: phf::Map<&'static str, TokenKind> = phf::phf_map! {
    "defun" => TokenKind::Defun,
    "if" => TokenKind::If,
    "cond" => TokenKind::Cond,
    "car" => TokenKind::Car,
    "cdr" => TokenKind::Cdr,
    "cons" => TokenKind::Cons,
    "eq" => TokenKind::EqFn,
    "nil" => TokenKind::Nil,
    "t" => TokenKind::T,
    "div" => TokenKind::DivInt,
    "mod" => TokenKind::Mod,
    "exp" => TokenKind::Exp,
};
