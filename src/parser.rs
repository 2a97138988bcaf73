use crate::{
    ast::{Defun, Expr, ExprKind, Ident, Program, Symbol},
    lexer::{self, extract},
    token::{Span, Spanned, Token, TokenKind},
};

type Result<T, E = Spanned<Error>> = std::result::Result<T, E>;

/// The result of parsing a program: the syntax tree, or the first syntax
/// error found. Lexical errors never stop parsing and are always returned.
pub struct Parsed {
    pub program: Result<Program>,
    pub lexical_errors: Vec<Spanned<lexer::Error>>,
}

/// How deeply lists may nest by default.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 128;

pub fn parse_program(src: &str, tokens: &mut Vec<Token>) -> Parsed {
    parse_program_with_max_depth(src, tokens, DEFAULT_MAX_NESTING_DEPTH)
}

/// Parses a program, failing with [`Error::TooDeep`] on lists nested deeper
/// than `max_depth`.
pub fn parse_program_with_max_depth(
    src: &str,
    tokens: &mut Vec<Token>,
    max_depth: usize,
) -> Parsed {
    assert!(tokens.is_empty());

    let lexical_errors = lexer::lex(src, tokens);
    let mut p = Parser::new(src, tokens, max_depth);
    Parsed {
        program: p.parse_program(),
        lexical_errors,
    }
}

struct Parser<'src, 'tok> {
    src: &'src str,
    tokens: &'tok [Token],
    cursor: usize,
    /// Number of lists currently open.
    depth: usize,
    max_depth: usize,
}

impl Parser<'_, '_> {
    fn parse_program(&mut self) -> Result<Program> {
        let mut exprs = Vec::with_capacity(8);
        while !self.is(TokenKind::Eof) {
            exprs.push(self.parse_expr()?);
        }
        if exprs.is_empty() {
            let eof = self.peek();
            return Err(eof.span().wrap(Error::EmptyProgram));
        }
        Ok(Program { exprs })
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        let token = self.advance();
        let kind = match token.kind {
            TokenKind::LParen => return self.parse_list(token),
            TokenKind::Number => match extract::int(token, self.src) {
                Ok(value) => ExprKind::Number(value),
                Err(_) => return Err(token.span().wrap(Error::ParseInt)),
            },
            kind if kind.is_symbol() => ExprKind::Symbol(Symbol {
                token: kind,
                lexeme: extract::symbol(token, self.src),
            }),
            other => {
                let error = Error::UnexpectedTokenInExpr { token: other };
                return Err(token.span().wrap(error));
            }
        };
        Ok(Expr {
            kind,
            span: token.span(),
        })
    }

    /// Parses everything after an opening parenthesis.
    fn parse_list(&mut self, open: Token) -> Result<Expr> {
        if self.depth >= self.max_depth {
            let error = Error::TooDeep {
                limit: self.max_depth,
            };
            return Err(open.span().wrap(error));
        }
        self.depth += 1;
        let list = self.parse_list_contents(open);
        self.depth -= 1;
        list
    }

    fn parse_list_contents(&mut self, open: Token) -> Result<Expr> {
        let kind = match self.peek().kind {
            // Empty list: ()
            TokenKind::RParen => ExprKind::Nil,

            // Conditional: (if expr expr [expr])
            TokenKind::If => {
                self.advance();
                let predicate = self.parse_expr()?;
                let then_arm = self.parse_expr()?;
                let else_arm = if self.is(TokenKind::RParen) {
                    let span = self.peek().span();
                    Expr {
                        kind: ExprKind::Nil,
                        span: Span::new_of_length(span.lo, 0, span.line),
                    }
                } else {
                    self.parse_expr()?
                };
                ExprKind::If {
                    predicate: Box::new(predicate),
                    then_arm: Box::new(then_arm),
                    else_arm: Box::new(else_arm),
                }
            }

            // Definition: (defun ID (ID*) expr)
            TokenKind::Defun => {
                self.advance();
                let name = self.parse_ident()?;
                self.consume(TokenKind::LParen)?;
                let mut params = Vec::new();
                while !self.at_list_end() {
                    params.push(self.parse_ident()?);
                }
                self.consume(TokenKind::RParen)?;
                let body = self.parse_expr()?;
                ExprKind::Defun(Defun {
                    name,
                    params,
                    body: Box::new(body),
                })
            }

            // Application: (expr expr*)
            _ => {
                let operator = self.parse_expr()?;
                let mut args = Vec::new();
                while !self.at_list_end() {
                    args.push(self.parse_expr()?);
                }
                ExprKind::Application {
                    operator: Box::new(operator),
                    args,
                }
            }
        };
        let close = self.consume(TokenKind::RParen)?;
        Ok(Expr {
            kind,
            span: open.span().to(close.span()),
        })
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        let token = self.consume(TokenKind::Identifier)?;
        Ok(Ident {
            name: extract::ident(token, self.src),
            span: token.span(),
        })
    }
}

impl Parser<'_, '_> {
    fn new<'src, 'tok>(
        src: &'src str,
        tokens: &'tok [Token],
        max_depth: usize,
    ) -> Parser<'src, 'tok> {
        debug_assert!(tokens.last().is_some_and(Token::is_eof));
        Parser {
            src,
            tokens,
            cursor: 0,
            depth: 0,
            max_depth,
        }
    }

    /// Returns the current token.
    fn peek(&self) -> Token {
        // The lexer always terminates the buffer with an Eof token, which is
        // never advanced past.
        self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    /// Returns the current token and advances, unless it is the Eof.
    fn advance(&mut self) -> Token {
        let c = self.peek();
        if !c.is_eof() {
            self.cursor += 1;
        }
        c
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Whether the current token closes a list. Also true at the end of the
    /// input, so that the missing parenthesis is the reported error.
    fn at_list_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::RParen | TokenKind::Eof)
    }

    /// Advances if the current token matches the provided one. If not,
    /// fails with a syntax error.
    fn consume(&mut self, expect: TokenKind) -> Result<Token> {
        let c = self.peek();
        if self.is(expect) {
            self.advance();
            Ok(c)
        } else {
            Err(c.span().wrap(Error::Unexpected {
                actual: c.kind,
                expected: expect,
            }))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    UnexpectedTokenInExpr {
        token: TokenKind,
    },
    Unexpected {
        actual: TokenKind,
        expected: TokenKind,
    },
    EmptyProgram,
    ParseInt,
    TooDeep {
        limit: usize,
    },
}

#[cfg(test)]
pub(crate) mod test_utils {
    use super::*;

    pub fn parse_program(src: &str) -> Program {
        super::parse_program(src, &mut Vec::with_capacity(512))
            .program
            .expect("failed to parse")
    }
}
