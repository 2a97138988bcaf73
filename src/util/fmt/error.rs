#![allow(clippy::items_after_statements)]

use std::fmt;

use crate::{lexer, parser, token::Spanned, type_checker};

/// Writes the `line:lo..hi: ` prefix when the alternate flag is set.
fn position<T>(f: &mut fmt::Formatter<'_>, spanned: &Spanned<T>) -> fmt::Result {
    if f.alternate() {
        let Spanned { span, .. } = spanned;
        write!(f, "{}:{span}: ", span.line)?;
    }
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

impl fmt::Display for Spanned<lexer::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        position(f, self)?;
        match self.inner {
            lexer::Error::UnexpectedChar(c) => write!(f, "unexpected character {c:?}"),
        }
    }
}

impl fmt::Display for Spanned<parser::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        position(f, self)?;

        use parser::Error::*;
        match &self.inner {
            UnexpectedTokenInExpr { token } => {
                write!(f, "unexpected token {token:?} in expression")
            }
            Unexpected { actual, expected } => {
                write!(f, "expected token {expected:?}, but got {actual:?}")
            }
            EmptyProgram => write!(f, "empty program"),
            ParseInt => write!(f, "number out of bounds"),
            TooDeep { limit } => write!(f, "lists nested deeper than {limit} levels"),
        }
    }
}

impl fmt::Display for Spanned<type_checker::Error> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        position(f, self)?;

        use type_checker::Error::*;
        match &self.inner {
            DuplicateFunction {
                name,
                other_definition_span,
            } => write!(f, "function {name} already defined at {other_definition_span}"),
            UndeclaredVariable(name) => write!(f, "undeclared variable {name}"),
            ArityMismatch {
                function,
                expected,
                actual,
            } => write!(
                f,
                "function {function} expects {expected} argument{}, but got {actual}",
                plural(*expected),
            ),
            InvalidOperator => write!(f, "invalid operator in application"),
            UndefinedFunction(name) => write!(f, "undefined function {name}"),
            BuiltinArity {
                operator,
                expected,
                actual,
            } => write!(
                f,
                "operator {operator} expects {expected} argument{}, but got {actual}",
                plural(*expected),
            ),
            BuiltinType {
                operator,
                position,
                expected,
                actual,
            } => write!(
                f,
                "operator {operator} expects {expected} as argument {position}, but got {actual}"
            ),
        }
    }
}
