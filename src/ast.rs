// program ::= expr+
// expr ::= atom | list
// atom ::= NUMBER | ID | operator | reserved word
// list ::= '(' ')'
//        | '(' if expr expr [expr] ')'
//        | '(' defun ID '(' ID* ')' expr ')'
//        | '(' expr+ ')'

use crate::token::{Span, TokenKind};

#[derive(Debug, PartialEq, Default)]
pub struct Program {
    /// Non empty list of top-level forms.
    pub exprs: Vec<Expr>,
}

impl Program {
    /// Iterates over the top-level function definitions, in source order.
    pub fn defuns(&self) -> impl Iterator<Item = &Defun> {
        self.exprs.iter().filter_map(|expr| match &expr.kind {
            ExprKind::Defun(defun) => Some(defun),
            _ => None,
        })
    }
}

#[derive(Debug, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, PartialEq)]
pub enum ExprKind {
    Number(i64),
    Symbol(Symbol),
    /// `()`
    Nil,
    If {
        predicate: Box<Expr>,
        then_arm: Box<Expr>,
        /// Defaults to [`ExprKind::Nil`] when omitted in the source.
        else_arm: Box<Expr>,
    },
    Defun(Defun),
    Application {
        operator: Box<Expr>,
        args: Vec<Expr>,
    },
}

/// A bare token used as an atom. Keeps the token kind so that `+` used as a
/// value can be told apart from an identifier named `x`.
#[derive(Debug, PartialEq)]
pub struct Symbol {
    pub token: TokenKind,
    pub lexeme: Box<str>,
}

impl Symbol {
    /// Returns the name if this symbol is a plain identifier.
    pub fn ident(&self) -> Option<&str> {
        (self.token == TokenKind::Identifier).then_some(&*self.lexeme)
    }
}

#[derive(Debug, PartialEq)]
pub struct Defun {
    pub name: Ident,
    pub params: Vec<Ident>,
    pub body: Box<Expr>,
}

#[derive(Debug, PartialEq)]
pub struct Ident {
    pub name: Box<str>,
    pub span: Span,
}

/// What an operator symbol means when it heads an application. User
/// functions are not listed here: they are resolved through the function
/// table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Operator {
    Arithmetic(BinaryOperator),
    Relational(BinaryOperator),
    Builtin(BuiltinFn),
}

impl Operator {
    pub fn of(token: TokenKind) -> Option<Operator> {
        use BinaryOperator as B;
        let op = match token {
            TokenKind::Plus => Operator::Arithmetic(B::Add),
            TokenKind::Minus => Operator::Arithmetic(B::Sub),
            TokenKind::Star => Operator::Arithmetic(B::Mul),
            TokenKind::Slash => Operator::Arithmetic(B::Div),
            TokenKind::DivInt => Operator::Arithmetic(B::DivInt),
            TokenKind::Mod => Operator::Arithmetic(B::Mod),
            TokenKind::Exp => Operator::Arithmetic(B::Exp),
            TokenKind::Less => Operator::Relational(B::Lt),
            TokenKind::Greater => Operator::Relational(B::Gt),
            TokenKind::LessEq => Operator::Relational(B::Le),
            TokenKind::GreaterEq => Operator::Relational(B::Ge),
            TokenKind::Eq => Operator::Relational(B::Eq),
            TokenKind::NotEq => Operator::Relational(B::Ne),
            TokenKind::Cons => Operator::Builtin(BuiltinFn::Cons),
            TokenKind::Car => Operator::Builtin(BuiltinFn::Car),
            TokenKind::Cdr => Operator::Builtin(BuiltinFn::Cdr),
            TokenKind::EqFn => Operator::Builtin(BuiltinFn::Eq),
            _ => return None,
        };
        Some(op)
    }

    /// Number of arguments the operator must be applied to.
    pub fn arity(self) -> usize {
        match self {
            Operator::Arithmetic(_) | Operator::Relational(_) => 2,
            Operator::Builtin(builtin) => builtin.arity(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    Div,
    DivInt,
    Mod,
    Exp,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
}

impl BinaryOperator {
    /// The textual operator used in the IR.
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
            BinaryOperator::DivInt => "div",
            BinaryOperator::Mod => "mod",
            BinaryOperator::Exp => "exp",
            BinaryOperator::Lt => "<",
            BinaryOperator::Gt => ">",
            BinaryOperator::Le => "<=",
            BinaryOperator::Ge => ">=",
            BinaryOperator::Eq => "=",
            BinaryOperator::Ne => "!=",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BuiltinFn {
    Cons,
    Car,
    Cdr,
    Eq,
}

impl BuiltinFn {
    pub fn arity(self) -> usize {
        match self {
            BuiltinFn::Car | BuiltinFn::Cdr => 1,
            BuiltinFn::Cons | BuiltinFn::Eq => 2,
        }
    }

    /// Source-level name.
    pub fn name(self) -> &'static str {
        match self {
            BuiltinFn::Cons => "cons",
            BuiltinFn::Car => "car",
            BuiltinFn::Cdr => "cdr",
            BuiltinFn::Eq => "eq",
        }
    }

    /// Name used in the IR (`t = CONS(a, b)`).
    pub fn ir_name(self) -> &'static str {
        match self {
            BuiltinFn::Cons => "CONS",
            BuiltinFn::Car => "CAR",
            BuiltinFn::Cdr => "CDR",
            BuiltinFn::Eq => "EQ",
        }
    }
}
