use std::collections::{HashMap, HashSet};

use crate::{
    ast::{BuiltinFn, Expr, ExprKind, Operator, Program},
    token::{Span, Spanned},
    types::{FunctionTable, Type},
};

/// Everything the semantic analysis learns about a program.
#[derive(Debug)]
pub struct Analysis<'ast> {
    pub functions: FunctionTable<'ast>,
    /// The inferred type of each top-level form, in source order.
    pub types: Vec<Type>,
    /// Every semantic error found, in discovery order.
    pub errors: Vec<Spanned<Error>>,
}

impl Analysis<'_> {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Analyzes the provided program with a fresh checker.
pub fn check(program: &Program) -> Analysis<'_> {
    Checker::with_capacity(16).check(program)
}

/// Maps variables in scope to their types.
type Env<'ast> = HashMap<&'ast str, Type>;

pub struct Checker<'ast> {
    functions: FunctionTable<'ast>,
    errors: Vec<Spanned<Error>>,
}

impl<'ast> Checker<'ast> {
    pub fn with_capacity(capacity: usize) -> Checker<'ast> {
        Checker {
            functions: FunctionTable::with_capacity(capacity),
            errors: Vec::with_capacity(8),
        }
    }

    /// Checks the whole program. Errors don't stop the analysis: each form
    /// is visited in full so that a single run reports everything it can.
    pub fn check(mut self, program: &'ast Program) -> Analysis<'ast> {
        self.build_function_table(program);

        let global = Env::new();
        let types = program
            .exprs
            .iter()
            .map(|expr| self.infer(expr, &global))
            .collect();

        Analysis {
            functions: self.functions,
            types,
            errors: self.errors,
        }
    }

    /// Records all top-level definitions in the function table. Each
    /// duplicated name is reported once, at its second definition.
    fn build_function_table(&mut self, program: &'ast Program) {
        let mut reported = HashSet::new();
        for defun in program.defuns() {
            let Err(previous) = self.functions.define(defun) else {
                continue;
            };
            if reported.insert(&*defun.name.name) {
                let error = Error::DuplicateFunction {
                    name: defun.name.name.clone(),
                    other_definition_span: previous.name.span,
                };
                self.error(defun.name.span.wrap(error));
            }
        }
    }

    fn infer(&mut self, expr: &'ast Expr, env: &Env<'ast>) -> Type {
        match &expr.kind {
            ExprKind::Number(_) => Type::Number,
            ExprKind::Nil => Type::List,
            ExprKind::Symbol(symbol) => {
                // Operators and reserved words used as values are opaque.
                let Some(name) = symbol.ident() else {
                    return Type::Any;
                };
                if let Some(ty) = env.get(name) {
                    *ty
                } else {
                    let error = Error::UndeclaredVariable(name.into());
                    self.error(expr.span.wrap(error));
                    Type::Any
                }
            }
            ExprKind::If {
                predicate,
                then_arm,
                else_arm,
            } => {
                self.infer(predicate, env);
                let then_ty = self.infer(then_arm, env);
                let else_ty = self.infer(else_arm, env);
                then_ty.join(else_ty)
            }
            ExprKind::Defun(defun) => {
                let local = defun
                    .params
                    .iter()
                    .map(|param| (&*param.name, Type::Any))
                    .collect();
                self.infer(&defun.body, &local);
                Type::Any
            }
            ExprKind::Application { operator, args } => {
                self.infer_application(expr.span, operator, args, env)
            }
        }
    }

    fn infer_application(
        &mut self,
        span: Span,
        operator: &'ast Expr,
        args: &'ast [Expr],
        env: &Env<'ast>,
    ) -> Type {
        let ExprKind::Symbol(symbol) = &operator.kind else {
            self.error(operator.span.wrap(Error::InvalidOperator));
            self.infer(operator, env);
            self.infer_all(args, env);
            return Type::Any;
        };

        // User-defined function call.
        if let Some(name) = symbol.ident() {
            let Some(defun) = self.functions.get(name) else {
                let error = Error::UndefinedFunction(name.into());
                self.error(operator.span.wrap(error));
                self.infer_all(args, env);
                return Type::Any;
            };
            if defun.params.len() != args.len() {
                let error = Error::ArityMismatch {
                    function: name.into(),
                    expected: defun.params.len(),
                    actual: args.len(),
                };
                self.error(span.wrap(error));
            }
            self.infer_all(args, env);
            return Type::Any;
        }

        let Some(op) = Operator::of(symbol.token) else {
            // A reserved word without call semantics, such as `nil` or `cond`,
            // is left for the runtime to resolve.
            self.infer_all(args, env);
            return Type::Any;
        };

        if args.len() != op.arity() {
            let error = Error::BuiltinArity {
                operator: symbol.lexeme.clone(),
                expected: op.arity(),
                actual: args.len(),
            };
            self.error(span.wrap(error));
        }

        let (expected_arg, result) = match op {
            Operator::Arithmetic(_) => (Some(Type::Number), Type::Number),
            Operator::Relational(_) => (None, Type::Any),
            Operator::Builtin(BuiltinFn::Cons) => (None, Type::List),
            Operator::Builtin(BuiltinFn::Car) => (Some(Type::List), Type::Any),
            Operator::Builtin(BuiltinFn::Cdr) => (Some(Type::List), Type::List),
            Operator::Builtin(BuiltinFn::Eq) => (None, Type::Any),
        };

        for (position, arg) in args.iter().enumerate() {
            let actual = self.infer(arg, env);
            let Some(expected) = expected_arg else {
                continue;
            };
            if !actual.is_compatible_with(expected) {
                let error = Error::BuiltinType {
                    operator: symbol.lexeme.clone(),
                    position: position + 1,
                    expected,
                    actual,
                };
                self.error(arg.span.wrap(error));
            }
        }

        result
    }

    fn infer_all(&mut self, exprs: &'ast [Expr], env: &Env<'ast>) {
        for expr in exprs {
            self.infer(expr, env);
        }
    }

    fn error(&mut self, error: Spanned<Error>) {
        self.errors.push(error);
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    DuplicateFunction {
        name: Box<str>,
        other_definition_span: Span,
    },
    UndeclaredVariable(Box<str>),
    ArityMismatch {
        function: Box<str>,
        expected: usize,
        actual: usize,
    },
    /// The head of an application is not something that can be applied.
    InvalidOperator,
    UndefinedFunction(Box<str>),
    BuiltinArity {
        operator: Box<str>,
        expected: usize,
        actual: usize,
    },
    BuiltinType {
        operator: Box<str>,
        /// 1-based argument position.
        position: usize,
        expected: Type,
        actual: Type,
    },
}
