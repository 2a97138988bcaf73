use std::{collections::HashMap, rc::Rc};

use thiserror::Error;

use crate::{
    ast::{Defun, Expr, ExprKind, Operator, Program},
    codegen::ir::{Annotation, Immediate, Instruction, Label, Operand, Temp},
    parser::DEFAULT_MAX_NESTING_DEPTH,
    type_checker::Analysis,
    types::FunctionTable,
};

pub const DEFAULT_MAX_INLINE_DEPTH: usize = 64;

type Result<T, E = LowerError> = std::result::Result<T, E>;

/// Lowers a checked program into IR with fresh counters.
pub fn generate<'ast>(
    program: &'ast Program,
    analysis: &Analysis<'ast>,
    max_inline_depth: usize,
) -> Result<Vec<Instruction>> {
    Generator::new(analysis)
        .with_max_inline_depth(max_inline_depth)
        .generate(program)
}

/// The temporary and label counters. Both are shared by every function block
/// and every inlined body of one lowering run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    pub temps: u32,
    pub labels: u32,
}

impl Counters {
    pub fn new_temp(&mut self) -> Temp {
        let temp = Temp(self.temps);
        self.temps += 1;
        temp
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label::Local(self.labels);
        self.labels += 1;
        label
    }
}

/// Maps the names in scope to where their values live.
type Env<'ast> = HashMap<&'ast str, Operand>;

pub struct Generator<'a, 'ast> {
    analysis: &'a Analysis<'ast>,
    functions: &'a FunctionTable<'ast>,
    counters: Counters,
    code: Vec<Instruction>,
    /// Functions whose bodies are currently being lowered, outermost first.
    inlining: Vec<&'ast str>,
    max_inline_depth: usize,
    /// Number of lists being lowered, counting those of inlined bodies.
    depth: usize,
    max_nesting_depth: usize,
}

impl<'a, 'ast> Generator<'a, 'ast> {
    pub fn new(analysis: &'a Analysis<'ast>) -> Generator<'a, 'ast> {
        Generator {
            analysis,
            functions: &analysis.functions,
            counters: Counters::default(),
            code: Vec::with_capacity(64),
            inlining: Vec::with_capacity(8),
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
            depth: 0,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    /// Starts numbering temporaries and labels from the given counters.
    pub fn with_counters(mut self, counters: Counters) -> Self {
        self.counters = counters;
        self
    }

    pub fn with_max_inline_depth(mut self, max_inline_depth: usize) -> Self {
        self.max_inline_depth = max_inline_depth;
        self
    }

    /// Limits how deeply lists may nest once inlined bodies are spliced into
    /// their call sites.
    pub fn with_max_nesting_depth(mut self, max_nesting_depth: usize) -> Self {
        self.max_nesting_depth = max_nesting_depth;
        self
    }

    /// Lowers every top-level form, in order.
    ///
    /// Refuses to run if the analysis reported any error.
    pub fn generate(mut self, program: &'ast Program) -> Result<Vec<Instruction>> {
        if !self.analysis.is_ok() {
            return Err(LowerError::UncheckedProgram(self.analysis.errors.len()));
        }
        let global = Env::new();
        for expr in &program.exprs {
            self.lower(expr, &global)?;
        }
        Ok(self.code)
    }

    /// Lowers the expression, returning where its value lives. Definitions
    /// produce no value.
    fn lower(&mut self, expr: &'ast Expr, env: &Env<'ast>) -> Result<Option<Operand>> {
        let value = match &expr.kind {
            ExprKind::Number(value) => self.assign(Immediate::Int(*value)),
            ExprKind::Nil => self.assign(Immediate::Nil),
            ExprKind::Symbol(symbol) => match symbol.ident() {
                Some(name) => match env.get(name) {
                    Some(value) => value.clone(),
                    None => return Err(LowerError::UnboundVariable(name.into())),
                },
                None => self.assign(Immediate::Name(Rc::from(&*symbol.lexeme))),
            },
            ExprKind::If {
                predicate,
                then_arm,
                else_arm,
            } => {
                self.open()?;
                let value = self.lower_if(predicate, then_arm, else_arm, env)?;
                self.close();
                value
            }
            ExprKind::Defun(defun) => {
                self.open()?;
                self.lower_defun(defun)?;
                self.close();
                return Ok(None);
            }
            ExprKind::Application { operator, args } => {
                self.open()?;
                let value = self.lower_application(operator, args, env)?;
                self.close();
                value
            }
        };
        Ok(Some(value))
    }

    /// Like [`Generator::lower`], but materializes a `NIL` when the
    /// expression has no value.
    fn lower_value(&mut self, expr: &'ast Expr, env: &Env<'ast>) -> Result<Operand> {
        match self.lower(expr, env)? {
            Some(value) => Ok(value),
            None => Ok(self.assign(Immediate::Nil)),
        }
    }

    fn lower_if(
        &mut self,
        predicate: &'ast Expr,
        then_arm: &'ast Expr,
        else_arm: &'ast Expr,
        env: &Env<'ast>,
    ) -> Result<Operand> {
        let cond = self.lower_value(predicate, env)?;

        let on_true = self.counters.new_label();
        let on_false = self.counters.new_label();
        let end = self.counters.new_label();
        let result = self.counters.new_temp();

        self.emit(Instruction::Branch {
            cond,
            target: on_true.clone(),
        });
        self.emit(Instruction::Jump(on_false.clone()));

        self.emit(Instruction::Label(on_true));
        let value = self.lower_value(then_arm, env)?;
        self.copy(result, value, None);
        self.emit(Instruction::Jump(end.clone()));

        self.emit(Instruction::Label(on_false));
        let value = self.lower_value(else_arm, env)?;
        self.copy(result, value, None);

        self.emit(Instruction::Label(end));
        Ok(Operand::Temp(result))
    }

    /// Emits the documentation block of a definition. Calls never jump here,
    /// they inline the body instead.
    fn lower_defun(&mut self, defun: &'ast Defun) -> Result<()> {
        let name: Rc<str> = Rc::from(&*defun.name.name);
        self.emit(Instruction::Annotation(Annotation::Function(name.clone())));
        self.emit(Instruction::Label(Label::Function(name)));

        let mut env = Env::with_capacity(defun.params.len());
        for param in &defun.params {
            let param_name: Rc<str> = Rc::from(&*param.name);
            self.emit(Instruction::Annotation(Annotation::Param(param_name.clone())));
            env.insert(&*param.name, Operand::Param(param_name));
        }

        self.enter(&defun.name.name)?;
        let value = self.lower(&defun.body, &env)?;
        self.leave();

        self.emit(Instruction::Return(value));
        Ok(())
    }

    fn lower_application(
        &mut self,
        operator: &'ast Expr,
        args: &'ast [Expr],
        env: &Env<'ast>,
    ) -> Result<Operand> {
        let ExprKind::Symbol(symbol) = &operator.kind else {
            return Err(LowerError::InvalidOperator);
        };

        if let Some(defun) = symbol.ident().and_then(|name| self.functions.get(name)) {
            return self.inline(defun, args, env);
        }

        let Some(op) = Operator::of(symbol.token) else {
            // Unknown functions and reserved words are left to the runtime.
            let args = self.lower_all(args, env)?;
            let dst = self.counters.new_temp();
            self.emit(Instruction::Call {
                dst,
                function: Rc::from(&*symbol.lexeme),
                args,
            });
            return Ok(Operand::Temp(dst));
        };
        let arity_mismatch = || LowerError::ArityMismatch {
            operator: symbol.lexeme.clone(),
            expected: op.arity(),
            actual: args.len(),
        };

        let dst = match op {
            Operator::Arithmetic(op) | Operator::Relational(op) => {
                let [lhs, rhs] = args else {
                    return Err(arity_mismatch());
                };
                let lhs = self.lower_value(lhs, env)?;
                let rhs = self.lower_value(rhs, env)?;
                let dst = self.counters.new_temp();
                self.emit(Instruction::Binary { dst, op, lhs, rhs });
                dst
            }
            Operator::Builtin(builtin) => {
                if args.len() != builtin.arity() {
                    return Err(arity_mismatch());
                }
                let args = self.lower_all(args, env)?;
                let dst = self.counters.new_temp();
                self.emit(Instruction::Builtin { dst, builtin, args });
                dst
            }
        };
        Ok(Operand::Temp(dst))
    }

    /// Splices the body of `defun` in place of a call. Parameters are bound
    /// straight to the argument values, without copies.
    fn inline(
        &mut self,
        defun: &'ast Defun,
        args: &'ast [Expr],
        env: &Env<'ast>,
    ) -> Result<Operand> {
        let name = &*defun.name.name;
        if defun.params.len() != args.len() {
            return Err(LowerError::ArityMismatch {
                operator: name.into(),
                expected: defun.params.len(),
                actual: args.len(),
            });
        }

        let mut local = Env::with_capacity(args.len());
        for (param, arg) in defun.params.iter().zip(args) {
            let value = self.lower_value(arg, env)?;
            local.insert(&*param.name, value);
        }

        self.enter(name)?;
        let value = self.lower_value(&defun.body, &local)?;
        self.leave();

        let dst = self.counters.new_temp();
        self.copy(dst, value, Some(Rc::from(name)));
        Ok(Operand::Temp(dst))
    }

    fn lower_all(&mut self, exprs: &'ast [Expr], env: &Env<'ast>) -> Result<Vec<Operand>> {
        exprs
            .iter()
            .map(|expr| self.lower_value(expr, env))
            .collect()
    }

    /// Pushes `function` onto the inlining stack, failing on cycles and on
    /// nesting deeper than the configured limit.
    fn enter(&mut self, function: &'ast str) -> Result<()> {
        if let Some(start) = self.inlining.iter().position(|&f| f == function) {
            let mut cycle = self.inlining[start..].to_vec();
            cycle.push(function);
            return Err(LowerError::RecursiveInline {
                function: function.into(),
                cycle: cycle.join(" -> "),
            });
        }
        if self.inlining.len() >= self.max_inline_depth {
            return Err(LowerError::InlineDepthExceeded {
                function: function.into(),
                limit: self.max_inline_depth,
            });
        }
        self.inlining.push(function);
        Ok(())
    }

    fn leave(&mut self) {
        self.inlining.pop();
    }

    fn open(&mut self) -> Result<()> {
        if self.depth >= self.max_nesting_depth {
            return Err(LowerError::NestingTooDeep {
                limit: self.max_nesting_depth,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.depth -= 1;
    }

    fn assign(&mut self, value: Immediate) -> Operand {
        let dst = self.counters.new_temp();
        self.emit(Instruction::Assign { dst, value });
        Operand::Temp(dst)
    }

    fn copy(&mut self, dst: Temp, src: Operand, result_of: Option<Rc<str>>) {
        self.emit(Instruction::Copy {
            dst,
            src,
            result_of,
        });
    }

    fn emit(&mut self, instruction: Instruction) {
        self.code.push(instruction);
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    #[error("refusing to generate code for a program with {0} semantic error(s)")]
    UncheckedProgram(usize),

    #[error("unbound variable '{0}'")]
    UnboundVariable(Box<str>),

    #[error("recursive definition of '{function}' can't be inlined ({cycle})")]
    RecursiveInline { function: Box<str>, cycle: String },

    #[error("inlining '{function}' exceeds the maximum depth of {limit}")]
    InlineDepthExceeded { function: Box<str>, limit: usize },

    #[error("expressions nested deeper than {limit} levels after inlining")]
    NestingTooDeep { limit: usize },

    #[error("invalid operator in application")]
    InvalidOperator,

    #[error("'{operator}' expects {expected} arguments, got {actual}")]
    ArityMismatch {
        operator: Box<str>,
        expected: usize,
        actual: usize,
    },
}
