use thiserror::Error;

use crate::{
    ast::Program,
    codegen::{
        ir::Instruction,
        lower::{Generator, LowerError, DEFAULT_MAX_INLINE_DEPTH},
    },
    lexer::{self, SUGGESTED_TOKENS_CAPACITY},
    parser::{self, Parsed, DEFAULT_MAX_NESTING_DEPTH},
    token::Spanned,
    type_checker,
};

/// Compile-time knobs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Options {
    /// How deeply calls may be nested while inlining.
    pub max_inline_depth: usize,
    /// How deeply lists may nest, both in the source and once inlined bodies
    /// are spliced into their call sites.
    pub max_nesting_depth: usize,
    /// Initial capacity of the token buffer.
    pub tokens_capacity: usize,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            max_inline_depth: DEFAULT_MAX_INLINE_DEPTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            tokens_capacity: SUGGESTED_TOKENS_CAPACITY,
        }
    }
}

/// A compilation unit that got past parsing.
#[derive(Debug)]
pub struct Compilation {
    pub lexical_errors: Vec<Spanned<lexer::Error>>,
    pub outcome: Outcome,
}

#[derive(Debug)]
pub enum Outcome {
    Success {
        program: Program,
        code: Vec<Instruction>,
    },
    /// The analysis found errors, so no code was generated.
    SemanticFailure {
        program: Program,
        errors: Vec<Spanned<type_checker::Error>>,
    },
}

impl Compilation {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success { .. })
    }

    pub fn program(&self) -> &Program {
        match &self.outcome {
            Outcome::Success { program, .. } | Outcome::SemanticFailure { program, .. } => program,
        }
    }

    pub fn code(&self) -> Option<&[Instruction]> {
        match &self.outcome {
            Outcome::Success { code, .. } => Some(code),
            Outcome::SemanticFailure { .. } => None,
        }
    }
}

#[derive(Error, Debug)]
pub enum CompileError {
    /// Parsing stopped at the first syntax error. Lexical errors found before
    /// are kept.
    #[error("{error:#}")]
    Syntax {
        error: Spanned<parser::Error>,
        lexical_errors: Vec<Spanned<lexer::Error>>,
    },

    #[error(transparent)]
    Lower(#[from] LowerError),
}

/// Runs every stage over `src`. Each call starts from a fresh function table
/// and fresh counters.
pub fn compile(src: &str, options: &Options) -> Result<Compilation, CompileError> {
    let mut tokens = Vec::with_capacity(options.tokens_capacity);
    let Parsed {
        program,
        lexical_errors,
    } = parser::parse_program_with_max_depth(src, &mut tokens, options.max_nesting_depth);
    let program = match program {
        Ok(program) => program,
        Err(error) => {
            return Err(CompileError::Syntax {
                error,
                lexical_errors,
            });
        }
    };

    let generated = {
        let analysis = type_checker::check(&program);
        if analysis.is_ok() {
            let code = Generator::new(&analysis)
                .with_max_inline_depth(options.max_inline_depth)
                .with_max_nesting_depth(options.max_nesting_depth)
                .generate(&program)?;
            Ok(code)
        } else {
            Err(analysis.errors)
        }
    };

    let outcome = match generated {
        Ok(code) => Outcome::Success { program, code },
        Err(errors) => Outcome::SemanticFailure { program, errors },
    };
    Ok(Compilation {
        lexical_errors,
        outcome,
    })
}
