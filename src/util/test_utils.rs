use crate::{
    codegen::{ir, vm::Machine},
    parser,
    pipeline::{self, Compilation, Outcome},
    token::Spanned,
    type_checker,
    util::fmt::tree,
};

pub fn format_errors<E>(e: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: std::fmt::Display,
{
    e.iter().map(|e| format!("{e:#}")).collect()
}

/// How far down the pipeline a test runs.
pub enum Stage {
    /// Renders the syntax tree.
    Parser,
    /// Renders the type of each top-level form.
    Checker,
    /// Renders the IR listing.
    Codegen,
    /// Renders the value the IR evaluates to.
    Vm,
}

pub enum Assertion {
    OutputOk(&'static str),
    Output(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

#[track_caller]
pub fn run_pipeline(stage: Stage, src: &str) -> (String, Vec<String>) {
    let tokens_buf = &mut Vec::with_capacity(1024);

    match stage {
        Stage::Parser => {
            let parsed = parser::parse_program(src, tokens_buf);
            let mut errors = format_errors(&parsed.lexical_errors);
            match parsed.program {
                Ok(program) => (tree::print_program_string(&program), errors),
                Err(error) => {
                    errors.push(format!("{error:#}"));
                    (String::new(), errors)
                }
            }
        }
        Stage::Checker => {
            let parsed = parser::parse_program(src, tokens_buf);
            let mut errors = format_errors(&parsed.lexical_errors);
            let program = match parsed.program {
                Ok(program) => program,
                Err(error) => {
                    errors.push(format!("{error:#}"));
                    return (String::new(), errors);
                }
            };
            let analysis = type_checker::check(&program);
            let types: Vec<_> = analysis.types.iter().map(ToString::to_string).collect();
            errors.extend(format_errors(&analysis.errors));
            (types.join("\n"), errors)
        }
        Stage::Codegen => match pipeline::compile(src, &pipeline::Options::default()) {
            Ok(Compilation {
                lexical_errors,
                outcome,
            }) => {
                let mut errors = format_errors(&lexical_errors);
                match outcome {
                    Outcome::Success { code, .. } => (ir::listing(&code), errors),
                    Outcome::SemanticFailure { errors: semantic, .. } => {
                        errors.extend(format_errors(&semantic));
                        (String::new(), errors)
                    }
                }
            }
            Err(error) => (String::new(), vec![format!("{error:#}")]),
        },
        Stage::Vm => {
            let compilation = match pipeline::compile(src, &pipeline::Options::default()) {
                Ok(compilation) => compilation,
                Err(error) => return (String::new(), vec![format!("{error:#}")]),
            };
            let mut errors = format_errors(&compilation.lexical_errors);
            let code = match &compilation.outcome {
                Outcome::Success { code, .. } => code,
                Outcome::SemanticFailure { errors: semantic, .. } => {
                    errors.extend(format_errors(semantic));
                    return (String::new(), errors);
                }
            };
            match Machine::new(code).run() {
                Ok(value) => (value.to_string(), errors),
                Err(error) => {
                    errors.push(error.to_string());
                    (String::new(), errors)
                }
            }
        }
    }
}

#[track_caller]
pub fn run_assertion(assertion: Assertion, actual_output: &str, actual_errors: &[String]) {
    match assertion {
        Assertion::OutputOk(expected_output) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(actual_output.trim(), expected_output.trim());
        }
        Assertion::Output(expected_output) => {
            ::pretty_assertions::assert_eq!(actual_output.trim(), expected_output.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $stage:ident;

        $(
            fn $test_name:ident() {
                let program = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let stage = $crate::util::test_utils::tree_tests!(@@stage $stage);
                let (actual_output, actual_errors) =
                    crate::util::test_utils::run_pipeline(stage, $source);
                let ctx = (&actual_output, &actual_errors);
                $crate::util::test_utils::tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            $crate::util::test_utils::tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        $crate::util::test_utils::tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, output_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::OutputOk(::indoc::indoc! { $expected })
    };
    (@@assertion, output, $expected:expr) => {
        crate::util::test_utils::Assertion::Output(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@stage parser) => { crate::util::test_utils::Stage::Parser };
    (@@stage checker) => { crate::util::test_utils::Stage::Checker };
    (@@stage codegen) => { crate::util::test_utils::Stage::Codegen };
    (@@stage vm) => { crate::util::test_utils::Stage::Vm };
}
pub(crate) use tree_tests;
