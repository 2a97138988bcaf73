use std::thread;

use lispc::{
    ast::{ExprKind, Symbol},
    codegen::{
        ir::{self, Instruction, Label, Operand},
        lower::LowerError,
        vm::{Machine, Value},
    },
    lexer::{self, extract},
    parser,
    pipeline::{compile, CompileError, Options, Outcome},
    token::TokenKind,
    type_checker::{self, Error},
    types::Type,
};
use pretty_assertions::assert_eq;

fn kinds(src: &str) -> Vec<TokenKind> {
    let (tokens, errors) = lexer::lex_in_new(src);
    assert!(errors.is_empty(), "{errors:?}");
    tokens.iter().map(|token| token.kind).collect()
}

fn semantic_errors(src: &str) -> Vec<Error> {
    let compilation = compile(src, &Options::default()).unwrap();
    match compilation.outcome {
        Outcome::SemanticFailure { errors, .. } => errors.into_iter().map(|e| e.inner).collect(),
        Outcome::Success { .. } => Vec::new(),
    }
}

fn listing(src: &str) -> String {
    let compilation = compile(src, &Options::default()).unwrap();
    ir::listing(compilation.code().expect("program has semantic errors"))
}

#[test]
fn numbers_lex_as_one_token() {
    for src in ["0", "7", "42", "1000", "9223372036854775807"] {
        let (tokens, errors) = lexer::lex_in_new(src);
        assert!(errors.is_empty());
        assert_eq!(tokens.len(), 2, "{src}");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(extract::int(tokens[0], src), src.parse());
    }
}

#[test]
fn longest_operator_wins() {
    assert_eq!(kinds("<="), [TokenKind::LessEq, TokenKind::Eof]);
    assert_eq!(kinds(">="), [TokenKind::GreaterEq, TokenKind::Eof]);
    assert_eq!(kinds("!="), [TokenKind::NotEq, TokenKind::Eof]);
    assert_eq!(kinds("< ="), [TokenKind::Less, TokenKind::Eq, TokenKind::Eof]);
}

#[test]
fn reserved_words_shadow_identifiers() {
    for src in ["defun", "(defun)", "x defun y", "(f defun)"] {
        let kinds = kinds(src);
        assert!(kinds.contains(&TokenKind::Defun), "{src}");
    }
    assert_eq!(kinds("defunx"), [TokenKind::Identifier, TokenKind::Eof]);
}

#[test]
fn defun_round_trip() {
    let compilation = compile("(defun f (x) (+ x 1))", &Options::default()).unwrap();
    let program = compilation.program();
    let [expr] = &program.exprs[..] else {
        panic!("expected one form");
    };
    let ExprKind::Defun(defun) = &expr.kind else {
        panic!("expected defun");
    };
    assert_eq!(&*defun.name.name, "f");
    assert_eq!(defun.params.len(), 1);
    assert_eq!(&*defun.params[0].name, "x");
    let ExprKind::Application { operator, args } = &defun.body.kind else {
        panic!("expected application");
    };
    assert!(matches!(
        &operator.kind,
        ExprKind::Symbol(Symbol { token: TokenKind::Plus, .. })
    ));
    assert!(matches!(&args[0].kind, ExprKind::Symbol(s) if s.ident() == Some("x")));
    assert_eq!(args[1].kind, ExprKind::Number(1));
}

#[test]
fn duplicate_function_reported_once_without_code() {
    let src = "(defun f (x) x) (defun f (y) y) (defun f () 3) (f 1)";
    let compilation = compile(src, &Options::default()).unwrap();
    assert!(!compilation.is_success());
    assert!(compilation.code().is_none());

    let duplicates: Vec<_> = semantic_errors(src)
        .into_iter()
        .filter(|e| matches!(e, Error::DuplicateFunction { .. }))
        .collect();
    assert_eq!(duplicates.len(), 1);
    assert!(matches!(&duplicates[0], Error::DuplicateFunction { name, .. } if &**name == "f"));
}

#[test]
fn arity_mismatch_names_the_function() {
    let errors = semantic_errors("(defun soma (x y) (+ x y)) (soma 1)");
    assert_eq!(
        errors,
        [Error::ArityMismatch {
            function: "soma".into(),
            expected: 2,
            actual: 1,
        }]
    );
}

#[test]
fn if_branch_types_are_unified() {
    let src = "(if (> 1 0) 5 6) (if (> 1 0) 5 nil)";
    let compilation = compile(src, &Options::default()).unwrap();
    let analysis = type_checker::check(compilation.program());
    assert_eq!(analysis.types, [Type::Number, Type::Any]);
}

#[test]
fn lowering_is_deterministic() {
    let src = "
        (defun sq (x) (* x x))
        (defun pick (c a b) (if c a b))
        (pick (< (sq 2) 5) (cons 1 ()) (sq 3))
    ";
    assert_eq!(listing(src), listing(src));
}

#[test]
fn independent_compilations_share_no_state() {
    let src = "(defun sq (x) (* x x)) (if (> (sq 3) 5) 1 2)";
    let expected = listing(src);
    let handles: Vec<_> = (0..4)
        .map(|_| thread::spawn(move || listing(src)))
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}

#[test]
fn if_lowering_shape() {
    let compilation = compile("(if (> 1 0) 1 2)", &Options::default()).unwrap();
    let code = compilation.code().unwrap();

    let Instruction::Binary { dst: cond, .. } = &code[2] else {
        panic!("condition is evaluated first");
    };
    let Instruction::Branch { cond: branch_cond, target: on_true } = &code[3] else {
        panic!("expected a conditional branch");
    };
    assert_eq!(branch_cond, &Operand::Temp(*cond));
    let Instruction::Jump(on_false) = &code[4] else {
        panic!("expected an unconditional branch");
    };
    assert_eq!(&code[5], &Instruction::Label(on_true.clone()));

    let result = match &code[7] {
        Instruction::Copy { dst, .. } => *dst,
        other => panic!("expected the then value to be stored, got {other}"),
    };
    let Instruction::Jump(end) = &code[8] else {
        panic!("expected a jump to the end");
    };
    assert_eq!(&code[9], &Instruction::Label(on_false.clone()));
    assert!(matches!(&code[11], Instruction::Copy { dst, .. } if *dst == result));
    assert_eq!(code.last(), Some(&Instruction::Label(end.clone())));
    assert!(matches!(end, Label::Local(_)));
}

#[test]
fn recursive_definitions_fail_to_lower() {
    for src in [
        "(defun f (n) (if (= n 0) 0 (f (- n 1))))",
        "(defun a (n) (b n)) (defun b (n) (a n))",
    ] {
        let error = compile(src, &Options::default()).unwrap_err();
        assert!(
            matches!(error, CompileError::Lower(LowerError::RecursiveInline { .. })),
            "{src}: {error}"
        );
    }
}

#[test]
fn inline_depth_is_configurable() {
    let src = "(defun a (x) x) (defun b (x) (a x)) (b 1)";
    let options = Options {
        max_inline_depth: 1,
        ..Options::default()
    };
    let error = compile(src, &options).unwrap_err();
    assert!(matches!(
        error,
        CompileError::Lower(LowerError::InlineDepthExceeded { limit: 1, .. })
    ));
    assert!(compile(src, &Options::default()).unwrap().is_success());
}

#[test]
fn reserved_word_operator_compiles_to_call() {
    assert!(semantic_errors("(t 1)").is_empty());
    assert_eq!(listing("(t 1)"), "t0 = 1\nt1 = CALL(t, t0)\n");
}

#[test]
fn deep_nesting_is_a_syntax_error() {
    let depth = 10_000;
    let src = format!("{}1{}", "(+ 1 ".repeat(depth), ")".repeat(depth));
    let error = compile(&src, &Options::default()).unwrap_err();
    let CompileError::Syntax { error, .. } = error else {
        panic!("expected a syntax error, got {error}");
    };
    assert_eq!(error.inner, parser::Error::TooDeep { limit: 128 });

    let options = Options {
        max_nesting_depth: depth + 1,
        ..Options::default()
    };
    let shallow = "(+ 1 (+ 1 (+ 1 1)))";
    assert!(compile(shallow, &options).unwrap().is_success());
}

#[test]
fn lexical_errors_do_not_stop_compilation() {
    let compilation = compile("(+ 1 # 2)", &Options::default()).unwrap();
    assert_eq!(compilation.lexical_errors.len(), 1);
    assert!(compilation.is_success());
}

#[test]
fn syntax_error_aborts() {
    let error = compile("(+ 1 @ (", &Options::default()).unwrap_err();
    let CompileError::Syntax {
        error,
        lexical_errors,
    } = error
    else {
        panic!("expected a syntax error");
    };
    assert_eq!(format!("{error:#}"), "1:8..8: unexpected token Eof in expression");
    assert_eq!(lexical_errors.len(), 1);
}

#[test]
fn demos_compile_and_run() {
    for (src, expected) in [
        (include_str!("../demos/squares.lisp"), Value::Int(25)),
        (include_str!("../demos/lists.lisp"), Value::Int(10)),
    ] {
        let compilation = compile(src, &Options::default()).unwrap();
        let code = compilation.code().unwrap();
        assert_eq!(Machine::new(code).run(), Ok(expected));
    }
    let big = compile(include_str!("../demos/big.lisp"), &Options::default()).unwrap();
    assert!(big.is_success());
}
