use std::{
    env,
    error::Error,
    fs,
    io::{self, Write},
};

use lispc::{
    codegen::{ir, vm::Machine},
    pipeline::{compile, CompileError, Compilation, Options, Outcome},
    util::fmt::tree,
};

fn main() {
    if let Err(error) = run() {
        println!("failed to run: {error}");
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let options = Options::default();

    if let Some(path) = env::args_os().nth(1) {
        let src = fs::read_to_string(path)?;
        report(&src, &options);
        return Ok(());
    }

    let mut input = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;

        input.clear();
        let n = io::stdin().read_line(&mut input)?;

        if n == 0 {
            println!("^D");
            return Ok(());
        }
        if input.trim().is_empty() {
            continue;
        }

        report(&input, &options);
    }
}

fn report(src: &str, options: &Options) {
    let Compilation {
        lexical_errors,
        outcome,
    } = match compile(src, options) {
        Ok(compilation) => compilation,
        Err(CompileError::Syntax {
            error,
            lexical_errors,
        }) => {
            for error in &lexical_errors {
                println!("lexical error: {error:#}");
            }
            println!("syntax error: {error:#}");
            return;
        }
        Err(error @ CompileError::Lower(_)) => {
            println!("code generation failed: {error}");
            return;
        }
    };

    for error in &lexical_errors {
        println!("lexical error: {error:#}");
    }

    match outcome {
        Outcome::Success { program, code } => {
            print!("{}", tree::print_program_string(&program));
            println!("---");
            print!("{}", ir::listing(&code));
            println!("---");
            match Machine::new(&code).run() {
                Ok(value) => println!("=> {value}"),
                Err(error) => println!("runtime error: {error}"),
            }
        }
        Outcome::SemanticFailure { program, errors } => {
            print!("{}", tree::print_program_string(&program));
            println!("---");
            for error in &errors {
                println!("semantic error: {error:#}");
            }
        }
    }
}
