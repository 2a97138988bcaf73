use std::io::Write;

use crate::ast::{Defun, Expr, ExprKind, Program};

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    for expr in &program.exprs {
        print_expr(w, 0, expr)?;
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    let span = expr.span;
    match &expr.kind {
        ExprKind::Number(value) => writeln!(w, "number {value} ({span})")?,
        ExprKind::Symbol(symbol) => {
            writeln!(w, "symbol {:?} {} ({span})", symbol.token, symbol.lexeme)?;
        }
        ExprKind::Nil => writeln!(w, "nil ({span})")?,
        ExprKind::If {
            predicate,
            then_arm,
            else_arm,
        } => {
            writeln!(w, "if ({span})")?;
            print_expr(w, i + 1, predicate)?;
            print_expr(w, i + 1, then_arm)?;
            print_expr(w, i + 1, else_arm)?;
        }
        ExprKind::Defun(Defun { name, params, body }) => {
            write!(w, "defun {}(", name.name)?;
            for (idx, param) in params.iter().enumerate() {
                if idx > 0 {
                    write!(w, ", ")?;
                }
                write!(w, "{}", param.name)?;
            }
            writeln!(w, ") ({span})")?;
            print_expr(w, i + 1, body)?;
        }
        ExprKind::Application { operator, args } => {
            writeln!(w, "application ({span})")?;
            print_expr(w, i + 1, operator)?;
            if !args.is_empty() {
                sp(w, i + 1)?;
                writeln!(w, "arguments")?;
                for arg in args {
                    print_expr(w, i + 2, arg)?;
                }
            }
        }
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
