use std::{fmt, rc::Rc};

use crate::ast::{BinaryOperator, BuiltinFn};

/// A generated temporary, rendered as `t<N>`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Temp(pub u32);

/// A branch target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    /// A generated label, rendered as `L<N>`.
    Local(u32),
    /// The entry of a function block, rendered as `func_<name>`.
    Function(Rc<str>),
}

/// Where a value lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    Temp(Temp),
    /// A function parameter, only referenced inside its function block.
    Param(Rc<str>),
}

/// The right-hand side of an immediate assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Immediate {
    Int(i64),
    Nil,
    /// An opaque value referred to by name, such as an operator atom.
    Name(Rc<str>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// `dst = 42`, `dst = NIL` or `dst = name`
    Assign { dst: Temp, value: Immediate },
    /// `dst = src`, optionally annotated with the inlined function whose
    /// result is being copied.
    Copy {
        dst: Temp,
        src: Operand,
        result_of: Option<Rc<str>>,
    },
    /// `dst = lhs <op> rhs`
    Binary {
        dst: Temp,
        op: BinaryOperator,
        lhs: Operand,
        rhs: Operand,
    },
    /// `dst = CONS(a, b)`
    Builtin {
        dst: Temp,
        builtin: BuiltinFn,
        args: Vec<Operand>,
    },
    /// `dst = CALL(name, args...)`, for calls that couldn't be resolved.
    Call {
        dst: Temp,
        function: Rc<str>,
        args: Vec<Operand>,
    },
    /// `L0:`
    Label(Label),
    /// `if cond goto L0`
    Branch { cond: Operand, target: Label },
    /// `goto L0`
    Jump(Label),
    /// `return value` or `return NIL`
    Return(Option<Operand>),
    /// A non-executable line.
    Annotation(Annotation),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Annotation {
    /// `# function f`
    Function(Rc<str>),
    /// `# param x`
    Param(Rc<str>),
}

impl Instruction {
    /// The temporary written by this instruction, if any.
    pub fn dst(&self) -> Option<Temp> {
        match self {
            Instruction::Assign { dst, .. }
            | Instruction::Copy { dst, .. }
            | Instruction::Binary { dst, .. }
            | Instruction::Builtin { dst, .. }
            | Instruction::Call { dst, .. } => Some(*dst),
            Instruction::Label(_)
            | Instruction::Branch { .. }
            | Instruction::Jump(_)
            | Instruction::Return(_)
            | Instruction::Annotation(_) => None,
        }
    }
}

/// Renders the instructions one per line.
pub fn listing(code: &[Instruction]) -> String {
    use fmt::Write;

    let mut buf = String::with_capacity(code.len() * 16);
    for instruction in code {
        writeln!(buf, "{instruction}").expect("writing to a string can't fail");
    }
    buf
}

impl fmt::Display for Temp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Local(n) => write!(f, "L{n}"),
            Label::Function(name) => write!(f, "func_{name}"),
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Temp(temp) => write!(f, "{temp}"),
            Operand::Param(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int(int) => write!(f, "{int}"),
            Immediate::Nil => f.write_str("NIL"),
            Immediate::Name(name) => f.write_str(name),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Assign { dst, value } => write!(f, "{dst} = {value}"),
            Instruction::Copy {
                dst,
                src,
                result_of,
            } => {
                write!(f, "{dst} = {src}")?;
                if let Some(function) = result_of {
                    write!(f, "  # result {function}")?;
                }
                Ok(())
            }
            Instruction::Binary { dst, op, lhs, rhs } => {
                write!(f, "{dst} = {lhs} {} {rhs}", op.symbol())
            }
            Instruction::Builtin { dst, builtin, args } => {
                write!(f, "{dst} = {}(", builtin.ir_name())?;
                write_args(f, args)?;
                f.write_str(")")
            }
            Instruction::Call {
                dst,
                function,
                args,
            } => {
                write!(f, "{dst} = CALL({function}")?;
                if !args.is_empty() {
                    f.write_str(", ")?;
                    write_args(f, args)?;
                }
                f.write_str(")")
            }
            Instruction::Label(label) => write!(f, "{label}:"),
            Instruction::Branch { cond, target } => write!(f, "if {cond} goto {target}"),
            Instruction::Jump(target) => write!(f, "goto {target}"),
            Instruction::Return(Some(value)) => write!(f, "return {value}"),
            Instruction::Return(None) => f.write_str("return NIL"),
            Instruction::Annotation(Annotation::Function(name)) => write!(f, "# function {name}"),
            Instruction::Annotation(Annotation::Param(name)) => write!(f, "# param {name}"),
        }
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Operand]) -> fmt::Result {
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}
