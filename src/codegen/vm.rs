//! Straight-line executor for the generated IR.
//!
//! Function blocks are documentation only (calls are inlined), so they are
//! stepped over. Execution starts at the first instruction and ends when the
//! code runs out; the result is the last value written to a temporary.

use std::{collections::HashMap, fmt, rc::Rc};

use thiserror::Error;

use crate::{
    ast::{BinaryOperator, BuiltinFn},
    codegen::ir::{Annotation, Immediate, Instruction, Label, Operand, Temp},
};

type Result<T, E = VmError> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Nil,
    Int(i64),
    Bool(bool),
    Cons(Rc<(Value, Value)>),
}

impl Value {
    pub fn cons(car: Value, cdr: Value) -> Value {
        Value::Cons(Rc::new((car, cdr)))
    }

    /// `NIL` and `false` are the only falsy values.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    fn as_int(&self, operator: &'static str) -> Result<i64> {
        match self {
            Value::Int(int) => Ok(*int),
            other => Err(VmError::TypeMismatch {
                operator,
                expected: "an integer",
                actual: other.clone(),
            }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => f.write_str("NIL"),
            Value::Int(int) => write!(f, "{int}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Cons(cell) => {
                write!(f, "({}", cell.0)?;
                let mut cell = cell;
                loop {
                    match &cell.1 {
                        Value::Nil => break,
                        Value::Cons(next) => {
                            write!(f, " {}", next.0)?;
                            cell = next;
                        }
                        atom => {
                            write!(f, " . {atom}")?;
                            break;
                        }
                    }
                }
                f.write_str(")")
            }
        }
    }
}

pub struct Machine<'code> {
    code: &'code [Instruction],
    labels: HashMap<&'code Label, usize>,
    /// Maps the start of each function block to the instruction after its
    /// `return`.
    blocks: HashMap<usize, usize>,
    names: HashMap<Rc<str>, Value>,
    temps: HashMap<Temp, Value>,
}

impl<'code> Machine<'code> {
    pub fn new(code: &'code [Instruction]) -> Machine<'code> {
        let mut labels = HashMap::new();
        let mut blocks = HashMap::new();
        let mut open_blocks = Vec::new();
        for (pc, instruction) in code.iter().enumerate() {
            match instruction {
                Instruction::Label(label) => {
                    labels.insert(label, pc);
                }
                Instruction::Annotation(Annotation::Function(_)) => open_blocks.push(pc),
                Instruction::Return(_) => {
                    if let Some(start) = open_blocks.pop() {
                        blocks.insert(start, pc + 1);
                    }
                }
                _ => {}
            }
        }
        Machine {
            code,
            labels,
            blocks,
            names: HashMap::new(),
            temps: HashMap::new(),
        }
    }

    /// Gives a value to an external name or parameter.
    pub fn bind(&mut self, name: impl Into<Rc<str>>, value: Value) {
        self.names.insert(name.into(), value);
    }

    pub fn temp(&self, temp: Temp) -> Option<&Value> {
        self.temps.get(&temp)
    }

    /// Runs the code from the start with empty temporaries.
    pub fn run(&mut self) -> Result<Value> {
        self.temps.clear();
        let mut last = Value::Nil;
        let mut pc = 0;

        while let Some(instruction) = self.code.get(pc) {
            pc += 1;
            let value = match instruction {
                Instruction::Assign { value, .. } => self.immediate(value)?,
                Instruction::Copy { src, .. } => self.operand(src)?,
                Instruction::Binary { op, lhs, rhs, .. } => {
                    binary(*op, &self.operand(lhs)?, &self.operand(rhs)?)?
                }
                Instruction::Builtin { builtin, args, .. } => {
                    let args = args
                        .iter()
                        .map(|arg| self.operand(arg))
                        .collect::<Result<Vec<_>>>()?;
                    apply(*builtin, args)?
                }
                Instruction::Call { function, .. } => {
                    return Err(VmError::UnresolvedCall(function.clone()));
                }
                Instruction::Branch { cond, target } => {
                    if self.operand(cond)?.is_truthy() {
                        pc = self.jump(target)?;
                    }
                    continue;
                }
                Instruction::Jump(target) => {
                    pc = self.jump(target)?;
                    continue;
                }
                Instruction::Annotation(Annotation::Function(_)) => {
                    if let Some(&end) = self.blocks.get(&(pc - 1)) {
                        pc = end;
                    }
                    continue;
                }
                Instruction::Return(value) => {
                    return match value {
                        Some(value) => self.operand(value),
                        None => Ok(Value::Nil),
                    };
                }
                Instruction::Label(_) | Instruction::Annotation(Annotation::Param(_)) => continue,
            };
            if let Some(dst) = instruction.dst() {
                self.temps.insert(dst, value.clone());
            }
            last = value;
        }

        Ok(last)
    }

    fn jump(&self, target: &Label) -> Result<usize> {
        self.labels
            .get(target)
            .copied()
            .ok_or_else(|| VmError::UnknownLabel(target.clone()))
    }

    fn operand(&self, operand: &Operand) -> Result<Value> {
        match operand {
            Operand::Temp(temp) => self
                .temps
                .get(temp)
                .cloned()
                .ok_or(VmError::UnassignedTemp(*temp)),
            Operand::Param(name) => self.name(name),
        }
    }

    fn immediate(&self, value: &Immediate) -> Result<Value> {
        match value {
            Immediate::Int(int) => Ok(Value::Int(*int)),
            Immediate::Nil => Ok(Value::Nil),
            Immediate::Name(name) => self.name(name),
        }
    }

    fn name(&self, name: &Rc<str>) -> Result<Value> {
        if let Some(value) = self.names.get(name) {
            return Ok(value.clone());
        }
        match &**name {
            "nil" => Ok(Value::Nil),
            "t" => Ok(Value::Bool(true)),
            _ => Err(VmError::UnboundName(name.clone())),
        }
    }
}

fn binary(op: BinaryOperator, lhs: &Value, rhs: &Value) -> Result<Value> {
    use BinaryOperator as B;

    match op {
        B::Eq => return Ok(Value::Bool(lhs == rhs)),
        B::Ne => return Ok(Value::Bool(lhs != rhs)),
        _ => {}
    }

    let symbol = op.symbol();
    let a = lhs.as_int(symbol)?;
    let b = rhs.as_int(symbol)?;
    let overflow = || VmError::Overflow(symbol);
    if matches!(op, B::Div | B::DivInt | B::Mod) && b == 0 {
        return Err(VmError::DivisionByZero);
    }

    let value = match op {
        B::Add => Value::Int(a.checked_add(b).ok_or_else(overflow)?),
        B::Sub => Value::Int(a.checked_sub(b).ok_or_else(overflow)?),
        B::Mul => Value::Int(a.checked_mul(b).ok_or_else(overflow)?),
        B::Div => Value::Int(a.checked_div(b).ok_or_else(overflow)?),
        B::DivInt => {
            let q = a.checked_div(b).ok_or_else(overflow)?;
            // Round towards negative infinity.
            if a % b != 0 && (a < 0) != (b < 0) {
                Value::Int(q - 1)
            } else {
                Value::Int(q)
            }
        }
        B::Mod => {
            let r = a.checked_rem(b).ok_or_else(overflow)?;
            // Takes the sign of the divisor.
            if r != 0 && (r < 0) != (b < 0) {
                Value::Int(r + b)
            } else {
                Value::Int(r)
            }
        }
        B::Exp => {
            if b < 0 {
                return Err(VmError::NegativeExponent(b));
            }
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            Value::Int(a.checked_pow(exp).ok_or_else(overflow)?)
        }
        B::Lt => Value::Bool(a < b),
        B::Gt => Value::Bool(a > b),
        B::Le => Value::Bool(a <= b),
        B::Ge => Value::Bool(a >= b),
        B::Eq => Value::Bool(a == b),
        B::Ne => Value::Bool(a != b),
    };
    Ok(value)
}

fn apply(builtin: BuiltinFn, args: Vec<Value>) -> Result<Value> {
    let mut args = args.into_iter();
    let mut arg = || args.next().unwrap_or(Value::Nil);
    match builtin {
        BuiltinFn::Cons => {
            let car = arg();
            Ok(Value::cons(car, arg()))
        }
        BuiltinFn::Eq => {
            let lhs = arg();
            Ok(Value::Bool(lhs == arg()))
        }
        BuiltinFn::Car | BuiltinFn::Cdr => match arg() {
            Value::Nil => Ok(Value::Nil),
            Value::Cons(cell) => {
                let (car, cdr) = &*cell;
                let value = if builtin == BuiltinFn::Car { car } else { cdr };
                Ok(value.clone())
            }
            other => Err(VmError::TypeMismatch {
                operator: builtin.name(),
                expected: "a list",
                actual: other,
            }),
        },
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("unbound name '{0}'")]
    UnboundName(Rc<str>),

    #[error("read of unassigned temporary {0}")]
    UnassignedTemp(Temp),

    #[error("jump to unknown label {0}")]
    UnknownLabel(Label),

    #[error("operator {operator} expects {expected}, but got {actual}")]
    TypeMismatch {
        operator: &'static str,
        expected: &'static str,
        actual: Value,
    },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in {0}")]
    Overflow(&'static str),

    #[error("negative exponent {0}")]
    NegativeExponent(i64),

    #[error("unresolved call to function '{0}'")]
    UnresolvedCall(Rc<str>),
}
