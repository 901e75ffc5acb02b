//! Instruction and argument types, plus load-time validation.

use crate::opcode::{ArgShape, OpCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An instruction argument.
///
/// Argument shapes are opcode-specific: literals for `PUSH`, names for
/// `LOAD`/`STORE`, counts for constructors, absolute indices for jumps and a
/// structured pattern/flags payload for regex literals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Arg {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Undefined,
    Name(String),
    Count(usize),
    Target(i64),
    Regex { pattern: String, flags: String },
}

impl Arg {
    fn shape(&self) -> ArgShape {
        match self {
            Arg::Number(_) | Arg::Str(_) | Arg::Bool(_) | Arg::Null | Arg::Undefined => {
                ArgShape::Literal
            }
            Arg::Name(_) => ArgShape::Name,
            Arg::Count(_) => ArgShape::Count,
            Arg::Target(_) => ArgShape::Target,
            Arg::Regex { .. } => ArgShape::Regex,
        }
    }
}

/// One bytecode instruction: an opcode plus its optional argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub op: OpCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Arg>,
}

impl Instruction {
    pub fn new(op: OpCode) -> Self {
        Instruction { op, arg: None }
    }

    pub fn with_arg(op: OpCode, arg: Arg) -> Self {
        Instruction { op, arg: Some(arg) }
    }

    /// The jump target, if this instruction carries one.  Signed so that a
    /// buggy compiler's negative target is representable and rejectable
    /// instead of failing at deserialization.
    pub fn target(&self) -> Option<i64> {
        match self.arg {
            Some(Arg::Target(t)) => Some(t),
            _ => None,
        }
    }

    /// The constructor count, if this instruction carries one.
    pub fn count(&self) -> Option<usize> {
        match self.arg {
            Some(Arg::Count(n)) => Some(n),
            _ => None,
        }
    }
}

/// Errors found during load-time bytecode validation.
#[derive(Debug, Error)]
pub enum BytecodeError {
    #[error("instruction {index}: {op} requires a {expected:?} argument")]
    BadArgument {
        index: usize,
        op: OpCode,
        expected: ArgShape,
    },
    #[error("instruction {index}: {op} takes no argument")]
    UnexpectedArgument { index: usize, op: OpCode },
    #[error("instruction {index}: jump target {target} out of bounds (program length {len})")]
    OutOfBoundsTarget {
        index: usize,
        target: i64,
        len: usize,
    },
}

/// Validate a whole program once at load time.
///
/// Checks every instruction's argument shape and every jump-carrying
/// instruction's target.  The engine re-validates targets at dispatch; this
/// exists so a host can reject malformed bytecode before persisting it.
pub fn validate_program(program: &[Instruction]) -> Result<(), BytecodeError> {
    for (index, instr) in program.iter().enumerate() {
        let expected = instr.op.arg_shape();
        match (&instr.arg, expected) {
            (None, ArgShape::None) => {}
            (Some(arg), shape) if shape != ArgShape::None && arg.shape() == shape => {}
            (Some(_), ArgShape::None) => {
                return Err(BytecodeError::UnexpectedArgument {
                    index,
                    op: instr.op,
                });
            }
            _ => {
                return Err(BytecodeError::BadArgument {
                    index,
                    op: instr.op,
                    expected,
                });
            }
        }
        if let Some(target) = instr.target() {
            if target < 0 || target as usize >= program.len() {
                return Err(BytecodeError::OutOfBoundsTarget {
                    index,
                    target,
                    len: program.len(),
                });
            }
        }
    }
    Ok(())
}

/// Render a program as a human-readable listing, one instruction per line.
pub fn disassemble(program: &[Instruction]) -> String {
    let mut out = String::new();
    for (i, instr) in program.iter().enumerate() {
        out.push_str(&format!("{i:4}  {}", instr.op));
        match &instr.arg {
            Some(Arg::Number(n)) => out.push_str(&format!(" {n}")),
            Some(Arg::Str(s)) => out.push_str(&format!(" {s:?}")),
            Some(Arg::Bool(b)) => out.push_str(&format!(" {b}")),
            Some(Arg::Null) => out.push_str(" null"),
            Some(Arg::Undefined) => out.push_str(" undefined"),
            Some(Arg::Name(n)) => out.push_str(&format!(" {n}")),
            Some(Arg::Count(c)) => out.push_str(&format!(" #{c}")),
            Some(Arg::Target(t)) => out.push_str(&format!(" -> {t}")),
            Some(Arg::Regex { pattern, flags }) => {
                out.push_str(&format!(" /{pattern}/{flags}"))
            }
            None => {}
        }
        out.push('\n');
    }
    out
}
