//! Opcode handlers, one module per family, dispatched through a single
//! exhaustive match so a new opcode cannot be forgotten silently.

pub mod arith;
pub mod collections;
pub mod compare;
pub mod control;
pub mod io;
pub mod iter_ops;
pub mod json_ops;
pub mod regex_ops;
pub mod strings;

use crate::coerce::coercion_string;
use crate::engine::{Flow, RunEnv};
use crate::error::VmError;
use crate::state::VmState;
use crate::values::Value;
use reverie_bytecode::{Arg, Instruction, OpCode};

/// Extract a name argument, which load-time validation guarantees for
/// well-formed bytecode; a miss here means the host skipped validation.
fn name_arg(instr: &Instruction) -> Result<&str, VmError> {
    match &instr.arg {
        Some(Arg::Name(name)) => Ok(name),
        _ => Err(VmError::Runtime(format!(
            "{} is missing its name argument",
            instr.op
        ))),
    }
}

fn count_arg(instr: &Instruction) -> Result<usize, VmError> {
    instr.count().ok_or_else(|| {
        VmError::Runtime(format!("{} is missing its count argument", instr.op))
    })
}

fn target_arg(instr: &Instruction) -> Result<i64, VmError> {
    instr.target().ok_or_else(|| {
        VmError::Runtime(format!("{} is missing its target argument", instr.op))
    })
}

fn regex_arg(instr: &Instruction) -> Result<(&str, &str), VmError> {
    match &instr.arg {
        Some(Arg::Regex { pattern, flags }) => Ok((pattern, flags)),
        _ => Err(VmError::Runtime(format!(
            "{} is missing its pattern argument",
            instr.op
        ))),
    }
}

fn literal_value(instr: &Instruction) -> Result<Value, VmError> {
    match &instr.arg {
        Some(Arg::Number(n)) => Ok(Value::Number(*n)),
        Some(Arg::Str(s)) => Ok(Value::String(s.clone())),
        Some(Arg::Bool(b)) => Ok(Value::Bool(*b)),
        Some(Arg::Null) => Ok(Value::Null),
        Some(Arg::Undefined) => Ok(Value::Undefined),
        _ => Err(VmError::Runtime(format!(
            "{} is missing its literal argument",
            instr.op
        ))),
    }
}

/// Dispatch one instruction.  Stack arity has already been checked by the
/// engine; handlers may still propagate underflow defensively but never
/// panic.
pub(crate) fn dispatch(
    state: &mut VmState,
    instr: &Instruction,
    program_len: usize,
    env: &RunEnv<'_>,
) -> Result<Flow, VmError> {
    use OpCode::*;
    let op = instr.op;
    match op {
        // Stack
        Push => {
            let value = literal_value(instr)?;
            state.push(value);
            Ok(Flow::Advance)
        }
        Pop => {
            state.pop(op)?;
            Ok(Flow::Advance)
        }
        Dup => {
            let value = state.pop(op)?;
            state.push(value.clone());
            state.push(value);
            Ok(Flow::Advance)
        }

        // Variables
        Load => {
            let name = name_arg(instr)?;
            let value = state
                .variables
                .get(name)
                .cloned()
                .unwrap_or(Value::Undefined);
            state.push(value);
            Ok(Flow::Advance)
        }
        Store => {
            let name = name_arg(instr)?.to_string();
            let value = state.pop(op)?;
            state.variables.insert(name, value);
            Ok(Flow::Advance)
        }

        // Arithmetic / logic
        Add => arith::add(state).map(advance),
        Sub => arith::binary_numeric(state, op, |a, b| a - b).map(advance),
        Mul => arith::binary_numeric(state, op, |a, b| a * b).map(advance),
        Div => arith::binary_numeric(state, op, |a, b| a / b).map(advance),
        Mod => arith::binary_numeric(state, op, |a, b| a % b).map(advance),
        Neg => arith::neg(state).map(advance),
        Not => arith::not(state).map(advance),

        // Comparison
        Lt => compare::relational(state, op, |a, b| a < b).map(advance),
        Gt => compare::relational(state, op, |a, b| a > b).map(advance),
        Le => compare::relational(state, op, |a, b| a <= b).map(advance),
        Ge => compare::relational(state, op, |a, b| a >= b).map(advance),
        Eq => compare::loose(state, op, true).map(advance),
        Ne => compare::loose(state, op, false).map(advance),
        StrictEq => compare::strict(state, op, true).map(advance),
        StrictNe => compare::strict(state, op, false).map(advance),

        // Constructors
        NewArray => collections::new_array(state, count_arg(instr)?).map(advance),
        NewObject => collections::new_object(state, count_arg(instr)?).map(advance),
        CopyValue => collections::copy_value(state).map(advance),

        // Indexed access
        GetIndex => collections::get_index(state).map(advance),
        SetIndex => collections::set_index(state).map(advance),

        // Array / object ops
        ArrayPush => collections::array_push(state).map(advance),
        Slice => collections::slice(state).map(advance),
        Join => collections::join(state).map(advance),
        IndexOf => collections::index_of(state).map(advance),
        Length => collections::length(state).map(advance),
        Keys => collections::keys(state).map(advance),

        // Strings
        Substring => strings::substring(state).map(advance),
        Split => strings::split(state).map(advance),
        ToUpper => strings::map_string(state, op, |s| s.to_uppercase()).map(advance),
        ToLower => strings::map_string(state, op, |s| s.to_lowercase()).map(advance),
        Trim => strings::map_string(state, op, |s| s.trim().to_string()).map(advance),
        Repeat => strings::repeat(state).map(advance),
        ToString => strings::to_string_op(state).map(advance),
        ToNumber => strings::to_number_op(state).map(advance),
        TypeOf => strings::type_of(state).map(advance),

        // JSON
        JsonStringify => json_ops::stringify(state).map(advance),
        JsonParse => json_ops::parse(state).map(advance),

        // Regex
        RegexTest => {
            let (pattern, flags) = regex_arg(instr)?;
            regex_ops::test(state, pattern, flags).map(advance)
        }
        RegexMatch => {
            let (pattern, flags) = regex_arg(instr)?;
            regex_ops::match_op(state, pattern, flags).map(advance)
        }
        RegexReplace => {
            let (pattern, flags) = regex_arg(instr)?;
            regex_ops::replace(state, pattern, flags).map(advance)
        }

        // Iteration
        IterStart => iter_ops::start(state, env.config.max_iter_depth).map(advance),
        IterNext => iter_ops::next(state).map(advance),
        IterEnd => iter_ops::end(state).map(advance),

        // Control flow
        Jump | Break | Continue => control::jump(state, op, target_arg(instr)?, program_len),
        JumpIfFalse => control::jump_if_false(state, op, target_arg(instr)?, program_len),
        Halt => Ok(Flow::Halt),

        // Output, files, agent
        Print => io::print(state).map(advance),
        ReadFile => io::read_file(state, env.files).map(advance),
        ListFiles => io::list_files(state, env.files).map(advance),
        CognitiveCall => {
            let value = state.pop(op)?;
            let prompt = coercion_string(&state.heap, &value);
            Ok(Flow::Suspend(prompt))
        }
    }
}

fn advance(_: ()) -> Flow {
    Flow::Advance
}
