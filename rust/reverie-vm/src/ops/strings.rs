//! String handlers and the conversion/typeof trio.

use crate::coerce::{coercion_string, to_number};
use crate::error::VmError;
use crate::state::VmState;
use crate::values::Value;
use reverie_bytecode::OpCode;

/// Cap on the REPEAT result so a bad count surfaces as an error instead of
/// an allocation storm.
const MAX_REPEAT_BYTES: usize = 16 * 1024 * 1024;

/// SUBSTRING: clamped to `[0, len]`, NaN treated as 0, bounds swapped when
/// start exceeds end.
pub fn substring(state: &mut VmState) -> Result<(), VmError> {
    let end = state.pop(OpCode::Substring)?;
    let start = state.pop(OpCode::Substring)?;
    let target = state.pop(OpCode::Substring)?;
    let s = match &target {
        Value::String(s) => s,
        other => {
            return Err(VmError::Type(format!(
                "SUBSTRING target must be a string, got {}",
                other.type_name()
            )));
        }
    };
    let chars: Vec<char> = s.chars().collect();
    let norm = |v: &Value, default: usize| -> usize {
        if matches!(v, Value::Undefined) {
            return default;
        }
        let n = to_number(v);
        if n.is_nan() || n <= 0.0 {
            0
        } else {
            (n.trunc() as usize).min(chars.len())
        }
    };
    let mut from = norm(&start, 0);
    let mut to = norm(&end, chars.len());
    if from > to {
        std::mem::swap(&mut from, &mut to);
    }
    state.push(Value::String(chars[from..to].iter().collect()));
    Ok(())
}

/// SPLIT: empty separator splits into characters; a missing separator
/// yields the whole string as a one-element array.
pub fn split(state: &mut VmState) -> Result<(), VmError> {
    let separator = state.pop(OpCode::Split)?;
    let target = state.pop(OpCode::Split)?;
    let s = match &target {
        Value::String(s) => s.clone(),
        other => {
            return Err(VmError::Type(format!(
                "SPLIT target must be a string, got {}",
                other.type_name()
            )));
        }
    };
    let parts: Vec<Value> = match &separator {
        Value::Undefined => vec![Value::String(s)],
        other => {
            let sep = coercion_string(&state.heap, other);
            if sep.is_empty() {
                s.chars().map(|c| Value::String(c.to_string())).collect()
            } else {
                s.split(&sep).map(|p| Value::String(p.to_string())).collect()
            }
        }
    };
    let id = state.heap.allocate_array(parts);
    state.push(Value::ArrayRef(id));
    Ok(())
}

/// TO_UPPER / TO_LOWER / TRIM: operate on the coerced string form, so
/// numbers and booleans pass through them without erroring.
pub fn map_string(
    state: &mut VmState,
    op: OpCode,
    apply: fn(&str) -> String,
) -> Result<(), VmError> {
    let value = state.pop(op)?;
    let s = coercion_string(&state.heap, &value);
    state.push(Value::String(apply(&s)));
    Ok(())
}

/// REPEAT: a negative, NaN or non-finite count is a runtime error.
pub fn repeat(state: &mut VmState) -> Result<(), VmError> {
    let count = state.pop(OpCode::Repeat)?;
    let target = state.pop(OpCode::Repeat)?;
    let s = coercion_string(&state.heap, &target);
    let n = to_number(&count);
    if n.is_nan() || n < 0.0 || n.is_infinite() {
        return Err(VmError::Runtime(format!(
            "repeat count must be a non-negative finite number, got {n}"
        )));
    }
    let times = n.trunc() as usize;
    if s.len().saturating_mul(times) > MAX_REPEAT_BYTES {
        return Err(VmError::Runtime(format!(
            "repeat result would exceed {MAX_REPEAT_BYTES} bytes"
        )));
    }
    state.push(Value::String(s.repeat(times)));
    Ok(())
}

pub fn to_string_op(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::ToString)?;
    let s = coercion_string(&state.heap, &value);
    state.push(Value::String(s));
    Ok(())
}

pub fn to_number_op(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::ToNumber)?;
    state.push(Value::Number(to_number(&value)));
    Ok(())
}

pub fn type_of(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::TypeOf)?;
    state.push(Value::String(value.type_name().to_string()));
    Ok(())
}
