//! Comparison handlers.

use crate::coerce::{loose_eq, strict_eq, to_number};
use crate::error::VmError;
use crate::state::VmState;
use crate::values::Value;
use reverie_bytecode::OpCode;

/// `<`, `>`, `<=`, `>=`: both operands through the toNumber policy.  A NaN
/// on either side makes the comparison false, never an error.
pub fn relational(
    state: &mut VmState,
    op: OpCode,
    apply: fn(f64, f64) -> bool,
) -> Result<(), VmError> {
    let b = state.pop(op)?;
    let a = state.pop(op)?;
    let na = to_number(&a);
    let nb = to_number(&b);
    let result = if na.is_nan() || nb.is_nan() {
        false
    } else {
        apply(na, nb)
    };
    state.push(Value::Bool(result));
    Ok(())
}

pub fn loose(state: &mut VmState, op: OpCode, want_equal: bool) -> Result<(), VmError> {
    let b = state.pop(op)?;
    let a = state.pop(op)?;
    let equal = loose_eq(&state.heap, &a, &b);
    state.push(Value::Bool(equal == want_equal));
    Ok(())
}

pub fn strict(state: &mut VmState, op: OpCode, want_equal: bool) -> Result<(), VmError> {
    let b = state.pop(op)?;
    let a = state.pop(op)?;
    state.push(Value::Bool(strict_eq(&a, &b) == want_equal));
    Ok(())
}
