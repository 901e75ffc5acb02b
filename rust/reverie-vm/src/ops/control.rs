//! Control-flow handlers.
//!
//! Every jump-carrying instruction re-validates its target against bytecode
//! bounds at dispatch time, even when the branch is not taken; an
//! out-of-bounds target is a fatal error naming the offending construct,
//! never a silent no-op.

use crate::engine::Flow;
use crate::error::VmError;
use crate::state::VmState;
use reverie_bytecode::OpCode;

fn checked_target(op: OpCode, target: i64, len: usize) -> Result<usize, VmError> {
    if target < 0 || target as usize >= len {
        Err(VmError::InvalidJumpTarget { op, target, len })
    } else {
        Ok(target as usize)
    }
}

/// JUMP / BREAK / CONTINUE: unconditional transfer to an absolute index.
pub fn jump(state: &mut VmState, op: OpCode, target: i64, len: usize) -> Result<Flow, VmError> {
    let target = checked_target(op, target, len)?;
    state.pc = target;
    Ok(Flow::Jumped)
}

/// JUMP_IF_FALSE: pops the condition; transfers when it is falsy.
pub fn jump_if_false(
    state: &mut VmState,
    op: OpCode,
    target: i64,
    len: usize,
) -> Result<Flow, VmError> {
    let target = checked_target(op, target, len)?;
    let condition = state.pop(op)?;
    if condition.is_truthy() {
        Ok(Flow::Advance)
    } else {
        state.pc = target;
        Ok(Flow::Jumped)
    }
}
