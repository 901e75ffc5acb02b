//! Iterator opcode handlers: ITER_START / ITER_NEXT / ITER_END.

use crate::error::VmError;
use crate::iter::IteratorContext;
use crate::state::VmState;
use crate::values::Value;
use reverie_bytecode::OpCode;

/// ITER_START: push a fresh context for an array or an object's keys.
/// The depth bound is checked before anything is popped, so a rejected
/// start leaves the operand stack intact.
pub fn start(state: &mut VmState, max_depth: usize) -> Result<(), VmError> {
    if state.iterators.len() >= max_depth {
        return Err(VmError::Runtime(format!(
            "iterator depth exceeded the bound of {max_depth}"
        )));
    }
    let target = state.pop(OpCode::IterStart)?;
    let context = match &target {
        Value::ArrayRef(id) => {
            let length = state.heap.array(*id)?.elements.len();
            IteratorContext::over_array(*id, length)
        }
        Value::ObjectRef(id) => {
            let keys: Vec<String> = state.heap.object(*id)?.properties.keys().cloned().collect();
            IteratorContext::over_keys(keys)
        }
        Value::Null => {
            return Err(VmError::Type("cannot iterate null".to_string()));
        }
        other => {
            return Err(VmError::Type(format!(
                "cannot iterate a {}",
                other.type_name()
            )));
        }
    };
    state.iterators.push(context);
    Ok(())
}

/// ITER_NEXT: pushes the element (or null) and then the has-more flag, so
/// the flag sits on top for a following JUMP_IF_FALSE.  Calling NEXT past
/// exhaustion is safe and keeps yielding `(null, false)`.
pub fn next(state: &mut VmState) -> Result<(), VmError> {
    let state = &mut *state;
    let context = state.iterators.last_mut().ok_or_else(|| {
        VmError::Runtime("ITER_NEXT with no active iterator".to_string())
    })?;
    let (element, has_more) = context.next(&state.heap);
    state.stack.push(element);
    state.stack.push(Value::Bool(has_more));
    Ok(())
}

/// ITER_END: pop the top context; an empty iterator stack is an error.
pub fn end(state: &mut VmState) -> Result<(), VmError> {
    state
        .iterators
        .pop()
        .map(|_| ())
        .ok_or_else(|| VmError::Runtime("ITER_END with no active iterator".to_string()))
}
