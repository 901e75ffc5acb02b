//! Output and file handlers.

use crate::capability::FileCapability;
use crate::coerce::{coercion_string, display_string};
use crate::error::VmError;
use crate::state::VmState;
use crate::values::Value;
use reverie_bytecode::OpCode;

/// PRINT: append the pretty form of the operand to accumulated output.
pub fn print(state: &mut VmState) -> Result<(), VmError> {
    let value = state.pop(OpCode::Print)?;
    let line = display_string(&state.heap, &value);
    state.print_line(&line);
    Ok(())
}

fn require_files<'a>(
    files: Option<&'a dyn FileCapability>,
    op: OpCode,
) -> Result<&'a dyn FileCapability, VmError> {
    files.ok_or_else(|| VmError::Runtime(format!("{op}: no file capability available")))
}

pub fn read_file(
    state: &mut VmState,
    files: Option<&dyn FileCapability>,
) -> Result<(), VmError> {
    let path_value = state.pop(OpCode::ReadFile)?;
    let path = coercion_string(&state.heap, &path_value);
    let files = require_files(files, OpCode::ReadFile)?;
    let contents = files
        .read_file(&path)
        .map_err(|e| VmError::Runtime(format!("READ_FILE {path}: {e}")))?;
    state.push(Value::String(contents));
    Ok(())
}

pub fn list_files(
    state: &mut VmState,
    files: Option<&dyn FileCapability>,
) -> Result<(), VmError> {
    let path_value = state.pop(OpCode::ListFiles)?;
    let path = coercion_string(&state.heap, &path_value);
    let files = require_files(files, OpCode::ListFiles)?;
    let names = files
        .list_files(&path)
        .map_err(|e| VmError::Runtime(format!("LIST_FILES {path}: {e}")))?;
    let elements: Vec<Value> = names.into_iter().map(Value::String).collect();
    let id = state.heap.allocate_array(elements);
    state.push(Value::ArrayRef(id));
    Ok(())
}
