//! Complete machine state for one execution.

use crate::error::VmError;
use crate::heap::Heap;
use crate::iter::IteratorContext;
use crate::values::Value;
use reverie_bytecode::OpCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Execution lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Running,
    Waiting,
    Complete,
    Error,
}

impl Status {
    /// Terminal statuses must never be resumed or re-run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Complete | Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Running => "running",
            Status::Waiting => "waiting",
            Status::Complete => "complete",
            Status::Error => "error",
        };
        f.write_str(s)
    }
}

/// The complete machine state: program counter, operand stack, flat variable
/// scope, heap, iterator stack, accumulated output and lifecycle status.
/// Owned exclusively by the engine during a burst; between bursts it is
/// owned by the continuation layer's persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmState {
    pub pc: usize,
    pub stack: Vec<Value>,
    pub variables: BTreeMap<String, Value>,
    pub heap: Heap,
    pub iterators: Vec<IteratorContext>,
    pub output: String,
    pub status: Status,
    pub cc_prompt: Option<String>,
    pub error: Option<String>,
}

impl VmState {
    pub fn new() -> Self {
        VmState {
            pc: 0,
            stack: Vec::new(),
            variables: BTreeMap::new(),
            heap: Heap::new(),
            iterators: Vec::new(),
            output: String::new(),
            status: Status::Running,
            cc_prompt: None,
            error: None,
        }
    }

    /// Pop one operand.  The engine checks arity before dispatch, so this
    /// failing inside a handler indicates an arity-table bug; it still
    /// propagates as a proper error rather than panicking.
    pub fn pop(&mut self, op: OpCode) -> Result<Value, VmError> {
        self.stack.pop().ok_or(VmError::StackUnderflow {
            op,
            needed: 1,
            available: 0,
        })
    }

    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Append one line of program output.
    pub fn print_line(&mut self, line: &str) {
        self.output.push_str(line);
        self.output.push('\n');
    }
}

impl Default for VmState {
    fn default() -> Self {
        Self::new()
    }
}
