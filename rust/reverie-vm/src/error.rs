//! VM error taxonomy.
//!
//! Handler-level errors are returned as values, never raised, so the engine
//! can uniformly decide between halting and the error-to-prompt recovery
//! path.  Host-boundary failures (storage, missing programs) live in the
//! runtime crate, not here.

use reverie_bytecode::OpCode;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    /// An opcode's declared input arity exceeds the available stack depth.
    /// Checked before dispatch, never discovered mid-handler.
    #[error("stack underflow: {op} needs {needed} operand(s), {available} available")]
    StackUnderflow {
        op: OpCode,
        needed: usize,
        available: usize,
    },

    /// A typed reference points at a missing or wrong-kind heap entry.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// An operand's runtime type is incompatible with the operation.
    #[error("type error: {0}")]
    Type(String),

    /// An out-of-bounds control-flow target.
    #[error("invalid jump target {target} in {op} (program length {len})")]
    InvalidJumpTarget {
        op: OpCode,
        target: i64,
        len: usize,
    },

    /// A malformed regex pattern/flags pair, discovered only at use time.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Catch-all for operation-specific failures.
    #[error("runtime error: {0}")]
    Runtime(String),
}
