//! Bytecode ISA for the Reverie VM.
//!
//! This crate is the contract between the compiler front end (which emits
//! bytecode as JSON) and the execution engine (which consumes it).  The
//! engine trusts the compiler to have resolved jump offsets to absolute
//! instruction indices, but still re-validates bounds at dispatch time;
//! [`validate_program`] lets a host reject malformed bytecode once at load.

pub mod instr;
pub mod opcode;

pub use instr::{disassemble, validate_program, Arg, BytecodeError, Instruction};
pub use opcode::{ArgShape, OpCode};
