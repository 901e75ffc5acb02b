//! Reverie runtime: persistence and host-facing operations.
//!
//! This crate owns everything *around* the interpreter core: the program
//! and execution records, the storage contract with its in-memory and
//! filesystem backends, and the thin host layer that loads programs,
//! starts executions, drives bursts and injects cognitive-call results.

pub mod host;
pub mod records;
pub mod store;

pub use host::{Host, HostError};
pub use records::{hash_bytecode, ExecutionRecord, ProgramRecord};
pub use store::{ExecutionStore, FileStore, MemoryStore, StoreError};
