//! The Reverie interpreter core.
//!
//! A stack-based VM with a mutable heap of id-stable arrays and objects,
//! dynamic JS-like coercion, structured iteration, and a continuation
//! protocol that can suspend at a cognitive call, serialize the complete
//! machine state and later resume bit-for-bit — across arbitrary delays,
//! including process restarts.

pub mod capability;
pub mod coerce;
pub mod config;
pub mod continuation;
pub mod engine;
pub mod error;
pub mod heap;
pub mod iter;
pub mod ops;
pub mod state;
pub mod trace;
pub mod values;

pub use capability::{CapabilityError, FileCapability, StubFiles};
pub use config::VmConfig;
pub use continuation::{resume, ContinuationError, HeapImage, Snapshot, SNAPSHOT_VERSION};
pub use engine::{run_burst, BurstOutcome, Flow, RunEnv};
pub use error::VmError;
pub use heap::{ArrayEntry, Heap, HeapEntry, ObjectEntry};
pub use iter::{IterTarget, IteratorContext, MAX_ITER_DEPTH};
pub use ops::json_ops::value_from_json;
pub use state::{Status, VmState};
pub use trace::{RunTrace, TraceEvent};
pub use values::{format_number, same_reference, HeapId, Value};
