//! The continuation protocol: pause-at-CC, full-state snapshot, and
//! resume-with-injected-result.
//!
//! A [`Snapshot`] captures everything resume correctness depends on:
//! program counter, operand stack (order-preserving), the complete
//! variables map, the complete heap with ids preserved exactly, the
//! iterator stack and accumulated output.  Bytecode is *not* part of the
//! snapshot; the host re-supplies it keyed by program id.  The format is
//! versioned so older snapshots can be rejected or migrated rather than
//! misread.

use crate::engine::{run_burst, BurstOutcome, RunEnv};
use crate::heap::{Heap, HeapEntry};
use crate::iter::IteratorContext;
use crate::state::{Status, VmState};
use crate::trace::RunTrace;
use crate::values::Value;
use reverie_bytecode::Instruction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ContinuationError {
    #[error("snapshot version mismatch: snapshot v{found}, vm v{expected}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error("cannot resume execution with status '{status}'")]
    NotWaiting { status: Status },
    #[error("snapshot serialization failed: {0}")]
    Serialize(String),
    #[error("snapshot deserialization failed: {0}")]
    Deserialize(String),
}

/// The heap flattened for storage: every entry keyed by id, plus the next
/// id to hand out, so allocation continues exactly where it left off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapImage {
    pub objects: BTreeMap<u64, HeapEntry>,
    pub next_id: u64,
}

/// A complete, serializable machine state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub pc: usize,
    pub stack: Vec<Value>,
    pub variables: BTreeMap<String, Value>,
    pub heap: HeapImage,
    pub iterators: Vec<IteratorContext>,
    pub output: String,
    pub status: Status,
    pub cc_prompt: Option<String>,
    pub error: Option<String>,
}

impl Snapshot {
    /// Freeze a state into a snapshot.  The state is borrowed, not
    /// consumed, so a host can persist and keep running in tests.
    pub fn take(state: &VmState) -> Snapshot {
        Snapshot {
            version: SNAPSHOT_VERSION,
            pc: state.pc,
            stack: state.stack.clone(),
            variables: state.variables.clone(),
            heap: HeapImage {
                objects: state.heap.entries().clone(),
                next_id: state.heap.next_id(),
            },
            iterators: state.iterators.clone(),
            output: state.output.clone(),
            status: state.status,
            cc_prompt: state.cc_prompt.clone(),
            error: state.error.clone(),
        }
    }

    /// Rebuild a machine state.  Heap ids are preserved exactly, so every
    /// reference on the stack, in variables and in iterators still
    /// resolves to the same entry it did before suspension.
    pub fn restore(self) -> Result<VmState, ContinuationError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(ContinuationError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        Ok(VmState {
            pc: self.pc,
            stack: self.stack,
            variables: self.variables,
            heap: Heap::from_parts(self.heap.objects, self.heap.next_id),
            iterators: self.iterators,
            output: self.output,
            status: self.status,
            cc_prompt: self.cc_prompt,
            error: self.error,
        })
    }

    pub fn to_json(&self) -> Result<String, ContinuationError> {
        serde_json::to_string(self).map_err(|e| ContinuationError::Serialize(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Snapshot, ContinuationError> {
        serde_json::from_str(json).map_err(|e| ContinuationError::Deserialize(e.to_string()))
    }
}

/// Resume a waiting execution with the agent's result value.
///
/// The result is pushed onto the operand stack (it is the value the
/// cognitive call "returns" to the guest program), the counter advances
/// past the call instruction, and the engine loop re-enters with the same
/// bytecode used originally.  Resuming a non-waiting execution is an error
/// reported to the caller, never a silent no-op.
pub fn resume(
    state: &mut VmState,
    result: Value,
    program: &[Instruction],
    env: &RunEnv<'_>,
    trace: &mut RunTrace,
) -> Result<BurstOutcome, ContinuationError> {
    if state.status != Status::Waiting {
        return Err(ContinuationError::NotWaiting {
            status: state.status,
        });
    }
    state.push(result);
    state.cc_prompt = None;
    state.status = Status::Running;
    state.pc += 1;
    Ok(run_burst(state, program, env, trace))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_bytecode::{Arg, OpCode};

    fn suspended_state() -> (VmState, Vec<Instruction>) {
        let program = vec![
            Instruction::with_arg(OpCode::Push, Arg::Str("pick a number".into())),
            Instruction::new(OpCode::CognitiveCall),
            Instruction::with_arg(OpCode::Store, Arg::Name("answer".into())),
            Instruction::with_arg(OpCode::Load, Arg::Name("answer".into())),
            Instruction::new(OpCode::Print),
        ];
        let mut state = VmState::new();
        let env = RunEnv::default();
        let mut trace = RunTrace::new();
        let out = run_burst(&mut state, &program, &env, &mut trace);
        assert_eq!(
            out,
            BurstOutcome::Waiting {
                prompt: "pick a number".into()
            }
        );
        (state, program)
    }

    #[test]
    fn snapshot_round_trip_is_exact() {
        let (mut state, _) = suspended_state();
        // Give the heap something to carry across.
        let id = state.heap.allocate_array(vec![Value::Number(7.0)]);
        state
            .variables
            .insert("xs".to_string(), Value::ArrayRef(id));

        let snap = Snapshot::take(&state);
        let json = snap.to_json().unwrap();
        let restored = Snapshot::from_json(&json).unwrap().restore().unwrap();
        assert_eq!(restored, state);
        // Ids preserved exactly.
        assert_eq!(restored.heap.next_id(), state.heap.next_id());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let (state, _) = suspended_state();
        let mut snap = Snapshot::take(&state);
        snap.version = 99;
        match snap.restore() {
            Err(ContinuationError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: 99,
            }) => {}
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn resume_injects_result_downstream() {
        let (state, program) = suspended_state();

        // Round-trip through the snapshot first, as a real host would.
        let snap = Snapshot::take(&state);
        let mut restored = snap.restore().unwrap();

        let env = RunEnv::default();
        let mut trace = RunTrace::new();
        let out = resume(
            &mut restored,
            Value::String("X".into()),
            &program,
            &env,
            &mut trace,
        )
        .unwrap();
        assert_eq!(out, BurstOutcome::Complete);
        assert_eq!(restored.output, "X\n");
        assert_eq!(restored.variables["answer"], Value::String("X".into()));
    }

    #[test]
    fn resume_requires_waiting() {
        let mut state = VmState::new();
        state.status = Status::Complete;
        let env = RunEnv::default();
        let mut trace = RunTrace::new();
        match resume(&mut state, Value::Null, &[], &env, &mut trace) {
            Err(ContinuationError::NotWaiting {
                status: Status::Complete,
            }) => {}
            other => panic!("unexpected: {other:?}"),
        }

        state.status = Status::Error;
        assert!(resume(&mut state, Value::Null, &[], &env, &mut trace).is_err());
    }

    #[test]
    fn aliasing_survives_snapshot_restore() {
        let mut state = VmState::new();
        let id = state.heap.allocate_array(vec![Value::Number(1.0)]);
        state.variables.insert("a".into(), Value::ArrayRef(id));
        state.variables.insert("b".into(), Value::ArrayRef(id));
        state.status = Status::Waiting;
        state.cc_prompt = Some("hold".into());

        let mut restored = Snapshot::take(&state).restore().unwrap();

        // Mutating through one alias is visible through the other.
        let a = match restored.variables["a"] {
            Value::ArrayRef(id) => id,
            _ => panic!("expected array ref"),
        };
        restored
            .heap
            .array_mut(a)
            .unwrap()
            .elements
            .push(Value::Number(2.0));
        let b = match restored.variables["b"] {
            Value::ArrayRef(id) => id,
            _ => panic!("expected array ref"),
        };
        assert_eq!(restored.heap.array(b).unwrap().elements.len(), 2);
        assert_eq!(a, b);
    }
}
