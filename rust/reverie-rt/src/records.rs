//! Persisted program and execution records.

use chrono::{DateTime, Utc};
use reverie_bytecode::Instruction;
use reverie_vm::{Snapshot, Status, VmState};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash of a program's bytecode (SHA-256 over its JSON encoding).  Stored
/// with the program and re-checked before every burst so a snapshot is
/// never resumed against different bytecode than it was created with.
pub fn hash_bytecode(bytecode: &[Instruction]) -> String {
    let json = serde_json::to_vec(bytecode).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&json);
    format!("{:x}", hasher.finalize())
}

/// A loaded program: source text plus the compiler's bytecode output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRecord {
    pub id: String,
    pub source: String,
    pub bytecode: Vec<Instruction>,
    pub bytecode_hash: String,
    pub created: DateTime<Utc>,
}

impl ProgramRecord {
    pub fn new(source: impl Into<String>, bytecode: Vec<Instruction>) -> Self {
        let bytecode_hash = hash_bytecode(&bytecode);
        ProgramRecord {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            bytecode,
            bytecode_hash,
            created: Utc::now(),
        }
    }
}

/// One execution of a program.  The machine state is flattened into the
/// record; bytecode is not part of it and is re-supplied from the program
/// record on every burst.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub program_id: String,
    #[serde(flatten)]
    pub snapshot: Snapshot,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Number of bursts attempted (initial runs and resumes alike).
    pub attempts: u32,
}

impl ExecutionRecord {
    /// A fresh execution at the start of the given program.
    pub fn new(program_id: impl Into<String>) -> Self {
        let now = Utc::now();
        ExecutionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            program_id: program_id.into(),
            snapshot: Snapshot::take(&VmState::new()),
            created: now,
            updated: now,
            attempts: 0,
        }
    }

    pub fn status(&self) -> Status {
        self.snapshot.status
    }

    /// Replace the stored machine state after a burst.
    pub fn absorb(&mut self, snapshot: Snapshot) {
        self.snapshot = snapshot;
        self.updated = Utc::now();
        self.attempts += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_bytecode::{Arg, OpCode};

    fn sample_bytecode() -> Vec<Instruction> {
        vec![
            Instruction::with_arg(OpCode::Push, Arg::Number(1.0)),
            Instruction::new(OpCode::Print),
        ]
    }

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        let a = sample_bytecode();
        let b = sample_bytecode();
        assert_eq!(hash_bytecode(&a), hash_bytecode(&b));

        let mut c = sample_bytecode();
        c.push(Instruction::new(OpCode::Halt));
        assert_ne!(hash_bytecode(&a), hash_bytecode(&c));
    }

    #[test]
    fn program_record_carries_hash() {
        let rec = ProgramRecord::new("print(1)", sample_bytecode());
        assert_eq!(rec.bytecode_hash, hash_bytecode(&rec.bytecode));
        assert!(!rec.id.is_empty());
    }

    #[test]
    fn execution_record_flattens_machine_state() {
        let rec = ExecutionRecord::new("prog-1");
        let json = serde_json::to_value(&rec).unwrap();
        // Snapshot fields sit at the record's top level.
        assert_eq!(json["status"], "running");
        assert_eq!(json["pc"], 0);
        assert!(json["heap"]["objects"].is_object());
        assert_eq!(json["program_id"], "prog-1");
    }

    #[test]
    fn absorb_bumps_attempts_and_updated() {
        let mut rec = ExecutionRecord::new("prog-1");
        let before = rec.updated;
        let mut state = VmState::new();
        state.pc = 3;
        rec.absorb(Snapshot::take(&state));
        assert_eq!(rec.attempts, 1);
        assert_eq!(rec.snapshot.pc, 3);
        assert!(rec.updated >= before);
    }

    #[test]
    fn record_round_trips_through_json() {
        let rec = ExecutionRecord::new("prog-2");
        let json = serde_json::to_string(&rec).unwrap();
        let back: ExecutionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, rec);
    }
}
