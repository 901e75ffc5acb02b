//! Host-facing operations: thin pass-throughs over the engine, the
//! continuation protocol and the store.
//!
//! Each execution id gets its own advisory lock so at most one burst (run
//! or resume) is in flight per execution at a time; concurrent callers get
//! a busy error instead of racing to overwrite the same persisted snapshot.

use crate::records::{ExecutionRecord, ProgramRecord};
use crate::store::{ExecutionStore, StoreError};
use reverie_bytecode::{validate_program, BytecodeError};
use reverie_vm::{
    resume, run_burst, value_from_json, BurstOutcome, ContinuationError, FileCapability,
    RunEnv, RunTrace, Snapshot, Status, Value, VmConfig, VmState,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid bytecode: {0}")]
    Bytecode(#[from] BytecodeError),
    #[error(transparent)]
    Continuation(#[from] ContinuationError),
    #[error("cannot resume execution with status '{status}'")]
    NotWaiting { status: Status },
    #[error("bytecode hash mismatch for program {program_id}: the stored program changed since this execution was created")]
    BytecodeMismatch { program_id: String },
    #[error("execution {0} is busy: another burst is in flight")]
    Busy(String),
}

/// The host layer.  Owns the store handle and the per-execution locks;
/// carries no business logic of its own.
pub struct Host {
    store: Arc<dyn ExecutionStore>,
    config: VmConfig,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Host {
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Host {
            store,
            config: VmConfig::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_config(store: Arc<dyn ExecutionStore>, config: VmConfig) -> Self {
        Host {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn ExecutionStore {
        self.store.as_ref()
    }

    fn execution_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.entry(id.to_string()).or_default().clone()
    }

    /// Validate, hash and persist a program; returns its id.
    pub fn load_program(
        &self,
        source: &str,
        bytecode: Vec<reverie_bytecode::Instruction>,
    ) -> Result<String, HostError> {
        validate_program(&bytecode)?;
        let record = ProgramRecord::new(source, bytecode);
        let id = record.id.clone();
        self.store.save_program(&record)?;
        Ok(id)
    }

    /// Create a fresh execution of a program and mark it current.  Nothing
    /// runs until the first `fetch_next`.
    pub fn start(&self, program_id: &str) -> Result<String, HostError> {
        let program = self.store.get_program(program_id)?;
        let record = ExecutionRecord::new(&program.id);
        let id = record.id.clone();
        self.store.save_execution(&record)?;
        self.store.set_current(Some(&id))?;
        Ok(id)
    }

    fn load_verified(
        &self,
        execution_id: &str,
    ) -> Result<(ExecutionRecord, ProgramRecord), HostError> {
        let record = self.store.get_execution(execution_id)?;
        let program = self.store.get_program(&record.program_id)?;
        if crate::records::hash_bytecode(&program.bytecode) != program.bytecode_hash {
            return Err(HostError::BytecodeMismatch {
                program_id: program.id,
            });
        }
        Ok((record, program))
    }

    /// Persist the post-burst state: the new snapshot plus the output
    /// delta, which is appended (never rewritten) to the output log.
    fn persist_burst(
        &self,
        record: &mut ExecutionRecord,
        state: &VmState,
        output_before: usize,
    ) -> Result<(), HostError> {
        let delta = &state.output[output_before..];
        if !delta.is_empty() {
            self.store.append_output(&record.id, delta)?;
        }
        record.absorb(Snapshot::take(state));
        self.store.save_execution(record)?;
        Ok(())
    }

    /// Drive one engine burst and report where the execution landed.
    pub fn fetch_next(
        &self,
        execution_id: &str,
        files: Option<&dyn FileCapability>,
    ) -> Result<BurstOutcome, HostError> {
        let lock = self.execution_lock(execution_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| HostError::Busy(execution_id.to_string()))?;

        let (mut record, program) = self.load_verified(execution_id)?;
        let mut state = record.snapshot.clone().restore()?;
        let output_before = state.output.len();
        let env = RunEnv {
            config: self.config.clone(),
            files,
        };
        let mut trace = RunTrace::new();
        let outcome = run_burst(&mut state, &program.bytecode, &env, &mut trace);
        self.persist_burst(&mut record, &state, output_before)?;
        Ok(outcome)
    }

    fn resume_injected(
        &self,
        execution_id: &str,
        files: Option<&dyn FileCapability>,
        make_result: impl FnOnce(&mut VmState) -> Value,
    ) -> Result<BurstOutcome, HostError> {
        let lock = self.execution_lock(execution_id);
        let _guard = lock
            .try_lock()
            .map_err(|_| HostError::Busy(execution_id.to_string()))?;

        let (mut record, program) = self.load_verified(execution_id)?;
        if record.status() != Status::Waiting {
            return Err(HostError::NotWaiting {
                status: record.status(),
            });
        }
        let mut state = record.snapshot.clone().restore()?;
        let output_before = state.output.len();
        let result = make_result(&mut state);
        let env = RunEnv {
            config: self.config.clone(),
            files,
        };
        let mut trace = RunTrace::new();
        let outcome = resume(&mut state, result, &program.bytecode, &env, &mut trace)?;
        self.persist_burst(&mut record, &state, output_before)?;
        Ok(outcome)
    }

    /// Resume a waiting execution with the agent's result.
    pub fn report_result(
        &self,
        execution_id: &str,
        result: Value,
        files: Option<&dyn FileCapability>,
    ) -> Result<BurstOutcome, HostError> {
        self.resume_injected(execution_id, files, |_| result)
    }

    /// Resume with a JSON result; nested arrays/objects are allocated into
    /// the execution's heap before injection.
    pub fn report_result_json(
        &self,
        execution_id: &str,
        result: &serde_json::Value,
        files: Option<&dyn FileCapability>,
    ) -> Result<BurstOutcome, HostError> {
        self.resume_injected(execution_id, files, |state| {
            value_from_json(&mut state.heap, result)
        })
    }

    /// The persisted state of an execution, as stored.
    pub fn inspect(&self, execution_id: &str) -> Result<ExecutionRecord, HostError> {
        Ok(self.store.get_execution(execution_id)?)
    }

    pub fn list_programs(&self) -> Result<Vec<String>, HostError> {
        Ok(self.store.list_programs()?)
    }

    pub fn list_executions(&self) -> Result<Vec<String>, HostError> {
        Ok(self.store.list_executions()?)
    }

    pub fn delete_program(&self, id: &str) -> Result<(), HostError> {
        Ok(self.store.delete_program(id)?)
    }

    pub fn delete_execution(&self, id: &str) -> Result<(), HostError> {
        self.store.delete_execution(id)?;
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(id);
        Ok(())
    }

    pub fn current_execution(&self) -> Result<Option<String>, HostError> {
        Ok(self.store.current()?)
    }
}
