//! Storage backends for programs and executions.
//!
//! [`ExecutionStore`] abstracts the backend; [`MemoryStore`] is the
//! mutex-guarded in-memory implementation used in tests, and [`FileStore`]
//! persists JSON files with write-to-tmp + rename so readers never observe
//! a partial record.  Output is logged append-only: it is never rewritten,
//! only extended.

use crate::records::{ExecutionRecord, ProgramRecord};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(String),
    #[error("program not found: {0}")]
    ProgramNotFound(String),
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),
}

/// The storage contract the continuation layer persists through.
pub trait ExecutionStore: Send + Sync {
    fn save_program(&self, record: &ProgramRecord) -> Result<(), StoreError>;
    fn get_program(&self, id: &str) -> Result<ProgramRecord, StoreError>;
    fn list_programs(&self) -> Result<Vec<String>, StoreError>;
    fn delete_program(&self, id: &str) -> Result<(), StoreError>;

    fn save_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError>;
    fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError>;
    fn list_executions(&self) -> Result<Vec<String>, StoreError>;
    /// Delete an execution, clearing the current marker if it pointed here.
    fn delete_execution(&self, id: &str) -> Result<(), StoreError>;

    /// Append a chunk to the execution's output log.  Append-only by
    /// contract: previously written output is never rewritten.
    fn append_output(&self, id: &str, chunk: &str) -> Result<(), StoreError>;
    /// The accumulated output log for an execution.
    fn get_output(&self, id: &str) -> Result<String, StoreError>;

    fn set_current(&self, id: Option<&str>) -> Result<(), StoreError>;
    fn current(&self) -> Result<Option<String>, StoreError>;
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemoryInner {
    programs: HashMap<String, ProgramRecord>,
    executions: HashMap<String, ExecutionRecord>,
    outputs: HashMap<String, String>,
    current: Option<String>,
}

/// In-memory store; the default for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned mutex means another thread panicked mid-write; the
        // maps themselves are still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ExecutionStore for MemoryStore {
    fn save_program(&self, record: &ProgramRecord) -> Result<(), StoreError> {
        self.lock().programs.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_program(&self, id: &str) -> Result<ProgramRecord, StoreError> {
        self.lock()
            .programs
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ProgramNotFound(id.to_string()))
    }

    fn list_programs(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.lock().programs.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete_program(&self, id: &str) -> Result<(), StoreError> {
        self.lock()
            .programs
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::ProgramNotFound(id.to_string()))
    }

    fn save_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        self.lock()
            .executions
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError> {
        self.lock()
            .executions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ExecutionNotFound(id.to_string()))
    }

    fn list_executions(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.lock().executions.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn delete_execution(&self, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner
            .executions
            .remove(id)
            .ok_or_else(|| StoreError::ExecutionNotFound(id.to_string()))?;
        inner.outputs.remove(id);
        if inner.current.as_deref() == Some(id) {
            inner.current = None;
        }
        Ok(())
    }

    fn append_output(&self, id: &str, chunk: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.executions.contains_key(id) {
            return Err(StoreError::ExecutionNotFound(id.to_string()));
        }
        inner.outputs.entry(id.to_string()).or_default().push_str(chunk);
        Ok(())
    }

    fn get_output(&self, id: &str) -> Result<String, StoreError> {
        Ok(self.lock().outputs.get(id).cloned().unwrap_or_default())
    }

    fn set_current(&self, id: Option<&str>) -> Result<(), StoreError> {
        self.lock().current = id.map(str::to_string);
        Ok(())
    }

    fn current(&self) -> Result<Option<String>, StoreError> {
        Ok(self.lock().current.clone())
    }
}

// ---------------------------------------------------------------------------
// Filesystem store
// ---------------------------------------------------------------------------

/// Stores records as JSON under `programs/` and `executions/`, with an
/// append-only `.out` log per execution and a `current` marker file.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create (or open) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(dir.join("programs"))?;
        fs::create_dir_all(dir.join("executions"))?;
        Ok(FileStore { dir })
    }

    fn program_path(&self, id: &str) -> PathBuf {
        self.dir.join("programs").join(format!("{id}.json"))
    }

    fn execution_path(&self, id: &str) -> PathBuf {
        self.dir.join("executions").join(format!("{id}.json"))
    }

    fn output_path(&self, id: &str) -> PathBuf {
        self.dir.join("executions").join(format!("{id}.out"))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join("current")
    }

    /// Atomic write: data lands in a `.tmp` sibling first, then is renamed
    /// into place.
    fn write_atomic(&self, path: &PathBuf, data: &[u8]) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    fn list_ids(&self, subdir: &str) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(self.dir.join(subdir))? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(stem) = name.strip_suffix(".json") {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

impl ExecutionStore for FileStore {
    fn save_program(&self, record: &ProgramRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.write_atomic(&self.program_path(&record.id), &json)
    }

    fn get_program(&self, id: &str) -> Result<ProgramRecord, StoreError> {
        let path = self.program_path(id);
        if !path.exists() {
            return Err(StoreError::ProgramNotFound(id.to_string()));
        }
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    fn list_programs(&self) -> Result<Vec<String>, StoreError> {
        self.list_ids("programs")
    }

    fn delete_program(&self, id: &str) -> Result<(), StoreError> {
        let path = self.program_path(id);
        if !path.exists() {
            return Err(StoreError::ProgramNotFound(id.to_string()));
        }
        fs::remove_file(path)?;
        Ok(())
    }

    fn save_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Serialize(e.to_string()))?;
        self.write_atomic(&self.execution_path(&record.id), &json)
    }

    fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError> {
        let path = self.execution_path(id);
        if !path.exists() {
            return Err(StoreError::ExecutionNotFound(id.to_string()));
        }
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| StoreError::Serialize(e.to_string()))
    }

    fn list_executions(&self) -> Result<Vec<String>, StoreError> {
        self.list_ids("executions")
    }

    fn delete_execution(&self, id: &str) -> Result<(), StoreError> {
        let path = self.execution_path(id);
        if !path.exists() {
            return Err(StoreError::ExecutionNotFound(id.to_string()));
        }
        fs::remove_file(path)?;
        let out = self.output_path(id);
        if out.exists() {
            fs::remove_file(out)?;
        }
        if self.current()?.as_deref() == Some(id) {
            self.set_current(None)?;
        }
        Ok(())
    }

    fn append_output(&self, id: &str, chunk: &str) -> Result<(), StoreError> {
        if !self.execution_path(id).exists() {
            return Err(StoreError::ExecutionNotFound(id.to_string()));
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.output_path(id))?;
        file.write_all(chunk.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    fn get_output(&self, id: &str) -> Result<String, StoreError> {
        let path = self.output_path(id);
        if !path.exists() {
            return Ok(String::new());
        }
        Ok(fs::read_to_string(path)?)
    }

    fn set_current(&self, id: Option<&str>) -> Result<(), StoreError> {
        let path = self.current_path();
        match id {
            Some(id) => fs::write(path, id)?,
            None => {
                if path.exists() {
                    fs::remove_file(path)?;
                }
            }
        }
        Ok(())
    }

    fn current(&self) -> Result<Option<String>, StoreError> {
        let path = self.current_path();
        if !path.exists() {
            return Ok(None);
        }
        let id = fs::read_to_string(path)?;
        let id = id.trim().to_string();
        Ok(if id.is_empty() { None } else { Some(id) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_bytecode::{Arg, Instruction, OpCode};

    fn sample_program() -> ProgramRecord {
        ProgramRecord::new(
            "print(1)",
            vec![
                Instruction::with_arg(OpCode::Push, Arg::Number(1.0)),
                Instruction::new(OpCode::Print),
            ],
        )
    }

    fn check_store(store: &dyn ExecutionStore) {
        // Programs.
        let program = sample_program();
        store.save_program(&program).unwrap();
        let got = store.get_program(&program.id).unwrap();
        assert_eq!(got, program);
        assert_eq!(store.list_programs().unwrap(), vec![program.id.clone()]);

        // Executions.
        let execution = ExecutionRecord::new(&program.id);
        store.save_execution(&execution).unwrap();
        let got = store.get_execution(&execution.id).unwrap();
        assert_eq!(got, execution);

        // Output is append-only.
        store.append_output(&execution.id, "line 1\n").unwrap();
        store.append_output(&execution.id, "line 2\n").unwrap();
        assert_eq!(store.get_output(&execution.id).unwrap(), "line 1\nline 2\n");

        // Current marker follows deletes.
        store.set_current(Some(&execution.id)).unwrap();
        assert_eq!(store.current().unwrap().as_deref(), Some(execution.id.as_str()));
        store.delete_execution(&execution.id).unwrap();
        assert_eq!(store.current().unwrap(), None);
        assert!(store.get_execution(&execution.id).is_err());
        assert!(store.append_output(&execution.id, "late").is_err());

        store.delete_program(&program.id).unwrap();
        assert!(matches!(
            store.get_program(&program.id),
            Err(StoreError::ProgramNotFound(_))
        ));
    }

    #[test]
    fn memory_store_contract() {
        check_store(&MemoryStore::new());
    }

    #[test]
    fn file_store_contract() {
        let dir = std::env::temp_dir().join(format!(
            "reverie-filestore-test-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let store = FileStore::new(&dir).unwrap();
        check_store(&store);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!(
            "reverie-filestore-reopen-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        let program = sample_program();
        let execution = ExecutionRecord::new(&program.id);
        {
            let store = FileStore::new(&dir).unwrap();
            store.save_program(&program).unwrap();
            store.save_execution(&execution).unwrap();
            store.append_output(&execution.id, "persisted\n").unwrap();
            store.set_current(Some(&execution.id)).unwrap();
        }
        // A brand-new handle sees everything.
        let store = FileStore::new(&dir).unwrap();
        assert_eq!(store.get_program(&program.id).unwrap(), program);
        assert_eq!(store.get_execution(&execution.id).unwrap(), execution);
        assert_eq!(store.get_output(&execution.id).unwrap(), "persisted\n");
        assert_eq!(store.current().unwrap().as_deref(), Some(execution.id.as_str()));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn deleting_other_execution_keeps_current() {
        let store = MemoryStore::new();
        let a = ExecutionRecord::new("p");
        let b = ExecutionRecord::new("p");
        store.save_execution(&a).unwrap();
        store.save_execution(&b).unwrap();
        store.set_current(Some(&a.id)).unwrap();
        store.delete_execution(&b.id).unwrap();
        assert_eq!(store.current().unwrap().as_deref(), Some(a.id.as_str()));
    }
}
