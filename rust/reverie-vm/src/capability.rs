//! File capability seam.
//!
//! No opcode handler performs blocking I/O directly; `READ_FILE` and
//! `LIST_FILES` delegate to a capability object passed into the run call and
//! queried synchronously within the handler.  The allowlist-enforcing
//! implementation lives in the `reverie-provider-fs` crate.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapabilityError {
    #[error("access denied: {0}")]
    Denied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(String),
}

/// Synchronous file access offered to guest programs.
pub trait FileCapability: Send + Sync {
    /// Read a file's contents as a string.
    fn read_file(&self, path: &str) -> Result<String, CapabilityError>;
    /// List the entry names in a directory.
    fn list_files(&self, path: &str) -> Result<Vec<String>, CapabilityError>;
}

/// In-memory capability for tests: a fixed path → contents map, with
/// directory listings derived from the stored paths.
#[derive(Debug, Default)]
pub struct StubFiles {
    files: BTreeMap<String, String>,
}

impl StubFiles {
    pub fn new() -> Self {
        StubFiles::default()
    }

    pub fn insert(&mut self, path: &str, contents: &str) {
        self.files.insert(path.to_string(), contents.to_string());
    }
}

impl FileCapability for StubFiles {
    fn read_file(&self, path: &str) -> Result<String, CapabilityError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| CapabilityError::NotFound(path.to_string()))
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>, CapabilityError> {
        let prefix = if path.ends_with('/') {
            path.to_string()
        } else {
            format!("{path}/")
        };
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|p| p.strip_prefix(&prefix))
            .map(|rest| match rest.split_once('/') {
                Some((dir, _)) => dir.to_string(),
                None => rest.to_string(),
            })
            .collect();
        names.sort();
        names.dedup();
        if names.is_empty() {
            return Err(CapabilityError::NotFound(path.to_string()));
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reads_and_lists() {
        let mut stub = StubFiles::new();
        stub.insert("data/a.txt", "alpha");
        stub.insert("data/b.txt", "beta");
        stub.insert("data/sub/c.txt", "gamma");

        assert_eq!(stub.read_file("data/a.txt").unwrap(), "alpha");
        assert!(matches!(
            stub.read_file("data/missing.txt"),
            Err(CapabilityError::NotFound(_))
        ));

        let names = stub.list_files("data").unwrap();
        assert_eq!(names, vec!["a.txt", "b.txt", "sub"]);
    }
}
