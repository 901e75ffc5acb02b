//! Filesystem capability for Reverie guest programs.
//!
//! Implements [`FileCapability`] with a path allowlist: every request is
//! canonicalized and must land inside one of the configured roots.  This is
//! the only sandboxing the VM offers, so the checks here are strict —
//! symlinks are resolved before the containment test, and a path that does
//! not exist cannot be probed for.

use reverie_vm::{CapabilityError, FileCapability};
use std::path::{Path, PathBuf};

/// Allowlist-rooted filesystem access.
pub struct AllowlistFs {
    roots: Vec<PathBuf>,
}

impl AllowlistFs {
    /// Build a capability allowing access under the given roots.  Roots
    /// that cannot be canonicalized (e.g. they do not exist) are rejected
    /// up front rather than silently dropped.
    pub fn new(roots: &[impl AsRef<Path>]) -> Result<Self, CapabilityError> {
        let mut canonical = Vec::with_capacity(roots.len());
        for root in roots {
            let root = root.as_ref();
            let resolved = root.canonicalize().map_err(|e| {
                CapabilityError::Io(format!("cannot resolve root {}: {e}", root.display()))
            })?;
            canonical.push(resolved);
        }
        Ok(AllowlistFs { roots: canonical })
    }

    /// Resolve a guest-supplied path and check containment.
    fn resolve(&self, path: &str) -> Result<PathBuf, CapabilityError> {
        let resolved = Path::new(path)
            .canonicalize()
            .map_err(|_| CapabilityError::NotFound(path.to_string()))?;
        if self.roots.iter().any(|root| resolved.starts_with(root)) {
            Ok(resolved)
        } else {
            Err(CapabilityError::Denied(format!(
                "{path} is outside the allowed roots"
            )))
        }
    }
}

impl FileCapability for AllowlistFs {
    fn read_file(&self, path: &str) -> Result<String, CapabilityError> {
        let resolved = self.resolve(path)?;
        std::fs::read_to_string(&resolved)
            .map_err(|e| CapabilityError::Io(format!("{path}: {e}")))
    }

    fn list_files(&self, path: &str) -> Result<Vec<String>, CapabilityError> {
        let resolved = self.resolve(path)?;
        let entries = std::fs::read_dir(&resolved)
            .map_err(|e| CapabilityError::Io(format!("{path}: {e}")))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| CapabilityError::Io(format!("{path}: {e}")))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}
