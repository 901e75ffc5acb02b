//! `reverie.toml` configuration.

use reverie_vm::VmConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "reverie.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Where programs and executions are persisted.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
    /// Optional directory for per-run trace logs.
    #[serde(default)]
    pub trace_dir: Option<PathBuf>,
    /// Roots guest programs may read from.  Empty means no file access.
    #[serde(default)]
    pub allowed_roots: Vec<PathBuf>,
    #[serde(default)]
    pub vm: VmConfig,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from(".reverie")
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            store_dir: default_store_dir(),
            trace_dir: None,
            allowed_roots: Vec::new(),
            vm: VmConfig::default(),
        }
    }
}

impl CliConfig {
    /// Load `reverie.toml` from the current directory, or fall back to the
    /// defaults if there is none.
    pub fn load() -> Result<Self, String> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(CliConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        toml::from_str(&text).map_err(|e| format!("invalid {}: {e}", path.display()))
    }

    /// Serialize the default config, for `reverie init`.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&CliConfig::default())
            .unwrap_or_else(|_| String::from("store_dir = \".reverie\"\n"))
    }
}
