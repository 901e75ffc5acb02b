//! Engine limits.

use serde::{Deserialize, Serialize};

/// Tunable limits for one engine run.  The defaults are generous; the step
/// budget exists to turn runaway loops into reportable errors instead of a
/// hung burst.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    /// Maximum nested iterator depth.
    #[serde(default = "default_iter_depth")]
    pub max_iter_depth: usize,
    /// Maximum instructions executed in a single burst.
    #[serde(default = "default_burst_steps")]
    pub max_burst_steps: u64,
}

fn default_iter_depth() -> usize {
    crate::iter::MAX_ITER_DEPTH
}

fn default_burst_steps() -> u64 {
    1_000_000
}

impl Default for VmConfig {
    fn default() -> Self {
        VmConfig {
            max_iter_depth: default_iter_depth(),
            max_burst_steps: default_burst_steps(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = VmConfig::default();
        assert_eq!(config.max_iter_depth, 10);
        assert_eq!(config.max_burst_steps, 1_000_000);
    }

    #[test]
    fn partial_deserialization_fills_defaults() {
        let config: VmConfig = serde_json::from_str("{\"max_iter_depth\": 4}").unwrap();
        assert_eq!(config.max_iter_depth, 4);
        assert_eq!(config.max_burst_steps, 1_000_000);
    }
}
