use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{MergeError, MergeResult};

/// Configuration for the merge engine.
///
/// Loaded from TOML; every key is optional:
///
/// ```toml
/// per_instance_fallback = true
/// delete_unmovable_protected = true
/// min_records = 2
/// enforce_merge_scope = true
/// deadline_ms = 5000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Retry a failed bulk repoint one instance at a time.
    pub per_instance_fallback: bool,
    /// Delete protect-relation instances that could not be moved, unless
    /// something else protects them.
    pub delete_unmovable_protected: bool,
    /// Minimum number of distinct records (primary included) per merge.
    pub min_records: usize,
    /// Refuse to merge records that disagree on their entity's merge scope.
    pub enforce_merge_scope: bool,
    /// Abort merges running longer than this.
    pub deadline_ms: Option<u64>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            per_instance_fallback: true,
            delete_unmovable_protected: true,
            min_records: 1,
            enforce_merge_scope: true,
            deadline_ms: None,
        }
    }
}

impl MergeConfig {
    /// Preset for operator-driven merges: at least two records.
    pub fn interactive() -> Self {
        Self {
            min_records: 2,
            ..Default::default()
        }
    }

    pub fn from_toml_str(text: &str) -> MergeResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| MergeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> MergeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| MergeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> MergeResult<()> {
        if self.min_records == 0 {
            return Err(MergeError::Config("min_records must be at least 1".into()));
        }
        Ok(())
    }
}
