//! Compiler configuration
//!
//! Named constants used by the generated orchestration steps. Defaults are
//! compiled in; a TOML file passed with `--config` may override any subset:
//!
//! ```toml
//! init-job-id = "cixx-init"
//! init-runs-on = "ubuntu-22.04"
//!
//! [cache]
//! action = "martijnhols/actions-cache"
//! version = "204c5fc6f17f75fc56021276acb5aa4b6a051d8e"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CixxError, Result};

/// Pinned revision of the cache action, shared by check/restore/save steps
pub const ACTIONS_CACHE_VERSION: &str = "204c5fc6f17f75fc56021276acb5aa4b6a051d8e";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct CompilerConfig {
    /// ID of the synthesized initialization job
    pub init_job_id: String,

    /// Runner label of the initialization job
    pub init_runs_on: String,

    /// ID of the key generation step inside the initialization job
    pub key_step_id: String,

    /// ID of the step exposing dependency outputs inside each pipeline job
    pub outputs_step_id: String,

    /// Cache action used to check, restore and save build outputs
    pub cache: CacheAction,
}

/// Cache action reference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CacheAction {
    /// Repository of the action, without sub-action or version
    pub action: String,

    /// Git revision the action is pinned to
    pub version: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            init_job_id: "cixx-init".to_string(),
            init_runs_on: "ubuntu-latest".to_string(),
            key_step_id: "generate-keys".to_string(),
            outputs_step_id: "cixx-outputs".to_string(),
            cache: CacheAction::default(),
        }
    }
}

impl Default for CacheAction {
    fn default() -> Self {
        Self {
            action: "martijnhols/actions-cache".to_string(),
            version: ACTIONS_CACHE_VERSION.to_string(),
        }
    }
}

impl CacheAction {
    /// `uses:` reference for a sub-action (`check`, `restore` or `save`)
    pub fn uses(&self, sub_action: &str) -> String {
        format!("{}/{}@{}", self.action, sub_action, self.version)
    }
}

impl CompilerConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| CixxError::InvalidConfig {
            path: path.to_path_buf(),
            details: e.to_string(),
        })
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| CixxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content, path)
    }
}
