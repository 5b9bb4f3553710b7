//! # Document I/O
//!
//! Loading pipeline documents into the value model and writing workflows back.
//!
//! ## Overview
//!
//! - [`DocumentLoader`] - Trait resolving a pipeline path to its parsed document
//! - [`FsLoader`] - Production loader reading YAML files from disk
//! - [`MemoryLoader`] - Test loader serving YAML text registered in memory
//!
//! Documents are YAML. Merge keys (`<<`) are applied and aliases resolved
//! while loading, so nothing downstream ever sees an anchor.
//!
//! ```rust
//! use cixx::document::{DocumentLoader, MemoryLoader};
//! use std::path::Path;
//!
//! let loader = MemoryLoader::new().with("ci/main.yml", "jobs: {}\n");
//! let doc = loader.load(Path::new("ci/main.yml")).unwrap();
//! assert!(doc["jobs"].is_object());
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::{CixxError, Result};
use crate::util::path;

/// Resolves a pipeline path to its document
pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Value>;
}

/// Parse YAML text into the value model
pub fn parse(content: &str, path: &Path) -> Result<Value> {
    let parse_error = |details: String| CixxError::Parse {
        path: path.to_path_buf(),
        details,
    };

    let mut yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| parse_error(e.to_string()))?;
    yaml.apply_merge().map_err(|e| parse_error(e.to_string()))?;
    serde_json::to_value(&yaml).map_err(|e| parse_error(e.to_string()))
}

/// Render a workflow as YAML
pub fn to_yaml(value: &Value) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| CixxError::Serialize {
        details: e.to_string(),
    })
}

/// Reads documents from the filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLoader;

impl DocumentLoader for FsLoader {
    fn load(&self, path: &Path) -> Result<Value> {
        let content = fs::read_to_string(path).map_err(|source| CixxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse(&content, path)
    }
}

/// Serves YAML documents registered under normalized paths
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    documents: FxHashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `content` under `path`
    pub fn with(mut self, path: &str, content: &str) -> Self {
        self.documents.insert(path::normalize(path), content.to_string());
        self
    }
}

impl DocumentLoader for MemoryLoader {
    fn load(&self, path: &Path) -> Result<Value> {
        let key = path::normalize(&path.to_string_lossy());
        match self.documents.get(&key) {
            Some(content) => parse(content, path),
            None => Err(CixxError::Io {
                path: PathBuf::from(key),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such document"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keys_and_aliases_are_resolved() {
        let doc = parse(
            r#"
x-defaults: &defaults
  runs-on: ubuntu-latest
  timeout-minutes: 10
jobs:
  build:
    <<: *defaults
    steps: [make]
"#,
            Path::new("ci.yml"),
        )
        .unwrap();
        assert_eq!(
            doc["jobs"]["build"],
            json!({"runs-on": "ubuntu-latest", "timeout-minutes": 10, "steps": ["make"]})
        );
    }

    #[test]
    fn on_stays_a_string_key() {
        let doc = parse("on: push\njobs: {}\n", Path::new("ci.yml")).unwrap();
        assert_eq!(doc["on"], json!("push"));
    }

    #[test]
    fn key_order_is_preserved() {
        let doc = parse("jobs:\n  z: {}\n  a: {}\n  m: {}\n", Path::new("ci.yml")).unwrap();
        let keys: Vec<&String> = doc["jobs"].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    #[test]
    fn syntax_error_names_the_file() {
        let err = parse("jobs: [unclosed", Path::new("ci/bad.yml")).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("CIXX-002"), "{message}");
        assert!(message.contains("ci/bad.yml"));
    }

    #[test]
    fn memory_loader_normalizes_paths() {
        let loader = MemoryLoader::new().with("ci/child.yml", "jobs: {}\n");
        assert!(loader.load(Path::new("ci/./child.yml")).is_ok());
        assert!(loader.load(Path::new("ci/other/../child.yml")).is_ok());

        let err = loader.load(Path::new("ci/missing.yml")).unwrap_err();
        assert!(matches!(err, CixxError::Io { .. }));
    }

    #[test]
    fn yaml_output_round_trips() {
        let value = json!({"on": {"push": null}, "jobs": {"a": {"steps": [{"run": "echo hi"}]}}});
        let text = to_yaml(&value).unwrap();
        assert_eq!(parse(&text, Path::new("out.yml")).unwrap(), value);
    }
}
