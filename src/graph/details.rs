//! Per-job cache settings read from a pipeline job body

use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::error::Result;
use crate::value::{as_bool, as_str, as_string_list, Object};

/// Job properties consumed by the compiler and removed from the output
pub const CIXX_PROPERTIES: &[&str] = &["paths", "output-paths", "extra-key", "force", "outputs"];

/// Path of the file a job's structured outputs are written to
pub fn outputs_file(job_name: &str) -> String {
    format!("__cixx_outputs_{job_name}.json")
}

/// Cache settings of one pipeline job
#[derive(Debug, Clone, PartialEq)]
pub struct JobDetails {
    /// Paths whose content determines the cache key
    pub paths: Vec<String>,
    /// Paths saved to and restored from the cache, outputs file included
    pub output_paths: Vec<String>,
    /// Free-form string folded into the key
    pub extra_key: String,
    /// Jobs this job depends on, in declaration order
    pub needs: Vec<String>,
    /// Never skip this job
    pub force: bool,
    /// Structured outputs exposed to dependents
    pub outputs: Option<Value>,
}

impl Default for JobDetails {
    fn default() -> Self {
        Self {
            paths: vec!["./".to_string()],
            output_paths: Vec::new(),
            extra_key: String::new(),
            needs: Vec::new(),
            force: false,
            outputs: None,
        }
    }
}

/// Remove duplicates, keeping the first occurrence
fn ordered_set(items: Vec<String>) -> Vec<String> {
    let mut seen = FxHashSet::default();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Read `needs`, which may be a single job name or a list of them
pub fn read_needs(job: &Object, location: &str) -> Result<Vec<String>> {
    let location = format!("{location}.needs");
    match job.get("needs") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(need)) => Ok(vec![need.clone()]),
        Some(value) => as_string_list(value, &location),
    }
}

impl JobDetails {
    /// Read the cache settings of job `name`
    pub fn from_job(name: &str, job: &Object) -> Result<Self> {
        let location = format!("jobs.{name}");
        let defaults = Self::default();

        let paths = match job.get("paths") {
            Some(value) => as_string_list(value, &format!("{location}.paths"))?,
            None => defaults.paths,
        };

        let mut output_paths = match job.get("output-paths") {
            Some(value) => as_string_list(value, &format!("{location}.output-paths"))?,
            None => defaults.output_paths,
        };
        output_paths.push(outputs_file(name));

        let extra_key = match job.get("extra-key") {
            Some(value) => as_str(value, &format!("{location}.extra-key"))?.to_string(),
            None => defaults.extra_key,
        };

        let force = match job.get("force") {
            Some(value) => as_bool(value, &format!("{location}.force"))?,
            None => defaults.force,
        };

        let outputs = match job.get("outputs") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        };

        Ok(Self {
            paths: ordered_set(paths),
            output_paths: ordered_set(output_paths),
            extra_key,
            needs: ordered_set(read_needs(job, &location)?),
            force,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(value: Value) -> Object {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn defaults_apply() {
        let details = JobDetails::from_job("build", &job(json!({"steps": []}))).unwrap();
        assert_eq!(details.paths, ["./"]);
        assert_eq!(details.output_paths, ["__cixx_outputs_build.json"]);
        assert_eq!(details.extra_key, "");
        assert!(details.needs.is_empty());
        assert!(!details.force);
        assert!(details.outputs.is_none());
    }

    #[test]
    fn reads_every_property() {
        let details = JobDetails::from_job(
            "test",
            &job(json!({
                "paths": ["src/", "Cargo.toml", "src/"],
                "output-paths": ["target/"],
                "extra-key": "v2",
                "force": true,
                "needs": ["build", "lint", "build"],
                "outputs": {"report": "${{ steps.r.outputs.path }}"},
            })),
        )
        .unwrap();
        assert_eq!(details.paths, ["src/", "Cargo.toml"]);
        assert_eq!(details.output_paths, ["target/", "__cixx_outputs_test.json"]);
        assert_eq!(details.extra_key, "v2");
        assert!(details.force);
        assert_eq!(details.needs, ["build", "lint"]);
        assert_eq!(
            details.outputs,
            Some(json!({"report": "${{ steps.r.outputs.path }}"}))
        );
    }

    #[test]
    fn single_string_needs() {
        let details = JobDetails::from_job("b", &job(json!({"needs": "a"}))).unwrap();
        assert_eq!(details.needs, ["a"]);
    }

    #[test]
    fn wrong_shapes_are_located() {
        let err = JobDetails::from_job("b", &job(json!({"force": "yes"}))).unwrap_err();
        assert!(err.to_string().contains("jobs.b.force"));

        let err = JobDetails::from_job("b", &job(json!({"paths": ["a", 1]}))).unwrap_err();
        assert!(err.to_string().contains("jobs.b.paths[1]"));

        let err = JobDetails::from_job("b", &job(json!({"extra-key": 3}))).unwrap_err();
        assert!(err.to_string().contains("jobs.b.extra-key"));
    }
}
