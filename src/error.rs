//! Error types with fix suggestions
//!
//! Error code ranges:
//! - CIXX-000-009: Document loading errors
//! - CIXX-010-019: Shape errors
//! - CIXX-020-029: Template errors
//! - CIXX-030-039: Job graph errors
//! - CIXX-040-049: Reusable pipeline errors
//! - CIXX-050-059: Configuration errors

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CixxError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug)]
pub enum CixxError {
    // ─────────────────────────────────────────────────────────────
    // Document loading (CIXX-000 to CIXX-009)
    // ─────────────────────────────────────────────────────────────
    #[error("CIXX-001: Failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CIXX-002: Failed to parse '{}': {details}", .path.display())]
    Parse { path: PathBuf, details: String },

    #[error("CIXX-003: Failed to serialize workflow: {details}")]
    Serialize { details: String },

    // ─────────────────────────────────────────────────────────────
    // Shape errors (CIXX-010 to CIXX-019)
    // ─────────────────────────────────────────────────────────────
    #[error("CIXX-010: Expected {expected} at '{location}' but found {found}")]
    ExpectedType {
        location: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("CIXX-011: Missing required property '{field}' at '{location}'")]
    MissingField { location: String, field: String },

    #[error("CIXX-012: Invalid job ID '{id}': {reason}")]
    InvalidJobId { id: String, reason: String },

    // ─────────────────────────────────────────────────────────────
    // Template errors (CIXX-020 to CIXX-029)
    // ─────────────────────────────────────────────────────────────
    #[error("CIXX-020: Incomplete expression in: {template}")]
    MalformedTemplate { template: String },

    // ─────────────────────────────────────────────────────────────
    // Job graph errors (CIXX-030 to CIXX-039)
    // ─────────────────────────────────────────────────────────────
    #[error("CIXX-030: Job '{job}' needs unknown job '{dependency}'")]
    UnknownDependency { job: String, dependency: String },

    #[error("CIXX-031: Cycle detected in needs: {cycle}")]
    CycleDetected { cycle: String },

    #[error("CIXX-032: Job '{job}' is not a pipeline job of this workflow")]
    NotAPipelineJob { job: String },

    // ─────────────────────────────────────────────────────────────
    // Reusable pipeline errors (CIXX-040 to CIXX-049)
    // ─────────────────────────────────────────────────────────────
    #[error("CIXX-040: Job '{job}' does not provide required input '{input}' of '{}'", .pipeline.display())]
    MissingInput {
        job: String,
        input: String,
        pipeline: PathBuf,
    },

    // ─────────────────────────────────────────────────────────────
    // Configuration errors (CIXX-050 to CIXX-059)
    // ─────────────────────────────────────────────────────────────
    #[error("CIXX-050: Invalid configuration '{}': {details}", .path.display())]
    InvalidConfig { path: PathBuf, details: String },
}

impl FixSuggestion for CixxError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            CixxError::Io { .. } => Some("Check file path and permissions"),
            CixxError::Parse { .. } => Some("Check YAML syntax: indentation and quoting"),
            CixxError::Serialize { .. } => None,
            CixxError::ExpectedType { .. } => {
                Some("Fix the value at the reported location to have the expected type")
            }
            CixxError::MissingField { .. } => Some("Add the missing property to the job"),
            CixxError::InvalidJobId { .. } => {
                Some("Job IDs start with a letter or '_' and contain only letters, digits, '-' or '_'")
            }
            CixxError::MalformedTemplate { .. } => {
                Some("Close every '${{' with '}}' and every quote inside expressions with \"'\"")
            }
            CixxError::UnknownDependency { .. } => {
                Some("Verify the job exists in the workflow or in an expanded cixx-uses pipeline")
            }
            CixxError::CycleDetected { .. } => {
                Some("Remove the circular dependency - jobs cannot (transitively) need themselves")
            }
            CixxError::NotAPipelineJob { .. } => {
                Some("Only jobs with 'steps' are assembled; build the graph from the same workflow")
            }
            CixxError::MissingInput { .. } => {
                Some("Pass the input in the job's 'with:' block or give it a default")
            }
            CixxError::InvalidConfig { .. } => Some("Check the TOML syntax and key names"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_codes() {
        let err = CixxError::CycleDetected {
            cycle: "a → b → a".into(),
        };
        assert!(err.to_string().contains("CIXX-031"));
        assert!(err.to_string().contains("a → b → a"));

        let err = CixxError::ExpectedType {
            location: "jobs.build.paths[1]".into(),
            expected: "a string",
            found: "number",
        };
        assert_eq!(
            err.to_string(),
            "CIXX-010: Expected a string at 'jobs.build.paths[1]' but found number"
        );
    }

    #[test]
    fn every_reference_error_has_a_suggestion() {
        let err = CixxError::UnknownDependency {
            job: "test".into(),
            dependency: "biuld".into(),
        };
        assert!(err.fix_suggestion().is_some());
        assert!(err.to_string().contains("biuld"));
    }
}
