//! Job Graph Model - cache keys and skip decisions for pipeline jobs
//!
//! - `details`: per-job settings (`paths`, `output-paths`, `extra-key`,
//!   `force`, `needs`, `outputs`)
//! - `flow`: the needs graph (validation, order, implicit force)
//! - `fingerprint`: the generated key script

mod details;
mod fingerprint;
mod flow;

pub use details::{outputs_file, read_needs, JobDetails, CIXX_PROPERTIES};
pub use fingerprint::{key_script, key_step_output, HASH_FUNCTION, RANDOM_NONCE};
pub use flow::JobGraph;

/// Name of the initialization job output holding a job's cache key
pub fn key_output(job_name: &str) -> String {
    format!("key-{job_name}")
}

/// Name of the initialization job output telling whether a job must run
pub fn needs_build_output(job_name: &str) -> String {
    format!("needs-build-{job_name}")
}
