//! Compiler pipeline
//!
//! ```text
//! load ─▶ expand cixx-uses ─▶ normalize ─▶ classify jobs ─▶ JobGraph
//!      ─▶ init job + assembled pipeline jobs ─▶ workflow
//! ```
//!
//! [`preprocess`] stops after normalisation; [`compile`] runs the rest.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::assemble::{assemble, init_job};
use crate::config::CompilerConfig;
use crate::document::DocumentLoader;
use crate::error::{CixxError, Result};
use crate::graph::{JobDetails, JobGraph};
use crate::reusable::{self, CALL_TRIGGER};
use crate::transform;
use crate::value::{as_object, into_object, required, Object};

static JOB_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").expect("job id pattern"));

/// Check that `id` is usable as a job ID and in `needs.<id>` expressions
pub fn validate_job_id(id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(CixxError::InvalidJobId {
            id: id.to_string(),
            reason: "cannot be empty".into(),
        });
    }
    if !JOB_ID_PATTERN.is_match(id) {
        return Err(CixxError::InvalidJobId {
            id: id.to_string(),
            reason: "must start with a letter or '_' and contain only letters, digits, '-' or '_'"
                .into(),
        });
    }
    Ok(())
}

/// Expand reusable pipelines and normalize, without cache compilation
#[instrument(skip(loader), fields(path = %path.display()))]
pub fn preprocess<L: DocumentLoader + ?Sized>(path: &Path, loader: &L) -> Result<Object> {
    let document = reusable::expand(path, loader)?;
    let document = transform::normalize(document)?;
    debug!("normalized workflow");
    Ok(document)
}

/// Drop the reusable pipeline interface from the top-level triggers
fn strip_call_trigger(mut document: Object) -> Object {
    if let Some(Value::Object(on)) = document.get("on") {
        if on.contains_key(CALL_TRIGGER) {
            let on: Object = on
                .iter()
                .filter(|(key, _)| *key != CALL_TRIGGER)
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            document.insert("on".to_string(), Value::Object(on));
        }
    }
    document
}

/// Compile a preprocessed document into a cache-aware workflow
pub fn compile(document: Object, config: &CompilerConfig) -> Result<Object> {
    let mut document = strip_call_trigger(document);
    let jobs = into_object(required(&document, "jobs", "top level")?.clone(), "jobs")?;

    validate_job_id(&config.init_job_id)?;
    let mut pipeline = Vec::new();
    let mut passthrough = FxHashSet::default();
    for (name, job) in &jobs {
        validate_job_id(name)?;
        if *name == config.init_job_id {
            return Err(CixxError::InvalidJobId {
                id: name.clone(),
                reason: "reserved for the initialization job".into(),
            });
        }
        let job = as_object(job, &format!("jobs.{name}"))?;
        if job.contains_key("steps") {
            pipeline.push((name.clone(), JobDetails::from_job(name, job)?));
        } else {
            passthrough.insert(name.clone());
        }
    }

    info!(
        pipeline = pipeline.len(),
        passthrough = passthrough.len(),
        "classified jobs"
    );
    let graph = JobGraph::new(pipeline, &passthrough)?;

    let mut new_jobs = Object::new();
    if !graph.is_empty() {
        new_jobs.insert(config.init_job_id.clone(), init_job(&graph, config));
    }
    for (name, job) in jobs {
        if graph.contains(&name) {
            let job = into_object(job, &format!("jobs.{name}"))?;
            let assembled = assemble(&name, job, &graph, config)?;
            debug!(job = %name, "assembled job");
            new_jobs.insert(name, Value::Object(assembled));
        } else {
            new_jobs.insert(name, job);
        }
    }

    document.insert("jobs".to_string(), Value::Object(new_jobs));
    Ok(document)
}

/// Preprocess and compile the pipeline at `path`
pub fn compile_file<L: DocumentLoader + ?Sized>(
    path: &Path,
    loader: &L,
    config: &CompilerConfig,
) -> Result<Object> {
    compile(preprocess(path, loader)?, config)
}
