//! Document normalisation run after reusable pipelines are expanded
//!
//! - `x-` top-level properties only hold YAML anchors and are dropped
//! - nested step arrays (from YAML references) are flattened, bare string
//!   steps become `run:` steps
//! - `jobs.<name>` references become `needs.<name>`, the form GitHub
//!   understands; `needs: [${{ jobs.<name> }}]` becomes `needs: [<name>]`

use serde_json::{json, Value};
use tracing::debug;

use crate::error::Result;
use crate::expression::{full_expression, substitute_identifiers_in_value};
use crate::graph::read_needs;
use crate::value::{as_array, into_object, required, Object};

/// Apply every normalisation step in order
pub fn normalize(document: Object) -> Result<Object> {
    let document = remove_x_properties(document);
    let document = flatten_nested_steps(document)?;
    replace_jobs_references(document)
}

/// Return the document without `x-` top-level properties
pub fn remove_x_properties(document: Object) -> Object {
    document
        .into_iter()
        .filter(|(key, _)| !key.starts_with("x-"))
        .collect()
}

/// Rewrite every job body, keeping job order
fn map_jobs<F>(mut document: Object, mut f: F) -> Result<Object>
where
    F: FnMut(&str, Object) -> Result<Object>,
{
    let jobs = into_object(required(&document, "jobs", "top level")?.clone(), "jobs")?;
    let mut new_jobs = Object::new();
    for (job_key, job) in jobs {
        let job = into_object(job, &format!("jobs.{job_key}"))?;
        let new_job = f(&job_key, job)?;
        new_jobs.insert(job_key, Value::Object(new_job));
    }
    document.insert("jobs".to_string(), Value::Object(new_jobs));
    Ok(document)
}

fn flatten_into(steps: &[Value], out: &mut Vec<Value>) {
    for step in steps {
        match step {
            Value::Array(nested) => flatten_into(nested, out),
            Value::String(run) => out.push(json!({ "run": run })),
            other => out.push(other.clone()),
        }
    }
}

/// Flatten nested step arrays and expand bare string steps into `run:` steps
pub fn flatten_nested_steps(document: Object) -> Result<Object> {
    map_jobs(document, |job_key, mut job| {
        let steps = match job.get("steps") {
            None | Some(Value::Null) => return Ok(job),
            Some(steps) => as_array(steps, &format!("jobs.{job_key}.steps"))?,
        };
        if steps.is_empty() {
            return Ok(job);
        }

        let mut flat = Vec::with_capacity(steps.len());
        flatten_into(steps, &mut flat);
        debug!(job = job_key, steps = flat.len(), "flattened steps");
        job.insert("steps".to_string(), Value::Array(flat));
        Ok(job)
    })
}

/// `${{ jobs.x }}` as a needs entry names job `x`
fn job_reference(need: &str) -> Result<String> {
    Ok(match full_expression(need)? {
        Some(expression) => match expression.strip_prefix("jobs.") {
            Some(name) => name.to_string(),
            None => need.to_string(),
        },
        None => need.to_string(),
    })
}

/// Rewrite `jobs.` references to `needs.` throughout every job
pub fn replace_jobs_references(document: Object) -> Result<Object> {
    let replacements = [("jobs".to_string(), "needs".to_string())];
    map_jobs(document, |job_key, job| {
        let new_needs = read_needs(&job, &format!("jobs.{job_key}"))?
            .iter()
            .map(|need| job_reference(need))
            .collect::<Result<Vec<_>>>()?;

        let job_value = Value::Object(job);
        let replaced = substitute_identifiers_in_value(&job_value, &replacements)?.into_owned();
        let mut new_job = into_object(replaced, &format!("jobs.{job_key}"))?;

        if !new_needs.is_empty() {
            new_job.insert(
                "needs".to_string(),
                Value::Array(new_needs.into_iter().map(Value::String).collect()),
            );
        }
        Ok(new_job)
    })
}
