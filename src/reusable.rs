//! Reusable pipelines - `cixx-uses` macro expansion
//!
//! A job with `cixx-uses: <path>` is replaced by the jobs of the referenced
//! pipeline. The child is expanded first, then spliced in:
//!
//! 1. child job names get a prefix no parent job starts with
//!    (`<call-site>-`, lengthened with `-` until unique), and every
//!    `needs.<job>` / `jobs.<job>` reference inside the child follows
//! 2. `inputs.*` is bound from the call site's `with:` block plus declared
//!    defaults; whole-expression leaves take the bound value as is, mixed
//!    templates get an inlined sub-expression
//! 3. the call site's `needs` move to the child's root jobs, and parent jobs
//!    needing the call site need every spliced job instead
//! 4. `needs.<call-site>.outputs.*` and `jobs.<call-site>.outputs.*` are
//!    rewritten to the child's declared `on.cixx_call.outputs`
//!
//! A child declares its interface like a reusable GitHub workflow:
//!
//! ```yaml
//! on:
//!   cixx_call:
//!     inputs:
//!       target: { required: true }
//!       profile: { default: release }
//!     outputs:
//!       binary: ${{ jobs.build.outputs.binary }}
//! ```

use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::document::DocumentLoader;
use crate::error::{CixxError, Result};
use crate::expression::{
    full_expression, substitute_full_expressions, substitute_identifiers_in_value, to_expression,
};
use crate::graph::read_needs;
use crate::util::path;
use crate::value::{as_bool, as_object, as_str, into_object, required, Object};

/// Property naming the child pipeline of a call-site job
pub const USES: &str = "cixx-uses";

/// Trigger key under `on` holding a child pipeline's interface
pub const CALL_TRIGGER: &str = "cixx_call";

const CONTEXTS: [&str; 2] = ["needs", "jobs"];

/// Load `path` and expand every `cixx-uses` job, recursively
#[instrument(skip(loader), fields(path = %path.display()))]
pub fn expand<L: DocumentLoader + ?Sized>(path: &Path, loader: &L) -> Result<Object> {
    let mut stack = Vec::new();
    let document = expand_file(path, loader, &mut stack)?;
    info!(jobs = jobs_len(&document), "expanded reusable pipelines");
    Ok(document)
}

fn jobs_len(document: &Object) -> usize {
    document
        .get("jobs")
        .and_then(Value::as_object)
        .map_or(0, |jobs| jobs.len())
}

/// A spliced call site: its name and the jobs that replaced it
struct CallSite {
    name: String,
    jobs: Vec<String>,
    outputs: Value,
}

fn expand_file<L: DocumentLoader + ?Sized>(
    file: &Path,
    loader: &L,
    stack: &mut Vec<String>,
) -> Result<Object> {
    let key = path::normalize(&file.to_string_lossy());
    if let Some(start) = stack.iter().position(|p| *p == key) {
        let mut cycle = stack[start..].to_vec();
        cycle.push(key);
        return Err(CixxError::CycleDetected {
            cycle: cycle.join(" → "),
        });
    }
    stack.push(key);

    let location = file.display().to_string();
    let mut document = into_object(loader.load(file)?, &location)?;
    let jobs_location = format!("{location}:jobs");
    let jobs = into_object(
        required(&document, "jobs", &location)?.clone(),
        &jobs_location,
    )?;

    let mut new_jobs = Object::new();
    let mut call_sites = Vec::new();

    for (job_key, job) in &jobs {
        let job_location = format!("{jobs_location}.{job_key}");
        let job = as_object(job, &job_location)?;
        let Some(uses) = job.get(USES) else {
            new_jobs.insert(job_key.clone(), Value::Object(job.clone()));
            continue;
        };
        let uses = as_str(uses, &format!("{job_location}.{USES}"))?;

        let child_path = child_path(file, uses);
        debug!(job = %job_key, child = %child_path.display(), "expanding cixx-uses");
        let child = expand_file(&child_path, loader, stack)?;

        let mut prefix = format!("{job_key}-");
        while jobs.keys().chain(new_jobs.keys()).any(|k| k.starts_with(&prefix)) {
            prefix.push('-');
        }

        let child = add_job_prefix(child, &prefix, &child_path)?;
        let inputs = bind_inputs(job_key, job, &child, &child_path)?;
        let child = bind(&Value::Object(child), "inputs", &inputs)?;
        let child = into_object(child, &child_path.display().to_string())?;

        let outputs = call_interface(&child)
            .and_then(|call| call.get("outputs"))
            .cloned()
            .unwrap_or(Value::Null);

        let call_site_needs = read_needs(job, &job_location)?;
        let child_jobs = into_object(
            required(&child, "jobs", &child_path.display().to_string())?.clone(),
            &format!("{}:jobs", child_path.display()),
        )?;

        let mut spliced = Vec::with_capacity(child_jobs.len());
        for (child_key, child_job) in child_jobs {
            let mut child_job = into_object(child_job, &format!("{}:jobs.{child_key}", child_path.display()))?;
            if !call_site_needs.is_empty() && read_needs(&child_job, &child_key)?.is_empty() {
                child_job.insert("needs".to_string(), string_array(&call_site_needs));
            }
            spliced.push(child_key.clone());
            new_jobs.insert(child_key, Value::Object(child_job));
        }

        debug!(job = %job_key, prefix = %prefix, jobs = spliced.len(), "spliced child pipeline");
        call_sites.push(CallSite {
            name: job_key.clone(),
            jobs: spliced,
            outputs,
        });
    }

    if !call_sites.is_empty() {
        new_jobs = rewire_needs(new_jobs, &call_sites)?;
    }
    document.insert("jobs".to_string(), Value::Object(new_jobs));

    let mut full = Vec::new();
    let mut inlined = Vec::new();
    for call_site in &call_sites {
        for context in CONTEXTS {
            let name = format!("{context}.{}.outputs", call_site.name);
            full_replacements(&name, &call_site.outputs, &mut full);
            expression_replacements(&name, &call_site.outputs, &mut inlined)?;
        }
    }
    let document = Value::Object(document);
    let document = substitute_full_expressions(&document, &full)?;
    let document = substitute_identifiers_in_value(&document, &inlined)?.into_owned();

    stack.pop();
    into_object(document, &location)
}

/// Child paths are relative to the directory of the referencing document
fn child_path(parent: &Path, uses: &str) -> PathBuf {
    let joined = parent.parent().unwrap_or_else(|| Path::new("")).join(uses);
    PathBuf::from(path::normalize(&joined.to_string_lossy()))
}

fn call_interface(document: &Object) -> Option<&Object> {
    document
        .get("on")
        .and_then(Value::as_object)
        .and_then(|on| on.get(CALL_TRIGGER))
        .and_then(Value::as_object)
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}

/// Rename every job of `document` to `<prefix><job>`, references included
fn add_job_prefix(mut document: Object, prefix: &str, file: &Path) -> Result<Object> {
    let jobs_location = format!("{}:jobs", file.display());
    let jobs = into_object(
        required(&document, "jobs", &file.display().to_string())?.clone(),
        &jobs_location,
    )?;

    let replacements: Vec<(String, String)> = jobs
        .keys()
        .flat_map(|job| {
            CONTEXTS
                .iter()
                .map(move |context| (format!("{context}.{job}"), format!("{context}.{prefix}{job}")))
        })
        .collect();

    let mut new_jobs = Object::new();
    for (job_key, job) in &jobs {
        let job_location = format!("{jobs_location}.{job_key}");
        let mut job = into_object(job.clone(), &job_location)?;
        if job.contains_key("needs") {
            let needs: Vec<String> = read_needs(&job, &job_location)?
                .into_iter()
                .map(|need| {
                    if jobs.contains_key(&need) {
                        format!("{prefix}{need}")
                    } else {
                        need
                    }
                })
                .collect();
            job.insert("needs".to_string(), string_array(&needs));
        }
        new_jobs.insert(format!("{prefix}{job_key}"), Value::Object(job));
    }
    document.insert("jobs".to_string(), Value::Object(new_jobs));

    let document = Value::Object(document);
    let renamed = substitute_identifiers_in_value(&document, &replacements)?.into_owned();
    into_object(renamed, &file.display().to_string())
}

/// Inputs passed by the call site, completed with the child's declared defaults
fn bind_inputs(job_key: &str, call_site: &Object, child: &Object, child_path: &Path) -> Result<Value> {
    let mut bound = match call_site.get("with") {
        None | Some(Value::Null) => Object::new(),
        Some(with) => as_object(with, &format!("jobs.{job_key}.with"))?.clone(),
    };

    let declared = call_interface(child)
        .and_then(|call| call.get("inputs"))
        .and_then(Value::as_object);

    for (name, declaration) in declared.into_iter().flatten() {
        if bound.contains_key(name) {
            continue;
        }
        let declaration = declaration.as_object();
        if let Some(default) = declaration.and_then(|d| d.get("default")) {
            bound.insert(name.clone(), default.clone());
            continue;
        }
        let is_required = match declaration.and_then(|d| d.get("required")) {
            Some(flag) => as_bool(
                flag,
                &format!("{}:on.{CALL_TRIGGER}.inputs.{name}.required", child_path.display()),
            )?,
            None => false,
        };
        if is_required {
            return Err(CixxError::MissingInput {
                job: job_key.to_string(),
                input: name.clone(),
                pipeline: child_path.to_path_buf(),
            });
        }
    }

    Ok(Value::Object(bound))
}

/// Substitute `<name>` and everything below it with `value` inside `document`
fn bind(document: &Value, name: &str, value: &Value) -> Result<Value> {
    let mut full = Vec::new();
    full_replacements(name, value, &mut full);
    let mut inlined = Vec::new();
    expression_replacements(name, value, &mut inlined)?;

    let document = substitute_full_expressions(document, &full)?;
    Ok(substitute_identifiers_in_value(&document, &inlined)?.into_owned())
}

/// Children before parents, so the most specific path is listed first
fn full_replacements(name: &str, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                full_replacements(&format!("{name}[{i}]"), item, out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                full_replacements(&format!("{name}.{key}"), item, out);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
    out.push((name.to_string(), value.clone()));
}

fn expression_replacements(name: &str, value: &Value, out: &mut Vec<(String, String)>) -> Result<()> {
    match value {
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                expression_replacements(&format!("{name}[{i}]"), item, out)?;
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                expression_replacements(&format!("{name}.{key}"), item, out)?;
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
    }
    out.push((name.to_string(), to_expression(value)?));
    Ok(())
}

/// A needs entry names a job plainly or as `${{ jobs.<job> }}`
fn needed_job(need: &str) -> Result<&str> {
    Ok(match full_expression(need)? {
        Some(expression) => expression
            .strip_prefix("jobs.")
            .or_else(|| expression.strip_prefix("needs."))
            .unwrap_or(need),
        None => need,
    })
}

/// Replace every need on a call site with the jobs spliced in for it
fn rewire_needs(jobs: Object, call_sites: &[CallSite]) -> Result<Object> {
    let spliced: FxHashMap<&str, &[String]> = call_sites
        .iter()
        .map(|site| (site.name.as_str(), site.jobs.as_slice()))
        .collect();

    let mut rewired = Object::new();
    for (job_key, job) in jobs {
        let mut job = into_object(job, &format!("jobs.{job_key}"))?;
        let needs = read_needs(&job, &format!("jobs.{job_key}"))?;
        let mut changed = false;
        let mut new_needs = Vec::with_capacity(needs.len());
        for need in needs {
            match spliced.get(needed_job(&need)?) {
                Some(child_jobs) => {
                    new_needs.extend(child_jobs.iter().cloned());
                    changed = true;
                }
                None => new_needs.push(need),
            }
        }
        if changed {
            job.insert("needs".to_string(), string_array(&new_needs));
        }
        rewired.insert(job_key, Value::Object(job));
    }
    Ok(rewired)
}
