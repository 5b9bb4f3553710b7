//! Rewrites one pipeline job around its cache entry
//!
//! ```text
//! Git clone ─▶ GNU tar / zstd ─▶ Restore <dep>… ─▶ Read outputs
//!     ─▶ authored steps ─▶ Save outputs ─▶ Commit build
//! ```

use serde_json::{json, Value};

use crate::config::CompilerConfig;
use crate::error::{CixxError, Result};
use crate::expression::{full_expression, placeholder, substitute_identifiers_in_value, to_json_template};
use crate::graph::{key_output, needs_build_output, outputs_file, JobDetails, JobGraph, CIXX_PROPERTIES};
use crate::util::shell;
use crate::value::{as_array, as_object, required, type_name, Object};

use super::checkout::clone_step;

/// Heredoc delimiter of the generated outputs file
const OUTPUTS_EOF: &str = "__CIXX_OUTPUTS_EOF__";

/// Keeps the cache archive format identical across runner operating systems
fn compression_steps() -> [Value; 2] {
    [
        // BSD tar on Windows produces archives the Linux restore misses
        json!({
            "if": "runner.os == 'Windows'",
            "name": "Use GNU tar instead BSD tar",
            "shell": "cmd",
            "run": r#"echo C:\Program Files\Git\usr\bin>>"%GITHUB_PATH%""#,
        }),
        // Without zstd the cache action falls back to gzip and the key misses
        json!({
            "name": "Check zstd on PATH",
            "shell": "bash",
            "run": "which zstd",
        }),
    ]
}

fn init_output(config: &CompilerConfig, output: &str) -> String {
    format!("needs.{}.outputs.{output}", config.init_job_id)
}

fn restore_step(config: &CompilerConfig, dependency: &str, details: &JobDetails) -> Value {
    json!({
        "name": format!("Restore {dependency}"),
        "uses": config.cache.uses("restore"),
        "with": {
            "path": details.output_paths.join("\n"),
            "key": placeholder(&init_output(config, &key_output(dependency))),
        },
    })
}

/// Exposes each dependency's outputs file as a step output, encoded the way
/// the runner decodes `set-output` values (`%`, CR and LF escaped)
fn read_outputs_step(config: &CompilerConfig, dependencies: &[(&str, &JobDetails)]) -> Option<Value> {
    let mut run = String::new();
    for (dependency, _) in dependencies.iter().filter(|(_, d)| d.outputs.is_some()) {
        run.push_str(&format!(
            "output=\"$(cat {file})\"\n\
             output=\"${{output//'%'/'%25'}}\"\n\
             output=\"${{output//$'\\r'/'%0D'}}\"\n\
             output=\"${{output//$'\\n'/'%0A'}}\"\n\
             echo \"::set-output name={dependency}::$output\"\n",
            file = shell::quote(&outputs_file(dependency)),
        ));
    }
    if run.is_empty() {
        return None;
    }
    Some(json!({
        "name": "Read outputs",
        "id": config.outputs_step_id,
        "shell": "bash",
        "run": run,
    }))
}

fn save_outputs_step(job_name: &str, outputs: &Value) -> Result<Value> {
    Ok(json!({
        "name": "Save outputs",
        "shell": "bash",
        "run": format!(
            "cd \"$GITHUB_WORKSPACE\"\ncat <<'{OUTPUTS_EOF}' > {file}\n{template}\n{OUTPUTS_EOF}\n",
            file = shell::quote(&outputs_file(job_name)),
            template = to_json_template(outputs)?,
        ),
    }))
}

fn commit_step(config: &CompilerConfig, job_name: &str, details: &JobDetails) -> Value {
    json!({
        "name": "Commit build",
        "uses": config.cache.uses("save"),
        "with": {
            "path": details.output_paths.join("\n"),
            "key": placeholder(&init_output(config, &key_output(job_name))),
        },
    })
}

/// Authored job condition as a bare expression
fn authored_condition(job_name: &str, condition: &Value) -> Result<String> {
    match condition {
        Value::Bool(b) => Ok(b.to_string()),
        Value::String(s) => Ok(match full_expression(s)? {
            Some(expression) => expression.to_string(),
            None => s.trim().to_string(),
        }),
        other => Err(CixxError::ExpectedType {
            location: format!("jobs.{job_name}.if"),
            expected: "a string or bool",
            found: type_name(other),
        }),
    }
}

fn gating_condition(
    job_name: &str,
    details: &JobDetails,
    forced: bool,
    authored: Option<String>,
    config: &CompilerConfig,
) -> String {
    let init = &config.init_job_id;
    let mut conditions = vec![
        "always()".to_string(),
        format!("(needs.{init}.result == 'success')"),
    ];
    conditions.extend(details.needs.iter().map(|need| {
        format!("(needs.{need}.result == 'success' || needs.{need}.result == 'skipped')")
    }));
    if !forced {
        conditions.push(format!(
            "({} == 'true')",
            init_output(config, &needs_build_output(job_name))
        ));
    }
    if let Some(authored) = authored {
        conditions.push(format!("({authored})"));
    }
    conditions.join(" && ")
}

/// Rewrite pipeline job `job_name` into its cache-aware form
pub fn assemble(
    job_name: &str,
    job: Object,
    graph: &JobGraph,
    config: &CompilerConfig,
) -> Result<Object> {
    let location = format!("jobs.{job_name}");
    let details = graph.get(job_name).ok_or_else(|| CixxError::NotAPipelineJob {
        job: job_name.to_string(),
    })?;
    let forced = graph.is_implicitly_forced(job_name);
    let dependencies = graph.pipeline_needs(job_name);

    required(&job, "runs-on", &location)?;
    let steps = as_array(required(&job, "steps", &location)?, &format!("{location}.steps"))?;
    for (i, step) in steps.iter().enumerate() {
        as_object(step, &format!("{location}.steps[{i}]"))?;
    }

    // needs.<dep>.outputs reads the local copy made by the Read outputs step
    let replacements: Vec<(String, String)> = dependencies
        .iter()
        .map(|(dependency, dependency_details)| {
            let target = match dependency_details.outputs {
                Some(_) => format!("fromJSON(steps.{}.outputs.{dependency})", config.outputs_step_id),
                None => "null".to_string(),
            };
            (format!("needs.{dependency}.outputs"), target)
        })
        .collect();

    let authored_steps = steps
        .iter()
        .map(|step| Ok(substitute_identifiers_in_value(step, &replacements)?.into_owned()))
        .collect::<Result<Vec<_>>>()?;

    let mut steps: Vec<Value> = Vec::with_capacity(authored_steps.len() + 8);
    steps.extend(clone_step(&details.paths));
    steps.extend(compression_steps());
    steps.extend(
        dependencies
            .iter()
            .filter(|(_, d)| !d.output_paths.is_empty())
            .map(|(dependency, d)| restore_step(config, dependency, d)),
    );
    steps.extend(read_outputs_step(config, &dependencies));
    steps.extend(authored_steps);

    if let Some(outputs) = &details.outputs {
        let outputs = substitute_identifiers_in_value(outputs, &replacements)?;
        steps.push(save_outputs_step(job_name, &outputs)?);
    }
    if !details.output_paths.is_empty() || !forced {
        steps.push(commit_step(config, job_name, details));
    }

    let authored = job
        .get("if")
        .map(|condition| authored_condition(job_name, condition))
        .transpose()?;

    let mut needs = vec![Value::String(config.init_job_id.clone())];
    needs.extend(details.needs.iter().cloned().map(Value::String));

    let mut out = Object::new();
    out.insert(
        "if".to_string(),
        Value::String(gating_condition(job_name, details, forced, authored, config)),
    );
    out.insert("needs".to_string(), Value::Array(needs));
    out.extend(job.into_iter().filter(|(key, _)| {
        key != "if" && key != "needs" && !CIXX_PROPERTIES.contains(&key.as_str())
    }));
    out.insert("steps".to_string(), Value::Array(steps));
    Ok(out)
}
