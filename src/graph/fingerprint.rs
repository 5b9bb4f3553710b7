//! Cache key generation
//!
//! Keys are computed on the runner by a generated bash script, because the
//! content they hash is the revision being built. For each job, in
//! topological order:
//!
//! ```text
//! forced:  <job>-<random nonce>
//! else:    <job>-hash(tree/blob ids of paths, keys of direct needs, extra-key)
//! ```
//!
//! Upstream keys rather than upstream content are hashed, so a change
//! anywhere propagates down the graph without re-hashing the transitive
//! file set.

use crate::expression::{placeholder, scan, Token};
use crate::util::{path, shell};

use super::flow::JobGraph;

/// Expands to a fresh number on every run, forcing a cache miss
pub const RANDOM_NONCE: &str = "$RANDOM$RANDOM";

/// Hashes the object ids of the paths before `--` and the strings after it
pub const HASH_FUNCTION: &str = r#"function git_hash_files {
    local files="true"

    for file in "$@"
    do
        if [ $files = "true" ]
        then
            if [ "$file" = "--" ]
            then
                files="false"
            elif [ -n "$file" ]
            then
                sha=$(git rev-parse "${GITHUB_SHA}:$file")
                echo "$file: $sha" 1>&2
                echo -n $sha
            fi
        else
            echo "string: $file" 1>&2
            echo -n "$file"
        fi
    done | git hash-object --stdin
}
"#;

/// Output name under which the key generation step exposes a job's key
pub fn key_step_output(job_name: &str) -> &str {
    job_name
}

/// One `git_hash_files` path argument: literal runs single-quoted, and
/// `${{ }}` spans left for the runner to substitute inside double quotes
fn path_argument(declared: &str) -> String {
    let normalized = path::normalize(declared);
    let Ok(tokens) = scan(&normalized) else {
        return shell::quote(&normalized);
    };
    tokens
        .iter()
        .filter_map(|token| match token {
            Token::Literal("") => None,
            Token::Literal(text) => Some(shell::quote(text)),
            Token::Expression(expression) => {
                Some(format!("\"{}\"", placeholder(expression.trim())))
            }
        })
        .collect()
}

/// Bash expression computing the key suffix of one job
fn key_suffix(graph: &JobGraph, job_name: &str) -> String {
    if graph.is_implicitly_forced(job_name) {
        return RANDOM_NONCE.to_string();
    }
    let Some(details) = graph.get(job_name) else {
        return RANDOM_NONCE.to_string();
    };

    let mut args: Vec<String> = details.paths.iter().map(|p| path_argument(p)).collect();
    args.push("--".to_string());
    args.extend(
        graph
            .pipeline_needs(job_name)
            .iter()
            .map(|(need, _)| format!("\"${{keys[{need}]}}\"")),
    );
    if !details.extra_key.is_empty() {
        args.push(shell::quote(&details.extra_key));
    }

    format!("$(git_hash_files {})", args.join(" "))
}

/// The full key generation script: hash helper, then one assignment and
/// one `set-output` per job in dependency order.
pub fn key_script(graph: &JobGraph) -> String {
    let mut script = String::from(HASH_FUNCTION);
    script.push_str("declare -A keys\n");

    for (name, _) in graph.topological() {
        script.push_str(&format!(
            "keys[{name}]=\"{name}-{}\"\necho \"::set-output name={}::${{keys[{name}]}}\"\n",
            key_suffix(graph, name),
            key_step_output(name),
        ));
    }

    script
}
