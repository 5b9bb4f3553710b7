//! End-to-end compilation tests
//!
//! Each test feeds a CI++ document through preprocess + compile using an
//! in-memory loader and inspects the generated workflow.

use std::path::Path;

use cixx::{compile, preprocess, CixxError, CompilerConfig, MemoryLoader};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn compile_yaml(yaml: &str) -> cixx::Result<Value> {
    let loader = MemoryLoader::new().with("ci.yml", yaml);
    let document = preprocess(Path::new("ci.yml"), &loader)?;
    Ok(Value::Object(compile(document, &CompilerConfig::default())?))
}

fn run_of<'a>(job: &'a Value, name: &str) -> &'a str {
    job["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["name"] == name)
        .and_then(|s| s["run"].as_str())
        .unwrap_or_else(|| panic!("no step named {name}"))
}

const BUILD_AND_TEST: &str = r#"
on:
  push:
    branches: [main]
jobs:
  build:
    runs-on: ubuntu-latest
    paths: [src/, Cargo.toml]
    output-paths: [target/release/app]
    outputs:
      artifact: ${{ steps.x.outputs.path }}
    steps:
      - id: x
        run: cargo build --release && echo "::set-output name=path::target/release/app"
  test:
    runs-on: ubuntu-latest
    needs: [build]
    steps:
      - run: ./${{ needs.build.outputs.artifact }} --test
"#;

// ═══════════════════════════════════════════════════════════════
// BUILD → TEST
// ═══════════════════════════════════════════════════════════════

#[test]
fn test_reads_build_outputs_locally() {
    let out = compile_yaml(BUILD_AND_TEST).unwrap();
    let test = &out["jobs"]["test"];

    let authored = test["steps"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s.get("name").is_none())
        .unwrap();
    assert_eq!(
        authored["run"],
        "./${{ fromJSON(steps.cixx-outputs.outputs.build).artifact }} --test"
    );
    assert!(!serde_json::to_string(test).unwrap().contains("needs.build.outputs"));

    let condition = test["if"].as_str().unwrap();
    assert!(condition.contains("needs.cixx-init.result == 'success'"));
    assert!(condition.contains("(needs.cixx-init.outputs.needs-build-test == 'true')"));
    assert_eq!(test["needs"], json!(["cixx-init", "build"]));
}

#[test]
fn init_job_and_triggers() {
    let out = compile_yaml(BUILD_AND_TEST).unwrap();
    assert_eq!(out["on"], json!({"push": {"branches": ["main"]}}));

    let names: Vec<&String> = out["jobs"].as_object().unwrap().keys().collect();
    assert_eq!(names, ["cixx-init", "build", "test"]);

    let init = &out["jobs"]["cixx-init"];
    let keys = run_of(init, "Generate keys");
    assert!(keys.contains(r#"keys[build]="build-$(git_hash_files 'src' 'Cargo.toml' --)""#));
    assert!(keys.contains(r#"keys[test]="test-$(git_hash_files '.' -- "${keys[build]}")""#));
    assert_eq!(
        init["outputs"]["needs-build-build"],
        "${{ steps.check-cache-build.outputs.cache-hit != 'true' }}"
    );
}

#[test]
fn build_saves_outputs_and_commits() {
    let out = compile_yaml(BUILD_AND_TEST).unwrap();
    let build = &out["jobs"]["build"];

    let clone = run_of(build, "Git clone");
    assert!(clone.contains("/*\n!/*/\n/src/\nEOF"));

    let save = run_of(build, "Save outputs");
    assert!(save.contains(r#"{"artifact":${{toJson(steps.x.outputs.path)}}}"#));

    let commit = build["steps"]
        .as_array()
        .unwrap()
        .last()
        .unwrap();
    assert_eq!(commit["name"], "Commit build");
    assert_eq!(
        commit["with"],
        json!({
            "path": "target/release/app\n__cixx_outputs_build.json",
            "key": "${{ needs.cixx-init.outputs.key-build }}"
        })
    );
    assert!(build.get("paths").is_none());
    assert!(build.get("outputs").is_none());
}

// ═══════════════════════════════════════════════════════════════
// FORCE AND DETERMINISM
// ═══════════════════════════════════════════════════════════════

#[test]
fn force_is_infectious() {
    let out = compile_yaml(
        r#"
jobs:
  a:
    runs-on: x
    force: true
    steps: [make]
  b:
    runs-on: x
    force: false
    needs: a
    steps: [make test]
"#,
    )
    .unwrap();

    let b_if = out["jobs"]["b"]["if"].as_str().unwrap();
    assert!(!b_if.contains("needs-build-b"));
    assert!(out["jobs"]["cixx-init"]["outputs"].get("needs-build-b").is_none());

    let keys = run_of(&out["jobs"]["cixx-init"], "Generate keys");
    assert!(keys.contains(r#"keys[b]="b-$RANDOM$RANDOM""#));
}

#[test]
fn identical_input_gives_identical_output() {
    assert_eq!(
        compile_yaml(BUILD_AND_TEST).unwrap(),
        compile_yaml(BUILD_AND_TEST).unwrap()
    );
}

#[test]
fn extra_key_changes_only_that_key() {
    let changed = BUILD_AND_TEST.replace(
        "    output-paths: [target/release/app]",
        "    output-paths: [target/release/app]\n    extra-key: v2",
    );
    let out = compile_yaml(&changed).unwrap();
    let keys = run_of(&out["jobs"]["cixx-init"], "Generate keys");
    assert!(keys.contains(r#"keys[build]="build-$(git_hash_files 'src' 'Cargo.toml' -- 'v2')""#));
    // test hashes build's key, so it changes with it at run time
    assert!(keys.contains(r#""${keys[build]}""#));
}

// ═══════════════════════════════════════════════════════════════
// FLATTENING
// ═══════════════════════════════════════════════════════════════

#[test]
fn anchors_and_nested_steps_are_flattened() {
    let out = compile_yaml(
        r#"
x-setup: &setup
  - uses: actions/setup-node@v4
  - npm ci
jobs:
  lint:
    runs-on: ubuntu-latest
    steps:
      - *setup
      - npm run lint
"#,
    )
    .unwrap();
    assert!(out.get("x-setup").is_none());

    let authored: Vec<&Value> = out["jobs"]["lint"]["steps"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s.get("name").is_none())
        .collect();
    assert_eq!(
        authored,
        [
            &json!({"uses": "actions/setup-node@v4"}),
            &json!({"run": "npm ci"}),
            &json!({"run": "npm run lint"}),
        ]
    );
}

#[test]
fn jobs_references_work_like_needs() {
    let out = compile_yaml(
        r#"
jobs:
  build:
    runs-on: x
    outputs: { v: "1" }
    steps: [make]
  test:
    runs-on: x
    needs: ["${{ jobs.build }}"]
    steps:
      - run: echo ${{ jobs.build.outputs.v }}
"#,
    )
    .unwrap();
    let test = &out["jobs"]["test"];
    assert_eq!(test["needs"], json!(["cixx-init", "build"]));
    assert!(serde_json::to_string(test)
        .unwrap()
        .contains("echo ${{ fromJSON(steps.cixx-outputs.outputs.build).v }}"));
}

// ═══════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════

#[test]
fn cycle_is_fatal() {
    let err = compile_yaml(
        r#"
jobs:
  a: { runs-on: x, needs: [b], steps: [] }
  b: { runs-on: x, needs: [a], steps: [] }
"#,
    )
    .unwrap_err();
    assert!(matches!(err, CixxError::CycleDetected { .. }));
}

#[test]
fn malformed_template_is_fatal() {
    let err = compile_yaml(
        r#"
jobs:
  a:
    runs-on: x
    steps:
      - run: echo ${{ jobs.b
"#,
    )
    .unwrap_err();
    assert!(matches!(err, CixxError::MalformedTemplate { .. }));
}

#[test]
fn shape_error_names_location() {
    let err = compile_yaml("jobs:\n  a:\n    runs-on: x\n    paths: src\n    steps: []\n").unwrap_err();
    assert_eq!(
        err.to_string(),
        "CIXX-010: Expected an array at 'jobs.a.paths' but found string"
    );
}
