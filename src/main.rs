//! cixx CLI - compile a CI++ pipeline into a GitHub Actions workflow

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cixx::document::to_yaml;
use cixx::{compile, preprocess, CixxError, CompilerConfig, FixSuggestion, FsLoader};

#[derive(Parser)]
#[command(name = "cixx")]
#[command(about = "Compile a CI++ pipeline to a GitHub Actions workflow")]
#[command(version)]
struct Cli {
    /// Input CI++ YAML file
    input: PathBuf,

    /// GitHub Actions workflow YAML file (default: stdout)
    output: Option<PathBuf>,

    /// Stop after expanding cixx-uses and flattening
    #[arg(short = 'E', long)]
    preprocess_only: bool,

    /// TOML file overriding compiler settings
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log debug details to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so the workflow on stdout stays clean
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<CixxError>() {
            Some(error) => {
                eprintln!("{} {}", "Error:".red().bold(), error);
                if let Some(suggestion) = error.fix_suggestion() {
                    eprintln!("  {} {}", "Fix:".yellow(), suggestion);
                }
            }
            None => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };

    let document = preprocess(&cli.input, &FsLoader)?;
    let document = if cli.preprocess_only {
        document
    } else {
        compile(document, &config)?
    };

    let yaml = to_yaml(&Value::Object(document))?;
    match &cli.output {
        Some(path) => write_output(path, &yaml)?,
        None => io::stdout()
            .write_all(yaml.as_bytes())
            .context("Failed to write workflow to stdout")?,
    }
    Ok(())
}

fn write_output(path: &Path, yaml: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory '{}'", parent.display()))?;
    }
    fs::write(path, yaml).with_context(|| format!("Failed to write '{}'", path.display()))?;
    info!(output = %path.display(), "wrote workflow");
    Ok(())
}
