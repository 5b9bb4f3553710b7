//! cixx - compiles CI++ pipelines into cache-aware GitHub Actions workflows

pub mod assemble;
pub mod compile;
pub mod config;
pub mod document;
pub mod error;
pub mod expression;
pub mod graph;
pub mod reusable;
pub mod transform;
pub mod util;
pub mod value;

pub use compile::{compile, compile_file, preprocess, validate_job_id};
pub use config::CompilerConfig;
pub use document::{DocumentLoader, FsLoader, MemoryLoader};
pub use error::{CixxError, FixSuggestion, Result};
pub use graph::{JobDetails, JobGraph};
