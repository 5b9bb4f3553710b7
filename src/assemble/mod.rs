//! Job Assembler - synthesized orchestration around pipeline jobs
//!
//! - `init_job`: the job computing keys and cache hits for every pipeline job
//! - `pipeline_job`: checkout, restore, output wiring and commit around the
//!   authored steps of one job, plus its run-gating condition
//! - `checkout`: sparse cone patterns for the declared paths

mod checkout;
mod init_job;
mod pipeline_job;

pub use checkout::{clone_script, clone_step, sparse_patterns};
pub use init_job::init_job;
pub use pipeline_job::assemble;
