pub mod runner;

pub use runner::{run_job, JobError, JobSummary};
