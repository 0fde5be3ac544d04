pub mod job_runner;

pub use job_runner::{JobObservation, JobRunner};
