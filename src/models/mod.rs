pub mod batch;
pub mod job;
pub mod job_spec;
pub mod loaders;

pub use batch::{Batch, WorkItem};
pub use job::{FailedBatch, Job, JobStatus};
pub use job_spec::{JobSpec, ResourceLimits};
pub use loaders::{load_work_items, parse_seed_lines, SeedSource};
