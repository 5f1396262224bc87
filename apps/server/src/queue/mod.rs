//! Background job queue

mod helpers;
mod inline;
mod models;
mod postgres;
mod traits;

pub use helpers::{list_jobs, try_dequeue_job};
pub use inline::InlineJobQueue;
pub use models::{job_types, Job, JobPriority, JobStatus, RetryPolicy};
pub use postgres::PostgresJobQueue;
pub use traits::JobQueue;
