//! 任务流程

pub mod daily_bar_job;

pub use daily_bar_job::{collect_task_id, DailyBarJob, DailyBarJobOptions, JobOutcome, JobStatus};
