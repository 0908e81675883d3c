//! # Quant Ingest Orchestration
//!
//! 编排层 - 批量采集任务
//!
//! 负责把标的列表切成批次、逐只拉取日线并落库，进度写入任务断点，
//! 中断后按同一个 task_id 续跑。

pub mod workflow;

pub use workflow::{DailyBarJob, DailyBarJobOptions, JobOutcome, JobStatus};
