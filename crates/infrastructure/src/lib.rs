//! # Quant Ingest Infrastructure
//!
//! 基础设施层 - 存储与外部调用
//!
//! ## 职责
//!
//! 1. **存储引擎**: 表结构注册、参数化 SQL、批量幂等写入（Postgres / 内存两种实现）
//! 2. **仓储**: 标的、日线、交易日历、任务断点与存储行之间的映射
//! 3. **重试**: 瞬时错误的退避重试
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quant_ingest_infrastructure::storage::{PgStorageEngine, StorageEngine};
//! use quant_ingest_infrastructure::repositories::CheckpointStore;
//!
//! let storage: Arc<dyn StorageEngine> = Arc::new(PgStorageEngine::new(pool));
//! storage.ensure_base_structure().await?;
//! let checkpoints = CheckpointStore::new(storage.clone());
//! ```

pub mod repositories;
pub mod retry;
pub mod storage;

pub use repositories::{
    CalendarRepository, CheckpointStore, DailyBarRepository, InstrumentRepository,
};
pub use retry::{retry, retry_if, RetryPolicy};
pub use storage::{MemoryStorageEngine, PgStorageEngine, StorageEngine};
