//! 任务断点
//!
//! 只由批量采集任务读写；每次保存整体覆盖，任务完成后删除。

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 任务统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskStats {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
    pub processed: u64,
    pub records: u64,
}

/// 任务断点
///
/// 落库结构: `{stats, processed_symbols, retry_symbols, current_batch, updated_at}`，
/// `task_id` 是存储主键，不写入数据体。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCheckpoint {
    #[serde(skip)]
    pub task_id: String,
    pub stats: TaskStats,
    /// 已处理完毕、续跑时跳过的代码
    pub processed_symbols: BTreeSet<String>,
    /// 因瞬时错误失败、续跑时需要重试的代码
    #[serde(default)]
    pub retry_symbols: BTreeSet<String>,
    pub current_batch: usize,
    pub updated_at: DateTime<Utc>,
}

impl TaskCheckpoint {
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            stats: TaskStats::default(),
            processed_symbols: BTreeSet::new(),
            retry_symbols: BTreeSet::new(),
            current_batch: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn is_processed(&self, symbol: &str) -> bool {
        self.processed_symbols.contains(symbol)
    }

    pub fn mark_processed(&mut self, symbol: &str) {
        self.retry_symbols.remove(symbol);
        self.processed_symbols.insert(symbol.to_string());
    }

    pub fn mark_retry(&mut self, symbol: &str) {
        self.retry_symbols.insert(symbol.to_string());
    }
}
