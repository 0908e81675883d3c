//! 任务断点存储
//!
//! 断点以 JSON 存入 `task_checkpoint.progress_data`，每次保存整体覆盖。

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::TaskCheckpoint;

use crate::storage::{Predicate, QueryRequest, Record, StorageEngine, TableRef};

const CONFLICT_KEY: &[&str] = &["task_id"];
const UPDATE_COLUMNS: &[&str] = &["progress_data", "updated_at"];

#[derive(Clone)]
pub struct CheckpointStore {
    storage: Arc<dyn StorageEngine>,
}

impl CheckpointStore {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    fn check_task_id(task_id: &str) -> Result<()> {
        if task_id.trim().is_empty() {
            return Err(IngestError::validation("task_id 不能为空"));
        }
        Ok(())
    }

    /// 保存断点，已存在时覆盖
    pub async fn save(&self, checkpoint: &TaskCheckpoint) -> Result<()> {
        Self::check_task_id(&checkpoint.task_id)?;
        let progress = serde_json::to_value(checkpoint)?;
        let record = Record::new()
            .with("task_id", checkpoint.task_id.as_str())
            .with("progress_data", progress)
            .with("updated_at", Utc::now().naive_utc());

        self.storage
            .bulk_upsert(&TableRef::Checkpoint, &[record], CONFLICT_KEY, UPDATE_COLUMNS)
            .await?;
        debug!(
            "保存断点 {}: 已处理 {} 只",
            checkpoint.task_id,
            checkpoint.processed_symbols.len()
        );
        Ok(())
    }

    /// 读取断点；数据体无法解析时返回 [`IngestError::CheckpointCorrupt`]
    pub async fn load(&self, task_id: &str) -> Result<Option<TaskCheckpoint>> {
        Self::check_task_id(task_id)?;
        let request = QueryRequest::new()
            .filter(Predicate::new().eq("task_id", task_id))
            .select(&["progress_data"])
            .limit(1);
        let rows = self.storage.query(&TableRef::Checkpoint, &request).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let blob = row.json("progress_data")?;
        let mut checkpoint: TaskCheckpoint =
            serde_json::from_value(blob).map_err(|e| IngestError::CheckpointCorrupt {
                task_id: task_id.to_string(),
                reason: e.to_string(),
            })?;
        checkpoint.task_id = task_id.to_string();
        Ok(Some(checkpoint))
    }

    /// 删除断点，返回是否存在
    pub async fn delete(&self, task_id: &str) -> Result<bool> {
        Self::check_task_id(task_id)?;
        let removed = self
            .storage
            .delete(&TableRef::Checkpoint, &Predicate::new().eq("task_id", task_id))
            .await?;
        if removed > 0 {
            info!("✓ 已删除任务断点 {}", task_id);
        }
        Ok(removed > 0)
    }
}
