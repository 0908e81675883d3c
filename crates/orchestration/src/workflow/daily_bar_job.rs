//! 日线批量采集任务
//!
//! 流程:
//! 1. 读取 `stock_basic` 中的在市标的（按代码升序）
//! 2. 按 task_id 加载断点，已处理的标的直接跳过
//! 3. 分批逐只建表、拉取、写入，每只处理完都覆盖保存断点
//! 4. 全部完成后删除断点；仍有瞬时失败的标的时保留断点，续跑只重试这些标的
//!
//! 同一个 task_id 不能并发运行。

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::time::sleep;
use tracing::{error, info, warn};

use quant_ingest_common::utils::{format_compact, log_elapsed};
use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::{AdjustMode, MarketDataProvider, Symbol, TaskCheckpoint, TaskStats};
use quant_ingest_infrastructure::retry::{retry, RetryPolicy};
use quant_ingest_infrastructure::{
    CheckpointStore, DailyBarRepository, InstrumentRepository, StorageEngine,
};

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_REQUEST_INTERVAL: Duration = Duration::from_millis(500);

/// 按日期区间生成的默认任务 id
pub fn collect_task_id(start: NaiveDate, end: NaiveDate) -> String {
    format!("collect_{}_{}", format_compact(start), format_compact(end))
}

#[derive(Debug, Clone)]
pub struct DailyBarJobOptions {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub adjust: AdjustMode,
    pub batch_size: usize,
    /// 为空时不落断点，中断后无法续跑
    pub task_id: Option<String>,
    /// 忽略已有断点，从头采集
    pub force_redo: bool,
    pub request_interval: Duration,
    pub retry_policy: RetryPolicy,
}

impl DailyBarJobOptions {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            adjust: AdjustMode::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            task_id: None,
            force_redo: false,
            request_interval: DEFAULT_REQUEST_INTERVAL,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_task_id(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// 使用 `collect_{start}_{end}` 作为任务 id
    pub fn with_default_task_id(self) -> Self {
        let task_id = collect_task_id(self.start_date, self.end_date);
        self.with_task_id(task_id)
    }

    fn validate(&self) -> Result<()> {
        if self.start_date > self.end_date {
            return Err(IngestError::validation(format!(
                "开始日期 {} 晚于结束日期 {}",
                self.start_date, self.end_date
            )));
        }
        if self.batch_size == 0 {
            return Err(IngestError::validation("batch_size 必须大于 0"));
        }
        if matches!(&self.task_id, Some(id) if id.trim().is_empty()) {
            return Err(IngestError::validation("task_id 不能为空字符串"));
        }
        Ok(())
    }
}

/// 任务跑完一遍后的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    /// 全部标的已处理，断点已删除
    Completed,
    /// 仍有这么多只标的瞬时失败；有 task_id 时断点保留，续跑只重试它们
    PendingRetry(usize),
}

/// 任务正常结束的结果；中途中止以 `Err` 返回
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub task_id: Option<String>,
    pub status: JobStatus,
    pub stats: TaskStats,
}

/// 单只标的的处理结果
enum EntityOutcome {
    Saved(u64),
    NoData,
}

/// 日线批量采集任务
///
/// # Example
/// ```rust,ignore
/// let job = DailyBarJob::new(storage.clone(), provider);
/// let options = DailyBarJobOptions::new(start, end).with_default_task_id();
/// let outcome = job.run(&options).await?;
/// ```
pub struct DailyBarJob {
    storage: Arc<dyn StorageEngine>,
    provider: Arc<dyn MarketDataProvider>,
    instruments: InstrumentRepository,
    bars: DailyBarRepository,
    checkpoints: CheckpointStore,
}

impl DailyBarJob {
    pub fn new(storage: Arc<dyn StorageEngine>, provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            instruments: InstrumentRepository::new(storage.clone()),
            bars: DailyBarRepository::new(storage.clone()),
            checkpoints: CheckpointStore::new(storage.clone()),
            storage,
            provider,
        }
    }

    pub async fn run(&self, options: &DailyBarJobOptions) -> Result<JobOutcome> {
        options.validate()?;
        log_elapsed("日线批量采集", self.execute(options)).await
    }

    async fn execute(&self, options: &DailyBarJobOptions) -> Result<JobOutcome> {
        info!(
            "📈 开始采集日线: {} ~ {}, 复权={}, task_id={:?}",
            options.start_date,
            options.end_date,
            options.adjust.code(),
            options.task_id
        );

        let universe = self.instruments.find_active_symbols().await?;
        let mut checkpoint = self.prepare_checkpoint(options).await?;
        checkpoint.stats.total = universe.len() as u64;
        info!("待采集标的 {} 只, 批大小 {}", universe.len(), options.batch_size);

        for (batch_index, batch) in universe.chunks(options.batch_size).enumerate() {
            checkpoint.current_batch = batch_index;
            info!(
                "处理第 {} 批, 共 {} 只",
                batch_index + 1,
                batch.len()
            );

            for symbol in batch {
                if !options.force_redo && checkpoint.is_processed(symbol.as_str()) {
                    continue;
                }

                self.collect_entity(symbol, options, &mut checkpoint).await;
                checkpoint.stats.processed += 1;

                if options.task_id.is_some() {
                    checkpoint.updated_at = Utc::now();
                    // 断点写失败直接中止，避免续跑时重复或遗漏
                    self.checkpoints.save(&checkpoint).await?;
                }

                if !options.request_interval.is_zero() {
                    sleep(options.request_interval).await;
                }
            }
        }

        let status = match checkpoint.retry_symbols.len() {
            0 => JobStatus::Completed,
            pending => JobStatus::PendingRetry(pending),
        };
        if let Some(task_id) = &options.task_id {
            match status {
                JobStatus::Completed => {
                    self.checkpoints.delete(task_id).await?;
                }
                JobStatus::PendingRetry(pending) => warn!(
                    "⚠️ {} 只标的瞬时失败, 保留断点 {} 供下次续跑重试",
                    pending, task_id
                ),
            }
        }

        let stats = checkpoint.stats;
        info!(
            "✅ 日线采集完成: 总数={}, 成功={}, 失败={}, 已处理={}, 写入记录={}",
            stats.total, stats.success, stats.failed, stats.processed, stats.records
        );
        Ok(JobOutcome {
            task_id: options.task_id.clone(),
            status,
            stats,
        })
    }

    /// 加载或新建断点
    ///
    /// 上次因瞬时错误失败的标的会在本次重跑，它们的失败计数先回退。
    async fn prepare_checkpoint(&self, options: &DailyBarJobOptions) -> Result<TaskCheckpoint> {
        let task_id = match &options.task_id {
            Some(id) => id,
            None => return Ok(TaskCheckpoint::new(String::new())),
        };
        if options.force_redo {
            info!("🔄 强制重跑, 忽略任务 {} 的断点", task_id);
            return Ok(TaskCheckpoint::new(task_id.clone()));
        }

        let mut checkpoint = match self.checkpoints.load(task_id).await? {
            Some(checkpoint) => checkpoint,
            None => return Ok(TaskCheckpoint::new(task_id.clone())),
        };

        let retrying = std::mem::take(&mut checkpoint.retry_symbols);
        let stats = &mut checkpoint.stats;
        stats.failed = stats.failed.saturating_sub(retrying.len() as u64);
        stats.processed = stats.processed.saturating_sub(retrying.len() as u64);

        info!(
            "📌 从断点续跑 {}: 已处理 {} 只, 待重试 {} 只, 上次更新 {}",
            task_id,
            checkpoint.processed_symbols.len(),
            retrying.len(),
            checkpoint.updated_at
        );
        Ok(checkpoint)
    }

    /// 处理单只标的并更新断点；错误只记录不上抛
    async fn collect_entity(
        &self,
        symbol: &Symbol,
        options: &DailyBarJobOptions,
        checkpoint: &mut TaskCheckpoint,
    ) {
        match self.fetch_and_save(symbol, options).await {
            Ok(EntityOutcome::Saved(rows)) => {
                info!("✅ {} 写入 {} 条日线", symbol, rows);
                checkpoint.stats.success += 1;
                checkpoint.stats.records += rows;
                checkpoint.mark_processed(symbol.as_str());
            }
            Ok(EntityOutcome::NoData) => {
                warn!("{} 区间内无日线数据", symbol);
                checkpoint.stats.failed += 1;
                checkpoint.mark_processed(symbol.as_str());
            }
            Err(e) if e.is_transient() => {
                error!("❌ {} 采集失败, 续跑时重试: {}", symbol, e);
                checkpoint.stats.failed += 1;
                checkpoint.mark_retry(symbol.as_str());
            }
            Err(e) => {
                error!("❌ {} 采集失败: {}", symbol, e);
                checkpoint.stats.failed += 1;
                checkpoint.mark_processed(symbol.as_str());
            }
        }
    }

    async fn fetch_and_save(
        &self,
        symbol: &Symbol,
        options: &DailyBarJobOptions,
    ) -> Result<EntityOutcome> {
        if self.storage.ensure_entity_table(symbol).await? {
            info!("新建日线表: {}", symbol);
        }

        let op_name = format!("获取 {} 日线", symbol);
        let bars = retry(&options.retry_policy, &op_name, || {
            self.provider.fetch_history(
                symbol,
                options.start_date,
                options.end_date,
                options.adjust,
            )
        })
        .await?;

        if bars.is_empty() {
            return Ok(EntityOutcome::NoData);
        }
        let rows = self.bars.save_bars(symbol, &bars).await?;
        Ok(EntityOutcome::Saved(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_task_id_format() {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 31).unwrap();
        assert_eq!(collect_task_id(start, end), "collect_20240101_20240331");
    }

    #[test]
    fn test_options_validation() {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(DailyBarJobOptions::new(start, end).validate().is_err());

        let mut options = DailyBarJobOptions::new(end, start);
        assert!(options.validate().is_ok());
        options.batch_size = 0;
        assert!(options.validate().is_err());

        let options = DailyBarJobOptions::new(end, start).with_task_id("  ");
        assert!(options.validate().is_err());
    }
}
