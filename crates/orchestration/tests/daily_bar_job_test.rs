use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::{
    AdjustMode, DailyBar, Instrument, MarketDataProvider, Symbol, TaskCheckpoint, TaskStats,
};
use quant_ingest_infrastructure::retry::RetryPolicy;
use quant_ingest_infrastructure::storage::{Predicate, QueryRequest, Record, TableRef};
use quant_ingest_infrastructure::{
    CheckpointStore, DailyBarRepository, InstrumentRepository, MemoryStorageEngine, StorageEngine,
};
use quant_ingest_orchestration::{DailyBarJob, DailyBarJobOptions, JobStatus};

const TASK_ID: &str = "collect_20240102_20240105";

#[derive(Clone, Copy)]
enum Script {
    Rows(usize),
    Empty,
    Transient,
    Rejected,
}

/// 按代码返回预设结果的数据源，记录每次请求
struct ScriptedProvider {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new(scripts: &[(&str, Script)]) -> Arc<Self> {
        Arc::new(Self {
            scripts: scripts
                .iter()
                .map(|(symbol, script)| (symbol.to_string(), *script))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl MarketDataProvider for ScriptedProvider {
    async fn list_entities(&self) -> Result<Vec<Instrument>> {
        Ok(Vec::new())
    }

    async fn fetch_history(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        _end: NaiveDate,
        _adjust: AdjustMode,
    ) -> Result<Vec<DailyBar>> {
        self.calls.lock().unwrap().push(symbol.to_string());
        match self.scripts.get(symbol.as_str()).copied().unwrap_or(Script::Empty) {
            Script::Rows(n) => Ok((0..n)
                .map(|offset| {
                    let price = Decimal::new(1000 + offset as i64, 2);
                    DailyBar::new(
                        symbol.clone(),
                        start + chrono::Duration::days(offset as i64),
                        price,
                        price,
                        price,
                        price,
                        10_000,
                        Decimal::new(1_000_000, 2),
                    )
                })
                .collect()),
            Script::Empty => Ok(Vec::new()),
            Script::Transient => Err(IngestError::provider("read timed out")),
            Script::Rejected => Err(IngestError::provider_rejected("symbol delisted")),
        }
    }

    async fn list_calendar_dates(&self) -> Result<Vec<NaiveDate>> {
        Ok(Vec::new())
    }
}

/// 只允许写入有限次断点的存储，用来模拟任务中途崩溃
struct CheckpointWriteLimit {
    inner: Arc<MemoryStorageEngine>,
    remaining: AtomicI64,
}

#[async_trait]
impl StorageEngine for CheckpointWriteLimit {
    async fn ensure_base_structure(&self) -> Result<()> {
        self.inner.ensure_base_structure().await
    }

    async fn ensure_entity_table(&self, symbol: &Symbol) -> Result<bool> {
        self.inner.ensure_entity_table(symbol).await
    }

    async fn bulk_upsert(
        &self,
        table: &TableRef,
        rows: &[Record],
        conflict_key: &[&str],
        update_columns: &[&str],
    ) -> Result<u64> {
        if matches!(table, TableRef::Checkpoint) && self.remaining.fetch_sub(1, Ordering::SeqCst) <= 0
        {
            return Err(IngestError::database("checkpoint write refused"));
        }
        self.inner
            .bulk_upsert(table, rows, conflict_key, update_columns)
            .await
    }

    async fn query(&self, table: &TableRef, request: &QueryRequest) -> Result<Vec<Record>> {
        self.inner.query(table, request).await
    }

    async fn delete(&self, table: &TableRef, predicate: &Predicate) -> Result<u64> {
        self.inner.delete(table, predicate).await
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn options() -> DailyBarJobOptions {
    let mut options =
        DailyBarJobOptions::new(date(2024, 1, 2), date(2024, 1, 5)).with_task_id(TASK_ID);
    options.request_interval = Duration::ZERO;
    options.retry_policy = RetryPolicy::immediate(2);
    options
}

async fn seeded_engine(symbols: &[&str]) -> Arc<MemoryStorageEngine> {
    let engine = Arc::new(MemoryStorageEngine::new());
    engine.ensure_base_structure().await.unwrap();
    let instruments: Vec<Instrument> = symbols
        .iter()
        .map(|symbol| Instrument::new(*symbol, format!("标的{}", symbol)))
        .collect();
    InstrumentRepository::new(engine.clone())
        .upsert_all(&instruments)
        .await
        .unwrap();
    engine
}

async fn load_checkpoint(engine: &Arc<MemoryStorageEngine>) -> Option<TaskCheckpoint> {
    CheckpointStore::new(engine.clone()).load(TASK_ID).await.unwrap()
}

fn stats(total: u64, success: u64, failed: u64, processed: u64, records: u64) -> TaskStats {
    TaskStats {
        total,
        success,
        failed,
        processed,
        records,
    }
}

#[tokio::test]
async fn test_no_data_entity_counts_as_failed() {
    let engine = seeded_engine(&["600000", "000001"]).await;
    let provider = ScriptedProvider::new(&[("600000", Script::Rows(2)), ("000001", Script::Empty)]);
    let job = DailyBarJob::new(engine.clone(), provider.clone());

    let outcome = job.run(&options()).await.unwrap();

    assert_eq!(outcome.stats, stats(2, 1, 1, 2, 2));
    assert_eq!(outcome.status, JobStatus::Completed);
    assert_eq!(outcome.task_id.as_deref(), Some(TASK_ID));
    assert_eq!(provider.calls(), vec!["000001", "600000"]);
    assert!(load_checkpoint(&engine).await.is_none());

    let bars = DailyBarRepository::new(engine.clone())
        .find_range(&Symbol::new("600000").unwrap(), date(2024, 1, 1), date(2024, 1, 31))
        .await
        .unwrap();
    assert_eq!(bars.len(), 2);
    assert!(engine.has_table(&TableRef::DailyBar(Symbol::new("000001").unwrap())).await);
}

#[tokio::test]
async fn test_resume_skips_processed_entities() {
    let symbols = ["000001", "000002", "600000"];
    let engine = seeded_engine(&symbols).await;
    let scripts = [
        ("000001", Script::Rows(1)),
        ("000002", Script::Rows(2)),
        ("600000", Script::Rows(3)),
    ];

    // 第二只标的保存断点时"崩溃"
    let crashing = Arc::new(CheckpointWriteLimit {
        inner: engine.clone(),
        remaining: AtomicI64::new(1),
    });
    let provider = ScriptedProvider::new(&scripts);
    let result = DailyBarJob::new(crashing, provider.clone())
        .run(&options())
        .await;
    assert!(result.is_err());
    assert_eq!(provider.calls(), vec!["000001", "000002"]);

    let saved = load_checkpoint(&engine).await.unwrap();
    assert_eq!(saved.processed_symbols.len(), 1);
    assert!(saved.is_processed("000001"));
    assert_eq!(saved.stats, stats(3, 1, 0, 1, 1));

    let provider = ScriptedProvider::new(&scripts);
    let outcome = DailyBarJob::new(engine.clone(), provider.clone())
        .run(&options())
        .await
        .unwrap();
    assert_eq!(provider.calls(), vec!["000002", "600000"]);
    assert_eq!(outcome.stats, stats(3, 3, 0, 3, 6));
    assert!(load_checkpoint(&engine).await.is_none());
}

#[tokio::test]
async fn test_force_redo_ignores_checkpoint() {
    let engine = seeded_engine(&["000001", "600000"]).await;
    let mut checkpoint = TaskCheckpoint::new(TASK_ID);
    checkpoint.mark_processed("000001");
    checkpoint.mark_processed("600000");
    checkpoint.stats = stats(2, 2, 0, 2, 10);
    CheckpointStore::new(engine.clone())
        .save(&checkpoint)
        .await
        .unwrap();

    let scripts = [("000001", Script::Rows(1)), ("600000", Script::Rows(1))];

    // 不强制时全部跳过，统计沿用断点
    let provider = ScriptedProvider::new(&scripts);
    let outcome = DailyBarJob::new(engine.clone(), provider.clone())
        .run(&options())
        .await
        .unwrap();
    assert!(provider.calls().is_empty());
    assert_eq!(outcome.stats, stats(2, 2, 0, 2, 10));

    CheckpointStore::new(engine.clone())
        .save(&checkpoint)
        .await
        .unwrap();
    let provider = ScriptedProvider::new(&scripts);
    let mut redo = options();
    redo.force_redo = true;
    let outcome = DailyBarJob::new(engine.clone(), provider.clone())
        .run(&redo)
        .await
        .unwrap();
    assert_eq!(provider.calls(), vec!["000001", "600000"]);
    assert_eq!(outcome.stats, stats(2, 2, 0, 2, 2));
    assert!(load_checkpoint(&engine).await.is_none());
}

#[tokio::test]
async fn test_transient_failure_retried_on_resume() {
    let engine = seeded_engine(&["000001", "600000"]).await;

    let provider =
        ScriptedProvider::new(&[("000001", Script::Transient), ("600000", Script::Rows(2))]);
    let outcome = DailyBarJob::new(engine.clone(), provider.clone())
        .run(&options())
        .await
        .unwrap();
    // 重试策略 2 次
    assert_eq!(provider.calls(), vec!["000001", "000001", "600000"]);
    assert_eq!(outcome.stats, stats(2, 1, 1, 2, 2));
    assert_eq!(outcome.status, JobStatus::PendingRetry(1));

    let kept = load_checkpoint(&engine).await.unwrap();
    assert!(kept.retry_symbols.contains("000001"));
    assert!(!kept.is_processed("000001"));
    assert!(kept.is_processed("600000"));

    let provider =
        ScriptedProvider::new(&[("000001", Script::Rows(3)), ("600000", Script::Rows(2))]);
    let outcome = DailyBarJob::new(engine.clone(), provider.clone())
        .run(&options())
        .await
        .unwrap();
    assert_eq!(provider.calls(), vec!["000001"]);
    assert_eq!(outcome.stats, stats(2, 2, 0, 2, 5));
    assert_eq!(outcome.status, JobStatus::Completed);
    assert!(load_checkpoint(&engine).await.is_none());
}

#[tokio::test]
async fn test_permanent_failure_not_retried() {
    let engine = seeded_engine(&["000001", "600000"]).await;
    let provider =
        ScriptedProvider::new(&[("000001", Script::Rejected), ("600000", Script::Rows(1))]);

    let outcome = DailyBarJob::new(engine.clone(), provider.clone())
        .run(&options())
        .await
        .unwrap();

    assert_eq!(provider.calls(), vec!["000001", "600000"]);
    assert_eq!(outcome.stats, stats(2, 1, 1, 2, 1));
    assert!(load_checkpoint(&engine).await.is_none());
}

#[tokio::test]
async fn test_run_without_task_id_keeps_no_checkpoint() {
    let engine = seeded_engine(&["000001"]).await;
    let provider = ScriptedProvider::new(&[("000001", Script::Rows(1))]);
    let mut options = options();
    options.task_id = None;
    options.batch_size = 1;

    let outcome = DailyBarJob::new(engine.clone(), provider)
        .run(&options)
        .await
        .unwrap();

    assert_eq!(outcome.task_id, None);
    assert_eq!(outcome.stats, stats(1, 1, 0, 1, 1));
    assert_eq!(engine.row_count(&TableRef::Checkpoint).await, 0);
}

#[tokio::test]
async fn test_missing_catalog_aborts() {
    let engine = Arc::new(MemoryStorageEngine::new());
    let provider = ScriptedProvider::new(&[]);

    let result = DailyBarJob::new(engine, provider.clone())
        .run(&options())
        .await;

    assert!(result.is_err());
    assert!(provider.calls().is_empty());
}
