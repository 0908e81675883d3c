//! 日线行情仓储
//!
//! 每只股票一张表 `stock_daily_<symbol>`，以 `trade_date` 为主键。

use std::sync::Arc;

use chrono::NaiveDate;

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::{AdjustMode, DailyBar, Symbol};

use crate::storage::{Predicate, QueryRequest, Record, SortDirection, StorageEngine, TableRef};

const CONFLICT_KEY: &[&str] = &["trade_date"];

/// 重复写入时覆盖的数值列
pub const DAILY_BAR_UPDATE_COLUMNS: &[&str] = &[
    "open",
    "high",
    "low",
    "close",
    "volume",
    "amount",
    "pct_change",
    "turnover_rate",
    "amplitude",
    "adjust_mode",
    "forward_factor",
    "backward_factor",
];

fn to_record(bar: &DailyBar) -> Record {
    Record::new()
        .with("trade_date", bar.trade_date)
        .with("symbol", bar.symbol.as_str())
        .with("open", bar.open)
        .with("high", bar.high)
        .with("low", bar.low)
        .with("close", bar.close)
        .with("volume", bar.volume)
        .with("amount", bar.amount)
        .with("pct_change", bar.pct_change)
        .with("turnover_rate", bar.turnover_rate)
        .with("amplitude", bar.amplitude)
        .with("adjust_mode", bar.adjust_mode.code())
        .with("forward_factor", bar.forward_factor)
        .with("backward_factor", bar.backward_factor)
}

fn from_record(record: &Record) -> Result<DailyBar> {
    Ok(DailyBar {
        symbol: Symbol::new(record.text("symbol")?)?,
        trade_date: record.date("trade_date")?,
        open: record.decimal("open")?,
        high: record.decimal("high")?,
        low: record.decimal("low")?,
        close: record.decimal("close")?,
        volume: record.int("volume")?,
        amount: record.decimal("amount")?,
        pct_change: record.opt_decimal("pct_change")?,
        turnover_rate: record.opt_decimal("turnover_rate")?,
        amplitude: record.opt_decimal("amplitude")?,
        adjust_mode: AdjustMode::from_code(record.int("adjust_mode")?)?,
        forward_factor: record.opt_decimal("forward_factor")?,
        backward_factor: record.opt_decimal("backward_factor")?,
        created_at: record.opt_timestamp("created_at")?,
        updated_at: record.opt_timestamp("updated_at")?,
    })
}

#[derive(Clone)]
pub struct DailyBarRepository {
    storage: Arc<dyn StorageEngine>,
}

impl DailyBarRepository {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    /// 写入一只股票的日线，表需已创建；返回去重后写入的行数
    pub async fn save_bars(&self, symbol: &Symbol, bars: &[DailyBar]) -> Result<u64> {
        if let Some(other) = bars.iter().find(|bar| &bar.symbol != symbol) {
            return Err(IngestError::validation(format!(
                "{} 的日线中混入了 {} 的数据",
                symbol, other.symbol
            )));
        }
        let rows: Vec<Record> = bars.iter().map(to_record).collect();
        self.storage
            .bulk_upsert(
                &TableRef::DailyBar(symbol.clone()),
                &rows,
                CONFLICT_KEY,
                DAILY_BAR_UPDATE_COLUMNS,
            )
            .await
    }

    /// [start, end] 区间日线，按日期升序
    pub async fn find_range(
        &self,
        symbol: &Symbol,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>> {
        let request = QueryRequest::new()
            .filter(Predicate::new().between("trade_date", start, end))
            .order_by("trade_date", SortDirection::Asc);
        self.storage
            .query(&TableRef::DailyBar(symbol.clone()), &request)
            .await?
            .iter()
            .map(from_record)
            .collect()
    }

    pub async fn latest_trade_date(&self, symbol: &Symbol) -> Result<Option<NaiveDate>> {
        let request = QueryRequest::new()
            .select(&["trade_date"])
            .order_by("trade_date", SortDirection::Desc)
            .limit(1);
        let rows = self
            .storage
            .query(&TableRef::DailyBar(symbol.clone()), &request)
            .await?;
        rows.first().map(|row| row.date("trade_date")).transpose()
    }
}
