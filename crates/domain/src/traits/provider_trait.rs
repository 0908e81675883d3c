//! 行情数据源接口

use async_trait::async_trait;
use chrono::NaiveDate;

use quant_ingest_common::Result;

use crate::entities::{DailyBar, Instrument};
use crate::enums::AdjustMode;
use crate::value_objects::Symbol;

/// 外部行情数据源
///
/// 不同市场/来源各自实现，彼此不共享可变状态。
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 全量标的列表
    async fn list_entities(&self) -> Result<Vec<Instrument>>;

    /// 区间日线；区间内无数据时返回空列表而不是错误
    async fn fetch_history(
        &self,
        symbol: &Symbol,
        start_date: NaiveDate,
        end_date: NaiveDate,
        adjust: AdjustMode,
    ) -> Result<Vec<DailyBar>>;

    /// 数据源给出的历史交易日
    async fn list_calendar_dates(&self) -> Result<Vec<NaiveDate>>;
}
