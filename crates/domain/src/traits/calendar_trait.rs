use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::NaiveDate;

use quant_ingest_common::Result;

/// 交易所日历
#[async_trait]
pub trait ExchangeCalendar: Send + Sync {
    /// [start, end] 区间内的交易日
    async fn schedule(
        &self,
        exchange: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>>;
}
