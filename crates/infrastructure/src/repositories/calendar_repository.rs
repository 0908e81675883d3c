//! 交易日历仓储

use std::sync::Arc;

use chrono::NaiveDate;

use quant_ingest_common::Result;
use quant_ingest_domain::CalendarEntry;

use crate::storage::{
    Operator, Predicate, QueryRequest, Record, SortDirection, StorageEngine, TableRef,
};

const CONFLICT_KEY: &[&str] = &["trade_date", "exchange"];
const UPDATE_COLUMNS: &[&str] = &["is_trading_day", "holiday_name"];

fn to_record(entry: &CalendarEntry) -> Record {
    Record::new()
        .with("trade_date", entry.trade_date)
        .with("exchange", entry.exchange.as_str())
        .with("is_trading_day", entry.is_trading_day)
        .with("holiday_name", entry.holiday_name.clone())
}

fn from_record(record: &Record) -> Result<CalendarEntry> {
    Ok(CalendarEntry {
        trade_date: record.date("trade_date")?,
        exchange: record.text("exchange")?,
        is_trading_day: record.bool("is_trading_day")?,
        holiday_name: record.opt_text("holiday_name")?,
        updated_at: record.opt_timestamp("updated_at")?,
    })
}

#[derive(Clone)]
pub struct CalendarRepository {
    storage: Arc<dyn StorageEngine>,
}

impl CalendarRepository {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    pub async fn upsert_entries(&self, entries: &[CalendarEntry]) -> Result<u64> {
        let rows: Vec<Record> = entries.iter().map(to_record).collect();
        self.storage
            .bulk_upsert(&TableRef::Calendar, &rows, CONFLICT_KEY, UPDATE_COLUMNS)
            .await
    }

    pub async fn find(&self, date: NaiveDate, exchange: &str) -> Result<Option<CalendarEntry>> {
        let request = QueryRequest::new()
            .filter(
                Predicate::new()
                    .eq("trade_date", date)
                    .eq("exchange", exchange),
            )
            .limit(1);
        let rows = self.storage.query(&TableRef::Calendar, &request).await?;
        rows.first().map(from_record).transpose()
    }

    /// 严格早于 `date` 的最近一个交易日
    pub async fn previous_trading_date(
        &self,
        date: NaiveDate,
        exchange: &str,
    ) -> Result<Option<NaiveDate>> {
        self.nearest_trading_date(date, exchange, Operator::Lt, SortDirection::Desc)
            .await
    }

    /// 严格晚于 `date` 的最近一个交易日
    pub async fn next_trading_date(
        &self,
        date: NaiveDate,
        exchange: &str,
    ) -> Result<Option<NaiveDate>> {
        self.nearest_trading_date(date, exchange, Operator::Gt, SortDirection::Asc)
            .await
    }

    async fn nearest_trading_date(
        &self,
        date: NaiveDate,
        exchange: &str,
        op: Operator,
        direction: SortDirection,
    ) -> Result<Option<NaiveDate>> {
        let request = QueryRequest::new()
            .filter(
                Predicate::new()
                    .compare("trade_date", op, date)
                    .eq("exchange", exchange)
                    .eq("is_trading_day", true),
            )
            .select(&["trade_date"])
            .order_by("trade_date", direction)
            .limit(1);
        let rows = self.storage.query(&TableRef::Calendar, &request).await?;
        rows.first().map(|row| row.date("trade_date")).transpose()
    }

    /// [start, end] 区间内的日历条目，按日期升序
    pub async fn list(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exchange: &str,
        only_trading: bool,
    ) -> Result<Vec<CalendarEntry>> {
        let mut predicate = Predicate::new()
            .between("trade_date", start, end)
            .eq("exchange", exchange);
        if only_trading {
            predicate = predicate.eq("is_trading_day", true);
        }
        let request = QueryRequest::new()
            .filter(predicate)
            .order_by("trade_date", SortDirection::Asc);
        self.storage
            .query(&TableRef::Calendar, &request)
            .await?
            .iter()
            .map(from_record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorageEngine;
    use quant_ingest_domain::entities::calendar::HOLIDAY_PLACEHOLDER;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, day).unwrap()
    }

    async fn seeded() -> CalendarRepository {
        let engine = Arc::new(MemoryStorageEngine::new());
        engine.ensure_base_structure().await.unwrap();
        let repo = CalendarRepository::new(engine);
        // 1 月 1、2 日休市，3、4 日开市，5 日休市，6 日开市
        let entries: Vec<CalendarEntry> = [(1, false), (2, false), (3, true), (4, true), (5, false), (6, true)]
            .iter()
            .map(|&(d, open)| CalendarEntry::classified(date(d), "SSE", open))
            .collect();
        repo.upsert_entries(&entries).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn test_find_entry() {
        let repo = seeded().await;
        let entry = repo.find(date(2), "SSE").await.unwrap().unwrap();
        assert!(!entry.is_trading_day);
        assert_eq!(entry.holiday_name.as_deref(), Some(HOLIDAY_PLACEHOLDER));
        assert!(repo.find(date(2), "SZSE").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_neighbours_skip_closed_days() {
        let repo = seeded().await;
        assert_eq!(repo.next_trading_date(date(2), "SSE").await.unwrap(), Some(date(3)));
        assert_eq!(repo.next_trading_date(date(4), "SSE").await.unwrap(), Some(date(6)));
        assert_eq!(repo.previous_trading_date(date(6), "SSE").await.unwrap(), Some(date(4)));
        assert_eq!(repo.previous_trading_date(date(3), "SSE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_filters() {
        let repo = seeded().await;
        assert_eq!(repo.list(date(1), date(6), "SSE", false).await.unwrap().len(), 6);
        let trading: Vec<NaiveDate> = repo
            .list(date(1), date(6), "SSE", true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.trade_date)
            .collect();
        assert_eq!(trading, vec![date(3), date(4), date(6)]);
    }
}
