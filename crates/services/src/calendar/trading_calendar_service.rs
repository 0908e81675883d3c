//! 交易日判断与本地日历维护
//!
//! 本地 `trading_calendar` 表是首选来源；未命中时回退到交易所日历，
//! 需要时把回退结果写回本地。

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use tracing::{debug, info};

use quant_ingest_common::utils::date_range;
use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::{CalendarEntry, ExchangeCalendar};
use quant_ingest_infrastructure::retry::{retry, RetryPolicy};
use quant_ingest_infrastructure::CalendarRepository;

/// 前后交易日回退查询交易所日历时的首个窗口（天），之后逐次翻倍
const NEIGHBOUR_WINDOW_DAYS: i64 = 30;
/// 向后查找的最远距离（天），交易所日历通常只公布到次年
const FORWARD_HORIZON_DAYS: i64 = 366 * 3;

/// 上交所开市日，更早的日期不会有交易日
fn calendar_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1990, 12, 19).unwrap_or(NaiveDate::MIN)
}

/// 交易日判断方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarMode {
    /// 只查本地，缺失时报 NotFound
    LocalOnly,
    /// 只查交易所日历
    ExchangeOnly,
    /// 先查本地，缺失时回退交易所日历
    #[default]
    LocalThenExchange,
    /// 只查数据源的历史交易日
    ProviderOnly,
}

impl fmt::Display for CalendarMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CalendarMode::LocalOnly => "local",
            CalendarMode::ExchangeOnly => "exchange",
            CalendarMode::LocalThenExchange => "auto",
            CalendarMode::ProviderOnly => "provider",
        };
        f.write_str(name)
    }
}

impl FromStr for CalendarMode {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "database" => Ok(CalendarMode::LocalOnly),
            "exchange" => Ok(CalendarMode::ExchangeOnly),
            "auto" => Ok(CalendarMode::LocalThenExchange),
            "provider" => Ok(CalendarMode::ProviderOnly),
            other => Err(IngestError::validation(format!(
                "无效的日历查询方式: {}，可选 auto / local / exchange / provider",
                other
            ))),
        }
    }
}

/// 同步本地日历时的数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    Exchange,
    Provider,
}

impl FromStr for SyncSource {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "exchange" => Ok(SyncSource::Exchange),
            "provider" => Ok(SyncSource::Provider),
            other => Err(IngestError::validation(format!(
                "无效的日历数据源: {}，可选 exchange / provider",
                other
            ))),
        }
    }
}

pub struct TradingCalendarService {
    repo: CalendarRepository,
    exchange: Arc<dyn ExchangeCalendar>,
    provider: Option<Arc<dyn ExchangeCalendar>>,
    retry_policy: RetryPolicy,
}

impl TradingCalendarService {
    pub fn new(repo: CalendarRepository, exchange: Arc<dyn ExchangeCalendar>) -> Self {
        Self {
            repo,
            exchange,
            provider: None,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// 附加数据源日历（见 [`ProviderCalendar`](super::ProviderCalendar)）
    pub fn with_provider(mut self, provider: Arc<dyn ExchangeCalendar>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn source(&self, source: SyncSource) -> Result<&Arc<dyn ExchangeCalendar>> {
        match source {
            SyncSource::Exchange => Ok(&self.exchange),
            SyncSource::Provider => self
                .provider
                .as_ref()
                .ok_or_else(|| IngestError::Config("未配置数据源日历".to_string())),
        }
    }

    async fn schedule(
        &self,
        source: SyncSource,
        exchange: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        let calendar = self.source(source)?;
        retry(&self.retry_policy, "获取交易日历", || {
            calendar.schedule(exchange, start, end)
        })
        .await
    }

    async fn check_with(&self, source: SyncSource, date: NaiveDate, exchange: &str) -> Result<bool> {
        Ok(self
            .schedule(source, exchange, date, date)
            .await?
            .contains(&date))
    }

    async fn write_back(&self, date: NaiveDate, exchange: &str, is_trading: bool) -> Result<()> {
        self.repo
            .upsert_entries(&[CalendarEntry::classified(date, exchange, is_trading)])
            .await?;
        debug!("写回本地日历: {} {} -> {}", exchange, date, is_trading);
        Ok(())
    }

    /// 判断是否为交易日
    pub async fn is_trading_day(
        &self,
        date: NaiveDate,
        exchange: &str,
        mode: CalendarMode,
        update_local: bool,
    ) -> Result<bool> {
        let source = match mode {
            CalendarMode::LocalOnly => {
                return self
                    .repo
                    .find(date, exchange)
                    .await?
                    .map(|entry| entry.is_trading_day)
                    .ok_or_else(|| {
                        IngestError::NotFound(format!("本地日历无 {} {} 的记录", exchange, date))
                    });
            }
            CalendarMode::LocalThenExchange => {
                if let Some(entry) = self.repo.find(date, exchange).await? {
                    return Ok(entry.is_trading_day);
                }
                SyncSource::Exchange
            }
            CalendarMode::ExchangeOnly => SyncSource::Exchange,
            CalendarMode::ProviderOnly => SyncSource::Provider,
        };

        let is_trading = self.check_with(source, date, exchange).await?;
        if update_local {
            self.write_back(date, exchange, is_trading).await?;
        }
        Ok(is_trading)
    }

    /// 用指定来源重建 [start, end] 区间的本地日历，返回写入条数
    pub async fn sync_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exchange: &str,
        source: SyncSource,
    ) -> Result<u64> {
        if start > end {
            return Err(IngestError::validation(format!(
                "开始日期 {} 晚于结束日期 {}",
                start, end
            )));
        }
        let trading_days = self.schedule(source, exchange, start, end).await?;
        let entries: Vec<CalendarEntry> = date_range(start, end)
            .into_iter()
            .map(|date| CalendarEntry::classified(date, exchange, trading_days.contains(&date)))
            .collect();

        let written = self.repo.upsert_entries(&entries).await?;
        info!(
            "✓ 成功更新 {} 条交易日历记录 ({} ~ {}, {}, 交易日 {} 天)",
            written,
            start,
            end,
            exchange,
            trading_days.len()
        );
        Ok(written)
    }

    /// 严格早于 `date` 的最近交易日
    ///
    /// 本地日历含有 `date` 这一天时以本地为准，否则向前逐段查询交易所日历，
    /// 直到找到或越过开市日。
    pub async fn previous_trading_day(
        &self,
        date: NaiveDate,
        exchange: &str,
    ) -> Result<Option<NaiveDate>> {
        if self.repo.find(date, exchange).await?.is_some() {
            if let Some(found) = self.repo.previous_trading_date(date, exchange).await? {
                return Ok(Some(found));
            }
        }

        let epoch = calendar_epoch();
        let mut end = date - Duration::days(1);
        let mut span = NEIGHBOUR_WINDOW_DAYS;
        while end >= epoch {
            let start = (end - Duration::days(span - 1)).max(epoch);
            let days = self.schedule(SyncSource::Exchange, exchange, start, end).await?;
            if let Some(found) = days.range(..date).next_back() {
                return Ok(Some(*found));
            }
            end = start - Duration::days(1);
            span *= 2;
        }
        Ok(None)
    }

    /// 严格晚于 `date` 的最近交易日，最多向后查 [`FORWARD_HORIZON_DAYS`] 天
    pub async fn next_trading_day(&self, date: NaiveDate, exchange: &str) -> Result<Option<NaiveDate>> {
        if self.repo.find(date, exchange).await?.is_some() {
            if let Some(found) = self.repo.next_trading_date(date, exchange).await? {
                return Ok(Some(found));
            }
        }

        let horizon = date + Duration::days(FORWARD_HORIZON_DAYS);
        let mut start = date + Duration::days(1);
        let mut span = NEIGHBOUR_WINDOW_DAYS;
        while start <= horizon {
            let end = (start + Duration::days(span - 1)).min(horizon);
            let days = self.schedule(SyncSource::Exchange, exchange, start, end).await?;
            if let Some(found) = days.range(start..).next() {
                return Ok(Some(*found));
            }
            start = end + Duration::days(1);
            span *= 2;
        }
        Ok(None)
    }

    /// 本地日历中 [start, end] 区间的条目，按日期升序
    pub async fn trading_days(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        exchange: &str,
        only_trading: bool,
    ) -> Result<Vec<CalendarEntry>> {
        if start > end {
            return Err(IngestError::validation(format!(
                "开始日期 {} 晚于结束日期 {}",
                start, end
            )));
        }
        self.repo.list(start, end, exchange, only_trading).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use quant_ingest_infrastructure::storage::{StorageEngine, TableRef};
    use quant_ingest_infrastructure::MemoryStorageEngine;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 固定交易日集合的假日历
    struct FixedCalendar {
        days: BTreeSet<NaiveDate>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl FixedCalendar {
        fn new(days: &[NaiveDate]) -> Self {
            Self {
                days: days.iter().copied().collect(),
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(&[])
            }
        }
    }

    #[async_trait]
    impl ExchangeCalendar for FixedCalendar {
        async fn schedule(
            &self,
            _exchange: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<BTreeSet<NaiveDate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(IngestError::CalendarSource("unreachable".into()));
            }
            Ok(self.days.range(start..=end).copied().collect())
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// 2022-12-30 (周五) 与 2023-01-03 之后的工作日开市
    fn sse_days() -> Vec<NaiveDate> {
        vec![
            d(2022, 12, 29),
            d(2022, 12, 30),
            d(2023, 1, 3),
            d(2023, 1, 4),
            d(2023, 1, 5),
            d(2023, 1, 6),
            d(2023, 1, 9),
        ]
    }

    async fn service(calendar: Arc<FixedCalendar>) -> (Arc<MemoryStorageEngine>, TradingCalendarService) {
        let engine = Arc::new(MemoryStorageEngine::new());
        engine.ensure_base_structure().await.unwrap();
        let repo = CalendarRepository::new(engine.clone());
        let service = TradingCalendarService::new(repo, calendar)
            .with_retry_policy(RetryPolicy::immediate(2));
        (engine, service)
    }

    #[tokio::test]
    async fn test_local_only_requires_entry() {
        let (_, service) = service(Arc::new(FixedCalendar::new(&sse_days()))).await;
        let err = service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::LocalOnly, false)
            .await;
        assert!(matches!(err, Err(IngestError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_fallback_writes_back() {
        let calendar = Arc::new(FixedCalendar::new(&sse_days()));
        let (engine, service) = service(calendar.clone()).await;

        let open = service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::LocalThenExchange, true)
            .await
            .unwrap();
        assert!(open);
        assert_eq!(engine.row_count(&TableRef::Calendar).await, 1);
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);

        // 第二次命中本地，不再访问交易所日历
        let again = service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::LocalThenExchange, false)
            .await
            .unwrap();
        assert!(again);
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 1);
        assert!(service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::LocalOnly, false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_fallback_without_write_back() {
        let (engine, service) = service(Arc::new(FixedCalendar::new(&sse_days()))).await;
        let open = service
            .is_trading_day(d(2023, 1, 2), "SSE", CalendarMode::ExchangeOnly, false)
            .await
            .unwrap();
        assert!(!open);
        assert_eq!(engine.row_count(&TableRef::Calendar).await, 0);
    }

    #[tokio::test]
    async fn test_provider_mode_requires_provider() {
        let (_, service) = service(Arc::new(FixedCalendar::new(&sse_days()))).await;
        let err = service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::ProviderOnly, false)
            .await;
        assert!(matches!(err, Err(IngestError::Config(_))));

        let service = service.with_provider(Arc::new(FixedCalendar::new(&[d(2023, 1, 3)])));
        assert!(service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::ProviderOnly, false)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_source_failure_retried_then_surfaced() {
        let calendar = Arc::new(FixedCalendar::failing());
        let (_, service) = service(calendar.clone()).await;
        let err = service
            .is_trading_day(d(2023, 1, 3), "SSE", CalendarMode::ExchangeOnly, false)
            .await;
        assert!(matches!(err, Err(IngestError::CalendarSource(_))));
        assert_eq!(calendar.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sync_range_covers_every_date() {
        let (engine, service) = service(Arc::new(FixedCalendar::new(&sse_days()))).await;
        let written = service
            .sync_range(d(2023, 1, 1), d(2023, 1, 9), "SSE", SyncSource::Exchange)
            .await
            .unwrap();
        assert_eq!(written, 9);
        assert_eq!(engine.row_count(&TableRef::Calendar).await, 9);

        let closed = service
            .trading_days(d(2023, 1, 1), d(2023, 1, 9), "SSE", false)
            .await
            .unwrap()
            .into_iter()
            .filter(|e| !e.is_trading_day)
            .collect::<Vec<_>>();
        assert_eq!(closed.len(), 4);
        assert!(closed
            .iter()
            .all(|e| e.holiday_name.as_deref() == Some(quant_ingest_domain::HOLIDAY_PLACEHOLDER)));

        let open: Vec<NaiveDate> = service
            .trading_days(d(2023, 1, 1), d(2023, 1, 9), "SSE", true)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.trade_date)
            .collect();
        assert_eq!(open, sse_days()[2..].to_vec());
    }

    #[tokio::test]
    async fn test_sync_range_rejects_inverted_range() {
        let (_, service) = service(Arc::new(FixedCalendar::new(&sse_days()))).await;
        assert!(matches!(
            service
                .sync_range(d(2023, 1, 9), d(2023, 1, 1), "SSE", SyncSource::Exchange)
                .await,
            Err(IngestError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_previous_trading_day_across_holiday() {
        let calendar = Arc::new(FixedCalendar::new(&sse_days()));
        let (_, service) = service(calendar.clone()).await;
        service
            .sync_range(d(2022, 12, 29), d(2023, 1, 3), "SSE", SyncSource::Exchange)
            .await
            .unwrap();
        let calls_after_sync = calendar.calls.load(Ordering::SeqCst);

        let prev = service
            .previous_trading_day(d(2023, 1, 3), "SSE")
            .await
            .unwrap();
        assert_eq!(prev, Some(d(2022, 12, 30)));
        assert!(prev.unwrap() < d(2023, 1, 3));
        // 本地覆盖该日期，不访问交易所日历
        assert_eq!(calendar.calls.load(Ordering::SeqCst), calls_after_sync);
    }

    #[tokio::test]
    async fn test_next_trading_day_falls_back_past_local_history() {
        let calendar = Arc::new(FixedCalendar::new(&sse_days()));
        let (_, service) = service(calendar.clone()).await;
        service
            .sync_range(d(2023, 1, 2), d(2023, 1, 3), "SSE", SyncSource::Exchange)
            .await
            .unwrap();

        // 2023-01-03 是本地最后一天，之后的交易日来自交易所日历
        let next = service.next_trading_day(d(2023, 1, 3), "SSE").await.unwrap();
        assert_eq!(next, Some(d(2023, 1, 4)));

        // 本地没有的日期直接回退
        let next = service.next_trading_day(d(2023, 1, 6), "SSE").await.unwrap();
        assert_eq!(next, Some(d(2023, 1, 9)));
    }

    #[tokio::test]
    async fn test_trading_days_filters_closed_dates() {
        let (_, service) = service(Arc::new(FixedCalendar::new(&sse_days()))).await;
        service
            .sync_range(d(2022, 12, 29), d(2023, 1, 3), "SSE", SyncSource::Exchange)
            .await
            .unwrap();

        let all = service
            .trading_days(d(2022, 12, 29), d(2023, 1, 3), "SSE", false)
            .await
            .unwrap();
        assert_eq!(all.len(), 6);

        let open: Vec<NaiveDate> = service
            .trading_days(d(2022, 12, 29), d(2023, 1, 3), "SSE", true)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.trade_date)
            .collect();
        assert_eq!(open, vec![d(2022, 12, 29), d(2022, 12, 30), d(2023, 1, 3)]);

        assert!(service
            .trading_days(d(2023, 1, 3), d(2022, 12, 29), "SSE", true)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_neighbour_found_beyond_first_window() {
        let calendar = Arc::new(FixedCalendar::new(&[d(2023, 1, 3)]));
        let (_, service) = service(calendar.clone()).await;

        let prev = service
            .previous_trading_day(d(2023, 3, 1), "SSE")
            .await
            .unwrap();
        assert_eq!(prev, Some(d(2023, 1, 3)));

        let next = service.next_trading_day(d(2022, 11, 2), "SSE").await.unwrap();
        assert_eq!(next, Some(d(2023, 1, 3)));

        // 一年以上的间隔也能找到
        let prev = service
            .previous_trading_day(d(2024, 6, 1), "SSE")
            .await
            .unwrap();
        assert_eq!(prev, Some(d(2023, 1, 3)));
    }

    #[tokio::test]
    async fn test_neighbour_absent_everywhere() {
        let (_, service) = service(Arc::new(FixedCalendar::new(&[]))).await;
        assert_eq!(service.next_trading_day(d(2023, 1, 3), "SSE").await.unwrap(), None);
        assert_eq!(service.previous_trading_day(d(2023, 1, 3), "SSE").await.unwrap(), None);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("auto".parse::<CalendarMode>().unwrap(), CalendarMode::LocalThenExchange);
        assert_eq!("database".parse::<CalendarMode>().unwrap(), CalendarMode::LocalOnly);
        assert!("akshare".parse::<CalendarMode>().is_err());
        assert_eq!(CalendarMode::default().to_string(), "auto");
    }
}
