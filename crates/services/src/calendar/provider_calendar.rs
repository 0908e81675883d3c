//! 以行情数据源的历史交易日作为日历来源

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::OnceCell;
use tracing::info;

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::{ExchangeCalendar, MarketDataProvider};

/// 数据源给出的交易日不区分交易所，首次使用时拉取一次后缓存
pub struct ProviderCalendar {
    provider: Arc<dyn MarketDataProvider>,
    dates: OnceCell<BTreeSet<NaiveDate>>,
}

impl ProviderCalendar {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            dates: OnceCell::new(),
        }
    }

    async fn dates(&self) -> Result<&BTreeSet<NaiveDate>> {
        self.dates
            .get_or_try_init(|| async {
                let dates: BTreeSet<NaiveDate> =
                    self.provider.list_calendar_dates().await?.into_iter().collect();
                info!("从数据源获取 {} 个历史交易日", dates.len());
                Ok::<_, IngestError>(dates)
            })
            .await
    }
}

#[async_trait]
impl ExchangeCalendar for ProviderCalendar {
    async fn schedule(
        &self,
        _exchange: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeSet<NaiveDate>> {
        if start > end {
            return Ok(BTreeSet::new());
        }
        Ok(self.dates().await?.range(start..=end).copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quant_ingest_domain::{AdjustMode, DailyBar, Instrument, Symbol};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct DatesProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataProvider for DatesProvider {
        async fn list_entities(&self) -> Result<Vec<Instrument>> {
            Ok(Vec::new())
        }

        async fn fetch_history(
            &self,
            _symbol: &Symbol,
            _start: NaiveDate,
            _end: NaiveDate,
            _adjust: AdjustMode,
        ) -> Result<Vec<DailyBar>> {
            Ok(Vec::new())
        }

        async fn list_calendar_dates(&self) -> Result<Vec<NaiveDate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![
                NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
                NaiveDate::from_ymd_opt(2023, 1, 4).unwrap(),
                NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
            ])
        }
    }

    #[tokio::test]
    async fn test_schedule_filters_and_caches() {
        let provider = Arc::new(DatesProvider {
            calls: AtomicUsize::new(0),
        });
        let calendar = ProviderCalendar::new(provider.clone());
        let jan = |d| NaiveDate::from_ymd_opt(2023, 1, d).unwrap();

        let days = calendar.schedule("SSE", jan(1), jan(31)).await.unwrap();
        assert_eq!(days.into_iter().collect::<Vec<_>>(), vec![jan(3), jan(4)]);
        let days = calendar.schedule("SZSE", jan(4), jan(4)).await.unwrap();
        assert_eq!(days.len(), 1);
        assert!(calendar.schedule("SSE", jan(5), jan(1)).await.unwrap().is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }
}
