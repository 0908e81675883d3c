//! 从数据源拉取全量标的并写入 `stock_basic`

use std::sync::Arc;

use tracing::{info, warn};

use quant_ingest_common::Result;
use quant_ingest_domain::{Instrument, MarketDataProvider};
use quant_ingest_infrastructure::retry::{retry, RetryPolicy};
use quant_ingest_infrastructure::InstrumentRepository;

pub struct CatalogSyncService {
    provider: Arc<dyn MarketDataProvider>,
    repo: InstrumentRepository,
    retry_policy: RetryPolicy,
}

impl CatalogSyncService {
    pub fn new(provider: Arc<dyn MarketDataProvider>, repo: InstrumentRepository) -> Self {
        Self {
            provider,
            repo,
            retry_policy: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// 同步标的目录，返回写入条数；代码不合法的标的跳过
    pub async fn sync_catalog(&self) -> Result<u64> {
        info!("📋 开始同步标的基础信息...");
        let instruments = retry(&self.retry_policy, "获取标的列表", || {
            self.provider.list_entities()
        })
        .await?;
        let fetched = instruments.len();

        let valid: Vec<Instrument> = instruments
            .into_iter()
            .filter(|instrument| match instrument.validated_symbol() {
                Ok(_) => true,
                Err(e) => {
                    warn!("跳过非法代码 {:?}: {}", instrument.symbol, e);
                    false
                }
            })
            .collect();

        let written = self.repo.upsert_all(&valid).await?;
        info!(
            "✅ 标的基础信息同步完成: 获取 {} 条, 写入 {} 条, 跳过 {} 条",
            fetched,
            written,
            fetched - valid.len()
        );
        Ok(written)
    }
}
