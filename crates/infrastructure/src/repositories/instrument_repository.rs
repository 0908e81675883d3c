//! 标的基础信息仓储

use std::sync::Arc;

use quant_ingest_common::Result;
use quant_ingest_domain::{Instrument, Market, Symbol};

use crate::storage::{Predicate, QueryRequest, Record, SortDirection, StorageEngine, TableRef};

const CONFLICT_KEY: &[&str] = &["symbol"];
const UPDATE_COLUMNS: &[&str] = &["name", "market", "industry", "listing_date", "active"];

fn to_record(instrument: &Instrument) -> Record {
    Record::new()
        .with("symbol", instrument.symbol.as_str())
        .with("name", instrument.name.as_str())
        .with("market", instrument.market.as_str())
        .with("industry", instrument.industry.clone())
        .with("listing_date", instrument.listing_date)
        .with("active", instrument.active)
}

fn from_record(record: &Record) -> Result<Instrument> {
    Ok(Instrument {
        symbol: record.text("symbol")?,
        name: record.text("name")?,
        market: record.text("market")?.parse::<Market>()?,
        industry: record.opt_text("industry")?,
        listing_date: record.opt_date("listing_date")?,
        active: record.bool("active")?,
    })
}

#[derive(Clone)]
pub struct InstrumentRepository {
    storage: Arc<dyn StorageEngine>,
}

impl InstrumentRepository {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self { storage }
    }

    /// 批量写入，代码需已校验
    pub async fn upsert_all(&self, instruments: &[Instrument]) -> Result<u64> {
        let mut rows = Vec::with_capacity(instruments.len());
        for instrument in instruments {
            instrument.validated_symbol()?;
            rows.push(to_record(instrument));
        }
        self.storage
            .bulk_upsert(&TableRef::Catalog, &rows, CONFLICT_KEY, UPDATE_COLUMNS)
            .await
    }

    /// 在市标的，按代码升序
    pub async fn find_active_symbols(&self) -> Result<Vec<Symbol>> {
        let request = QueryRequest::new()
            .filter(Predicate::new().eq("active", true))
            .select(&["symbol"])
            .order_by("symbol", SortDirection::Asc);
        self.storage
            .query(&TableRef::Catalog, &request)
            .await?
            .iter()
            .map(|row| Symbol::new(row.text("symbol")?))
            .collect()
    }

    pub async fn find(&self, symbol: &Symbol) -> Result<Option<Instrument>> {
        let request = QueryRequest::new()
            .filter(Predicate::new().eq("symbol", symbol.as_str()))
            .limit(1);
        let rows = self.storage.query(&TableRef::Catalog, &request).await?;
        rows.first().map(from_record).transpose()
    }
}
