//! 标的基础信息

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use quant_ingest_common::Result;

use crate::enums::Market;
use crate::value_objects::Symbol;

/// 标的基础信息，`symbol` 为不可变身份
///
/// 代码保持数据源给出的原样，落库前通过 [`Instrument::validated_symbol`] 校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub symbol: String,
    pub name: String,
    pub market: Market,
    pub industry: Option<String>,
    pub listing_date: Option<NaiveDate>,
    pub active: bool,
}

impl Instrument {
    /// 创建在市标的，市场按代码首位推断
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        let symbol = symbol.into();
        Self {
            market: Market::from_symbol(&symbol),
            symbol,
            name: name.into(),
            industry: None,
            listing_date: None,
            active: true,
        }
    }

    pub fn validated_symbol(&self) -> Result<Symbol> {
        Symbol::new(self.symbol.clone())
    }
}
