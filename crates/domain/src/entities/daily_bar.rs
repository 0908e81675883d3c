//! 日线行情实体

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::AdjustMode;
use crate::value_objects::Symbol;

/// 单只股票单个交易日的行情
///
/// 每个 (symbol, trade_date) 只保留一行，重复写入覆盖数值列。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub symbol: Symbol,
    pub trade_date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    /// 成交量（股）
    pub volume: i64,
    /// 成交额
    pub amount: Decimal,
    pub pct_change: Option<Decimal>,
    pub turnover_rate: Option<Decimal>,
    pub amplitude: Option<Decimal>,
    pub adjust_mode: AdjustMode,
    /// 前复权因子
    pub forward_factor: Option<Decimal>,
    /// 后复权因子
    pub backward_factor: Option<Decimal>,
    /// 由存储层维护
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl DailyBar {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: Symbol,
        trade_date: NaiveDate,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: i64,
        amount: Decimal,
    ) -> Self {
        Self {
            symbol,
            trade_date,
            open,
            high,
            low,
            close,
            volume,
            amount,
            pct_change: None,
            turnover_rate: None,
            amplitude: None,
            adjust_mode: AdjustMode::None,
            forward_factor: None,
            backward_factor: None,
            created_at: None,
            updated_at: None,
        }
    }
}
