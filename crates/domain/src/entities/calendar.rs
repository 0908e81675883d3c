//! 交易日历

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// 未指定交易所时使用上交所
pub const DEFAULT_EXCHANGE: &str = "SSE";

/// 非交易日的节假日占位标签
pub const HOLIDAY_PLACEHOLDER: &str = "节假日";

/// 交易日历条目，(trade_date, exchange) 唯一
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub trade_date: NaiveDate,
    pub exchange: String,
    pub is_trading_day: bool,
    pub holiday_name: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

impl CalendarEntry {
    /// 按是否开市生成条目，休市日填入占位标签
    pub fn classified(trade_date: NaiveDate, exchange: &str, is_trading_day: bool) -> Self {
        Self {
            trade_date,
            exchange: exchange.to_string(),
            is_trading_day,
            holiday_name: (!is_trading_day).then(|| HOLIDAY_PLACEHOLDER.to_string()),
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_day_carries_holiday_label() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 12).unwrap();
        let closed = CalendarEntry::classified(date, DEFAULT_EXCHANGE, false);
        assert_eq!(closed.holiday_name.as_deref(), Some("节假日"));

        let open = CalendarEntry::classified(date, DEFAULT_EXCHANGE, true);
        assert_eq!(open.holiday_name, None);
    }
}
