use chrono::{Duration, NaiveDate};

use crate::errors::{IngestError, Result};

/// 解析日期字符串，支持 `YYYY-MM-DD` 与 `YYYYMMDD`
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    let value = value.trim();
    let format = match value.len() {
        8 if value.chars().all(|c| c.is_ascii_digit()) => "%Y%m%d",
        10 => "%Y-%m-%d",
        _ => {
            return Err(IngestError::validation(format!(
                "日期格式应为 'YYYY-MM-DD' 或 'YYYYMMDD', 实际: {}",
                value
            )))
        }
    };
    NaiveDate::parse_from_str(value, format)
        .map_err(|e| IngestError::validation(format!("日期解析失败 {}: {}", value, e)))
}

/// 数据源接口使用的紧凑日期格式
pub fn format_compact(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// [start, end] 闭区间内的所有自然日
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return vec![];
    }
    let days = (end - start).num_days();
    (0..=days).map(|offset| start + Duration::days(offset)).collect()
}
