//! 行与列值
//!
//! 存储层不认识业务实体，只处理按列名排列的 [`Record`]。

use std::cmp::Ordering;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

use quant_ingest_common::{IngestError, Result};

/// 单列取值
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Decimal(Decimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    Json(serde_json::Value),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Decimal(_) => "decimal",
            SqlValue::Text(_) => "text",
            SqlValue::Date(_) => "date",
            SqlValue::Timestamp(_) => "timestamp",
            SqlValue::Json(_) => "json",
        }
    }

    /// SQL 比较语义：NULL 与任何值都不可比较
    pub fn compare(&self, other: &SqlValue) -> Option<Ordering> {
        match (self, other) {
            (SqlValue::Bool(a), SqlValue::Bool(b)) => Some(a.cmp(b)),
            (SqlValue::Int(a), SqlValue::Int(b)) => Some(a.cmp(b)),
            (SqlValue::Decimal(a), SqlValue::Decimal(b)) => Some(a.cmp(b)),
            (SqlValue::Int(a), SqlValue::Decimal(b)) => Some(Decimal::from(*a).cmp(b)),
            (SqlValue::Decimal(a), SqlValue::Int(b)) => Some(a.cmp(&Decimal::from(*b))),
            (SqlValue::Text(a), SqlValue::Text(b)) => Some(a.cmp(b)),
            (SqlValue::Date(a), SqlValue::Date(b)) => Some(a.cmp(b)),
            (SqlValue::Timestamp(a), SqlValue::Timestamp(b)) => Some(a.cmp(b)),
            (SqlValue::Json(a), SqlValue::Json(b)) if a == b => Some(Ordering::Equal),
            _ => None,
        }
    }

    /// 冲突键比较用的规范化表示
    pub(crate) fn key_repr(&self) -> String {
        match self {
            SqlValue::Null => "∅".to_string(),
            SqlValue::Bool(v) => v.to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Decimal(v) => v.normalize().to_string(),
            SqlValue::Text(v) => v.clone(),
            SqlValue::Date(v) => v.to_string(),
            SqlValue::Timestamp(v) => v.to_string(),
            SqlValue::Json(v) => v.to_string(),
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i16> for SqlValue {
    fn from(v: i16) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<serde_json::Value> for SqlValue {
    fn from(v: serde_json::Value) -> Self {
        SqlValue::Json(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// 一行数据，列顺序即写入顺序
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, SqlValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 链式追加列
    pub fn with(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.set(column, value);
        self
    }

    /// 设置列值，列已存在时覆盖
    pub fn set(&mut self, column: &str, value: impl Into<SqlValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == column) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// 只保留指定列，按给定顺序排列
    pub fn project(&self, columns: &[String]) -> Record {
        let mut projected = Record::new();
        for column in columns {
            let value = self.get(column).cloned().unwrap_or(SqlValue::Null);
            projected.fields.push((column.clone(), value));
        }
        projected
    }

    fn required(&self, column: &str) -> Result<&SqlValue> {
        match self.get(column) {
            Some(SqlValue::Null) | None => Err(IngestError::database(format!(
                "列 {} 为空或不存在",
                column
            ))),
            Some(value) => Ok(value),
        }
    }

    fn mismatch(column: &str, expected: &str, value: &SqlValue) -> IngestError {
        IngestError::database(format!(
            "列 {} 类型不符: 期望 {}, 实际 {}",
            column,
            expected,
            value.type_name()
        ))
    }

    pub fn text(&self, column: &str) -> Result<String> {
        match self.required(column)? {
            SqlValue::Text(v) => Ok(v.clone()),
            other => Err(Self::mismatch(column, "text", other)),
        }
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>> {
        self.optional(column, |c| self.text(c))
    }

    pub fn bool(&self, column: &str) -> Result<bool> {
        match self.required(column)? {
            SqlValue::Bool(v) => Ok(*v),
            other => Err(Self::mismatch(column, "bool", other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64> {
        match self.required(column)? {
            SqlValue::Int(v) => Ok(*v),
            other => Err(Self::mismatch(column, "int", other)),
        }
    }

    pub fn decimal(&self, column: &str) -> Result<Decimal> {
        match self.required(column)? {
            SqlValue::Decimal(v) => Ok(*v),
            SqlValue::Int(v) => Ok(Decimal::from(*v)),
            other => Err(Self::mismatch(column, "decimal", other)),
        }
    }

    pub fn opt_decimal(&self, column: &str) -> Result<Option<Decimal>> {
        self.optional(column, |c| self.decimal(c))
    }

    pub fn date(&self, column: &str) -> Result<NaiveDate> {
        match self.required(column)? {
            SqlValue::Date(v) => Ok(*v),
            other => Err(Self::mismatch(column, "date", other)),
        }
    }

    pub fn opt_date(&self, column: &str) -> Result<Option<NaiveDate>> {
        self.optional(column, |c| self.date(c))
    }

    pub fn opt_timestamp(&self, column: &str) -> Result<Option<NaiveDateTime>> {
        self.optional(column, |c| match self.required(c)? {
            SqlValue::Timestamp(v) => Ok(*v),
            other => Err(Self::mismatch(c, "timestamp", other)),
        })
    }

    pub fn json(&self, column: &str) -> Result<serde_json::Value> {
        match self.required(column)? {
            SqlValue::Json(v) => Ok(v.clone()),
            other => Err(Self::mismatch(column, "json", other)),
        }
    }

    fn optional<T>(&self, column: &str, read: impl Fn(&str) -> Result<T>) -> Result<Option<T>> {
        match self.get(column) {
            None | Some(SqlValue::Null) => Ok(None),
            Some(_) => read(column).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromStr;

    #[test]
    fn test_set_overwrites_in_place() {
        let mut record = Record::new().with("a", 1i64).with("b", "x");
        record.set("a", 2i64);
        assert_eq!(record.columns().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record.int("a").unwrap(), 2);
    }

    #[test]
    fn test_null_never_compares() {
        assert_eq!(SqlValue::Null.compare(&SqlValue::Null), None);
        assert_eq!(
            SqlValue::Int(2).compare(&SqlValue::Decimal(Decimal::from_str("1.5").unwrap())),
            Some(Ordering::Greater)
        );
    }

    #[test]
    fn test_optional_accessors() {
        let record = Record::new()
            .with("industry", Option::<String>::None)
            .with("close", Decimal::from_str("10.50").unwrap());
        assert_eq!(record.opt_text("industry").unwrap(), None);
        assert_eq!(record.opt_text("missing").unwrap(), None);
        assert!(record.text("industry").is_err());
        assert!(record.date("close").is_err());
    }

    #[test]
    fn test_decimal_key_repr_normalized() {
        let a = SqlValue::Decimal(Decimal::from_str("1.50").unwrap());
        let b = SqlValue::Decimal(Decimal::from_str("1.5").unwrap());
        assert_eq!(a.key_repr(), b.key_repr());
    }
}
