//! 查询条件

use quant_ingest_common::{IngestError, Result};

use super::value::{Record, SqlValue};

/// 比较运算符
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Operator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
        }
    }
}

/// 单列条件
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// 等值字面量
    Eq(SqlValue),
    Compare(Operator, SqlValue),
    /// 闭区间
    Between(SqlValue, SqlValue),
}

impl Condition {
    /// 按运算符文本构造，支持 `=`, `<`, `>`, `<=`, `>=`, `BETWEEN`
    pub fn parse(operator: &str, mut values: Vec<SqlValue>) -> Result<Self> {
        let op = operator.trim().to_uppercase();
        if op == "BETWEEN" {
            if values.len() != 2 {
                return Err(IngestError::validation(format!(
                    "BETWEEN 需要 2 个值, 实际 {} 个",
                    values.len()
                )));
            }
            let high = values.remove(1);
            let low = values.remove(0);
            return Ok(Condition::Between(low, high));
        }

        let operator = match op.as_str() {
            "=" => Operator::Eq,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            other => {
                return Err(IngestError::validation(format!(
                    "不支持的运算符: {}",
                    other
                )))
            }
        };
        if values.len() != 1 {
            return Err(IngestError::validation(format!(
                "运算符 {} 需要 1 个值, 实际 {} 个",
                operator.as_sql(),
                values.len()
            )));
        }
        Ok(Condition::Compare(operator, values.remove(0)))
    }

    pub fn values(&self) -> Vec<&SqlValue> {
        match self {
            Condition::Eq(v) | Condition::Compare(_, v) => vec![v],
            Condition::Between(low, high) => vec![low, high],
        }
    }

    /// 在内存中求值，语义与 SQL 一致（NULL 参与的比较为假）
    pub fn matches(&self, actual: &SqlValue) -> bool {
        use std::cmp::Ordering::*;

        match self {
            Condition::Eq(expected) => actual.compare(expected) == Some(Equal),
            Condition::Compare(op, expected) => match (op, actual.compare(expected)) {
                (_, None) => false,
                (Operator::Eq, Some(ord)) => ord == Equal,
                (Operator::Lt, Some(ord)) => ord == Less,
                (Operator::Gt, Some(ord)) => ord == Greater,
                (Operator::Le, Some(ord)) => ord != Greater,
                (Operator::Ge, Some(ord)) => ord != Less,
            },
            Condition::Between(low, high) => {
                matches!(actual.compare(low), Some(Greater) | Some(Equal))
                    && matches!(actual.compare(high), Some(Less) | Some(Equal))
            }
        }
    }
}

/// 多列条件，各列之间为 AND
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<(String, Condition)>,
}

impl Predicate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.with(column, Condition::Eq(value.into()))
    }

    pub fn compare(self, column: &str, op: Operator, value: impl Into<SqlValue>) -> Self {
        self.with(column, Condition::Compare(op, value.into()))
    }

    pub fn between(
        self,
        column: &str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> Self {
        self.with(column, Condition::Between(low.into(), high.into()))
    }

    pub fn with(mut self, column: &str, condition: Condition) -> Self {
        self.clauses.push((column.to_string(), condition));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|(column, condition)| {
            let actual = record.get(column).unwrap_or(&SqlValue::Null);
            condition.matches(actual)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: SortDirection,
}

/// 查询请求
///
/// `projection` 为空时返回表的全部列。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub predicate: Predicate,
    pub projection: Option<Vec<String>>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u64>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn select(mut self, columns: &[&str]) -> Self {
        self.projection = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn order_by(mut self, column: &str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            column: column.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
