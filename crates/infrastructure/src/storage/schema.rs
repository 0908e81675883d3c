//! 表结构注册表
//!
//! 所有表结构在这里声明，建表、索引与触发器 DDL 均由应用层生成。
//! 动态表名只来自校验过的 [`Symbol`]，列名只来自本注册表。

use chrono::{NaiveDateTime, Utc};

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::Symbol;

use super::value::SqlValue;

pub const CATALOG_TABLE: &str = "stock_basic";
pub const CALENDAR_TABLE: &str = "trading_calendar";
pub const CHECKPOINT_TABLE: &str = "task_checkpoint";
pub const DAILY_TABLE_PREFIX: &str = "stock_daily";

/// 维护 `updated_at` 的触发器函数
pub const TOUCH_FUNCTION: &str = "touch_updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Varchar(u16),
    SmallInt,
    BigInt,
    Numeric(u8, u8),
    Boolean,
    Date,
    Timestamp,
    Jsonb,
}

impl ColumnType {
    pub fn sql(&self) -> String {
        match self {
            ColumnType::Varchar(len) => format!("VARCHAR({})", len),
            ColumnType::SmallInt => "SMALLINT".to_string(),
            ColumnType::BigInt => "BIGINT".to_string(),
            ColumnType::Numeric(p, s) => format!("NUMERIC({}, {})", p, s),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "DATE".to_string(),
            ColumnType::Timestamp => "TIMESTAMP".to_string(),
            ColumnType::Jsonb => "JSONB".to_string(),
        }
    }

    /// 值能否写入该类型的列；NULL 总是可以，是否允许为空另行检查
    pub fn accepts(&self, value: &SqlValue) -> bool {
        match (self, value) {
            (_, SqlValue::Null) => true,
            (ColumnType::Varchar(len), SqlValue::Text(s)) => s.chars().count() <= *len as usize,
            (ColumnType::SmallInt, SqlValue::Int(v)) => i16::try_from(*v).is_ok(),
            (ColumnType::BigInt, SqlValue::Int(_)) => true,
            (ColumnType::Numeric(..), SqlValue::Decimal(_) | SqlValue::Int(_)) => true,
            (ColumnType::Boolean, SqlValue::Bool(_)) => true,
            (ColumnType::Date, SqlValue::Date(_)) => true,
            (ColumnType::Timestamp, SqlValue::Timestamp(_)) => true,
            (ColumnType::Jsonb, SqlValue::Json(_)) => true,
            _ => false,
        }
    }
}

/// 列默认值
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnDefault {
    CurrentTimestamp,
    Int(i64),
    Bool(bool),
}

impl ColumnDefault {
    fn sql(&self) -> String {
        match self {
            ColumnDefault::CurrentTimestamp => "CURRENT_TIMESTAMP".to_string(),
            ColumnDefault::Int(v) => v.to_string(),
            ColumnDefault::Bool(v) => v.to_string().to_uppercase(),
        }
    }

    pub fn value(&self, now: NaiveDateTime) -> SqlValue {
        match self {
            ColumnDefault::CurrentTimestamp => SqlValue::Timestamp(now),
            ColumnDefault::Int(v) => SqlValue::Int(*v),
            ColumnDefault::Bool(v) => SqlValue::Bool(*v),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub nullable: bool,
    pub default: Option<ColumnDefault>,
}

impl ColumnDef {
    const fn required(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: None,
        }
    }

    const fn optional(name: &'static str, ty: ColumnType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
            default: None,
        }
    }

    const fn defaulted(name: &'static str, ty: ColumnType, default: ColumnDefault) -> Self {
        Self {
            name,
            ty,
            nullable: false,
            default: Some(default),
        }
    }

    fn ddl(&self) -> String {
        let mut ddl = format!("{} {}", quote_ident(self.name), self.ty.sql());
        if !self.nullable {
            ddl.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default {
            ddl.push_str(" DEFAULT ");
            ddl.push_str(&default.sql());
        }
        ddl
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub suffix: &'static str,
    pub columns: &'static [&'static str],
}

/// 逻辑表引用
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TableRef {
    Catalog,
    Calendar,
    Checkpoint,
    /// 单只股票的日线表 `stock_daily_<symbol>`
    DailyBar(Symbol),
}

impl TableRef {
    pub fn table_name(&self) -> String {
        match self {
            TableRef::Catalog => CATALOG_TABLE.to_string(),
            TableRef::Calendar => CALENDAR_TABLE.to_string(),
            TableRef::Checkpoint => CHECKPOINT_TABLE.to_string(),
            TableRef::DailyBar(symbol) => format!("{}_{}", DAILY_TABLE_PREFIX, symbol.as_str()),
        }
    }
}

/// 表结构
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<&'static str>,
    pub indexes: Vec<IndexDef>,
    /// 是否挂 `updated_at` 触发器
    pub touch_updated_at: bool,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// 列名必须在声明中，否则视为非法标识符
    pub fn require_column(&self, name: &str) -> Result<&ColumnDef> {
        self.column(name).ok_or_else(|| {
            IngestError::InvalidIdentifier(format!("表 {} 不存在列 {}", self.name, name))
        })
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.to_string()).collect()
    }

    pub fn has_updated_at(&self) -> bool {
        self.column("updated_at").is_some()
    }

    pub fn create_table_sql(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnDef::ddl).collect();
        parts.push(format!("PRIMARY KEY ({})", quote_list(&self.primary_key)));
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote_ident(&self.name),
            parts.join(", ")
        )
    }

    pub fn create_index_sqls(&self) -> Vec<String> {
        self.indexes
            .iter()
            .map(|index| {
                format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                    quote_ident(&format!("idx_{}_{}", self.name, index.suffix)),
                    quote_ident(&self.name),
                    quote_list(index.columns)
                )
            })
            .collect()
    }

    /// 先删后建，保证重复执行不报错
    pub fn trigger_sqls(&self) -> Vec<String> {
        if !self.touch_updated_at {
            return Vec::new();
        }
        let trigger = quote_ident(&format!("trg_{}_updated_at", self.name));
        let table = quote_ident(&self.name);
        vec![
            format!("DROP TRIGGER IF EXISTS {} ON {}", trigger, table),
            format!(
                "CREATE TRIGGER {} BEFORE UPDATE ON {} FOR EACH ROW EXECUTE FUNCTION {}()",
                trigger, table, TOUCH_FUNCTION
            ),
        ]
    }

    /// 建表、索引、触发器的完整 DDL
    pub fn ddl(&self) -> Vec<String> {
        let mut statements = vec![self.create_table_sql()];
        statements.extend(self.create_index_sqls());
        statements.extend(self.trigger_sqls());
        statements
    }
}

pub fn touch_function_sql() -> String {
    format!(
        "CREATE OR REPLACE FUNCTION {}() RETURNS TRIGGER AS $$ \
         BEGIN NEW.updated_at = CURRENT_TIMESTAMP; RETURN NEW; END; \
         $$ LANGUAGE plpgsql",
        TOUCH_FUNCTION
    )
}

/// 双引号包裹标识符
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn quote_list<S: AsRef<str>>(names: &[S]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 当前时间（UTC，无时区），内存实现与默认值共用
pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// 表结构注册表
pub struct SchemaRegistry;

impl SchemaRegistry {
    pub fn resolve(table: &TableRef) -> TableSchema {
        match table {
            TableRef::Catalog => Self::catalog(),
            TableRef::Calendar => Self::calendar(),
            TableRef::Checkpoint => Self::checkpoint(),
            TableRef::DailyBar(symbol) => Self::daily_bar(symbol),
        }
    }

    /// 启动时创建的固定表
    pub fn base_tables() -> Vec<TableSchema> {
        vec![Self::catalog(), Self::calendar(), Self::checkpoint()]
    }

    fn catalog() -> TableSchema {
        TableSchema {
            name: CATALOG_TABLE.to_string(),
            columns: vec![
                ColumnDef::required("symbol", ColumnType::Varchar(10)),
                ColumnDef::required("name", ColumnType::Varchar(50)),
                ColumnDef::required("market", ColumnType::Varchar(10)),
                ColumnDef::optional("industry", ColumnType::Varchar(50)),
                ColumnDef::optional("listing_date", ColumnType::Date),
                ColumnDef::defaulted("active", ColumnType::Boolean, ColumnDefault::Bool(true)),
                ColumnDef::defaulted(
                    "created_at",
                    ColumnType::Timestamp,
                    ColumnDefault::CurrentTimestamp,
                ),
                ColumnDef::defaulted(
                    "updated_at",
                    ColumnType::Timestamp,
                    ColumnDefault::CurrentTimestamp,
                ),
            ],
            primary_key: vec!["symbol"],
            indexes: vec![
                IndexDef {
                    suffix: "market",
                    columns: &["market"],
                },
                IndexDef {
                    suffix: "active",
                    columns: &["active"],
                },
            ],
            touch_updated_at: true,
        }
    }

    fn calendar() -> TableSchema {
        TableSchema {
            name: CALENDAR_TABLE.to_string(),
            columns: vec![
                ColumnDef::required("trade_date", ColumnType::Date),
                ColumnDef::required("exchange", ColumnType::Varchar(10)),
                ColumnDef::required("is_trading_day", ColumnType::Boolean),
                ColumnDef::optional("holiday_name", ColumnType::Varchar(50)),
                ColumnDef::defaulted(
                    "updated_at",
                    ColumnType::Timestamp,
                    ColumnDefault::CurrentTimestamp,
                ),
            ],
            primary_key: vec!["trade_date", "exchange"],
            indexes: vec![IndexDef {
                suffix: "exchange",
                columns: &["exchange"],
            }],
            touch_updated_at: true,
        }
    }

    fn checkpoint() -> TableSchema {
        TableSchema {
            name: CHECKPOINT_TABLE.to_string(),
            columns: vec![
                ColumnDef::required("task_id", ColumnType::Varchar(100)),
                ColumnDef::required("progress_data", ColumnType::Jsonb),
                ColumnDef::defaulted(
                    "updated_at",
                    ColumnType::Timestamp,
                    ColumnDefault::CurrentTimestamp,
                ),
            ],
            primary_key: vec!["task_id"],
            indexes: vec![IndexDef {
                suffix: "updated_at",
                columns: &["updated_at"],
            }],
            touch_updated_at: true,
        }
    }

    fn daily_bar(symbol: &Symbol) -> TableSchema {
        TableSchema {
            name: format!("{}_{}", DAILY_TABLE_PREFIX, symbol.as_str()),
            columns: vec![
                ColumnDef::required("trade_date", ColumnType::Date),
                ColumnDef::required("symbol", ColumnType::Varchar(10)),
                ColumnDef::required("open", ColumnType::Numeric(10, 2)),
                ColumnDef::required("high", ColumnType::Numeric(10, 2)),
                ColumnDef::required("low", ColumnType::Numeric(10, 2)),
                ColumnDef::required("close", ColumnType::Numeric(10, 2)),
                ColumnDef::required("volume", ColumnType::BigInt),
                ColumnDef::required("amount", ColumnType::Numeric(20, 2)),
                ColumnDef::optional("pct_change", ColumnType::Numeric(10, 2)),
                ColumnDef::optional("turnover_rate", ColumnType::Numeric(10, 2)),
                ColumnDef::optional("amplitude", ColumnType::Numeric(10, 2)),
                ColumnDef::defaulted("adjust_mode", ColumnType::SmallInt, ColumnDefault::Int(0)),
                ColumnDef::optional("forward_factor", ColumnType::Numeric(20, 6)),
                ColumnDef::optional("backward_factor", ColumnType::Numeric(20, 6)),
                ColumnDef::defaulted(
                    "created_at",
                    ColumnType::Timestamp,
                    ColumnDefault::CurrentTimestamp,
                ),
                ColumnDef::defaulted(
                    "updated_at",
                    ColumnType::Timestamp,
                    ColumnDefault::CurrentTimestamp,
                ),
            ],
            primary_key: vec!["trade_date"],
            indexes: vec![IndexDef {
                suffix: "trade_date",
                columns: &["trade_date"],
            }],
            touch_updated_at: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_table_name_from_symbol() {
        let symbol = Symbol::new("600000").unwrap();
        let table = TableRef::DailyBar(symbol.clone());
        assert_eq!(table.table_name(), "stock_daily_600000");
        assert_eq!(SchemaRegistry::resolve(&table).name, "stock_daily_600000");
    }

    #[test]
    fn test_daily_ddl() {
        let schema = SchemaRegistry::resolve(&TableRef::DailyBar(Symbol::new("000001").unwrap()));
        let ddl = schema.ddl();
        assert_eq!(ddl.len(), 4);
        assert!(ddl[0].starts_with("CREATE TABLE IF NOT EXISTS \"stock_daily_000001\" ("));
        assert!(ddl[0].contains("\"adjust_mode\" SMALLINT NOT NULL DEFAULT 0"));
        assert!(ddl[0].contains("\"pct_change\" NUMERIC(10, 2),"));
        assert!(ddl[0].ends_with("PRIMARY KEY (\"trade_date\"))"));
        assert_eq!(
            ddl[1],
            "CREATE INDEX IF NOT EXISTS \"idx_stock_daily_000001_trade_date\" ON \"stock_daily_000001\" (\"trade_date\")"
        );
        assert!(ddl[2].starts_with("DROP TRIGGER IF EXISTS"));
        assert!(ddl[3].contains("EXECUTE FUNCTION touch_updated_at()"));
    }

    #[test]
    fn test_calendar_composite_key() {
        let schema = SchemaRegistry::resolve(&TableRef::Calendar);
        assert!(schema
            .create_table_sql()
            .contains("PRIMARY KEY (\"trade_date\", \"exchange\")"));
    }

    #[test]
    fn test_unknown_column_rejected() {
        let schema = SchemaRegistry::resolve(&TableRef::Catalog);
        assert!(matches!(
            schema.require_column("name; DROP TABLE x"),
            Err(IngestError::InvalidIdentifier(_))
        ));
        assert!(schema.require_column("industry").is_ok());
    }

    #[test]
    fn test_column_type_accepts() {
        assert!(ColumnType::SmallInt.accepts(&SqlValue::Int(2)));
        assert!(!ColumnType::SmallInt.accepts(&SqlValue::Int(100_000)));
        assert!(!ColumnType::Varchar(2).accepts(&SqlValue::Text("abc".into())));
        assert!(ColumnType::Date.accepts(&SqlValue::Null));
        assert!(!ColumnType::Date.accepts(&SqlValue::Text("2023-01-01".into())));
    }
}
