//! 进程内存储引擎
//!
//! 与 [`PgStorageEngine`](super::PgStorageEngine) 共用同一套校验与写入计划，
//! 用于测试和不连库的试运行。

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::RoundingStrategy;
use tokio::sync::RwLock;
use tracing::debug;

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::Symbol;

use super::predicate::{Predicate, QueryRequest, SortDirection};
use super::schema::{now, ColumnType, SchemaRegistry, TableRef, TableSchema};
use super::sql_builder::{build_delete, build_select, resolve_projection, UpsertPlan};
use super::value::{Record, SqlValue};
use super::StorageEngine;

#[derive(Debug, Clone)]
struct MemTable {
    schema: TableSchema,
    /// 主键规范化表示 -> 完整行
    rows: BTreeMap<String, Record>,
}

impl MemTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
        }
    }

    fn key_of(&self, record: &Record) -> String {
        self.schema
            .primary_key
            .iter()
            .map(|column| record.get(column).unwrap_or(&SqlValue::Null).key_repr())
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }

    /// 补齐默认值、按列精度舍入小数并检查非空约束
    fn materialize(&self, columns: &[String], values: &[SqlValue]) -> Result<Record> {
        let now = now();
        let mut record = Record::new();
        for column in &self.schema.columns {
            let provided = columns
                .iter()
                .position(|c| c == column.name)
                .map(|i| values[i].clone());
            let value = match (provided, column.default) {
                (Some(value), _) => value,
                (None, Some(default)) => default.value(now),
                (None, None) => SqlValue::Null,
            };
            // NUMERIC(p, s) 与 Postgres 一样四舍五入到 s 位
            let value = match (value, column.ty) {
                (SqlValue::Decimal(d), ColumnType::Numeric(_, scale)) => SqlValue::Decimal(
                    d.round_dp_with_strategy(scale as u32, RoundingStrategy::MidpointAwayFromZero),
                ),
                (value, _) => value,
            };
            if value.is_null() && !column.nullable {
                return Err(IngestError::database(format!(
                    "表 {} 的列 {} 不能为空",
                    self.schema.name, column.name
                )));
            }
            record.set(column.name, value);
        }
        Ok(record)
    }
}

/// 进程内存储引擎
#[derive(Default)]
pub struct MemoryStorageEngine {
    tables: RwLock<HashMap<String, MemTable>>,
}

impl MemoryStorageEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn has_table(&self, table: &TableRef) -> bool {
        self.tables.read().await.contains_key(&table.table_name())
    }

    /// 表中行数，表不存在时为 0
    pub async fn row_count(&self, table: &TableRef) -> usize {
        self.tables
            .read()
            .await
            .get(&table.table_name())
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    fn missing(name: &str) -> IngestError {
        IngestError::database(format!("relation \"{}\" does not exist", name))
    }
}

/// NULL 视为最大值，与 Postgres 默认排序一致
fn order_values(a: &SqlValue, b: &SqlValue) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.compare(b).unwrap_or(Ordering::Equal),
    }
}

#[async_trait]
impl StorageEngine for MemoryStorageEngine {
    async fn ensure_base_structure(&self) -> Result<()> {
        let mut tables = self.tables.write().await;
        for schema in SchemaRegistry::base_tables() {
            tables
                .entry(schema.name.clone())
                .or_insert_with(|| MemTable::new(schema));
        }
        Ok(())
    }

    async fn ensure_entity_table(&self, symbol: &Symbol) -> Result<bool> {
        let schema = SchemaRegistry::resolve(&TableRef::DailyBar(symbol.clone()));
        let mut tables = self.tables.write().await;
        if tables.contains_key(&schema.name) {
            return Ok(false);
        }
        debug!("内存引擎创建表 {}", schema.name);
        tables.insert(schema.name.clone(), MemTable::new(schema));
        Ok(true)
    }

    async fn bulk_upsert(
        &self,
        table: &TableRef,
        rows: &[Record],
        conflict_key: &[&str],
        update_columns: &[&str],
    ) -> Result<u64> {
        let schema = SchemaRegistry::resolve(table);
        let plan = UpsertPlan::new(&schema, rows, conflict_key, update_columns)?;
        if plan.is_empty() {
            return Ok(0);
        }

        let mut tables = self.tables.write().await;
        let target = tables
            .get(&schema.name)
            .ok_or_else(|| Self::missing(&schema.name))?;

        // 在副本上完成整批写入，任一行失败时原表保持不变
        let mut staged = target.clone();
        let columns: Vec<String> = plan.columns.iter().map(|c| c.name.to_string()).collect();
        for values in &plan.rows {
            let incoming = staged.materialize(&columns, values)?;
            let key = staged.key_of(&incoming);
            let touch = staged.schema.touch_updated_at;
            match staged.rows.get_mut(&key) {
                Some(existing) => {
                    let changed = plan
                        .update_columns
                        .iter()
                        .any(|c| existing.get(c) != incoming.get(c));
                    if changed {
                        for column in &plan.update_columns {
                            let value = incoming.get(column).cloned().unwrap_or(SqlValue::Null);
                            existing.set(column, value);
                        }
                        if touch {
                            existing.set("updated_at", now());
                        }
                    }
                }
                None => {
                    staged.rows.insert(key, incoming);
                }
            }
        }
        tables.insert(schema.name.clone(), staged);
        Ok(plan.rows.len() as u64)
    }

    async fn query(&self, table: &TableRef, request: &QueryRequest) -> Result<Vec<Record>> {
        let schema = SchemaRegistry::resolve(table);
        build_select(&schema, request)?;
        let projection: Vec<String> = resolve_projection(&schema, request)?
            .iter()
            .map(|c| c.name.to_string())
            .collect();

        let tables = self.tables.read().await;
        let source = tables
            .get(&schema.name)
            .ok_or_else(|| Self::missing(&schema.name))?;

        let mut matched: Vec<&Record> = source
            .rows
            .values()
            .filter(|record| request.predicate.matches(record))
            .collect();
        if let Some(order) = &request.order_by {
            matched.sort_by(|a, b| {
                let ord = order_values(
                    a.get(&order.column).unwrap_or(&SqlValue::Null),
                    b.get(&order.column).unwrap_or(&SqlValue::Null),
                );
                match order.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }
        let limit = request.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(matched
            .into_iter()
            .take(limit)
            .map(|record| record.project(&projection))
            .collect())
    }

    async fn delete(&self, table: &TableRef, predicate: &Predicate) -> Result<u64> {
        let schema = SchemaRegistry::resolve(table);
        build_delete(&schema, predicate)?;

        let mut tables = self.tables.write().await;
        let target = tables
            .get_mut(&schema.name)
            .ok_or_else(|| Self::missing(&schema.name))?;
        let before = target.rows.len();
        target.rows.retain(|_, record| !predicate.matches(record));
        Ok((before - target.rows.len()) as u64)
    }
}
