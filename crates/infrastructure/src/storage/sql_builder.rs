//! 参数化 SQL 构造
//!
//! 纯函数，不接触连接。标识符一律来自 [`TableSchema`] 并加双引号，
//! 取值全部以 `$n` 占位符绑定。

use std::collections::HashMap;

use quant_ingest_common::{IngestError, Result};

use super::predicate::{Condition, Predicate, QueryRequest};
use super::schema::{quote_ident, quote_list, ColumnDef, ColumnType, TableSchema};
use super::value::{Record, SqlValue};

/// Postgres 单条语句的绑定参数上限
pub const MAX_BIND_PARAMS: usize = 65_535;

/// 暂存表名，事务提交时自动删除
pub const STAGE_TABLE: &str = "upsert_stage";

/// 带列类型的绑定参数，空值也能按列类型绑定
#[derive(Debug, Clone, PartialEq)]
pub struct BoundParam {
    pub value: SqlValue,
    pub ty: ColumnType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<BoundParam>,
}

impl BuiltQuery {
    fn push(&mut self, value: SqlValue, ty: ColumnType) -> String {
        self.params.push(BoundParam { value, ty });
        format!("${}", self.params.len())
    }
}

fn check_value(column: &ColumnDef, value: &SqlValue) -> Result<()> {
    if column.ty.accepts(value) {
        Ok(())
    } else {
        Err(IngestError::validation(format!(
            "列 {} ({}) 不接受 {} 类型的值",
            column.name,
            column.ty.sql(),
            value.type_name()
        )))
    }
}

/// 校验条件中的列与取值类型
pub fn validate_predicate(schema: &TableSchema, predicate: &Predicate) -> Result<()> {
    for (column, condition) in predicate.clauses() {
        let def = schema.require_column(column)?;
        for value in condition.values() {
            check_value(def, value)?;
        }
    }
    Ok(())
}

fn push_where(schema: &TableSchema, predicate: &Predicate, query: &mut BuiltQuery) -> Result<()> {
    validate_predicate(schema, predicate)?;
    if predicate.is_empty() {
        return Ok(());
    }

    let mut clauses = Vec::with_capacity(predicate.clauses().len());
    for (column, condition) in predicate.clauses() {
        let def = schema.require_column(column)?;
        let ident = quote_ident(def.name);
        let clause = match condition {
            Condition::Eq(value) => {
                format!("{} = {}", ident, query.push(value.clone(), def.ty))
            }
            Condition::Compare(op, value) => {
                format!("{} {} {}", ident, op.as_sql(), query.push(value.clone(), def.ty))
            }
            Condition::Between(low, high) => {
                let low = query.push(low.clone(), def.ty);
                let high = query.push(high.clone(), def.ty);
                format!("{} BETWEEN {} AND {}", ident, low, high)
            }
        };
        clauses.push(clause);
    }
    query.sql.push_str(" WHERE ");
    query.sql.push_str(&clauses.join(" AND "));
    Ok(())
}

/// 解析投影列，返回按投影顺序排列的列定义
pub fn resolve_projection<'a>(
    schema: &'a TableSchema,
    request: &QueryRequest,
) -> Result<Vec<&'a ColumnDef>> {
    match &request.projection {
        None => Ok(schema.columns.iter().collect()),
        Some(columns) if columns.is_empty() => {
            Err(IngestError::validation("投影列不能为空列表"))
        }
        Some(columns) => columns.iter().map(|c| schema.require_column(c)).collect(),
    }
}

pub fn build_select(schema: &TableSchema, request: &QueryRequest) -> Result<BuiltQuery> {
    let projection = resolve_projection(schema, request)?;
    let names: Vec<&str> = projection.iter().map(|c| c.name).collect();

    let mut query = BuiltQuery {
        sql: format!("SELECT {} FROM {}", quote_list(&names), quote_ident(&schema.name)),
        params: Vec::new(),
    };
    push_where(schema, &request.predicate, &mut query)?;

    if let Some(order) = &request.order_by {
        let def = schema.require_column(&order.column)?;
        query.sql.push_str(&format!(
            " ORDER BY {} {}",
            quote_ident(def.name),
            order.direction.as_sql()
        ));
    }
    if let Some(limit) = request.limit {
        let limit = i64::try_from(limit)
            .map_err(|_| IngestError::validation(format!("LIMIT 超出范围: {}", limit)))?;
        let placeholder = query.push(SqlValue::Int(limit), ColumnType::BigInt);
        query.sql.push_str(&format!(" LIMIT {}", placeholder));
    }
    Ok(query)
}

/// 删除必须带条件
pub fn build_delete(schema: &TableSchema, predicate: &Predicate) -> Result<BuiltQuery> {
    if predicate.is_empty() {
        return Err(IngestError::validation(format!(
            "拒绝无条件删除表 {}",
            schema.name
        )));
    }
    let mut query = BuiltQuery {
        sql: format!("DELETE FROM {}", quote_ident(&schema.name)),
        params: Vec::new(),
    };
    push_where(schema, predicate, &mut query)?;
    Ok(query)
}

/// 一次批量写入的执行计划
///
/// 构造时完成全部校验并按冲突键去重（保留最后一次出现的行），
/// 数据库实现与内存实现共用同一份计划。
#[derive(Debug, Clone)]
pub struct UpsertPlan {
    pub table: String,
    pub columns: Vec<ColumnDef>,
    pub conflict_key: Vec<String>,
    pub update_columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl UpsertPlan {
    pub fn new(
        schema: &TableSchema,
        rows: &[Record],
        conflict_key: &[&str],
        update_columns: &[&str],
    ) -> Result<Self> {
        if update_columns.is_empty() {
            return Err(IngestError::validation("必须指定需要更新的列"));
        }
        if conflict_key.is_empty() {
            return Err(IngestError::validation("必须指定冲突键"));
        }
        for column in conflict_key.iter().chain(update_columns) {
            schema.require_column(column)?;
        }
        if let Some(column) = update_columns.iter().find(|c| conflict_key.contains(*c)) {
            return Err(IngestError::validation(format!(
                "冲突键列 {} 不能出现在更新列中",
                column
            )));
        }
        let mut key_sorted: Vec<&str> = conflict_key.to_vec();
        key_sorted.sort_unstable();
        let mut pk_sorted = schema.primary_key.clone();
        pk_sorted.sort_unstable();
        if key_sorted != pk_sorted {
            return Err(IngestError::validation(format!(
                "冲突键 {:?} 与表 {} 的主键 {:?} 不一致",
                conflict_key, schema.name, schema.primary_key
            )));
        }

        let mut plan = Self {
            table: schema.name.clone(),
            columns: Vec::new(),
            conflict_key: conflict_key.iter().map(|c| c.to_string()).collect(),
            update_columns: update_columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        };
        let Some(first) = rows.first() else {
            return Ok(plan);
        };

        for name in first.columns() {
            plan.columns.push(schema.require_column(name)?.clone());
        }
        for column in conflict_key.iter().chain(update_columns) {
            if !first.contains(column) {
                return Err(IngestError::validation(format!("写入数据缺少列 {}", column)));
            }
        }

        let key_positions: Vec<usize> = conflict_key
            .iter()
            .filter_map(|k| plan.columns.iter().position(|c| c.name == *k))
            .collect();
        let mut seen: HashMap<Vec<String>, usize> = HashMap::with_capacity(rows.len());

        for (index, record) in rows.iter().enumerate() {
            if record.len() != plan.columns.len() {
                return Err(IngestError::validation(format!(
                    "第 {} 行的列集合与首行不一致",
                    index + 1
                )));
            }
            let mut values = Vec::with_capacity(plan.columns.len());
            for column in &plan.columns {
                let value = record.get(column.name).ok_or_else(|| {
                    IngestError::validation(format!(
                        "第 {} 行缺少列 {}",
                        index + 1,
                        column.name
                    ))
                })?;
                check_value(column, value)?;
                values.push(value.clone());
            }

            let key: Vec<String> = key_positions.iter().map(|&i| values[i].key_repr()).collect();
            match seen.get(&key) {
                Some(&slot) => plan.rows[slot] = values,
                None => {
                    seen.insert(key, plan.rows.len());
                    plan.rows.push(values);
                }
            }
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn create_stage_sql(&self) -> String {
        format!(
            "CREATE TEMP TABLE {} (LIKE {} INCLUDING DEFAULTS) ON COMMIT DROP",
            quote_ident(STAGE_TABLE),
            quote_ident(&self.table)
        )
    }

    /// 分块写入暂存表，每块参数数不超过 [`MAX_BIND_PARAMS`]
    pub fn stage_inserts(&self) -> Vec<BuiltQuery> {
        let width = self.columns.len().max(1);
        let rows_per_chunk = (MAX_BIND_PARAMS / width).max(1);
        let head = format!(
            "INSERT INTO {} ({}) VALUES ",
            quote_ident(STAGE_TABLE),
            quote_list(&self.column_names())
        );

        self.rows
            .chunks(rows_per_chunk)
            .map(|chunk| {
                let mut query = BuiltQuery {
                    sql: head.clone(),
                    params: Vec::with_capacity(chunk.len() * width),
                };
                let mut tuples = Vec::with_capacity(chunk.len());
                for row in chunk {
                    let placeholders: Vec<String> = row
                        .iter()
                        .zip(&self.columns)
                        .map(|(value, column)| query.push(value.clone(), column.ty))
                        .collect();
                    tuples.push(format!("({})", placeholders.join(", ")));
                }
                query.sql.push_str(&tuples.join(", "));
                query
            })
            .collect()
    }

    /// 从暂存表合并到目标表；值未变化的行不做更新
    pub fn merge_sql(&self) -> String {
        let columns = quote_list(&self.column_names());
        let target = quote_ident(&self.table);
        let assignments: Vec<String> = self
            .update_columns
            .iter()
            .map(|c| format!("{} = EXCLUDED.{}", quote_ident(c), quote_ident(c)))
            .collect();
        let current: Vec<String> = self
            .update_columns
            .iter()
            .map(|c| format!("{}.{}", target, quote_ident(c)))
            .collect();
        let incoming: Vec<String> = self
            .update_columns
            .iter()
            .map(|c| format!("EXCLUDED.{}", quote_ident(c)))
            .collect();

        format!(
            "INSERT INTO {target} ({columns}) SELECT {columns} FROM {stage} \
             ON CONFLICT ({key}) DO UPDATE SET {assignments} \
             WHERE ({current}) IS DISTINCT FROM ({incoming})",
            target = target,
            columns = columns,
            stage = quote_ident(STAGE_TABLE),
            key = quote_list(&self.conflict_key),
            assignments = assignments.join(", "),
            current = current.join(", "),
            incoming = incoming.join(", "),
        )
    }
}
