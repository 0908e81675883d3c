//! 基于 sqlx 连接池的存储引擎

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};
use tracing::{debug, error, info, warn};

use quant_ingest_common::{IngestError, Result};
use quant_ingest_domain::Symbol;

use super::predicate::{Predicate, QueryRequest};
use super::schema::{touch_function_sql, ColumnDef, ColumnType, SchemaRegistry, TableRef, TableSchema};
use super::sql_builder::{build_delete, build_select, resolve_projection, BoundParam, BuiltQuery, UpsertPlan};
use super::value::{Record, SqlValue};
use super::StorageEngine;

type PgQuery<'q> = Query<'q, Postgres, PgArguments>;

/// Postgres 存储引擎
///
/// 连接池由调用方创建并显式传入，关闭也由调用方负责。
#[derive(Clone)]
pub struct PgStorageEngine {
    pool: PgPool,
}

impl PgStorageEngine {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn table_exists(conn: &mut PgConnection, table: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables \
             WHERE table_schema = current_schema() AND table_name = $1)",
        )
        .bind(table)
        .fetch_one(&mut *conn)
        .await?;
        Ok(exists)
    }

    async fn apply_ddl(conn: &mut PgConnection, schema: &TableSchema) -> Result<()> {
        for statement in schema.ddl() {
            debug!("执行 DDL: {}", statement);
            sqlx::query(&statement).execute(&mut *conn).await?;
        }
        Ok(())
    }

    async fn create_base(conn: &mut PgConnection) -> Result<()> {
        sqlx::query(&touch_function_sql()).execute(&mut *conn).await?;
        for schema in SchemaRegistry::base_tables() {
            Self::apply_ddl(conn, &schema).await?;
        }
        Ok(())
    }

    async fn create_entity(conn: &mut PgConnection, schema: &TableSchema) -> Result<bool> {
        if Self::table_exists(conn, &schema.name).await? {
            return Ok(false);
        }
        Self::apply_ddl(conn, schema).await?;
        Ok(true)
    }

    async fn upsert(conn: &mut PgConnection, plan: &UpsertPlan) -> Result<u64> {
        sqlx::query(&plan.create_stage_sql())
            .execute(&mut *conn)
            .await?;
        for chunk in plan.stage_inserts() {
            bind_all(sqlx::query(&chunk.sql), &chunk)?
                .execute(&mut *conn)
                .await?;
        }
        let merged = sqlx::query(&plan.merge_sql()).execute(&mut *conn).await?;
        debug!(
            "表 {} 合并 {} 行, 实际变更 {} 行",
            plan.table,
            plan.rows.len(),
            merged.rows_affected()
        );
        Ok(plan.rows.len() as u64)
    }

    async fn select(
        conn: &mut PgConnection,
        query: &BuiltQuery,
        columns: &[&ColumnDef],
    ) -> Result<Vec<Record>> {
        let rows = bind_all(sqlx::query(&query.sql), query)?
            .fetch_all(&mut *conn)
            .await?;
        rows.iter().map(|row| decode_row(row, columns)).collect()
    }

    async fn remove(conn: &mut PgConnection, query: &BuiltQuery) -> Result<u64> {
        let result = bind_all(sqlx::query(&query.sql), query)?
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// 提交事务；出错时显式回滚后再返回原错误
    async fn finish<T>(tx: Transaction<'static, Postgres>, result: Result<T>, op: &str) -> Result<T> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                error!("{} 失败，回滚事务: {}", op, e);
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("{} 回滚失败: {}", op, rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[async_trait]
impl StorageEngine for PgStorageEngine {
    async fn ensure_base_structure(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let result = Self::create_base(&mut tx).await;
        Self::finish(tx, result, "创建基础表结构").await?;
        info!("✓ 基础表结构已就绪");
        Ok(())
    }

    async fn ensure_entity_table(&self, symbol: &Symbol) -> Result<bool> {
        let schema = SchemaRegistry::resolve(&TableRef::DailyBar(symbol.clone()));
        let mut tx = self.pool.begin().await?;
        let result = Self::create_entity(&mut tx, &schema).await;
        let created = Self::finish(tx, result, "创建日线表").await?;
        if created {
            info!("✓ 创建日线表 {}", schema.name);
        }
        Ok(created)
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
        let mut tx = self.pool.begin().await?;
        let result = Self::upsert(&mut tx, &plan).await;
        Self::finish(tx, result, "批量写入").await
    }

    async fn query(&self, table: &TableRef, request: &QueryRequest) -> Result<Vec<Record>> {
        let schema = SchemaRegistry::resolve(table);
        let query = build_select(&schema, request)?;
        let columns = resolve_projection(&schema, request)?;
        let mut tx = self.pool.begin().await?;
        let result = Self::select(&mut tx, &query, &columns).await;
        Self::finish(tx, result, "查询").await
    }

    async fn delete(&self, table: &TableRef, predicate: &Predicate) -> Result<u64> {
        let schema = SchemaRegistry::resolve(table);
        let query = build_delete(&schema, predicate)?;
        let mut tx = self.pool.begin().await?;
        let result = Self::remove(&mut tx, &query).await;
        Self::finish(tx, result, "删除").await
    }
}

fn bind_all<'q>(mut query: PgQuery<'q>, built: &BuiltQuery) -> Result<PgQuery<'q>> {
    for param in &built.params {
        query = bind_param(query, param)?;
    }
    Ok(query)
}

/// 按列类型绑定，空值同样带类型
fn bind_param<'q>(query: PgQuery<'q>, param: &BoundParam) -> Result<PgQuery<'q>> {
    let bound = match (&param.ty, &param.value) {
        (ColumnType::Varchar(_), SqlValue::Null) => query.bind(Option::<String>::None),
        (ColumnType::SmallInt, SqlValue::Null) => query.bind(Option::<i16>::None),
        (ColumnType::BigInt, SqlValue::Null) => query.bind(Option::<i64>::None),
        (ColumnType::Numeric(..), SqlValue::Null) => query.bind(Option::<Decimal>::None),
        (ColumnType::Boolean, SqlValue::Null) => query.bind(Option::<bool>::None),
        (ColumnType::Date, SqlValue::Null) => query.bind(Option::<NaiveDate>::None),
        (ColumnType::Timestamp, SqlValue::Null) => query.bind(Option::<NaiveDateTime>::None),
        (ColumnType::Jsonb, SqlValue::Null) => query.bind(Option::<Json<serde_json::Value>>::None),

        (ColumnType::Varchar(_), SqlValue::Text(v)) => query.bind(v.clone()),
        (ColumnType::SmallInt, SqlValue::Int(v)) => {
            let v = i16::try_from(*v)
                .map_err(|_| IngestError::validation(format!("SMALLINT 溢出: {}", v)))?;
            query.bind(v)
        }
        (ColumnType::BigInt, SqlValue::Int(v)) => query.bind(*v),
        (ColumnType::Numeric(..), SqlValue::Decimal(v)) => query.bind(*v),
        (ColumnType::Numeric(..), SqlValue::Int(v)) => query.bind(Decimal::from(*v)),
        (ColumnType::Boolean, SqlValue::Bool(v)) => query.bind(*v),
        (ColumnType::Date, SqlValue::Date(v)) => query.bind(*v),
        (ColumnType::Timestamp, SqlValue::Timestamp(v)) => query.bind(*v),
        (ColumnType::Jsonb, SqlValue::Json(v)) => query.bind(Json(v.clone())),
        (ty, value) => {
            return Err(IngestError::validation(format!(
                "无法将 {} 绑定到 {} 列",
                value.type_name(),
                ty.sql()
            )))
        }
    };
    Ok(bound)
}

fn decode_row(row: &PgRow, columns: &[&ColumnDef]) -> Result<Record> {
    let mut record = Record::new();
    for (index, column) in columns.iter().enumerate() {
        let value: SqlValue = match column.ty {
            ColumnType::Varchar(_) => row.try_get::<Option<String>, _>(index)?.into(),
            ColumnType::SmallInt => row
                .try_get::<Option<i16>, _>(index)?
                .map(|v| SqlValue::Int(v as i64))
                .unwrap_or(SqlValue::Null),
            ColumnType::BigInt => row.try_get::<Option<i64>, _>(index)?.into(),
            ColumnType::Numeric(..) => row.try_get::<Option<Decimal>, _>(index)?.into(),
            ColumnType::Boolean => row.try_get::<Option<bool>, _>(index)?.into(),
            ColumnType::Date => row.try_get::<Option<NaiveDate>, _>(index)?.into(),
            ColumnType::Timestamp => row.try_get::<Option<NaiveDateTime>, _>(index)?.into(),
            ColumnType::Jsonb => row
                .try_get::<Option<Json<serde_json::Value>>, _>(index)?
                .map(|json| SqlValue::Json(json.0))
                .unwrap_or(SqlValue::Null),
        };
        record.set(column.name, value);
    }
    Ok(record)
}
