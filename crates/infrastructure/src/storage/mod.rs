//! 存储引擎
//!
//! - `schema`: 表结构注册表与 DDL
//! - `sql_builder`: 参数化 SQL 构造与批量写入计划
//! - `postgres`: 基于 sqlx 连接池的实现
//! - `memory`: 进程内实现，语义与数据库实现一致

pub mod memory;
pub mod postgres;
pub mod predicate;
pub mod schema;
pub mod sql_builder;
pub mod value;

use async_trait::async_trait;

use quant_ingest_common::Result;
use quant_ingest_domain::Symbol;

pub use memory::MemoryStorageEngine;
pub use postgres::PgStorageEngine;
pub use predicate::{Condition, Operator, OrderBy, Predicate, QueryRequest, SortDirection};
pub use schema::{SchemaRegistry, TableRef, TableSchema};
pub use value::{Record, SqlValue};

/// 存储引擎接口
///
/// 每个操作独占一个连接并在单个事务内完成，失败时整体回滚。
#[async_trait]
pub trait StorageEngine: Send + Sync {
    /// 创建触发器函数与固定表（标的、交易日历、任务断点），可重复执行
    async fn ensure_base_structure(&self) -> Result<()>;

    /// 按需创建单只股票的日线表，返回是否本次新建
    async fn ensure_entity_table(&self, symbol: &Symbol) -> Result<bool>;

    /// 批量幂等写入
    ///
    /// - `update_columns` 为空时报校验错误
    /// - `rows` 为空时返回 0
    /// - 同一批内冲突键重复时保留最后一行
    ///
    /// 返回去重后处理的行数。
    async fn bulk_upsert(
        &self,
        table: &TableRef,
        rows: &[Record],
        conflict_key: &[&str],
        update_columns: &[&str],
    ) -> Result<u64>;

    async fn query(&self, table: &TableRef, request: &QueryRequest) -> Result<Vec<Record>>;

    /// 条件为空时拒绝执行
    async fn delete(&self, table: &TableRef, predicate: &Predicate) -> Result<u64>;
}
