//! # 应用启动引导
//!
//! 读取数据库配置、创建连接池与存储引擎；命令结束后关闭连接池。

use std::sync::Arc;

use anyhow::{anyhow, Result};
use sqlx::PgPool;
use tracing::info;

use quant_ingest_core::config::DbConfig;
use quant_ingest_core::database::{close_db_pool, init_db_pool};
use quant_ingest_infrastructure::{PgStorageEngine, StorageEngine};

pub struct AppContext {
    pool: PgPool,
    pub storage: Arc<dyn StorageEngine>,
}

impl AppContext {
    pub async fn connect() -> Result<Self> {
        let config = DbConfig::from_env().map_err(|e| anyhow!("加载数据库配置失败: {}", e))?;
        let pool = init_db_pool(&config).await?;
        let storage: Arc<dyn StorageEngine> = Arc::new(PgStorageEngine::new(pool.clone()));
        info!("应用初始化完成");
        Ok(Self { pool, storage })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn shutdown(self) {
        close_db_pool(&self.pool).await;
    }
}
