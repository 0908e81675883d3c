//! SQLx 数据库连接池管理
//!
//! 连接池在进程启动时创建一次，以句柄形式传给存储引擎，进程退出前关闭。

use quant_ingest_common::{IngestError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{error, info};

use crate::config::DbConfig;

/// 初始化数据库连接池
pub async fn init_db_pool(config: &DbConfig) -> Result<PgPool> {
    info!(
        "正在初始化数据库连接池: {}:{}/{} (min={}, max={})",
        config.host, config.port, config.database, config.min_connections, config.max_connections
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect_with(config.connect_options())
        .await
        .map_err(|e| {
            error!("数据库连接池初始化失败: {}", e);
            IngestError::Config(format!("数据库连接失败: {}", e))
        })?;

    info!("✓ 数据库连接池初始化成功");
    Ok(pool)
}

/// 关闭数据库连接池
pub async fn close_db_pool(pool: &PgPool) {
    info!("正在关闭数据库连接池...");
    pool.close().await;
    info!("✓ 数据库连接池已关闭");
}

/// 健康检查
pub async fn health_check(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}
