use std::time::Duration;

use quant_ingest_common::{IngestError, Result};
use sqlx::postgres::PgConnectOptions;

use super::environment::{env_i64, env_required};

/// 数据库连接配置
///
/// 必填：`DB_HOST` `DB_NAME` `DB_USER` `DB_PASSWORD`，缺任何一项都视为启动失败。
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

fn env_u32(key: &str, default: i64) -> Result<u32> {
    let value = env_i64(key, default);
    u32::try_from(value).map_err(|_| IngestError::Config(format!("{} 超出范围: {}", key, value)))
}

impl DbConfig {
    pub fn from_env() -> Result<Self> {
        let port = env_i64("DB_PORT", 5432);
        let port = u16::try_from(port)
            .map_err(|_| IngestError::Config(format!("DB_PORT 超出范围: {}", port)))?;

        let min_connections = env_u32("DB_MIN_CONNECTIONS", 1)?;
        let max_connections = env_u32("DB_MAX_CONNECTIONS", 10)?.max(1);
        if min_connections > max_connections {
            return Err(IngestError::Config(format!(
                "DB_MIN_CONNECTIONS({}) 不能大于 DB_MAX_CONNECTIONS({})",
                min_connections, max_connections
            )));
        }

        Ok(Self {
            host: env_required("DB_HOST")?,
            port,
            database: env_required("DB_NAME")?,
            user: env_required("DB_USER")?,
            password: env_required("DB_PASSWORD")?,
            min_connections,
            max_connections,
            acquire_timeout: Duration::from_secs(env_i64("DB_ACQUIRE_TIMEOUT_SECS", 30).max(1) as u64),
        })
    }

    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.user)
            .password(&self.password)
    }
}
