//! 统一错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// 采集流水线错误
///
/// `transient` 标记的错误允许重试，其余错误在第一次出现时直接向上传递。
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("配置错误: {0}")]
    Config(String),

    /// 标识符校验失败，任何 SQL 发出之前抛出
    #[error("非法标识符: {0}")]
    InvalidIdentifier(String),

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("数据库错误: {message}")]
    Database { message: String, transient: bool },

    #[error("数据源错误: {message}")]
    Provider { message: String, transient: bool },

    #[error("交易所日历错误: {0}")]
    CalendarSource(String),

    #[error("记录不存在: {0}")]
    NotFound(String),

    #[error("任务 {task_id} 的断点数据已损坏: {reason}")]
    CheckpointCorrupt { task_id: String, reason: String },

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl IngestError {
    pub fn validation(msg: impl Into<String>) -> Self {
        IngestError::Validation(msg.into())
    }

    /// 可重试的数据源错误（网络抖动、限流等）
    pub fn provider(msg: impl Into<String>) -> Self {
        IngestError::Provider {
            message: msg.into(),
            transient: true,
        }
    }

    /// 不可重试的数据源错误（参数被拒绝等）
    pub fn provider_rejected(msg: impl Into<String>) -> Self {
        IngestError::Provider {
            message: msg.into(),
            transient: false,
        }
    }

    pub fn database(msg: impl Into<String>) -> Self {
        IngestError::Database {
            message: msg.into(),
            transient: false,
        }
    }

    /// 是否属于瞬时错误，决定重试包装器是否继续尝试
    pub fn is_transient(&self) -> bool {
        match self {
            IngestError::Database { transient, .. } => *transient,
            IngestError::Provider { transient, .. } => *transient,
            IngestError::CalendarSource(_) => true,
            _ => false,
        }
    }
}

// 40001: serialization_failure, 40P01: deadlock_detected
const RETRYABLE_SQLSTATES: [&str; 2] = ["40001", "40P01"];

impl From<sqlx::Error> for IngestError {
    fn from(e: sqlx::Error) -> Self {
        let transient = match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Tls(_) => true,
            sqlx::Error::Database(db) => db
                .code()
                .map(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref()))
                .unwrap_or(false),
            _ => false,
        };
        IngestError::Database {
            message: e.to_string(),
            transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(IngestError::provider("timeout").is_transient());
        assert!(!IngestError::provider_rejected("bad symbol").is_transient());
        assert!(!IngestError::InvalidIdentifier("600000;DROP".into()).is_transient());
        assert!(!IngestError::validation("empty").is_transient());
        assert!(IngestError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(!IngestError::from(sqlx::Error::RowNotFound).is_transient());
    }
}
