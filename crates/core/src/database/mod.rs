//! 数据库连接管理（使用 sqlx）

pub mod sqlx_pool;

// 重新导出
pub use sqlx_pool::{close_db_pool, health_check, init_db_pool};
