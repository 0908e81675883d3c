//! 配置管理模块

pub mod db;
pub mod environment;

// 重新导出
pub use db::DbConfig;
pub use environment::*;
