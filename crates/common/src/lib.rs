//! # Quant Ingest Common
//!
//! 公共错误类型与日期工具

pub mod errors;
pub mod utils;

// 重新导出常用类型
pub use errors::{IngestError, Result};
