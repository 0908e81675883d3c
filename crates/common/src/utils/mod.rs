//! 工具函数模块

pub mod time;
pub mod timing;

pub use time::*;
pub use timing::log_elapsed;
