//! 业务枚举模块

pub mod market_enums;

pub use market_enums::{AdjustMode, Market};
