//! # Quant Ingest Domain
//!
//! 领域模型层 - 不依赖数据库与网络实现
//!
//! - `entities`: 标的、日线、交易日历、任务断点
//! - `value_objects`: 标识符与股票代码
//! - `enums`: 市场、复权方式
//! - `traits`: 数据源与交易所日历接口

pub mod entities;
pub mod enums;
pub mod traits;
pub mod value_objects;

// 重新导出核心类型
pub use entities::calendar::{DEFAULT_EXCHANGE, HOLIDAY_PLACEHOLDER};
pub use entities::{CalendarEntry, DailyBar, Instrument, TaskCheckpoint, TaskStats};
pub use enums::{AdjustMode, Market};
pub use traits::{ExchangeCalendar, MarketDataProvider};
pub use value_objects::{validate_identifier, Symbol, MAX_IDENTIFIER_LEN, SYMBOL_LEN};
