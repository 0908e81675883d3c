//! # Quant Ingest Services
//!
//! 应用服务层 - 协调领域接口与仓储，实现交易日历和标的目录的业务流程
//!
//! ## 架构位置
//!
//! ```text
//! orchestration (调度) → services (业务协调) → domain + infrastructure
//! ```
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use quant_ingest_services::calendar::{CalendarMode, TradingCalendarService};
//!
//! let service = TradingCalendarService::new(calendar_repo, exchange_calendar);
//! let open = service
//!     .is_trading_day(date, "SSE", CalendarMode::LocalThenExchange, true)
//!     .await?;
//! ```

pub mod calendar;
pub mod catalog;

// 重新导出常用服务
pub use calendar::{CalendarMode, ProviderCalendar, SyncSource, TradingCalendarService};
pub use catalog::CatalogSyncService;
