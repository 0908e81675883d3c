//! 交易日历服务

mod provider_calendar;
mod trading_calendar_service;

pub use provider_calendar::ProviderCalendar;
pub use trading_calendar_service::{CalendarMode, SyncSource, TradingCalendarService};
