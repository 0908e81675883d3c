//! 领域接口

pub mod calendar_trait;
pub mod provider_trait;

pub use calendar_trait::ExchangeCalendar;
pub use provider_trait::MarketDataProvider;
