//! 业务实体模块

pub mod calendar;
pub mod checkpoint;
pub mod daily_bar;
pub mod instrument;

pub use calendar::CalendarEntry;
pub use checkpoint::{TaskCheckpoint, TaskStats};
pub use daily_bar::DailyBar;
pub use instrument::Instrument;
