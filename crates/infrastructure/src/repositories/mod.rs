//! 仓储层
//!
//! 领域实体与存储行之间的映射，全部经由 [`StorageEngine`](crate::storage::StorageEngine)。

pub mod calendar_repository;
pub mod checkpoint_repository;
pub mod daily_bar_repository;
pub mod instrument_repository;

pub use calendar_repository::CalendarRepository;
pub use checkpoint_repository::CheckpointStore;
pub use daily_bar_repository::{DailyBarRepository, DAILY_BAR_UPDATE_COLUMNS};
pub use instrument_repository::InstrumentRepository;
