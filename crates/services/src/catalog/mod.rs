//! 标的目录同步

mod catalog_sync_service;

pub use catalog_sync_service::CatalogSyncService;
