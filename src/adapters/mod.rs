//! Concrete adapter implementations for ports.

pub mod alphavantage_adapter;
pub mod cached_data;
pub mod csv_adapter;
pub mod file_config_adapter;
#[cfg(feature = "sqlite")]
pub mod sqlite_adapter;
