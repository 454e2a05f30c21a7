//! Core domain types and logic.

pub mod ohlcv;
pub mod series;
pub mod period;
pub mod forecast;
pub mod ensemble;
pub mod recommendation;
pub mod pipeline;
pub mod tax;
pub mod trade;
pub mod portfolio;
pub mod history;
pub mod indicator;
pub mod universe;
pub mod config_validation;
pub mod error;
