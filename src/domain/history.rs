//! Records kept by the history store.

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::domain::period::Period;
use crate::domain::recommendation::Signal;

pub const DEFAULT_ANALYSIS_LIMIT: usize = 20;
pub const DEFAULT_TRADE_LIMIT: usize = 50;

/// A saved forecast run. `prediction` is the JSON-encoded ensemble table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub id: Option<i64>,
    pub user_id: i64,
    pub symbol: String,
    #[serde(serialize_with = "serialize_display")]
    pub period: Period,
    pub created_at: NaiveDateTime,
    pub prediction: String,
    pub recommendation: Signal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchlistEntry {
    pub symbol: String,
    pub added_at: NaiveDateTime,
}

fn serialize_display<T: std::fmt::Display, S: serde::Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}
