//! Look-back periods accepted by the market data lookup.

use chrono::{Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;

use crate::domain::error::StockcastError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    OneMonth,
    ThreeMonth,
    FiveMonth,
}

impl Period {
    pub const ALL: [Period; 3] = [Period::OneMonth, Period::ThreeMonth, Period::FiveMonth];

    pub fn days(self) -> i64 {
        match self {
            Period::OneMonth => 30,
            Period::ThreeMonth => 90,
            Period::FiveMonth => 150,
        }
    }

    /// Oldest date retained for this period as seen from `today`.
    pub fn start_date(self, today: NaiveDate) -> NaiveDate {
        today - Duration::days(self.days())
    }

    /// Whether a provider's compact (most recent ~100 bars) history is enough.
    pub fn fits_compact_history(self) -> bool {
        matches!(self, Period::OneMonth)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Period::OneMonth => "1month",
            Period::ThreeMonth => "3month",
            Period::FiveMonth => "5month",
        };
        f.write_str(s)
    }
}

impl FromStr for Period {
    type Err = StockcastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1month" | "1m" => Ok(Period::OneMonth),
            "3month" | "3m" => Ok(Period::ThreeMonth),
            "5month" | "5m" => Ok(Period::FiveMonth),
            other => Err(StockcastError::invalid_input(format!(
                "unknown period '{}', expected 1month, 3month or 5month",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_display() {
        for period in Period::ALL {
            assert_eq!(period.to_string().parse::<Period>().unwrap(), period);
        }
    }

    #[test]
    fn parse_accepts_short_forms() {
        assert_eq!("3M".parse::<Period>().unwrap(), Period::ThreeMonth);
    }

    #[test]
    fn parse_rejects_unknown() {
        assert!("2month".parse::<Period>().is_err());
    }

    #[test]
    fn start_date_subtracts_calendar_days() {
        let today = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        assert_eq!(
            Period::OneMonth.start_date(today),
            NaiveDate::from_ymd_opt(2024, 5, 31).unwrap()
        );
        assert_eq!(
            Period::FiveMonth.start_date(today),
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()
        );
    }
}
