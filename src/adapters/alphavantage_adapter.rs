//! Alpha Vantage market data adapter.
//!
//! Response parsing is pure over `serde_json::Value` and always compiled;
//! the HTTP client needs the `alphavantage` feature.

use chrono::NaiveDate;
use serde_json::Value;

use crate::domain::error::StockcastError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::period::Period;
use crate::domain::series::PriceSeries;

const SERIES_KEY: &str = "Time Series (Daily)";
const QUOTE_KEY: &str = "Global Quote";

/// API-level failures arrive as HTTP 200 with one of these keys.
fn api_error(body: &Value) -> Option<StockcastError> {
    ["Error Message", "Note", "Information"].iter().find_map(|key| {
        body.get(*key).and_then(Value::as_str).map(|msg| StockcastError::DataSource {
            reason: format!("Alpha Vantage: {}", msg),
        })
    })
}

fn number(fields: &Value, key: &str, date: &str) -> Result<f64, StockcastError> {
    fields
        .get(key)
        .and_then(Value::as_str)
        .and_then(|s| s.trim().parse::<f64>().ok())
        .ok_or_else(|| StockcastError::DataSource {
            reason: format!("bad or missing '{}' on {}", key, date),
        })
}

/// Parses a `TIME_SERIES_DAILY` body into bars on or after `cutoff`.
/// A body without a series object is `Ok(None)`.
pub fn parse_daily_series(symbol: &str, body: &Value, cutoff: NaiveDate) -> Result<Option<PriceSeries>, StockcastError> {
    if let Some(err) = api_error(body) {
        return Err(err);
    }
    let Some(days) = body.get(SERIES_KEY).and_then(Value::as_object) else {
        return Ok(None);
    };

    let mut bars = Vec::with_capacity(days.len());
    for (raw_date, fields) in days {
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| StockcastError::DataSource {
            reason: format!("invalid date '{}': {}", raw_date, e),
        })?;
        if date < cutoff {
            continue;
        }
        bars.push(PriceBar {
            date,
            open: number(fields, "1. open", raw_date)?,
            high: number(fields, "2. high", raw_date)?,
            low: number(fields, "3. low", raw_date)?,
            close: number(fields, "4. close", raw_date)?,
            volume: number(fields, "5. volume", raw_date)? as i64,
        });
    }
    bars.sort_by_key(|b| b.date);
    Ok(Some(PriceSeries::new(symbol, bars)))
}

/// Parses a `GLOBAL_QUOTE` body. An empty quote object is `Ok(None)`.
pub fn parse_global_quote(body: &Value) -> Result<Option<f64>, StockcastError> {
    if let Some(err) = api_error(body) {
        return Err(err);
    }
    match body.get(QUOTE_KEY).and_then(Value::as_object) {
        Some(quote) if !quote.is_empty() => number(&body[QUOTE_KEY], "05. price", "quote").map(Some),
        _ => Ok(None),
    }
}

pub fn output_size(period: Period) -> &'static str {
    if period.fits_compact_history() {
        "compact"
    } else {
        "full"
    }
}

#[cfg(feature = "alphavantage")]
pub use client::AlphaVantageAdapter;

#[cfg(feature = "alphavantage")]
mod client {
    use chrono::Utc;
    use serde_json::Value;

    use super::{output_size, parse_daily_series, parse_global_quote};
    use crate::domain::error::StockcastError;
    use crate::domain::period::Period;
    use crate::domain::series::PriceSeries;
    use crate::ports::market_data_port::MarketDataPort;

    pub struct AlphaVantageAdapter {
        http: reqwest::blocking::Client,
        base_url: String,
        api_key: String,
    }

    impl AlphaVantageAdapter {
        pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self, StockcastError> {
            let http = reqwest::blocking::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| StockcastError::DataSource {
                    reason: format!("failed to build HTTP client: {}", e),
                })?;
            Ok(Self {
                http,
                base_url: base_url.into(),
                api_key: api_key.into(),
            })
        }

        fn query(&self, params: &[(&str, &str)]) -> Result<Value, StockcastError> {
            let response = self
                .http
                .get(&self.base_url)
                .query(params)
                .query(&[("apikey", self.api_key.as_str())])
                .send()
                .and_then(|r| r.error_for_status())
                .map_err(|e| StockcastError::DataSource {
                    reason: format!("request failed: {}", e),
                })?;
            response.json::<Value>().map_err(|e| StockcastError::DataSource {
                reason: format!("invalid JSON response: {}", e),
            })
        }
    }

    impl MarketDataPort for AlphaVantageAdapter {
        fn get_series(&self, symbol: &str, period: Period) -> Result<Option<PriceSeries>, StockcastError> {
            tracing::info!(%symbol, %period, "fetching daily series");
            let body = self.query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", output_size(period)),
            ])?;
            parse_daily_series(symbol, &body, period.start_date(Utc::now().date_naive()))
        }

        fn get_current_price(&self, symbol: &str) -> Result<Option<f64>, StockcastError> {
            let body = self.query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])?;
            parse_global_quote(&body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cutoff() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    #[test]
    fn parses_series_sorted_and_cut() {
        let body = json!({
            "Meta Data": {"2. Symbol": "TCS.BSE"},
            "Time Series (Daily)": {
                "2024-01-03": {"1. open": "3700.0", "2. high": "3750.5", "3. low": "3690", "4. close": "3740.25", "5. volume": "12000"},
                "2024-01-02": {"1. open": "3650", "2. high": "3710", "3. low": "3640", "4. close": "3700", "5. volume": "9000"},
                "2023-12-29": {"1. open": "3600", "2. high": "3660", "3. low": "3590", "4. close": "3650", "5. volume": "8000"}
            }
        });
        let series = parse_daily_series("TCS.BSE", &body, cutoff()).unwrap().unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(series.bars[1].close, 3740.25);
        assert_eq!(series.bars[1].volume, 12000);
    }

    #[test]
    fn error_message_is_data_source_error() {
        let body = json!({"Error Message": "Invalid API call."});
        let err = parse_daily_series("NOPE", &body, cutoff()).unwrap_err();
        assert!(err.to_string().contains("Invalid API call."));

        let throttled = json!({"Note": "Thank you for using Alpha Vantage!"});
        assert!(parse_global_quote(&throttled).is_err());
    }

    #[test]
    fn missing_series_key_is_none() {
        assert!(parse_daily_series("TCS.BSE", &json!({}), cutoff()).unwrap().is_none());
    }

    #[test]
    fn bad_number_is_reported() {
        let body = json!({
            "Time Series (Daily)": {
                "2024-01-02": {"1. open": "n/a", "2. high": "1", "3. low": "1", "4. close": "1", "5. volume": "1"}
            }
        });
        assert!(matches!(
            parse_daily_series("X", &body, cutoff()),
            Err(StockcastError::DataSource { .. })
        ));
    }

    #[test]
    fn parses_global_quote() {
        let body = json!({"Global Quote": {"01. symbol": "ITC.BSE", "05. price": "432.50"}});
        assert_eq!(parse_global_quote(&body).unwrap(), Some(432.5));
        assert_eq!(parse_global_quote(&json!({"Global Quote": {}})).unwrap(), None);
    }

    #[test]
    fn output_size_follows_period() {
        assert_eq!(output_size(Period::OneMonth), "compact");
        assert_eq!(output_size(Period::FiveMonth), "full");
    }
}
