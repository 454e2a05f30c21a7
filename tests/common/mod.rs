#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::cell::RefCell;
use std::collections::HashMap;

use stockcast::domain::ensemble::ModelRun;
use stockcast::domain::error::StockcastError;
use stockcast::domain::forecast::{ForecastSeries, ModelKind};
use stockcast::domain::history::{AnalysisRecord, WatchlistEntry};
pub use stockcast::domain::ohlcv::PriceBar;
use stockcast::domain::period::Period;
use stockcast::domain::portfolio::{Holding, apply_fill};
use stockcast::domain::series::PriceSeries;
use stockcast::domain::trade::TradeRecord;
use stockcast::ports::history_port::HistoryPort;
use stockcast::ports::market_data_port::MarketDataPort;

pub struct MockMarketData {
    pub series: HashMap<String, Vec<PriceBar>>,
    pub quotes: HashMap<String, f64>,
    pub errors: HashMap<String, String>,
}

impl MockMarketData {
    pub fn new() -> Self {
        Self {
            series: HashMap::new(),
            quotes: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.series.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_quote(mut self, symbol: &str, price: f64) -> Self {
        self.quotes.insert(symbol.to_string(), price);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), StockcastError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(StockcastError::DataSource {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MarketDataPort for MockMarketData {
    fn get_series(&self, symbol: &str, _period: Period) -> Result<Option<PriceSeries>, StockcastError> {
        self.check(symbol)?;
        Ok(self
            .series
            .get(symbol)
            .map(|bars| PriceSeries::new(symbol, bars.clone())))
    }

    fn get_current_price(&self, symbol: &str) -> Result<Option<f64>, StockcastError> {
        self.check(symbol)?;
        Ok(self.quotes.get(symbol).copied())
    }
}

/// In-memory history store with the same portfolio semantics as sqlite.
#[derive(Default)]
pub struct MockHistory {
    pub analyses: RefCell<Vec<AnalysisRecord>>,
    pub trades: RefCell<Vec<TradeRecord>>,
    pub holdings: RefCell<HashMap<(i64, String), Holding>>,
    pub watched: RefCell<Vec<(i64, WatchlistEntry)>>,
}

impl MockHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryPort for MockHistory {
    fn save_analysis(&self, record: &AnalysisRecord) -> Result<i64, StockcastError> {
        let mut analyses = self.analyses.borrow_mut();
        let id = analyses.len() as i64 + 1;
        analyses.push(AnalysisRecord {
            id: Some(id),
            ..record.clone()
        });
        Ok(id)
    }

    fn analysis_history(&self, user_id: i64, limit: usize) -> Result<Vec<AnalysisRecord>, StockcastError> {
        Ok(self
            .analyses
            .borrow()
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn save_trade(&self, record: &TradeRecord) -> Result<i64, StockcastError> {
        let mut trades = self.trades.borrow_mut();
        let id = trades.len() as i64 + 1;
        trades.push(TradeRecord {
            id: Some(id),
            ..record.clone()
        });
        Ok(id)
    }

    fn trade_history(&self, user_id: i64, limit: usize) -> Result<Vec<TradeRecord>, StockcastError> {
        Ok(self
            .trades
            .borrow()
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }

    fn apply_to_portfolio(
        &self,
        user_id: i64,
        symbol: &str,
        quantity_delta: i64,
        price: f64,
    ) -> Result<Option<Holding>, StockcastError> {
        let key = (user_id, symbol.to_string());
        let mut holdings = self.holdings.borrow_mut();
        let updated = apply_fill(holdings.get(&key), symbol, quantity_delta, price);
        match &updated {
            Some(h) => {
                holdings.insert(key, h.clone());
            }
            None => {
                holdings.remove(&key);
            }
        }
        Ok(updated)
    }

    fn portfolio(&self, user_id: i64) -> Result<Vec<Holding>, StockcastError> {
        let mut held: Vec<Holding> = self
            .holdings
            .borrow()
            .iter()
            .filter(|((user, _), _)| *user == user_id)
            .map(|(_, h)| h.clone())
            .collect();
        held.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(held)
    }

    fn add_to_watchlist(&self, user_id: i64, symbol: &str) -> Result<bool, StockcastError> {
        let mut watched = self.watched.borrow_mut();
        if watched.iter().any(|(u, e)| *u == user_id && e.symbol == symbol) {
            return Ok(false);
        }
        watched.push((
            user_id,
            WatchlistEntry {
                symbol: symbol.to_string(),
                added_at: timestamp("2024-03-01 10:00:00"),
            },
        ));
        Ok(true)
    }

    fn remove_from_watchlist(&self, user_id: i64, symbol: &str) -> Result<bool, StockcastError> {
        let mut watched = self.watched.borrow_mut();
        let before = watched.len();
        watched.retain(|(u, e)| !(*u == user_id && e.symbol == symbol));
        Ok(watched.len() != before)
    }

    fn watchlist(&self, user_id: i64) -> Result<Vec<WatchlistEntry>, StockcastError> {
        Ok(self
            .watched
            .borrow()
            .iter()
            .rev()
            .filter(|(u, _)| *u == user_id)
            .map(|(_, e)| e.clone())
            .collect())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn timestamp(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// One bar per calendar day from 2024-01-01.
pub fn bars_from_closes(closes: &[f64]) -> Vec<PriceBar> {
    let start = date(2024, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar::from_close(start + Duration::days(i as i64), close))
        .collect()
}

/// Upward drift with a small oscillation, so models have something to fit.
pub fn trending_closes(n: usize, start: f64, step: f64) -> Vec<f64> {
    (0..n)
        .map(|i| start + step * i as f64 + 1.5 * (i as f64 * 0.8).sin())
        .collect()
}

pub fn trending_series(symbol: &str, n: usize) -> PriceSeries {
    PriceSeries::new(symbol, bars_from_closes(&trending_closes(n, 100.0, 0.5)))
}

pub fn csv_body(bars: &[PriceBar]) -> String {
    let mut out = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    out
}

/// A successful run with `values` forecast after `last_date`.
pub fn ok_run(model: ModelKind, last_date: NaiveDate, values: Vec<f64>) -> ModelRun {
    ModelRun {
        model,
        result: Ok(ForecastSeries::from_values(model, last_date, values).unwrap()),
    }
}
