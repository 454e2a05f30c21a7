//! CSV file market data adapter.
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with a
//! `date,open,high,low,close,volume` header. An optional `<SYMBOL>.quote`
//! file holding a single number overrides the last close as current price.

use chrono::{NaiveDate, Utc};
use std::fs;
use std::io;
use std::path::PathBuf;

use crate::domain::error::StockcastError;
use crate::domain::ohlcv::PriceBar;
use crate::domain::period::Period;
use crate::domain::series::PriceSeries;
use crate::ports::market_data_port::MarketDataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
    /// Fixed "today" for period cutoffs; `None` uses the system clock.
    today: Option<NaiveDate>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            today: None,
        }
    }

    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    fn quote_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.quote", symbol))
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// All bars in the file, in file order. `None` when there is no file.
    fn read_bars(&self, symbol: &str) -> Result<Option<Vec<PriceBar>>, StockcastError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StockcastError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();
        for (line, result) in rdr.deserialize::<PriceBar>().enumerate() {
            let bar = result.map_err(|e| StockcastError::DataSource {
                reason: format!("{} row {}: {}", path.display(), line + 1, e),
            })?;
            bars.push(bar);
        }
        Ok(Some(bars))
    }
}

impl MarketDataPort for CsvAdapter {
    fn get_series(&self, symbol: &str, period: Period) -> Result<Option<PriceSeries>, StockcastError> {
        let Some(bars) = self.read_bars(symbol)? else {
            tracing::debug!(%symbol, "no csv file");
            return Ok(None);
        };
        let series = PriceSeries::new(symbol, bars).since(period.start_date(self.today()));
        tracing::debug!(%symbol, %period, bars = series.len(), "loaded csv series");
        Ok(Some(series))
    }

    fn get_current_price(&self, symbol: &str) -> Result<Option<f64>, StockcastError> {
        let path = self.quote_path(symbol);
        match fs::read_to_string(&path) {
            Ok(raw) => {
                let price = raw.trim().parse::<f64>().map_err(|_| StockcastError::DataSource {
                    reason: format!("{} does not hold a number", path.display()),
                })?;
                return Ok(Some(price));
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StockcastError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        }

        Ok(self
            .read_bars(symbol)?
            .and_then(|bars| bars.into_iter().max_by_key(|b| b.date))
            .map(|bar| bar.close))
    }
}
