//! The set of symbols the tool will analyze.
//!
//! Defaults to the NIFTY-50 constituents listed on BSE. A custom list can be
//! supplied through configuration as a comma-separated string.

use std::collections::HashSet;

use crate::domain::error::StockcastError;
use crate::domain::period::Period;
use crate::ports::market_data_port::MarketDataPort;

pub const NIFTY50: [&str; 50] = [
    "RELIANCE.BSE",
    "TCS.BSE",
    "HDFCBANK.BSE",
    "ICICIBANK.BSE",
    "HINDUNILVR.BSE",
    "INFY.BSE",
    "HDFC.BSE",
    "KOTAKBANK.BSE",
    "ITC.BSE",
    "SBIN.BSE",
    "BHARTIARTL.BSE",
    "BAJFINANCE.BSE",
    "LT.BSE",
    "ASIANPAINT.BSE",
    "AXISBANK.BSE",
    "WIPRO.BSE",
    "MARUTI.BSE",
    "ULTRACEMCO.BSE",
    "TITAN.BSE",
    "BAJAJFINSV.BSE",
    "HCLTECH.BSE",
    "SUNPHARMA.BSE",
    "TATASTEEL.BSE",
    "M&M.BSE",
    "TECHM.BSE",
    "NTPC.BSE",
    "POWERGRID.BSE",
    "NESTLEIND.BSE",
    "JSWSTEEL.BSE",
    "DRREDDY.BSE",
    "HDFCLIFE.BSE",
    "IOC.BSE",
    "CIPLA.BSE",
    "ONGC.BSE",
    "DIVISLAB.BSE",
    "COALINDIA.BSE",
    "GRASIM.BSE",
    "BPCL.BSE",
    "UPL.BSE",
    "SHREECEM.BSE",
    "HEROMOTOCO.BSE",
    "TATAMOTORS.BSE",
    "ADANIPORTS.BSE",
    "INDUSINDBK.BSE",
    "BRITANNIA.BSE",
    "HINDALCO.BSE",
    "EICHERMOT.BSE",
    "SBILIFE.BSE",
    "BAJAJ-AUTO.BSE",
    "TATACONSUM.BSE",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Universe {
    pub symbols: Vec<String>,
}

impl Default for Universe {
    fn default() -> Self {
        Universe {
            symbols: NIFTY50.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Universe {
    pub fn new(symbols: Vec<String>) -> Self {
        Universe { symbols }
    }

    pub fn count(&self) -> usize {
        self.symbols.len()
    }

    /// Case-insensitive membership.
    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol.trim()))
    }

    /// The canonical spelling of `symbol`, or `UnknownSymbol`.
    pub fn resolve(&self, symbol: &str) -> Result<&str, StockcastError> {
        self.symbols
            .iter()
            .find(|s| s.eq_ignore_ascii_case(symbol.trim()))
            .map(String::as_str)
            .ok_or_else(|| StockcastError::UnknownSymbol {
                symbol: symbol.to_string(),
            })
    }

    /// Display name: the ticker without its exchange suffix.
    pub fn display_name(symbol: &str) -> &str {
        symbol.split('.').next().unwrap_or(symbol)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),
}

impl From<UniverseError> for StockcastError {
    fn from(err: UniverseError) -> Self {
        StockcastError::invalid_input(err.to_string())
    }
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolCoverage {
    pub symbol: String,
    pub bars: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CoverageReport {
    pub available: Vec<SymbolCoverage>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Checks which symbols the data source can serve for `period`.
/// Lookup failures are recorded per symbol instead of aborting the scan.
pub fn check_coverage(data: &dyn MarketDataPort, universe: &Universe, period: Period) -> CoverageReport {
    let mut report = CoverageReport::default();

    for symbol in &universe.symbols {
        match data.get_series(symbol, period) {
            Ok(Some(series)) if !series.is_empty() => report.available.push(SymbolCoverage {
                symbol: symbol.clone(),
                bars: series.len(),
            }),
            Ok(_) => {
                tracing::warn!(%symbol, "no data");
                report.skipped.push((symbol.clone(), SkipReason::NoData));
            }
            Err(e) => {
                tracing::warn!(%symbol, error = %e, "lookup failed");
                report.skipped.push((symbol.clone(), SkipReason::Unavailable(e.to_string())));
            }
        }
    }

    tracing::info!(
        available = report.available.len(),
        skipped = report.skipped.len(),
        "universe coverage checked"
    );
    report
}
