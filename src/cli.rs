//! CLI definition and dispatch.
//!
//! Every subcommand loads [`Settings`] from the optional `--config` file,
//! builds the adapters it needs and prints its result to stdout. Progress
//! and errors go to stderr.

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::cached_data::CachedMarketData;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{DataSettings, DataSourceKind, Settings, SqliteSettings, load_settings};
use crate::domain::ensemble::Execution;
use crate::domain::error::StockcastError;
use crate::domain::history::{AnalysisRecord, DEFAULT_ANALYSIS_LIMIT, DEFAULT_TRADE_LIMIT};
use crate::domain::indicator::IndicatorSnapshot;
use crate::domain::period::Period;
use crate::domain::pipeline::{Analysis, Analyzer};
use crate::domain::portfolio::Portfolio;
use crate::domain::series::prepare;
use crate::domain::tax::{HoldingTerm, Side, TaxBreakdown, calculate_tax, profit_potential};
use crate::domain::trade::{TradeRequest, execute_trade};
use crate::domain::universe::{SkipReason, Universe, check_coverage};
use crate::ports::history_port::HistoryPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "stockcast", about = "Stock price forecasting and trade recommendations")]
pub struct Cli {
    /// INI configuration file. Built-in defaults apply when omitted.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Forecast a symbol and recommend buy, sell or hold
    Predict(PredictArgs),
    /// Show the latest technical indicators for a symbol
    Indicators {
        #[arg(short, long)]
        symbol: String,
        #[arg(short, long, default_value = "3month")]
        period: Period,
        #[arg(long)]
        json: bool,
    },
    /// Break down the taxes on a single transaction
    Tax {
        #[arg(long)]
        side: Side,
        #[arg(long)]
        price: f64,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        long_term: bool,
    },
    /// Project after-tax profit from a price move
    Profit {
        #[arg(long)]
        current: f64,
        #[arg(long)]
        predicted: f64,
        #[arg(long)]
        quantity: i64,
    },
    /// Execute a simulated trade and update the portfolio
    Trade(TradeArgs),
    /// Show holdings valued at current prices
    Portfolio {
        #[arg(long, default_value_t = 1)]
        user: i64,
        #[arg(long)]
        json: bool,
    },
    /// Manage the watchlist
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
    /// Show saved analyses or trades
    History {
        #[command(subcommand)]
        kind: HistoryKind,
    },
    /// List the configured symbol universe
    Symbols {
        /// Also query the data source for each symbol
        #[arg(long)]
        check: bool,
        #[arg(short, long, default_value = "1month")]
        period: Period,
    },
    /// Validate the configuration file
    Validate,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(short, long)]
    pub symbol: String,
    #[arg(short, long, default_value = "3month")]
    pub period: Period,
    /// Forecast horizon in days; overrides [forecast] days
    #[arg(short, long)]
    pub days: Option<usize>,
    /// Run the models one after another instead of concurrently
    #[arg(long)]
    pub sequential: bool,
    #[arg(long)]
    pub json: bool,
    /// Store the analysis in the history database
    #[arg(long)]
    pub save: bool,
    #[arg(long, default_value_t = 1)]
    pub user: i64,
}

#[derive(Args, Debug)]
pub struct TradeArgs {
    #[arg(long, default_value_t = 1)]
    pub user: i64,
    #[arg(short, long)]
    pub symbol: String,
    #[arg(long)]
    pub side: Side,
    #[arg(long)]
    pub quantity: i64,
    /// Execution price; defaults to the current quote
    #[arg(long)]
    pub price: Option<f64>,
    #[arg(long)]
    pub long_term: bool,
}

#[derive(Subcommand, Debug)]
pub enum WatchlistAction {
    Add {
        #[arg(long, default_value_t = 1)]
        user: i64,
        #[arg(short, long)]
        symbol: String,
    },
    Remove {
        #[arg(long, default_value_t = 1)]
        user: i64,
        #[arg(short, long)]
        symbol: String,
    },
    List {
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum HistoryKind {
    Analyses {
        #[arg(long, default_value_t = 1)]
        user: i64,
        #[arg(long, default_value_t = DEFAULT_ANALYSIS_LIMIT)]
        limit: usize,
    },
    Trades {
        #[arg(long, default_value_t = 1)]
        user: i64,
        #[arg(long, default_value_t = DEFAULT_TRADE_LIMIT)]
        limit: usize,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let config = cli.config.as_deref();
    let result = match cli.command {
        Command::Predict(args) => run_predict(config, &args),
        Command::Indicators { symbol, period, json } => run_indicators(config, &symbol, period, json),
        Command::Tax {
            side,
            price,
            quantity,
            long_term,
        } => run_tax(config, side, price, quantity, long_term),
        Command::Profit {
            current,
            predicted,
            quantity,
        } => run_profit(config, current, predicted, quantity),
        Command::Trade(args) => run_trade(config, &args),
        Command::Portfolio { user, json } => run_portfolio(config, user, json),
        Command::Watchlist { action } => run_watchlist(config, action),
        Command::History { kind } => run_history(config, kind),
        Command::Symbols { check, period } => run_symbols(config, check, period),
        Command::Validate => run_validate(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Reads the INI file, or an empty configuration when no path is given.
pub fn load_config(path: Option<&Path>) -> Result<FileConfigAdapter, StockcastError> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading config");
            FileConfigAdapter::from_file(path)
        }
        None => Ok(FileConfigAdapter::empty()),
    }
}

pub fn settings_from(path: Option<&Path>) -> Result<Settings, StockcastError> {
    let adapter = load_config(path)?;
    load_settings(&adapter)
}

/// The configured source behind a TTL cache.
pub fn open_market_data(settings: &DataSettings) -> Result<CachedMarketData<Box<dyn MarketDataPort>>, StockcastError> {
    let source: Box<dyn MarketDataPort> = match settings.source {
        DataSourceKind::Csv => {
            tracing::debug!(dir = %settings.csv_dir.display(), "using csv data source");
            Box::new(CsvAdapter::new(settings.csv_dir.clone()))
        }
        DataSourceKind::AlphaVantage => alphavantage_source(settings)?,
    };
    Ok(CachedMarketData::new(source, settings.cache_ttl))
}

#[cfg(feature = "alphavantage")]
fn alphavantage_source(settings: &DataSettings) -> Result<Box<dyn MarketDataPort>, StockcastError> {
    use crate::adapters::alphavantage_adapter::AlphaVantageAdapter;

    tracing::debug!(url = %settings.base_url, "using alpha vantage data source");
    let adapter = AlphaVantageAdapter::new(settings.base_url.clone(), settings.api_key.clone())?;
    Ok(Box::new(adapter))
}

#[cfg(not(feature = "alphavantage"))]
fn alphavantage_source(_settings: &DataSettings) -> Result<Box<dyn MarketDataPort>, StockcastError> {
    Err(StockcastError::DataSource {
        reason: "alphavantage feature is required for source = alphavantage".into(),
    })
}

#[cfg(feature = "sqlite")]
pub fn open_history(settings: &SqliteSettings) -> Result<Box<dyn HistoryPort>, StockcastError> {
    use crate::adapters::sqlite_adapter::SqliteAdapter;

    Ok(Box::new(SqliteAdapter::open(settings)?))
}

#[cfg(not(feature = "sqlite"))]
pub fn open_history(_settings: &SqliteSettings) -> Result<Box<dyn HistoryPort>, StockcastError> {
    Err(StockcastError::Database {
        reason: "sqlite feature is required for history commands".into(),
    })
}

fn run_predict(config: Option<&Path>, args: &PredictArgs) -> Result<(), StockcastError> {
    let mut settings = settings_from(config)?;
    let symbol = settings.universe.resolve(&args.symbol)?.to_string();
    let days = args.days.unwrap_or(settings.forecast_days);
    if args.sequential {
        let combiner = std::mem::take(&mut settings.pipeline.combiner);
        settings.pipeline.combiner = combiner.with_execution(Execution::Sequential);
    }

    let data = open_market_data(&settings.data)?;
    eprintln!(
        "Forecasting {} ({}) {} days ahead from {} of history...",
        symbol,
        Universe::display_name(&symbol),
        days,
        args.period
    );
    let analysis = Analyzer::new(&data, settings.pipeline.clone()).analyze(&symbol, args.period, days)?;

    for failure in &analysis.ensemble.failures {
        eprintln!("warning: {failure}");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }

    if args.save {
        let history = open_history(&settings.sqlite)?;
        let record = AnalysisRecord {
            id: None,
            user_id: args.user,
            symbol: symbol.clone(),
            period: args.period,
            created_at: Utc::now().naive_utc(),
            prediction: serde_json::to_string(&analysis.ensemble)?,
            recommendation: analysis.recommendation.signal,
        };
        let id = history.save_analysis(&record)?;
        eprintln!("Saved analysis #{id}");
    }
    Ok(())
}

pub fn print_analysis(analysis: &Analysis) {
    let models = analysis.ensemble.models();
    let mut header = format!("{:<12}", "Date");
    for model in &models {
        header.push_str(&format!("{:>12}", model.name()));
    }
    header.push_str(&format!("{:>12}", "Ensemble"));
    println!("{header}");

    for (row, date) in analysis.ensemble.dates.iter().enumerate() {
        let mut line = format!("{:<12}", date.format("%Y-%m-%d"));
        for column in &analysis.ensemble.columns {
            line.push_str(&format!("{:>12.2}", column.points[row].predicted_price));
        }
        line.push_str(&format!("{:>12.2}", analysis.ensemble.ensemble[row]));
        println!("{line}");
    }

    let rec = &analysis.recommendation;
    println!();
    println!("Current price:   {:.2}", analysis.current_price);
    println!(
        "Recommendation:  {} ({} confidence)",
        rec.signal.as_str().to_uppercase(),
        rec.confidence
    );
    if let Some(returns) = &rec.returns {
        println!(
            "Expected return: {:+.2}% ({}d)  {:+.2}% ({}d)  {:+.2}% ({}d)",
            returns.short_pct,
            returns.short_days,
            returns.medium_pct,
            returns.medium_days,
            returns.long_pct,
            returns.long_days
        );
    }
    for signal in &rec.model_signals {
        println!("  {:<10} {}", signal.model.name(), signal.outlook);
    }
    println!("{}", rec.rationale);
}

fn run_indicators(config: Option<&Path>, symbol: &str, period: Period, json: bool) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    let symbol = settings.universe.resolve(symbol)?;
    let data = open_market_data(&settings.data)?;

    let no_data = || StockcastError::NoData {
        symbol: symbol.to_string(),
    };
    let series = data
        .get_series(symbol, period)?
        .filter(|s| !s.is_empty())
        .ok_or_else(no_data)?;
    let snapshot = IndicatorSnapshot::latest(&prepare(&series)?).ok_or_else(no_data)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));
    println!("{} as of {}", symbol, snapshot.date);
    println!("Close:      {:.2}", snapshot.close);
    println!("SMA(20):    {}", show(snapshot.sma_20));
    println!("SMA(50):    {}", show(snapshot.sma_50));
    println!("EMA(20):    {}", show(snapshot.ema_20));
    match (snapshot.rsi_14, snapshot.rsi_zone) {
        (Some(rsi), Some(zone)) => println!("RSI(14):    {:.2} ({:?})", rsi, zone),
        _ => println!("RSI(14):    n/a"),
    }
    match snapshot.macd {
        Some(m) => println!(
            "MACD:       {:.2} signal {:.2} histogram {:+.2}",
            m.line, m.signal, m.histogram
        ),
        None => println!("MACD:       n/a"),
    }
    match snapshot.bollinger {
        Some(b) => println!(
            "Bollinger:  {:.2} / {:.2} / {:.2} (position {})",
            b.upper,
            b.middle,
            b.lower,
            b.position_pct.map_or_else(|| "n/a".to_string(), |p| format!("{:.0}%", p))
        ),
        None => println!("Bollinger:  n/a"),
    }
    Ok(())
}

fn term(long_term: bool) -> HoldingTerm {
    if long_term {
        HoldingTerm::LongTerm
    } else {
        HoldingTerm::ShortTerm
    }
}

fn run_tax(config: Option<&Path>, side: Side, price: f64, quantity: i64, long_term: bool) -> Result<(), StockcastError> {
    if quantity <= 0 || !price.is_finite() || price <= 0.0 {
        return Err(StockcastError::invalid_input("price and quantity must be positive"));
    }
    let settings = settings_from(config)?;
    let breakdown = calculate_tax(side, price, quantity, term(long_term), &settings.tax);
    print_tax(&breakdown);
    Ok(())
}

fn print_tax(tax: &TaxBreakdown) {
    println!("Transaction value:   {:>12.2}", tax.transaction_value);
    println!("STT:                 {:>12.2}", tax.stt);
    println!("Transaction charges: {:>12.2}", tax.transaction_charges);
    println!("GST:                 {:>12.2}", tax.gst);
    match tax.side {
        Side::Buy => println!("Stamp duty:          {:>12.2}", tax.stamp_duty),
        Side::Sell => println!("Income tax:          {:>12.2}", tax.income_tax),
    }
    println!("Total tax:           {:>12.2}", tax.total_tax);
    match tax.side {
        Side::Buy => println!("Total cost:          {:>12.2}", tax.settlement),
        Side::Sell => println!("Net proceeds:        {:>12.2}", tax.settlement),
    }
}

fn run_profit(config: Option<&Path>, current: f64, predicted: f64, quantity: i64) -> Result<(), StockcastError> {
    if quantity <= 0 {
        return Err(StockcastError::invalid_input("quantity must be positive"));
    }
    let settings = settings_from(config)?;
    let p = profit_potential(current, predicted, quantity, settings.tax.profit_tax_pct);
    println!("Investment:    {:>12.2}", p.investment);
    println!("Future value:  {:>12.2}", p.future_value);
    println!("Gross profit:  {:>12.2}", p.gross_profit);
    println!("Tax:           {:>12.2}", p.tax);
    println!("Net profit:    {:>12.2}", p.net_profit);
    println!("ROI:           {:>11.2}%", p.roi_pct);
    Ok(())
}

fn current_price(data: &dyn MarketDataPort, symbol: &str) -> Result<f64, StockcastError> {
    if let Some(price) = data.get_current_price(symbol)? {
        return Ok(price);
    }
    data.get_series(symbol, Period::OneMonth)?
        .and_then(|s| prepare(&s).ok())
        .and_then(|s| s.last_close())
        .ok_or_else(|| StockcastError::NoData {
            symbol: symbol.to_string(),
        })
}

fn run_trade(config: Option<&Path>, args: &TradeArgs) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    let symbol = settings.universe.resolve(&args.symbol)?;
    let price = match args.price {
        Some(price) => price,
        None => current_price(&open_market_data(&settings.data)?, symbol)?,
    };

    let history = open_history(&settings.sqlite)?;
    let request = TradeRequest {
        user_id: args.user,
        symbol,
        side: args.side,
        quantity: args.quantity,
        price,
        term: term(args.long_term),
    };
    let outcome = execute_trade(history.as_ref(), &request, &settings.tax)?;

    println!(
        "{} {} {} @ {:.2}",
        outcome.record.side.as_str().to_uppercase(),
        outcome.record.quantity,
        outcome.record.symbol,
        outcome.record.price
    );
    print_tax(&outcome.tax);
    match &outcome.holding {
        Some(h) => println!("Holding: {} shares @ {:.2} average", h.quantity, h.average_price),
        None => println!("Holding: none"),
    }
    Ok(())
}

fn run_portfolio(config: Option<&Path>, user: i64, json: bool) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    let history = open_history(&settings.sqlite)?;
    let portfolio = Portfolio::new(history.portfolio(user)?);
    if portfolio.is_empty() {
        eprintln!("No holdings for user {user}");
        return Ok(());
    }

    let data = open_market_data(&settings.data)?;
    let mut prices = HashMap::new();
    for holding in &portfolio.holdings {
        match current_price(&data, &holding.symbol) {
            Ok(price) => {
                prices.insert(holding.symbol.clone(), price);
            }
            Err(e) => tracing::warn!(symbol = %holding.symbol, error = %e, "no current price"),
        }
    }
    let valuations = portfolio.valuations(&prices);

    if json {
        println!("{}", serde_json::to_string_pretty(&valuations)?);
        return Ok(());
    }

    let show = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("{:.2}", v));
    println!(
        "{:<16}{:>10}{:>12}{:>12}{:>14}{:>14}",
        "Symbol", "Qty", "Avg", "Price", "Value", "P&L"
    );
    for v in &valuations {
        println!(
            "{:<16}{:>10}{:>12.2}{:>12}{:>14}{:>14}",
            v.symbol,
            v.quantity,
            v.average_price,
            show(v.current_price),
            show(v.market_value),
            show(v.unrealized_pnl)
        );
    }
    println!();
    println!("Cost basis:     {:.2}", portfolio.cost_basis());
    println!("Market value:   {:.2}", portfolio.market_value(&prices));
    println!("Unrealized P&L: {:+.2}", portfolio.unrealized_pnl(&prices));
    Ok(())
}

fn run_watchlist(config: Option<&Path>, action: WatchlistAction) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    let history = open_history(&settings.sqlite)?;
    match action {
        WatchlistAction::Add { user, symbol } => {
            let symbol = settings.universe.resolve(&symbol)?;
            if history.add_to_watchlist(user, symbol)? {
                println!("Added {symbol}");
            } else {
                println!("{symbol} is already on the watchlist");
            }
        }
        WatchlistAction::Remove { user, symbol } => {
            let symbol = symbol.trim().to_uppercase();
            if history.remove_from_watchlist(user, &symbol)? {
                println!("Removed {symbol}");
            } else {
                println!("{symbol} was not on the watchlist");
            }
        }
        WatchlistAction::List { user } => {
            let entries = history.watchlist(user)?;
            if entries.is_empty() {
                eprintln!("Watchlist is empty");
            }
            for entry in entries {
                println!("{:<16}{}", entry.symbol, entry.added_at.format("%Y-%m-%d %H:%M"));
            }
        }
    }
    Ok(())
}

fn run_history(config: Option<&Path>, kind: HistoryKind) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    let history = open_history(&settings.sqlite)?;
    match kind {
        HistoryKind::Analyses { user, limit } => {
            for record in history.analysis_history(user, limit)? {
                println!(
                    "{:<6}{:<18}{:<16}{:<8}{}",
                    record.id.unwrap_or_default(),
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.symbol,
                    record.period,
                    record.recommendation.as_str().to_uppercase()
                );
            }
        }
        HistoryKind::Trades { user, limit } => {
            for record in history.trade_history(user, limit)? {
                println!(
                    "{:<6}{:<18}{:<16}{:<6}{:>8}{:>12.2}{:>12.2}{:>14.2}",
                    record.id.unwrap_or_default(),
                    record.executed_at.format("%Y-%m-%d %H:%M"),
                    record.symbol,
                    record.side,
                    record.quantity,
                    record.price,
                    record.tax_amount,
                    record.total_amount
                );
            }
        }
    }
    Ok(())
}

fn run_symbols(config: Option<&Path>, check: bool, period: Period) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    if !check {
        for symbol in &settings.universe.symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols", settings.universe.count());
        return Ok(());
    }

    let data = open_market_data(&settings.data)?;
    let report = check_coverage(&data, &settings.universe, period);
    for coverage in &report.available {
        println!("{:<20}{:>6} bars", coverage.symbol, coverage.bars);
    }
    for (symbol, reason) in &report.skipped {
        match reason {
            SkipReason::NoData => eprintln!("warning: skipping {} (no data)", symbol),
            SkipReason::Unavailable(e) => eprintln!("warning: skipping {} ({})", symbol, e),
        }
    }
    eprintln!(
        "{} of {} symbols have data for {}",
        report.available.len(),
        settings.universe.count(),
        period
    );
    Ok(())
}

fn run_validate(config: Option<&Path>) -> Result<(), StockcastError> {
    let settings = settings_from(config)?;
    let models = settings
        .pipeline
        .combiner
        .forecasters
        .iter()
        .map(|f| f.kind().name())
        .collect::<Vec<_>>();
    println!("Configuration is valid");
    println!("  models:        {}", models.join(", "));
    println!("  forecast days: {}", settings.forecast_days);
    println!("  data source:   {:?}", settings.data.source);
    println!("  symbols:       {}", settings.universe.count());
    Ok(())
}
