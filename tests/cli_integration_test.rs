//! CLI integration tests.
//!
//! Tests cover:
//! - Argument parsing for each subcommand
//! - Settings loading from INI files on disk
//! - Market data wiring from settings (csv source behind the cache)
//! - Full predict / trade / history runs against csv data and sqlite

mod common;

use chrono::{Duration, Utc};
use clap::Parser;
use common::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use stockcast::cli::{self, Cli, Command};
use stockcast::domain::config_validation::DataSourceKind;
use stockcast::domain::error::StockcastError;
use stockcast::domain::period::Period;
use stockcast::domain::tax::Side;
use stockcast::ports::market_data_port::MarketDataPort;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn is_success(code: ExitCode) -> bool {
    format!("{:?}", code) == format!("{:?}", ExitCode::SUCCESS)
}

fn same_code(code: ExitCode, err: &StockcastError) -> bool {
    format!("{:?}", code) == format!("{:?}", ExitCode::from(err))
}

fn run_args(args: &[&str]) -> ExitCode {
    cli::run(Cli::try_parse_from(args.iter().copied()).unwrap())
}

/// Data directory holding `n` daily bars for TCS.BSE ending yesterday.
fn write_csv_dir(dir: &Path, n: i64) {
    let end = Utc::now().date_naive() - Duration::days(1);
    let closes = trending_closes(n as usize, 3500.0, 4.0);
    let mut bars = bars_from_closes(&closes);
    for (i, bar) in bars.iter_mut().enumerate() {
        bar.date = end - Duration::days(n - 1 - i as i64);
    }
    fs::write(dir.join("TCS.BSE.csv"), csv_body(&bars)).unwrap();
}

fn project_ini(dir: &Path) -> String {
    format!(
        r#"
[data]
source = csv
csv_dir = {data}

[forecast]
days = 14
models = arima, seasonal
parallel = false

[sqlite]
path = {db}
pool_size = 1

[universe]
symbols = TCS.BSE, ITC.BSE
"#,
        data = dir.display(),
        db = dir.join("history.db").display()
    )
}

mod parsing {
    use super::*;

    #[test]
    fn predict_defaults() {
        let cli = Cli::try_parse_from(["stockcast", "predict", "--symbol", "TCS.BSE"]).unwrap();
        assert!(cli.config.is_none());
        match cli.command {
            Command::Predict(args) => {
                assert_eq!(args.symbol, "TCS.BSE");
                assert_eq!(args.period, Period::ThreeMonth);
                assert_eq!(args.days, None);
                assert_eq!(args.user, 1);
                assert!(!args.save && !args.json && !args.sequential);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn global_config_after_subcommand() {
        let cli = Cli::try_parse_from(["stockcast", "validate", "--config", "app.ini"]).unwrap();
        assert_eq!(cli.config.unwrap().to_str(), Some("app.ini"));
    }

    #[test]
    fn trade_parses_side_and_optional_price() {
        let cli = Cli::try_parse_from([
            "stockcast", "trade", "--symbol", "ITC.BSE", "--side", "SELL", "--quantity", "3", "--long-term",
        ])
        .unwrap();
        match cli.command {
            Command::Trade(args) => {
                assert_eq!(args.side, Side::Sell);
                assert_eq!(args.price, None);
                assert!(args.long_term);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bad_period_is_rejected() {
        assert!(Cli::try_parse_from(["stockcast", "predict", "--symbol", "TCS.BSE", "--period", "2weeks"]).is_err());
    }
}

mod settings {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let settings = cli::settings_from(None).unwrap();
        assert_eq!(settings.data.source, DataSourceKind::Csv);
        assert_eq!(settings.forecast_days, 30);
        assert_eq!(settings.universe.count(), 50);
        assert_eq!(settings.pipeline.combiner.forecasters.len(), 3);
    }

    #[test]
    fn reads_ini_from_disk() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&project_ini(dir.path()));
        let settings = cli::settings_from(Some(ini.path())).unwrap();

        assert_eq!(settings.forecast_days, 14);
        assert_eq!(settings.universe.symbols, vec!["TCS.BSE", "ITC.BSE"]);
        assert_eq!(settings.sqlite.pool_size, 1);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = cli::settings_from(Some(Path::new("/nonexistent/stockcast.ini"))).unwrap_err();
        assert!(matches!(err, StockcastError::ConfigParse { .. }));
    }

    #[test]
    fn validate_exit_codes() {
        let good = write_temp_ini("[forecast]\ndays = 20\n");
        assert!(is_success(run_args(&["stockcast", "validate", "--config", good.path().to_str().unwrap()])));

        let bad = write_temp_ini("[forecast]\ndays = 5\n");
        let code = run_args(&["stockcast", "validate", "--config", bad.path().to_str().unwrap()]);
        assert!(same_code(code, &StockcastError::config_invalid("forecast", "days", "")));
    }

    #[test]
    fn csv_source_is_served_through_cache() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv_dir(dir.path(), 30);
        let ini = write_temp_ini(&project_ini(dir.path()));
        let settings = cli::settings_from(Some(ini.path())).unwrap();

        let data = cli::open_market_data(&settings.data).unwrap();
        let series = data.get_series("TCS.BSE", Period::OneMonth).unwrap().unwrap();
        assert_eq!(series.len(), 30);
        assert_eq!(data.len(), 1);
        assert!(data.get_series("ITC.BSE", Period::OneMonth).unwrap().is_none());
    }
}

mod commands {
    use super::*;

    #[test]
    fn unknown_symbol_fails_before_any_lookup() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&project_ini(dir.path()));
        let code = run_args(&["stockcast", "predict", "--symbol", "NOPE.BSE", "--config", ini.path().to_str().unwrap()]);
        assert!(same_code(code, &StockcastError::UnknownSymbol { symbol: "NOPE.BSE".into() }));
    }

    #[test]
    fn predict_without_data_is_no_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&project_ini(dir.path()));
        let code = run_args(&["stockcast", "predict", "--symbol", "itc.bse", "--config", ini.path().to_str().unwrap()]);
        assert!(same_code(code, &StockcastError::NoData { symbol: "ITC.BSE".into() }));
    }

    #[test]
    fn tax_and_profit_need_no_data() {
        assert!(is_success(run_args(&[
            "stockcast", "tax", "--side", "buy", "--price", "1000", "--quantity", "10",
        ])));
        assert!(is_success(run_args(&[
            "stockcast", "profit", "--current", "100", "--predicted", "110", "--quantity", "5",
        ])));
        let code = run_args(&["stockcast", "tax", "--side", "sell", "--price", "1000", "--quantity", "0"]);
        assert!(same_code(code, &StockcastError::invalid_input("")));
    }

    #[test]
    fn indicators_for_csv_symbol() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv_dir(dir.path(), 60);
        let ini = write_temp_ini(&project_ini(dir.path()));
        let code = run_args(&[
            "stockcast", "indicators", "--symbol", "TCS.BSE", "--json", "--config", ini.path().to_str().unwrap(),
        ]);
        assert!(is_success(code));
    }

    #[test]
    fn symbols_check_reports_coverage() {
        let dir = tempfile::TempDir::new().unwrap();
        write_csv_dir(dir.path(), 10);
        let ini = write_temp_ini(&project_ini(dir.path()));
        assert!(is_success(run_args(&[
            "stockcast", "symbols", "--check", "--config", ini.path().to_str().unwrap(),
        ])));
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn predict_save_then_trade_and_read_history() {
        use stockcast::ports::history_port::HistoryPort;

        let dir = tempfile::TempDir::new().unwrap();
        write_csv_dir(dir.path(), 60);
        let ini = write_temp_ini(&project_ini(dir.path()));
        let config = ini.path().to_str().unwrap();

        assert!(is_success(run_args(&[
            "stockcast", "predict", "--symbol", "tcs.bse", "--save", "--user", "7", "--config", config,
        ])));
        assert!(is_success(run_args(&[
            "stockcast", "trade", "--symbol", "TCS.BSE", "--side", "buy", "--quantity", "3", "--user", "7",
            "--config", config,
        ])));
        assert!(is_success(run_args(&["stockcast", "portfolio", "--user", "7", "--config", config])));
        assert!(is_success(run_args(&[
            "stockcast", "watchlist", "add", "--symbol", "ITC.BSE", "--user", "7", "--config", config,
        ])));

        let settings = cli::settings_from(Some(ini.path())).unwrap();
        let history = cli::open_history(&settings.sqlite).unwrap();
        let analyses = history.analysis_history(7, 10).unwrap();
        assert_eq!(analyses.len(), 1);
        assert_eq!(analyses[0].symbol, "TCS.BSE");

        let trades = history.trade_history(7, 10).unwrap();
        assert_eq!(trades.len(), 1);
        let last_close = *trending_closes(60, 3500.0, 4.0).last().unwrap();
        assert!((trades[0].price - last_close).abs() < 1e-9);

        assert_eq!(history.portfolio(7).unwrap()[0].quantity, 3);
        assert_eq!(history.watchlist(7).unwrap()[0].symbol, "ITC.BSE");
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn selling_unheld_symbol_is_recorded_without_a_holding() {
        use stockcast::ports::history_port::HistoryPort;

        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&project_ini(dir.path()));
        let code = run_args(&[
            "stockcast", "trade", "--symbol", "ITC.BSE", "--side", "sell", "--quantity", "1", "--price", "400",
            "--config", ini.path().to_str().unwrap(),
        ]);
        assert!(is_success(code));

        let settings = cli::settings_from(Some(ini.path())).unwrap();
        let history = cli::open_history(&settings.sqlite).unwrap();
        assert_eq!(history.trade_history(1, 10).unwrap().len(), 1);
        assert!(history.portfolio(1).unwrap().is_empty());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn zero_quantity_trade_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let ini = write_temp_ini(&project_ini(dir.path()));
        let code = run_args(&[
            "stockcast", "trade", "--symbol", "ITC.BSE", "--side", "buy", "--quantity", "0", "--price", "400",
            "--config", ini.path().to_str().unwrap(),
        ]);
        assert!(same_code(code, &StockcastError::Trade { reason: String::new() }));
    }
}
