//! SQLite history store.

use chrono::NaiveDateTime;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, params};

use crate::domain::config_validation::SqliteSettings;
use crate::domain::error::StockcastError;
use crate::domain::history::{AnalysisRecord, WatchlistEntry};
use crate::domain::portfolio::{Holding, apply_fill};
use crate::domain::trade::TradeRecord;
use crate::ports::history_port::HistoryPort;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS stock_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        stock_symbol TEXT NOT NULL,
        analysis_date TEXT NOT NULL,
        analysis_period TEXT NOT NULL,
        prediction_result TEXT NOT NULL,
        recommendation TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_stock_history_user ON stock_history(user_id, analysis_date);
    CREATE TABLE IF NOT EXISTS trading_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        stock_symbol TEXT NOT NULL,
        transaction_type TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price REAL NOT NULL,
        transaction_date TEXT NOT NULL,
        tax_amount REAL NOT NULL,
        total_amount REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trading_history_user ON trading_history(user_id, transaction_date);
    CREATE TABLE IF NOT EXISTS portfolio (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        stock_symbol TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        average_buy_price REAL NOT NULL,
        UNIQUE(user_id, stock_symbol)
    );
    CREATE TABLE IF NOT EXISTS watchlist (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL,
        stock_symbol TEXT NOT NULL,
        added_date TEXT NOT NULL,
        UNIQUE(user_id, stock_symbol)
    );";

fn pool_err(e: r2d2::Error) -> StockcastError {
    StockcastError::Database { reason: e.to_string() }
}

fn query_err(e: rusqlite::Error) -> StockcastError {
    StockcastError::DatabaseQuery { reason: e.to_string() }
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
}

fn timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(|e| conversion_err(idx, e))
}

fn parse_text<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = StockcastError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    /// Opens (creating if needed) the database file and its schema.
    pub fn open(settings: &SqliteSettings) -> Result<Self, StockcastError> {
        let manager = SqliteConnectionManager::file(&settings.path);
        let pool = Pool::builder()
            .max_size(settings.pool_size)
            .build(manager)
            .map_err(pool_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::debug!(path = %settings.path, "opened history database");
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, StockcastError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StockcastError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), StockcastError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }
}

impl HistoryPort for SqliteAdapter {
    fn save_analysis(&self, record: &AnalysisRecord) -> Result<i64, StockcastError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO stock_history
                (user_id, stock_symbol, analysis_date, analysis_period, prediction_result, recommendation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.user_id,
                record.symbol,
                timestamp(record.created_at),
                record.period.to_string(),
                record.prediction,
                record.recommendation.as_str(),
            ],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn analysis_history(&self, user_id: i64, limit: usize) -> Result<Vec<AnalysisRecord>, StockcastError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, stock_symbol, analysis_period, analysis_date, prediction_result, recommendation
                 FROM stock_history
                 WHERE user_id = ?1
                 ORDER BY analysis_date DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(AnalysisRecord {
                    id: Some(row.get(0)?),
                    user_id: row.get(1)?,
                    symbol: row.get(2)?,
                    period: parse_text(row, 3)?,
                    created_at: parse_timestamp(row, 4)?,
                    prediction: row.get(5)?,
                    recommendation: parse_text(row, 6)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn save_trade(&self, record: &TradeRecord) -> Result<i64, StockcastError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO trading_history
                (user_id, stock_symbol, transaction_type, quantity, price, transaction_date, tax_amount, total_amount)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.user_id,
                record.symbol,
                record.side.as_str(),
                record.quantity,
                record.price,
                timestamp(record.executed_at),
                record.tax_amount,
                record.total_amount,
            ],
        )
        .map_err(query_err)?;
        Ok(conn.last_insert_rowid())
    }

    fn trade_history(&self, user_id: i64, limit: usize) -> Result<Vec<TradeRecord>, StockcastError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, user_id, stock_symbol, transaction_type, quantity, price, tax_amount, total_amount, transaction_date
                 FROM trading_history
                 WHERE user_id = ?1
                 ORDER BY transaction_date DESC, id DESC
                 LIMIT ?2",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| {
                Ok(TradeRecord {
                    id: Some(row.get(0)?),
                    user_id: row.get(1)?,
                    symbol: row.get(2)?,
                    side: parse_text(row, 3)?,
                    quantity: row.get(4)?,
                    price: row.get(5)?,
                    tax_amount: row.get(6)?,
                    total_amount: row.get(7)?,
                    executed_at: parse_timestamp(row, 8)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn apply_to_portfolio(
        &self,
        user_id: i64,
        symbol: &str,
        quantity_delta: i64,
        price: f64,
    ) -> Result<Option<Holding>, StockcastError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        let existing = tx
            .query_row(
                "SELECT stock_symbol, quantity, average_buy_price FROM portfolio
                 WHERE user_id = ?1 AND stock_symbol = ?2",
                params![user_id, symbol],
                |row| {
                    Ok(Holding {
                        symbol: row.get(0)?,
                        quantity: row.get(1)?,
                        average_price: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(query_err)?;

        let next = apply_fill(existing.as_ref(), symbol, quantity_delta, price);
        match (&existing, &next) {
            (_, Some(h)) => {
                tx.execute(
                    "INSERT INTO portfolio (user_id, stock_symbol, quantity, average_buy_price)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(user_id, stock_symbol)
                     DO UPDATE SET quantity = excluded.quantity, average_buy_price = excluded.average_buy_price",
                    params![user_id, h.symbol, h.quantity, h.average_price],
                )
                .map_err(query_err)?;
            }
            (Some(_), None) => {
                tx.execute(
                    "DELETE FROM portfolio WHERE user_id = ?1 AND stock_symbol = ?2",
                    params![user_id, symbol],
                )
                .map_err(query_err)?;
            }
            (None, None) => {
                tracing::warn!(user = user_id, %symbol, "sell of a symbol that is not held");
            }
        }

        tx.commit().map_err(query_err)?;
        Ok(next)
    }

    fn portfolio(&self, user_id: i64) -> Result<Vec<Holding>, StockcastError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT stock_symbol, quantity, average_buy_price FROM portfolio
                 WHERE user_id = ?1 ORDER BY stock_symbol",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(Holding {
                    symbol: row.get(0)?,
                    quantity: row.get(1)?,
                    average_price: row.get(2)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn add_to_watchlist(&self, user_id: i64, symbol: &str) -> Result<bool, StockcastError> {
        let now = chrono::Utc::now().naive_utc();
        let inserted = self
            .conn()?
            .execute(
                "INSERT OR IGNORE INTO watchlist (user_id, stock_symbol, added_date) VALUES (?1, ?2, ?3)",
                params![user_id, symbol, timestamp(now)],
            )
            .map_err(query_err)?;
        Ok(inserted > 0)
    }

    fn remove_from_watchlist(&self, user_id: i64, symbol: &str) -> Result<bool, StockcastError> {
        let removed = self
            .conn()?
            .execute(
                "DELETE FROM watchlist WHERE user_id = ?1 AND stock_symbol = ?2",
                params![user_id, symbol],
            )
            .map_err(query_err)?;
        Ok(removed > 0)
    }

    fn watchlist(&self, user_id: i64) -> Result<Vec<WatchlistEntry>, StockcastError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT stock_symbol, added_date FROM watchlist
                 WHERE user_id = ?1 ORDER BY added_date DESC, id DESC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok(WatchlistEntry {
                    symbol: row.get(0)?,
                    added_at: parse_timestamp(row, 1)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}
