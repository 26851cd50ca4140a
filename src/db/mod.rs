//! SQLite-backed durable store for the customer/license collection.
//!
//! Each state-machine transition runs inside a single immediate
//! transaction, so a refused or failed transition leaves the stored record
//! exactly as it was.

pub mod locks;
pub mod queries;

use chrono::{DateTime, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::{AppError, Result};
use crate::service::LicenseService;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub service: LicenseService,
    pub admin_token: Option<String>,
}

fn configure(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA busy_timeout = 5000;
         PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;",
    )
}

/// Open a pooled connection manager for the database at `path`.
pub fn open_pool(path: &str) -> Result<DbPool> {
    let manager = SqliteConnectionManager::file(path).with_init(configure);
    Pool::builder().build(manager).map_err(AppError::from)
}

/// Create the schema if it does not exist yet.
///
/// Activations carry a rowid `seq` so the activation set reads back in
/// insertion order.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS customers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            license_key TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL,
            banned INTEGER NOT NULL DEFAULT 0,
            max_devices INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS activations (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
            device_id TEXT NOT NULL,
            activated_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            UNIQUE (customer_id, device_id)
        );

        CREATE INDEX IF NOT EXISTS idx_activations_customer
            ON activations (customer_id);",
    )?;
    Ok(())
}

/// Timestamps are stored as RFC 3339 UTC text with fixed sub-second width,
/// so lexicographic order matches chronological order.
pub(crate) fn ts_to_sql(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_sql(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|t| t.with_timezone(&Utc))
}
