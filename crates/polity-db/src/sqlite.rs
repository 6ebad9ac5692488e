//! Embedded `SQLite` connection handling.
//!
//! File databases run in WAL mode with a busy timeout so readers never
//! block the single writer. An in-memory database lives exactly as long as
//! its connection, so it gets a pool of one connection that is never
//! recycled.

use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::config::StoreConfig;
use crate::connect::with_backoff;
use crate::error::DbError;

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a pool for `config`, retrying the first connection with
/// exponential backoff.
pub(crate) async fn connect(config: &StoreConfig) -> Result<SqlitePool, DbError> {
    let options: SqliteConnectOptions = config
        .url
        .parse()
        .map_err(|e: sqlx::Error| DbError::Config(format!("Invalid SQLite URL: {e}")))?;
    let options = options
        .create_if_missing(true)
        .busy_timeout(BUSY_TIMEOUT);

    let memory = config.is_memory();
    let (options, pool_options) = if memory {
        (
            options,
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None),
        )
    } else {
        (
            options.journal_mode(SqliteJournalMode::Wal),
            SqlitePoolOptions::new().max_connections(config.max_connections),
        )
    };
    let pool_options = pool_options.acquire_timeout(config.connect_timeout());

    let pool = with_backoff("sqlite", config.backoff(), || {
        pool_options.clone().connect_with(options.clone())
    })
    .await?;
    tracing::info!(url = %config.url, memory, "Connected to SQLite");
    Ok(pool)
}
