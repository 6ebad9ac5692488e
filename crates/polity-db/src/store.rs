//! The store handle.
//!
//! [`Store`] is a cheap, cloneable handle over a connection pool for either
//! backend. It is created once and passed to whatever needs it; there is
//! no global instance.

use futures::future::BoxFuture;
use sqlx::{PgPool, SqlitePool};

use crate::config::{BackendKind, StoreConfig};
use crate::dialect::Dialect;
use crate::error::DbError;
use crate::postgres::{self, PostgresConfig};
use crate::schema::{self, SCHEMA_VERSION, SCHEMA_VERSION_KEY};
use crate::sqlite;
use crate::token::DEFAULT_PAGE_SIZE;
use crate::transaction::{Transaction, TxInner};

#[derive(Debug, Clone)]
enum Pool {
    Sqlite(SqlitePool),
    Postgres(PgPool),
}

/// Handle to an open store.
#[derive(Debug, Clone)]
pub struct Store {
    pool: Pool,
    page_size: u64,
}

impl Store {
    /// Connect to the backend `config` names, creating or upgrading the
    /// schema when `config.migrate` is set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] for unusable settings,
    /// [`DbError::SchemaVersion`] if the database is newer than this build,
    /// or [`DbError::Backend`] if connecting fails.
    pub async fn open(config: &StoreConfig) -> Result<Self, DbError> {
        config.validate()?;
        let pool = match config.backend {
            BackendKind::Sqlite => Pool::Sqlite(sqlite::connect(config).await?),
            BackendKind::Postgres => {
                Pool::Postgres(postgres::connect(&PostgresConfig::from(config)).await?)
            }
        };
        let store = Self {
            pool,
            page_size: config.page_size,
        };
        if config.migrate {
            store.ensure_schema().await?;
        }
        Ok(store)
    }

    /// A fresh in-memory `SQLite` store with its schema in place.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if `SQLite` cannot be opened.
    pub async fn memory() -> Result<Self, DbError> {
        Self::open(&StoreConfig::default()).await
    }

    /// An embedded store at `url` with default settings.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub async fn sqlite(url: &str) -> Result<Self, DbError> {
        Self::open(&StoreConfig::sqlite(url)).await
    }

    /// A networked store with its schema in place.
    ///
    /// # Errors
    ///
    /// See [`Store::open`].
    pub async fn postgres(config: &PostgresConfig) -> Result<Self, DbError> {
        let store = Self {
            pool: Pool::Postgres(postgres::connect(config).await?),
            page_size: DEFAULT_PAGE_SIZE,
        };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// The SQL dialect of the backend.
    pub const fn dialect(&self) -> Dialect {
        match self.pool {
            Pool::Sqlite(_) => Dialect::Sqlite,
            Pool::Postgres(_) => Dialect::Postgres,
        }
    }

    /// Rows per page for reads given an empty token.
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Start a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if no connection could be acquired.
    pub async fn begin(&self) -> Result<Transaction, DbError> {
        let inner = match &self.pool {
            Pool::Sqlite(pool) => TxInner::Sqlite(pool.begin().await?),
            Pool::Postgres(pool) => TxInner::Postgres(pool.begin().await?),
        };
        Ok(Transaction::new(inner, self.dialect(), self.page_size))
    }

    /// Run `work` in a transaction, committing if it returns `Ok` and
    /// rolling back if it returns `Err`.
    ///
    /// ```ignore
    /// store
    ///     .in_transaction(|tx| Box::pin(async move { tx.set_tick(7).await }))
    ///     .await?;
    /// ```
    ///
    /// # Errors
    ///
    /// Returns whatever `work` returns, or the backend error from beginning
    /// or committing.
    pub async fn in_transaction<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: for<'t> FnOnce(&'t mut Transaction) -> BoxFuture<'t, Result<T, E>>,
        E: From<DbError>,
    {
        let mut tx = self.begin().await?;
        match work(&mut tx).await {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Create every table and index, or upgrade an older schema.
    ///
    /// Safe to call on an up-to-date database.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SchemaVersion`] if the database was written by a
    /// newer build.
    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        let dialect = self.dialect();
        let mut tx = self.begin().await?;
        let mut statements = schema::statements(dialect).into_iter();
        if let Some(meta) = statements.next() {
            let stmt = tx.statement(meta);
            tx.execute(stmt).await?;
        }

        let found = match tx.meta(SCHEMA_VERSION_KEY).await? {
            None => None,
            Some(raw) => Some(raw.parse::<i64>().map_err(|e| {
                DbError::Decode(format!("schema version `{raw}`: {e}"))
            })?),
        };
        match found {
            Some(version) if version > SCHEMA_VERSION => {
                return Err(DbError::SchemaVersion {
                    found: version,
                    supported: SCHEMA_VERSION,
                });
            }
            Some(version) if version == SCHEMA_VERSION => {
                tx.commit().await?;
                return Ok(());
            }
            _ => {}
        }

        for sql in statements {
            let stmt = tx.statement(sql);
            tx.execute(stmt).await?;
        }
        tx.set_meta(SCHEMA_VERSION_KEY, &SCHEMA_VERSION.to_string())
            .await?;
        tx.commit().await?;
        tracing::info!(
            ?dialect,
            from = found.unwrap_or(0),
            to = SCHEMA_VERSION,
            "Schema created"
        );
        Ok(())
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        match &self.pool {
            Pool::Sqlite(pool) => pool.close().await,
            Pool::Postgres(pool) => pool.close().await,
        }
        tracing::info!(dialect = ?self.dialect(), "Store closed");
    }
}
