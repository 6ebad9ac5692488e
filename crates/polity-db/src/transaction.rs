//! The transactional editor.
//!
//! A [`Transaction`] wraps one backend transaction. Every read and write in
//! this crate goes through it, so a caller decides exactly which changes
//! commit together. Dropping a transaction without calling
//! [`Transaction::commit`] rolls it back.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use polity_types::{Area, Faction, Family, Government, Job, Person, Plot, Route};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Postgres, Sqlite};

use crate::dialect::{Dialect, MAX_BIND_PARAMS, Param, Statement};
use crate::error::DbError;
use crate::filters::{
    AreaFilter, FactionFilter, FamilyFilter, GovernmentFilter, JobFilter, PersonFilter,
    PlotFilter, RouteFilter,
};
use crate::query::{Filter, Query};
use crate::record::{Column, LawRow, Record, check_id, column_list};
use crate::token::Cursor;

/// `meta` key holding the current simulation tick.
const TICK_KEY: &str = "tick";

/// Bind every [`Param`] of a statement onto a `sqlx` query, in order.
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                Param::Int(v) => query.bind(v),
                Param::Real(v) => query.bind(v),
                Param::Text(v) => query.bind(v),
                Param::OptText(v) => query.bind(v),
                Param::Bool(v) => query.bind(v),
            };
        }
        query
    }};
}

/// A row type readable from either backend.
pub(crate) trait Decoded:
    Send + Unpin + for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow>
{
}

impl<T> Decoded for T where
    T: Send + Unpin + for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow>
{
}

#[derive(sqlx::FromRow)]
struct MetaRow {
    value: String,
}

/// Backend transaction.
pub(crate) enum TxInner {
    /// Embedded.
    Sqlite(sqlx::Transaction<'static, Sqlite>),
    /// Networked.
    Postgres(sqlx::Transaction<'static, Postgres>),
}

/// One unit of work against the store.
pub struct Transaction {
    inner: TxInner,
    dialect: Dialect,
    page_size: u64,
}

impl core::fmt::Debug for Transaction {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transaction")
            .field("dialect", &self.dialect)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    pub(crate) const fn new(inner: TxInner, dialect: Dialect, page_size: u64) -> Self {
        Self {
            inner,
            dialect,
            page_size,
        }
    }

    /// The SQL dialect of the underlying backend.
    pub const fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Page size used for an empty pagination token.
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Make every change in this transaction durable.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Conflict`] if a concurrent writer won, or
    /// [`DbError::Backend`] for any other failure.
    pub async fn commit(self) -> Result<(), DbError> {
        match self.inner {
            TxInner::Sqlite(tx) => tx.commit().await?,
            TxInner::Postgres(tx) => tx.commit().await?,
        }
        Ok(())
    }

    /// Discard every change in this transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the backend could not roll back.
    pub async fn rollback(self) -> Result<(), DbError> {
        match self.inner {
            TxInner::Sqlite(tx) => tx.rollback().await?,
            TxInner::Postgres(tx) => tx.rollback().await?,
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Statement execution
    // -----------------------------------------------------------------------

    /// Start a statement in this transaction's dialect.
    pub(crate) fn statement(&self, sql: impl Into<String>) -> Statement {
        Statement::with_sql(self.dialect, sql)
    }

    /// Run a statement and return the number of rows it touched.
    pub(crate) async fn execute(&mut self, stmt: Statement) -> Result<u64, DbError> {
        let sql = stmt.sql;
        let params = stmt.params;
        let affected = match &mut self.inner {
            TxInner::Sqlite(tx) => bind_params!(sqlx::query::<Sqlite>(&sql), params)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
            TxInner::Postgres(tx) => bind_params!(sqlx::query::<Postgres>(&sql), params)
                .execute(&mut **tx)
                .await?
                .rows_affected(),
        };
        Ok(affected)
    }

    /// Run a query and decode every row.
    pub(crate) async fn fetch<T: Decoded>(&mut self, stmt: Statement) -> Result<Vec<T>, DbError> {
        let sql = stmt.sql;
        let params = stmt.params;
        let rows = match &mut self.inner {
            TxInner::Sqlite(tx) => {
                bind_params!(sqlx::query_as::<Sqlite, T>(&sql), params)
                    .fetch_all(&mut **tx)
                    .await?
            }
            TxInner::Postgres(tx) => {
                bind_params!(sqlx::query_as::<Postgres, T>(&sql), params)
                    .fetch_all(&mut **tx)
                    .await?
            }
        };
        Ok(rows)
    }

    /// Order `select`, fetch the page `token` points at and return it with
    /// the token for the next page.
    pub(crate) async fn page<T: Decoded>(
        &mut self,
        mut select: Statement,
        order_by: &str,
        token: &str,
    ) -> Result<(Vec<T>, String), DbError> {
        let cursor = Cursor::decode(token, self.page_size)?;
        select.push(" ORDER BY ").push(order_by);
        cursor.render(&mut select);
        let rows = self.fetch(select).await?;
        cursor.finish(rows)
    }

    /// Page through `R`'s table.
    pub(crate) async fn list<R: Record, F: Filter>(
        &mut self,
        token: &str,
        filters: &[F],
    ) -> Result<(Vec<R>, String), DbError> {
        let mut stmt = self.statement(format!(
            "SELECT {} FROM {}",
            column_list(R::COLUMNS),
            R::TABLE
        ));
        Query::from_filters(filters).render_where(&mut stmt);
        self.page(stmt, &R::KEY.join(", "), token).await
    }

    /// Fetch one `R` by its `id`.
    async fn by_id<R: Record>(&mut self, id: &str) -> Result<R, DbError> {
        let mut stmt = self.statement(format!(
            "SELECT {} FROM {} WHERE id = ",
            column_list(R::COLUMNS),
            R::TABLE
        ));
        stmt.bind(Param::Text(id.to_owned()));
        self.fetch::<R>(stmt)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::NotFound {
                kind: R::KIND,
                id: id.to_owned(),
            })
    }

    /// Validate and upsert `rows`. Later duplicates of a key replace earlier
    /// ones.
    pub(crate) async fn upsert<R: Record>(&mut self, rows: &[R]) -> Result<u64, DbError> {
        for row in rows {
            row.validate()?;
        }
        let rows = last_wins(rows, R::key);
        let written = self
            .write_rows(
                R::TABLE,
                R::COLUMNS,
                Some(R::KEY),
                rows.iter().map(|r| r.params()),
            )
            .await?;
        tracing::debug!(table = R::TABLE, count = rows.len(), "Upserted rows");
        Ok(written)
    }

    /// Multi-row `INSERT`, chunked under [`MAX_BIND_PARAMS`]. With a `key`
    /// the insert becomes an upsert on it.
    pub(crate) async fn write_rows(
        &mut self,
        table: &str,
        columns: &[Column],
        key: Option<&[&str]>,
        rows: impl Iterator<Item = Vec<Param>>,
    ) -> Result<u64, DbError> {
        let per_chunk = MAX_BIND_PARAMS
            .checked_div(columns.len())
            .unwrap_or(1)
            .max(1);
        let rows: Vec<Vec<Param>> = rows.collect();
        let mut written: u64 = 0;
        for chunk in rows.chunks(per_chunk) {
            let stmt = insert_statement(self.dialect, table, columns, key, chunk);
            written = written.saturating_add(self.execute(stmt).await?);
        }
        Ok(written)
    }

    // -----------------------------------------------------------------------
    // Meta and tick
    // -----------------------------------------------------------------------

    /// Read a value from the `meta` table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the read fails.
    pub async fn meta(&mut self, key: &str) -> Result<Option<String>, DbError> {
        let mut stmt = self.statement("SELECT value FROM meta WHERE key = ");
        stmt.bind(Param::Text(key.to_owned()));
        let rows: Vec<MetaRow> = self.fetch(stmt).await?;
        Ok(rows.into_iter().next().map(|r| r.value))
    }

    /// Write a value into the `meta` table.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the write fails.
    pub async fn set_meta(&mut self, key: &str, value: &str) -> Result<(), DbError> {
        let mut stmt = self.statement("INSERT INTO meta (key, value) VALUES (");
        stmt.bind(Param::Text(key.to_owned()))
            .push(", ")
            .bind(Param::Text(value.to_owned()))
            .push(") ON CONFLICT (key) DO UPDATE SET value = excluded.value");
        self.execute(stmt).await?;
        Ok(())
    }

    /// The current simulation tick, or 0 if it was never set.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Decode`] if the stored tick is not an integer.
    pub async fn tick(&mut self) -> Result<i64, DbError> {
        match self.meta(TICK_KEY).await? {
            None => Ok(0),
            Some(raw) => raw
                .parse()
                .map_err(|e| DbError::Decode(format!("tick `{raw}`: {e}"))),
        }
    }

    /// Record the current simulation tick.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the write fails.
    pub async fn set_tick(&mut self, tick: i64) -> Result<(), DbError> {
        self.set_meta(TICK_KEY, &tick.to_string()).await
    }

    // -----------------------------------------------------------------------
    // Entities
    // -----------------------------------------------------------------------

    /// Areas matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn areas(
        &mut self,
        token: &str,
        filters: &[AreaFilter],
    ) -> Result<(Vec<Area>, String), DbError> {
        self.list(token, filters).await
    }

    /// Insert or replace areas.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID is
    /// malformed.
    pub async fn set_areas(&mut self, areas: &[Area]) -> Result<u64, DbError> {
        self.upsert(areas).await
    }

    /// Factions matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn factions(
        &mut self,
        token: &str,
        filters: &[FactionFilter],
    ) -> Result<(Vec<Faction>, String), DbError> {
        self.list(token, filters).await
    }

    /// One faction by ID.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no faction has this ID.
    pub async fn faction(&mut self, id: &str) -> Result<Faction, DbError> {
        self.by_id(id).await
    }

    /// Insert or replace factions.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID is
    /// malformed.
    pub async fn set_factions(&mut self, factions: &[Faction]) -> Result<u64, DbError> {
        self.upsert(factions).await
    }

    /// People matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn people(
        &mut self,
        token: &str,
        filters: &[PersonFilter],
    ) -> Result<(Vec<Person>, String), DbError> {
        self.list(token, filters).await
    }

    /// One person by ID.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotFound`] if no person has this ID.
    pub async fn person(&mut self, id: &str) -> Result<Person, DbError> {
        self.by_id(id).await
    }

    /// Insert or replace people.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID is
    /// malformed.
    pub async fn set_people(&mut self, people: &[Person]) -> Result<u64, DbError> {
        self.upsert(people).await
    }

    /// Families matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn families(
        &mut self,
        token: &str,
        filters: &[FamilyFilter],
    ) -> Result<(Vec<Family>, String), DbError> {
        self.list(token, filters).await
    }

    /// Insert or replace families.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID is
    /// malformed.
    pub async fn set_families(&mut self, families: &[Family]) -> Result<u64, DbError> {
        self.upsert(families).await
    }

    /// Governments matching any of `filters`, each with its laws.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn governments(
        &mut self,
        token: &str,
        filters: &[GovernmentFilter],
    ) -> Result<(Vec<Government>, String), DbError> {
        let (mut governments, next): (Vec<Government>, String) = self.list(token, filters).await?;
        if governments.is_empty() {
            return Ok((governments, next));
        }

        let ids: Vec<String> = governments.iter().map(|g| g.id.clone()).collect();
        let mut laws: HashMap<String, Vec<LawRow>> = HashMap::new();
        for chunk in ids.chunks(MAX_BIND_PARAMS) {
            let mut stmt = self.statement(format!(
                "SELECT {} FROM {} WHERE government_id IN (",
                column_list(LawRow::COLUMNS),
                LawRow::TABLE
            ));
            push_text_list(&mut stmt, chunk);
            stmt.push(")");
            for row in self.fetch::<LawRow>(stmt).await? {
                laws.entry(row.government_id.clone()).or_default().push(row);
            }
        }

        for government in &mut governments {
            for row in laws.remove(&government.id).unwrap_or_default() {
                government.outlawed.set_mut(row.kind).insert(row.subject);
            }
        }
        Ok((governments, next))
    }

    /// Insert or replace governments. Each government's laws are replaced
    /// wholesale by the ones it carries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID or
    /// outlawed subject is malformed.
    pub async fn set_governments(&mut self, governments: &[Government]) -> Result<u64, DbError> {
        let written = self.upsert(governments).await?;

        let ids: Vec<String> = governments.iter().map(|g| g.id.clone()).collect();
        for chunk in ids.chunks(MAX_BIND_PARAMS) {
            let mut stmt = self.statement(format!(
                "DELETE FROM {} WHERE government_id IN (",
                LawRow::TABLE
            ));
            push_text_list(&mut stmt, chunk);
            stmt.push(")");
            self.execute(stmt).await?;
        }

        let laws: Vec<LawRow> = last_wins(governments, <Government as Record>::key)
            .into_iter()
            .flat_map(LawRow::from_government)
            .collect();
        self.upsert(&laws).await?;
        Ok(written)
    }

    /// Jobs matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn jobs(
        &mut self,
        token: &str,
        filters: &[JobFilter],
    ) -> Result<(Vec<Job>, String), DbError> {
        self.list(token, filters).await
    }

    /// Insert or replace jobs.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID is
    /// malformed.
    pub async fn set_jobs(&mut self, jobs: &[Job]) -> Result<u64, DbError> {
        self.upsert(jobs).await
    }

    /// Plots matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn plots(
        &mut self,
        token: &str,
        filters: &[PlotFilter],
    ) -> Result<(Vec<Plot>, String), DbError> {
        self.list(token, filters).await
    }

    /// Insert or replace plots.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any ID is
    /// malformed.
    pub async fn set_plots(&mut self, plots: &[Plot]) -> Result<u64, DbError> {
        self.upsert(plots).await
    }

    /// Routes matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn routes(
        &mut self,
        token: &str,
        filters: &[RouteFilter],
    ) -> Result<(Vec<Route>, String), DbError> {
        self.list(token, filters).await
    }

    /// Insert or replace routes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any area ID
    /// is malformed.
    pub async fn set_routes(&mut self, routes: &[Route]) -> Result<u64, DbError> {
        self.upsert(routes).await
    }

    /// Delete entities of kind `R` by ID.
    pub(crate) async fn delete_by_id<R: Record>(&mut self, ids: &[String]) -> Result<u64, DbError> {
        for id in ids {
            check_id("id", id)?;
        }
        let mut deleted: u64 = 0;
        for chunk in ids.chunks(MAX_BIND_PARAMS) {
            let mut stmt = self.statement(format!("DELETE FROM {} WHERE id IN (", R::TABLE));
            push_text_list(&mut stmt, chunk);
            stmt.push(")");
            deleted = deleted.saturating_add(self.execute(stmt).await?);
        }
        tracing::debug!(table = R::TABLE, count = deleted, "Deleted rows");
        Ok(deleted)
    }

    /// Delete jobs by ID, for example once they have finished.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before deleting anything if any ID is
    /// malformed.
    pub async fn delete_jobs(&mut self, ids: &[String]) -> Result<u64, DbError> {
        self.delete_by_id::<Job>(ids).await
    }
}

/// Keep the last row for every key, in first-seen key order.
pub(crate) fn last_wins<T>(rows: &[T], key: impl Fn(&T) -> String) -> Vec<&T> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(rows.len());
    let mut out: Vec<&T> = Vec::with_capacity(rows.len());
    for row in rows {
        match seen.entry(key(row)) {
            Entry::Occupied(slot) => {
                if let Some(kept) = out.get_mut(*slot.get()) {
                    *kept = row;
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(row);
            }
        }
    }
    out
}

/// Append `?, ?, ...` binding every value in `values`.
fn push_text_list(stmt: &mut Statement, values: &[String]) {
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.bind(Param::Text(value.clone()));
    }
}

/// `INSERT INTO table (...) VALUES (...), (...)`, plus an upsert clause when
/// `key` is given.
fn insert_statement(
    dialect: Dialect,
    table: &str,
    columns: &[Column],
    key: Option<&[&str]>,
    rows: &[Vec<Param>],
) -> Statement {
    let mut stmt = Statement::with_sql(
        dialect,
        format!("INSERT INTO {table} ({}) VALUES ", column_list(columns)),
    );
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            stmt.push(", ");
        }
        stmt.push("(");
        for (j, param) in row.iter().enumerate() {
            if j > 0 {
                stmt.push(", ");
            }
            stmt.bind(param.clone());
        }
        stmt.push(")");
    }

    let Some(key) = key else {
        return stmt;
    };
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| !key.contains(&c.name))
        .map(|c| format!("{name} = excluded.{name}", name = c.name))
        .collect();
    stmt.push(" ON CONFLICT (").push(&key.join(", ")).push(")");
    if updates.is_empty() {
        stmt.push(" DO NOTHING");
    } else {
        stmt.push(" DO UPDATE SET ").push(&updates.join(", "));
    }
    stmt
}
