//! Per-backend SQL differences and the statement builder.
//!
//! Everything above this module writes backend-neutral SQL fragments; the
//! [`Dialect`] supplies placeholders, column types and the clamp
//! expression, and [`Statement`] keeps the bound parameters in the same
//! order as their placeholders.

use polity_types::{MAX_VALUE, MIN_VALUE};

/// Largest number of bind parameters a single statement may carry.
///
/// `SQLite` builds before 3.32 refuse more than 999.
pub const MAX_BIND_PARAMS: usize = 999;

/// The SQL flavour of a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Embedded `SQLite`.
    Sqlite,
    /// Networked `PostgreSQL`.
    Postgres,
}

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColumnKind {
    /// Required text.
    Text,
    /// Nullable text.
    OptText,
    /// 64-bit integer.
    Int,
    /// Double precision float.
    Real,
    /// Boolean.
    Bool,
}

impl Dialect {
    /// Placeholder for the `n`th (1-based) parameter.
    fn placeholder(self, n: usize) -> String {
        match self {
            Self::Sqlite => String::from("?"),
            Self::Postgres => format!("${n}"),
        }
    }

    /// Column type and nullability for a table definition.
    pub(crate) const fn column_type(self, kind: ColumnKind) -> &'static str {
        match (self, kind) {
            (_, ColumnKind::Text) => "TEXT NOT NULL",
            (_, ColumnKind::OptText) => "TEXT",
            (Self::Sqlite, ColumnKind::Int) => "INTEGER NOT NULL",
            (Self::Postgres, ColumnKind::Int) => "BIGINT NOT NULL",
            (Self::Sqlite, ColumnKind::Real) => "REAL NOT NULL",
            (Self::Postgres, ColumnKind::Real) => "DOUBLE PRECISION NOT NULL",
            (_, ColumnKind::Bool) => "BOOLEAN NOT NULL",
        }
    }

    /// Definition of the auto-incrementing `seq` primary key column.
    pub(crate) const fn seq_column(self) -> &'static str {
        match self {
            Self::Sqlite => "seq INTEGER PRIMARY KEY AUTOINCREMENT",
            Self::Postgres => "seq BIGSERIAL PRIMARY KEY",
        }
    }

    /// `expr` saturated into `[MIN_VALUE, MAX_VALUE]`.
    pub(crate) fn clamp(self, expr: &str) -> String {
        match self {
            Self::Sqlite => format!("MAX(MIN({expr}, {MAX_VALUE}), {MIN_VALUE})"),
            Self::Postgres => format!("GREATEST(LEAST({expr}, {MAX_VALUE}), {MIN_VALUE})"),
        }
    }
}

/// A bound statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Param {
    /// Integer.
    Int(i64),
    /// Float.
    Real(f64),
    /// Text.
    Text(String),
    /// Nullable text.
    OptText(Option<String>),
    /// Boolean.
    Bool(bool),
}

/// SQL text plus its parameters, in placeholder order.
#[derive(Debug, Clone)]
pub(crate) struct Statement {
    pub(crate) sql: String,
    pub(crate) params: Vec<Param>,
    dialect: Dialect,
}

impl Statement {
    /// Start a statement with fixed leading SQL.
    pub(crate) fn with_sql(dialect: Dialect, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            dialect,
        }
    }

    /// Append raw SQL.
    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a placeholder and bind `param` to it.
    pub(crate) fn bind(&mut self, param: Param) -> &mut Self {
        self.params.push(param);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
        self
    }

    /// Append `column + delta`, saturated into the value range.
    pub(crate) fn push_clamped_add(&mut self, column: &str, delta: Param) -> &mut Self {
        self.params.push(delta);
        let sum = format!(
            "{column} + {}",
            self.dialect.placeholder(self.params.len())
        );
        let clamped = self.dialect.clamp(&sum);
        self.sql.push_str(&clamped);
        self
    }
}
