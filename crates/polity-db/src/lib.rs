//! Temporal relation store for the Polity simulation.
//!
//! The store keeps pairwise integer facts between entities ("tuples") plus
//! temporary deltas on them ("modifiers") that stop applying once the
//! simulation clock passes their expiry tick. The same API runs against an
//! embedded `SQLite` database or a networked `PostgreSQL` server.
//!
//! # Architecture
//!
//! ```text
//! Store (pool handle, cloneable)
//!     |
//!     +-- begin() / in_transaction() --> Transaction
//!     |       |-- entities      (areas, factions, people, ...)
//!     |       |-- tuples        (set / incr / list)
//!     |       |-- modifiers     (set / incr / sum / purge)
//!     |       +-- compute_tuples (base + active modifiers at a tick)
//!     |
//!     +-- Pump::spawn() --> PumpHandle (batched background writes)
//! ```
//!
//! Every list read takes an opaque pagination token and returns the token
//! for the next page; an empty token means the first page on the way in and
//! "no more rows" on the way out.
//!
//! # Modules
//!
//! - [`store`] -- The store handle and schema setup
//! - [`transaction`] -- Entity reads and writes inside one transaction
//! - [`tuples`] -- Tuples, modifiers and decayed values
//! - [`query`] -- The OR-of-AND filter algebra
//! - [`filters`] -- One typed filter per table
//! - [`token`] -- Pagination tokens
//! - [`pump`] -- The batched background writer
//! - [`config`] -- File and environment configuration
//! - [`dialect`] -- Per-backend SQL differences
//! - [`error`] -- Shared error types

pub mod config;
mod connect;
pub mod dialect;
pub mod error;
pub mod filters;
pub mod postgres;
pub mod pump;
pub mod query;
mod record;
pub mod schema;
mod sqlite;
pub mod store;
pub mod token;
pub mod transaction;
pub mod tuples;

// Re-export primary types for convenience.
pub use crate::config::{BackendKind, PumpSettings, StoreConfig};
pub use dialect::Dialect;
pub use error::DbError;
pub use filters::{
    AreaFilter, FactionFilter, FamilyFilter, GovernmentFilter, JobFilter, ModifierFilter,
    PersonFilter, PlotFilter, RouteFilter, TupleFilter,
};
pub use postgres::PostgresConfig;
pub use pump::{Pump, PumpConfig, PumpHandle, PumpStats};
pub use query::{Clause, Filter, Op, Query, SqlValue};
pub use schema::SCHEMA_VERSION;
pub use store::Store;
pub use token::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, first_page};
pub use transaction::Transaction;
