//! Error types for the relation store.
//!
//! All errors are propagated via [`DbError`]. Backend failures wrap the
//! underlying [`sqlx`] error unchanged, except lock and serialization
//! failures, which surface as [`DbError::Conflict`] so callers can retry.

use polity_types::Relation;

/// SQLSTATE / SQLite result codes that mean "another writer got there first".
///
/// `40001` serialization failure and `40P01` deadlock (`PostgreSQL`);
/// `5` busy, `6` locked, `261` busy recovery, `262` locked shared cache,
/// `517` busy snapshot (`SQLite`).
const CONFLICT_CODES: [&str; 7] = ["40001", "40P01", "5", "6", "261", "262", "517"];

/// Errors that can occur in the store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A backend operation failed.
    #[error("backend error: {0}")]
    Backend(sqlx::Error),

    /// A concurrent transaction conflicted with this one; retrying may succeed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier or key failed validation.
    #[error("invalid {field}: `{value}`")]
    InvalidId {
        /// Field that carried the value.
        field: &'static str,
        /// The rejected value.
        value: String,
    },

    /// A modifier operation was attempted on a relation without modifiers.
    #[error("relation {0} does not support modifiers")]
    Capability(Relation),

    /// A pagination token could not be decoded.
    #[error("invalid pagination token: {0}")]
    InvalidToken(String),

    /// A single-entity lookup found nothing.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Entity kind looked up.
        kind: &'static str,
        /// Identifier that was missing.
        id: String,
    },

    /// The embedded database was written by a newer schema.
    #[error("schema version {found} is newer than supported version {supported}")]
    SchemaVersion {
        /// Version recorded in the database.
        found: i64,
        /// Newest version this build understands.
        supported: i64,
    },

    /// A configuration value is unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration sources could not be read.
    #[error("configuration load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    /// The batched writer has shut down.
    #[error("pump is closed")]
    PumpClosed,
}

impl DbError {
    /// Whether retrying the whole transaction may succeed.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Whether the error is a caller mistake rather than a backend failure.
    pub const fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidId { .. } | Self::Capability(_) | Self::InvalidToken(_)
        )
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = err.as_database_error().and_then(|db| {
            let code = db.code()?;
            CONFLICT_CODES
                .contains(&code.as_ref())
                .then(|| db.message().to_owned())
        });
        conflict.map_or(Self::Backend(err), Self::Conflict)
    }
}
