//! Opaque pagination tokens.
//!
//! A token is URL-safe base64 over a tiny JSON cursor. Callers must treat it
//! as a black box: pass `""` for the first page and hand back whatever the
//! previous page returned until it comes back empty.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

use crate::dialect::{Param, Statement};
use crate::error::DbError;

/// Page size used when no token (or an empty one) is supplied.
pub const DEFAULT_PAGE_SIZE: u64 = 500;

/// Largest page size a token may request.
pub const MAX_PAGE_SIZE: u64 = 10_000;

/// Decoded position within one query shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Cursor {
    #[serde(rename = "o")]
    pub(crate) offset: u64,
    #[serde(rename = "l")]
    pub(crate) limit: u64,
}

impl Cursor {
    /// The first page with `limit` rows.
    pub(crate) const fn first(limit: u64) -> Self {
        Self { offset: 0, limit }
    }

    /// Decode `token`, or start at the first page when it is empty.
    pub(crate) fn decode(token: &str, default_limit: u64) -> Result<Self, DbError> {
        if token.is_empty() {
            return Ok(Self::first(default_limit));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| DbError::InvalidToken(e.to_string()))?;
        let cursor: Self =
            serde_json::from_slice(&bytes).map_err(|e| DbError::InvalidToken(e.to_string()))?;
        if cursor.limit == 0 || cursor.limit > MAX_PAGE_SIZE {
            return Err(DbError::InvalidToken(format!(
                "page size {} outside 1..={MAX_PAGE_SIZE}",
                cursor.limit
            )));
        }
        Ok(cursor)
    }

    /// Encode as an opaque token.
    pub(crate) fn encode(self) -> Result<String, DbError> {
        let json = serde_json::to_vec(&self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Append ` LIMIT .. OFFSET ..`, fetching one row beyond the page so the
    /// caller can tell whether another page exists.
    pub(crate) fn render(self, stmt: &mut Statement) {
        let probe = self.limit.saturating_add(1);
        stmt.push(" LIMIT ")
            .bind(Param::Int(i64::try_from(probe).unwrap_or(i64::MAX)))
            .push(" OFFSET ")
            .bind(Param::Int(i64::try_from(self.offset).unwrap_or(i64::MAX)));
    }

    /// Trim a probed result to the page and produce the next token.
    ///
    /// The token is empty when the probe row was not returned.
    pub(crate) fn finish<T>(self, mut rows: Vec<T>) -> Result<(Vec<T>, String), DbError> {
        let limit = usize::try_from(self.limit).unwrap_or(usize::MAX);
        if rows.len() <= limit {
            return Ok((rows, String::new()));
        }
        rows.truncate(limit);
        let next = Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        };
        Ok((rows, next.encode()?))
    }
}

/// A token requesting the first page with `page_size` rows per page.
///
/// # Errors
///
/// Returns [`DbError::InvalidToken`] if `page_size` is zero or above
/// [`MAX_PAGE_SIZE`].
pub fn first_page(page_size: u64) -> Result<String, DbError> {
    if page_size == 0 || page_size > MAX_PAGE_SIZE {
        return Err(DbError::InvalidToken(format!(
            "page size {page_size} outside 1..={MAX_PAGE_SIZE}"
        )));
    }
    Cursor::first(page_size).encode()
}
