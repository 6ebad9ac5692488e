//! Opaque identifier generation and validation.
//!
//! Every stored entity is keyed by a hyphenated UUID string. Random IDs use
//! UUID v4; deterministic IDs use UUID v5 under a fixed namespace so that
//! generators can derive the same ID for the same inputs across runs.
//!
//! Relations whose object is a concept rather than an entity (professions,
//! actions, commodities, research topics) are keyed by a short symbolic name
//! instead; see [`is_valid_name`].

use uuid::Uuid;

/// Namespace for [`deterministic_id`].
const ID_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_1c6e_8d1a_4b9e_a3f4_1b0f_9c2d_5e77);

/// Separator placed between parts before hashing.
const PART_SEPARATOR: char = '\u{1f}';

/// Longest symbolic name accepted by [`is_valid_name`].
pub const MAX_NAME_LEN: usize = 64;

/// Create a new random identifier.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create an identifier that is stable for the given parts.
///
/// `["a", "bc"]` and `["ab", "c"]` produce different IDs.
pub fn deterministic_id(parts: &[&str]) -> String {
    let mut joined = String::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            joined.push(PART_SEPARATOR);
        }
        joined.push_str(part);
    }
    Uuid::new_v5(&ID_NAMESPACE, joined.as_bytes()).to_string()
}

/// Whether `id` is a well-formed identifier.
pub fn is_valid_id(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

/// Whether `name` is a well-formed symbolic name (`[a-z0-9_.-]`, 1 to 64 chars).
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'_' | b'.' | b'-'))
}
