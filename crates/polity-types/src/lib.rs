//! Shared type definitions for the Polity relation store.
//!
//! This crate holds everything that crosses the store boundary without
//! touching a backend: identifiers, the fixed value range, the relation
//! registry, and the entity and relation row types.
//!
//! # Modules
//!
//! - [`ids`] -- Opaque ID generation and validation
//! - [`value`] -- The `[MIN_VALUE, MAX_VALUE]` range and clamping
//! - [`relation`] -- The static [`Relation`] registry
//! - [`enums`] -- Job states, law kinds, severity bands
//! - [`structs`] -- Entities, [`Tuple`] and [`Modifier`] rows

pub mod enums;
pub mod ids;
pub mod relation;
pub mod structs;
pub mod value;

// Re-export all public types at crate root for convenience.
pub use enums::{Band, BandCounts, JobState, LawKind, UnknownVariant};
pub use ids::{deterministic_id, is_valid_id, is_valid_name, new_id};
pub use relation::{KeyKind, Relation};
pub use structs::{
    Area, Faction, Family, Government, Job, Laws, Modifier, Person, Plot, Route, Tuple,
};
pub use value::{MAX_VALUE, MIN_VALUE, clamp, clamp_delta};
