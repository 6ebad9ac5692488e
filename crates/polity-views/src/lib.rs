//! Aggregation views over the Polity relation store.
//!
//! Planning logic wants rolled-up answers ("which factions hold land in
//! this area", "how devout is this population") rather than raw rows. Each
//! view here walks the store through paginated [`Transaction`] reads,
//! drains every page, and folds the rows into a plain owned value. Nothing
//! is cached or written back; a view is recomputed on every call.
//!
//! # Views
//!
//! | View | Built from |
//! |------|------------|
//! | [`faction_summaries`] | factions, faction-side tuples, active modifier sums |
//! | [`demographics()`] | people, decayed person tuples |
//! | [`area_factions`] / [`faction_areas`] | plots |
//! | [`faction_areas_hydrated`] | plots, areas |
//! | [`area_governments`] | areas, governments |
//! | [`land_summary`] | plots |
//!
//! [`Transaction`]: polity_db::Transaction

/// Largest ID list pushed into a single `IN` filter.
const ID_CHUNK: usize = 500;

/// Fetch pages until the returned token is empty, running `$body` on each.
///
/// `$fetch` is evaluated once per page with `$token` bound to the current
/// token and must produce a future of `Result<(Vec<_>, String), DbError>`.
macro_rules! drain {
    (|$token:ident| $fetch:expr, |$page:ident| $body:block) => {{
        let mut $token = String::new();
        loop {
            let ($page, next) = $fetch.await?;
            $body
            if next.is_empty() {
                break;
            }
            $token = next;
        }
    }};
}

pub mod demographics;
pub mod faction_summary;
pub mod governments;
pub mod influence;
pub mod land;

pub use demographics::{Demographics, demographics};
pub use faction_summary::{FactionSummary, faction_summaries};
pub use governments::area_governments;
pub use influence::{AreaInfluence, PlotIndex, area_factions, faction_areas, faction_areas_hydrated};
pub use land::{CommodityLand, LandSummary, land_summary};
