//! Totals over land rights.

use std::collections::{BTreeMap, BTreeSet};

use polity_db::{DbError, PlotFilter, Transaction};
use polity_types::Plot;
use serde::Serialize;

/// Land given over to one commodity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CommodityLand {
    /// Number of plots.
    pub plots: u64,
    /// Summed plot size.
    pub size: i64,
    /// Summed crop yield.
    pub crop_yield: i64,
}

/// Totals over a set of plots.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LandSummary {
    /// Number of plots.
    pub plots: u64,
    /// Summed plot size.
    pub total_size: i64,
    /// Breakdown by commodity. Plots without a commodity are not listed.
    pub commodities: BTreeMap<String, CommodityLand>,
    /// Areas containing at least one plot.
    pub areas: BTreeSet<String>,
    /// Plots per owning faction.
    pub owners: BTreeMap<String, u64>,
}

impl LandSummary {
    fn add(&mut self, plot: Plot) {
        self.plots = self.plots.saturating_add(1);
        self.total_size = self.total_size.saturating_add(plot.size);
        if let Some(commodity) = plot.commodity {
            let land = self.commodities.entry(commodity).or_default();
            land.plots = land.plots.saturating_add(1);
            land.size = land.size.saturating_add(plot.size);
            land.crop_yield = land.crop_yield.saturating_add(plot.crop_yield);
        }
        if let Some(owner) = plot.owner_faction_id {
            let count = self.owners.entry(owner).or_insert(0);
            *count = count.saturating_add(1);
        }
        self.areas.insert(plot.area_id);
    }
}

/// Summarize every plot matching any of `filters`.
///
/// # Errors
///
/// Propagates any store error.
pub async fn land_summary(
    tx: &mut Transaction,
    filters: &[PlotFilter],
) -> Result<LandSummary, DbError> {
    let mut summary = LandSummary::default();
    drain!(|token| tx.plots(&token, filters), |page| {
        for plot in page {
            summary.add(plot);
        }
    });
    Ok(summary)
}
