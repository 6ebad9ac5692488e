//! Land-based influence indexes: which factions own plots where.

use std::collections::BTreeMap;

use polity_db::{AreaFilter, DbError, PlotFilter, Transaction};
use polity_types::{Area, Plot};
use serde::Serialize;

use crate::ID_CHUNK;

/// Plot counts nested under two keys.
pub type PlotIndex = BTreeMap<String, BTreeMap<String, u64>>;

/// One area a faction holds land in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AreaInfluence {
    /// The area row.
    pub area: Area,
    /// Plots the faction owns there.
    pub plots: u64,
}

/// Count owned plots matching `filters` under `(outer, inner)` keys.
async fn count_plots(
    tx: &mut Transaction,
    filters: &[PlotFilter],
    keys: fn(&Plot, &str) -> (String, String),
) -> Result<PlotIndex, DbError> {
    let mut index = PlotIndex::new();
    drain!(|token| tx.plots(&token, filters), |page| {
        for plot in page {
            let Some(owner) = plot.owner_faction_id.as_deref() else {
                continue;
            };
            let (outer, inner) = keys(&plot, owner);
            let count = index.entry(outer).or_default().entry(inner).or_insert(0);
            *count = count.saturating_add(1);
        }
    });
    Ok(index)
}

/// Per area, how many plots each faction owns there.
///
/// Plots without an owner are skipped.
///
/// # Errors
///
/// Propagates any store error.
pub async fn area_factions(
    tx: &mut Transaction,
    filters: &[PlotFilter],
) -> Result<PlotIndex, DbError> {
    count_plots(tx, filters, |plot, owner| {
        (plot.area_id.clone(), owner.to_owned())
    })
    .await
}

/// Per faction, how many plots it owns in each area.
///
/// # Errors
///
/// Propagates any store error.
pub async fn faction_areas(
    tx: &mut Transaction,
    filters: &[PlotFilter],
) -> Result<PlotIndex, DbError> {
    count_plots(tx, filters, |plot, owner| {
        (owner.to_owned(), plot.area_id.clone())
    })
    .await
}

/// [`faction_areas`] with the full area rows attached.
///
/// Areas referenced by a plot but missing from the store are dropped.
///
/// # Errors
///
/// Propagates any store error.
pub async fn faction_areas_hydrated(
    tx: &mut Transaction,
    filters: &[PlotFilter],
) -> Result<BTreeMap<String, Vec<AreaInfluence>>, DbError> {
    let index = faction_areas(tx, filters).await?;

    let mut wanted: Vec<String> = index.values().flat_map(|a| a.keys().cloned()).collect();
    wanted.sort_unstable();
    wanted.dedup();

    let mut areas = BTreeMap::new();
    for chunk in wanted.chunks(ID_CHUNK) {
        let filters = [AreaFilter {
            ids: chunk.to_vec(),
            ..AreaFilter::default()
        }];
        drain!(|token| tx.areas(&token, &filters), |page| {
            areas.extend(page.into_iter().map(|a| (a.id.clone(), a)));
        });
    }

    let hydrated = index
        .into_iter()
        .map(|(faction, counts)| {
            let held = counts
                .into_iter()
                .filter_map(|(area_id, plots)| {
                    areas.get(&area_id).map(|area| AreaInfluence {
                        area: area.clone(),
                        plots,
                    })
                })
                .collect();
            (faction, held)
        })
        .collect();
    Ok(hydrated)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use polity_types::new_id;

    use super::*;
    use crate::testing::{area, paged_store, plot, store};

    #[tokio::test]
    async fn indexes_are_inverse() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        let (north, south) = (area(None), area(None));
        let (f1, f2) = (new_id(), new_id());
        tx.set_areas(&[north.clone(), south.clone()]).await.unwrap();
        tx.set_plots(&[
            plot(&north.id, Some(&f1), None),
            plot(&north.id, Some(&f1), None),
            plot(&north.id, Some(&f2), None),
            plot(&south.id, Some(&f2), None),
            plot(&south.id, None, None),
        ])
        .await
        .unwrap();

        let by_area = area_factions(&mut tx, &[]).await.unwrap();
        assert_eq!(by_area[&north.id][&f1], 2);
        assert_eq!(by_area[&north.id][&f2], 1);
        assert_eq!(by_area[&south.id].len(), 1);

        let by_faction = faction_areas(&mut tx, &[]).await.unwrap();
        assert_eq!(by_faction[&f1][&north.id], 2);
        assert_eq!(by_faction[&f2][&south.id], 1);
        assert!(!by_faction[&f1].contains_key(&south.id));
    }

    #[tokio::test]
    async fn hydration_attaches_areas_and_drops_unknown() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        let known = area(None);
        let owner = new_id();
        tx.set_areas(std::slice::from_ref(&known)).await.unwrap();
        tx.set_plots(&[
            plot(&known.id, Some(&owner), None),
            plot(&new_id(), Some(&owner), None),
        ])
        .await
        .unwrap();

        let hydrated = faction_areas_hydrated(&mut tx, &[]).await.unwrap();
        assert_eq!(
            hydrated[&owner],
            vec![AreaInfluence {
                area: known,
                plots: 1
            }]
        );
    }

    #[tokio::test]
    async fn indexes_span_every_page() {
        let store = paged_store(2).await;
        let mut tx = store.begin().await.unwrap();
        let areas: Vec<Area> = (0..5).map(|_| area(None)).collect();
        tx.set_areas(&areas).await.unwrap();
        let owner = new_id();
        let plots: Vec<Plot> = areas
            .iter()
            .flat_map(|a| [plot(&a.id, Some(&owner), None), plot(&a.id, Some(&owner), None)])
            .chain([plot(&areas[0].id, None, None)])
            .collect();
        tx.set_plots(&plots).await.unwrap();

        let by_area = area_factions(&mut tx, &[]).await.unwrap();
        assert_eq!(by_area.len(), 5);
        assert!(by_area.values().all(|owners| owners[&owner] == 2));

        let hydrated = faction_areas_hydrated(&mut tx, &[]).await.unwrap();
        let held = &hydrated[&owner];
        assert_eq!(held.len(), 5);
        assert!(held.iter().all(|h| h.plots == 2));
        let mut seen: Vec<&str> = held.iter().map(|h| h.area.id.as_str()).collect();
        let mut expected: Vec<&str> = areas.iter().map(|a| a.id.as_str()).collect();
        seen.sort_unstable();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }
}
