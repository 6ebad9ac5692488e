//! Which government rules each area.

use std::collections::{BTreeMap, BTreeSet};

use polity_db::{AreaFilter, DbError, GovernmentFilter, Transaction};
use polity_types::Government;

use crate::ID_CHUNK;

/// The government of every area matching any of `filters`, laws included.
///
/// Ungoverned areas, and areas whose government row is missing, are left
/// out.
///
/// # Errors
///
/// Propagates any store error.
pub async fn area_governments(
    tx: &mut Transaction,
    filters: &[AreaFilter],
) -> Result<BTreeMap<String, Government>, DbError> {
    let mut ruled: Vec<(String, String)> = Vec::new();
    drain!(|token| tx.areas(&token, filters), |page| {
        ruled.extend(
            page.into_iter()
                .filter_map(|area| area.government_id.map(|g| (area.id, g))),
        );
    });

    let ids: Vec<String> = ruled
        .iter()
        .map(|(_, g)| g.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let mut governments = BTreeMap::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let filters = [GovernmentFilter {
            ids: chunk.to_vec(),
        }];
        drain!(|token| tx.governments(&token, &filters), |page| {
            governments.extend(page.into_iter().map(|g| (g.id.clone(), g)));
        });
    }

    let by_area: BTreeMap<String, Government> = ruled
        .into_iter()
        .filter_map(|(area, g)| governments.get(&g).map(|gov| (area, gov.clone())))
        .collect();
    tracing::debug!(
        areas = by_area.len(),
        governments = governments.len(),
        "Resolved area governments"
    );
    Ok(by_area)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use polity_types::{LawKind, Laws, new_id};

    use super::*;
    use crate::testing::{area, paged_store, store};

    #[tokio::test]
    async fn areas_map_to_their_government() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();

        let mut outlawed = Laws::default();
        outlawed.set_mut(LawKind::Commodity).insert(String::from("opium"));
        let crown = Government {
            id: new_id(),
            tax_rate: 0.25,
            tax_frequency: 12,
            outlawed,
        };
        tx.set_governments(std::slice::from_ref(&crown))
            .await
            .unwrap();

        let (a, b) = (area(Some(&crown.id)), area(Some(&crown.id)));
        let lawless = area(None);
        let orphan = area(Some(&new_id()));
        tx.set_areas(&[a.clone(), b.clone(), lawless.clone(), orphan.clone()])
            .await
            .unwrap();

        let ruled = area_governments(&mut tx, &[]).await.unwrap();
        assert_eq!(ruled.len(), 2);
        assert_eq!(ruled[&a.id], crown);
        assert_eq!(ruled[&b.id], crown);
        assert!(ruled[&a.id].outlawed.commodities.contains("opium"));
        assert!(!ruled.contains_key(&lawless.id));
        assert!(!ruled.contains_key(&orphan.id));
    }

    #[tokio::test]
    async fn filters_restrict_areas() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        let crown = Government {
            id: new_id(),
            tax_rate: 0.1,
            tax_frequency: 1,
            outlawed: Laws::default(),
        };
        tx.set_governments(std::slice::from_ref(&crown))
            .await
            .unwrap();
        let (a, b) = (area(Some(&crown.id)), area(Some(&crown.id)));
        tx.set_areas(&[a.clone(), b]).await.unwrap();

        let only_a = AreaFilter {
            ids: vec![a.id.clone()],
            ..AreaFilter::default()
        };
        let ruled = area_governments(&mut tx, &[only_a]).await.unwrap();
        assert_eq!(ruled.keys().collect::<Vec<_>>(), vec![&a.id]);
    }

    #[tokio::test]
    async fn resolves_across_pages_of_areas_and_governments() {
        let store = paged_store(2).await;
        let mut tx = store.begin().await.unwrap();
        let governments: Vec<Government> = (0..5)
            .map(|_| Government {
                id: new_id(),
                tax_rate: 0.2,
                tax_frequency: 6,
                outlawed: Laws::default(),
            })
            .collect();
        tx.set_governments(&governments).await.unwrap();
        let areas: Vec<_> = governments
            .iter()
            .cycle()
            .take(9)
            .map(|g| area(Some(&g.id)))
            .collect();
        tx.set_areas(&areas).await.unwrap();

        let ruled = area_governments(&mut tx, &[]).await.unwrap();
        assert_eq!(ruled.len(), 9);
        for a in &areas {
            assert_eq!(Some(&ruled[&a.id].id), a.government_id.as_ref());
        }
    }
}
