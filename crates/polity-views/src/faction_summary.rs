//! Per-faction rollup of every faction-side relation.
//!
//! Which relations feed which summary field is fixed by [`SOURCES`]. Each
//! entry is fetched once for all requested factions; rows are then routed
//! through [`SummaryField::apply`] without looking at relation names again.

use std::collections::BTreeMap;

use polity_db::{DbError, FactionFilter, ModifierFilter, Transaction, TupleFilter};
use polity_types::{BandCounts, Faction, Relation, Tuple};
use serde::Serialize;

use crate::ID_CHUNK;

/// Everything planning needs to know about one faction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactionSummary {
    /// The faction row itself.
    pub faction: Faction,
    /// Weight per profession.
    pub professions: BTreeMap<String, i64>,
    /// Inclination per action, including active modifiers.
    pub actions: BTreeMap<String, i64>,
    /// Progress per research topic.
    pub research: BTreeMap<String, i64>,
    /// Importance per commodity.
    pub commodities: BTreeMap<String, i64>,
    /// Trust toward other factions, including active modifiers.
    pub trust: BTreeMap<String, i64>,
    /// Members' ranks, bucketed by band.
    pub ranks: BandCounts,
}

impl FactionSummary {
    fn new(faction: Faction) -> Self {
        Self {
            faction,
            professions: BTreeMap::new(),
            actions: BTreeMap::new(),
            research: BTreeMap::new(),
            commodities: BTreeMap::new(),
            trust: BTreeMap::new(),
            ranks: BandCounts::default(),
        }
    }
}

/// Which side of a relation the faction sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Subject,
    Object,
}

impl Direction {
    fn tuple_filter(self, factions: &[String]) -> TupleFilter {
        match self {
            Self::Subject => TupleFilter {
                subjects: factions.to_vec(),
                ..TupleFilter::default()
            },
            Self::Object => TupleFilter {
                objects: factions.to_vec(),
                ..TupleFilter::default()
            },
        }
    }

    fn modifier_filter(self, factions: &[String]) -> ModifierFilter {
        match self {
            Self::Subject => ModifierFilter {
                subjects: factions.to_vec(),
                ..ModifierFilter::default()
            },
            Self::Object => ModifierFilter {
                objects: factions.to_vec(),
                ..ModifierFilter::default()
            },
        }
    }

    /// `(faction, other)` keys of a row.
    fn split(self, tuple: Tuple) -> (String, String) {
        match self {
            Self::Subject => (tuple.subject, tuple.object),
            Self::Object => (tuple.object, tuple.subject),
        }
    }
}

/// Destination of a relation's values inside a [`FactionSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SummaryField {
    Professions,
    Actions,
    Research,
    Commodities,
    Trust,
    Ranks,
}

impl SummaryField {
    fn apply(self, summary: &mut FactionSummary, other: String, value: i64) {
        let map = match self {
            Self::Professions => &mut summary.professions,
            Self::Actions => &mut summary.actions,
            Self::Research => &mut summary.research,
            Self::Commodities => &mut summary.commodities,
            Self::Trust => &mut summary.trust,
            Self::Ranks => {
                summary.ranks.add(value);
                return;
            }
        };
        map.insert(other, value);
    }
}

const SOURCES: [(Relation, Direction, SummaryField); 6] = [
    (
        Relation::WeightFactionToProfession,
        Direction::Subject,
        SummaryField::Professions,
    ),
    (
        Relation::WeightFactionToAction,
        Direction::Subject,
        SummaryField::Actions,
    ),
    (
        Relation::ProgressFactionToResearch,
        Direction::Subject,
        SummaryField::Research,
    ),
    (
        Relation::ImportanceFactionToCommodity,
        Direction::Subject,
        SummaryField::Commodities,
    ),
    (
        Relation::TrustFactionToFaction,
        Direction::Subject,
        SummaryField::Trust,
    ),
    (
        Relation::RankPersonToFaction,
        Direction::Object,
        SummaryField::Ranks,
    ),
];

fn accumulate(values: &mut BTreeMap<(String, String), i64>, key: (String, String), value: i64) {
    let slot = values.entry(key).or_insert(0);
    *slot = slot.saturating_add(value);
}

/// Summaries for the factions in `ids`, keyed by faction ID.
///
/// IDs with no stored faction are left out. Values of relations that take
/// modifiers include every modifier still active at the stored tick.
///
/// # Errors
///
/// Propagates any store error.
pub async fn faction_summaries(
    tx: &mut Transaction,
    ids: &[String],
) -> Result<BTreeMap<String, FactionSummary>, DbError> {
    let mut summaries = BTreeMap::new();
    for chunk in ids.chunks(ID_CHUNK) {
        let filters = [FactionFilter::ids(chunk)];
        drain!(|token| tx.factions(&token, &filters), |page| {
            for faction in page {
                summaries.insert(faction.id.clone(), FactionSummary::new(faction));
            }
        });
    }
    if summaries.is_empty() {
        return Ok(summaries);
    }

    let tick = tx.tick().await?;
    let found: Vec<String> = summaries.keys().cloned().collect();
    for (relation, direction, field) in SOURCES {
        let mut values = BTreeMap::new();
        for chunk in found.chunks(ID_CHUNK) {
            let filters = [direction.tuple_filter(chunk)];
            drain!(|token| tx.tuples(relation, &token, &filters), |page| {
                for tuple in page {
                    let value = tuple.value;
                    accumulate(&mut values, direction.split(tuple), value);
                }
            });
            if relation.supports_modifiers() {
                let filters = [direction.modifier_filter(chunk).active_at(tick)];
                drain!(|token| tx.modifiers_sum(relation, &token, &filters), |page| {
                    for sum in page {
                        let value = sum.value;
                        accumulate(&mut values, direction.split(sum), value);
                    }
                });
            }
        }
        for ((faction, other), value) in values {
            if let Some(summary) = summaries.get_mut(&faction) {
                field.apply(summary, other, value);
            }
        }
    }

    tracing::debug!(
        requested = ids.len(),
        found = summaries.len(),
        tick,
        "Built faction summaries"
    );
    Ok(summaries)
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use polity_types::{Band, Modifier, new_id};

    use super::*;
    use crate::testing::{faction, paged_store, store};

    #[tokio::test]
    async fn summary_folds_every_source() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        let (guild, rival) = (faction(), faction());
        tx.set_factions(&[guild.clone(), rival.clone()])
            .await
            .unwrap();
        tx.set_tick(20).await.unwrap();

        let g = guild.id.as_str();
        tx.set_tuples(
            Relation::WeightFactionToProfession,
            &[Tuple::new(g, "farmer", 400)],
        )
        .await
        .unwrap();
        tx.set_tuples(
            Relation::WeightFactionToAction,
            &[Tuple::new(g, "trade", 100)],
        )
        .await
        .unwrap();
        tx.set_modifiers(
            Relation::WeightFactionToAction,
            &[
                Modifier::new(g, "trade", 50, 25),
                // Expired at the stored tick.
                Modifier::new(g, "trade", 999, 20),
                // No base tuple.
                Modifier::new(g, "raid", -30, 30),
            ],
        )
        .await
        .unwrap();
        tx.set_tuples(
            Relation::TrustFactionToFaction,
            &[Tuple::new(g, &rival.id, -2_500)],
        )
        .await
        .unwrap();
        tx.set_tuples(
            Relation::RankPersonToFaction,
            &[
                Tuple::new(new_id(), g, 9_000),
                Tuple::new(new_id(), g, 100),
                Tuple::new(new_id(), &rival.id, 100),
            ],
        )
        .await
        .unwrap();

        let missing = new_id();
        let summaries = faction_summaries(&mut tx, &[guild.id.clone(), missing.clone()])
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert!(!summaries.contains_key(&missing));

        let summary = &summaries[&guild.id];
        assert_eq!(summary.faction, guild);
        assert_eq!(summary.professions["farmer"], 400);
        assert_eq!(summary.actions["trade"], 150);
        assert_eq!(summary.actions["raid"], -30);
        assert_eq!(summary.trust[&rival.id], -2_500);
        assert!(summary.research.is_empty());
        assert_eq!(summary.ranks.total(), 2);
        assert_eq!(summary.ranks.get(Band::Exemplary), 1);
        assert_eq!(summary.ranks.get(Band::Average), 1);
    }

    #[tokio::test]
    async fn no_ids_means_no_summaries() {
        let store = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.set_factions(&[faction()]).await.unwrap();
        assert!(faction_summaries(&mut tx, &[]).await.unwrap().is_empty());
    }

    #[test]
    fn every_source_lands_on_the_faction_side() {
        for (relation, direction, _) in SOURCES {
            let kind = match direction {
                Direction::Subject => relation.subject_kind(),
                Direction::Object => relation.object_kind(),
            };
            assert_eq!(kind, polity_types::KeyKind::Id, "{relation}");
        }
    }

    #[tokio::test]
    async fn summaries_span_id_chunks_and_pages() {
        let store = paged_store(7).await;
        let mut tx = store.begin().await.unwrap();
        tx.set_tick(3).await.unwrap();
        let factions: Vec<Faction> = (0..ID_CHUNK + 3).map(|_| faction()).collect();
        tx.set_factions(&factions).await.unwrap();

        let base: Vec<Tuple> = factions
            .iter()
            .map(|f| Tuple::new(&f.id, "trade", 100))
            .collect();
        tx.set_tuples(Relation::WeightFactionToAction, &base)
            .await
            .unwrap();
        let boosts: Vec<Modifier> = factions
            .iter()
            .map(|f| Modifier::new(&f.id, "trade", 5, 10))
            .collect();
        tx.set_modifiers(Relation::WeightFactionToAction, &boosts)
            .await
            .unwrap();

        let ids: Vec<String> = factions.iter().map(|f| f.id.clone()).collect();
        let summaries = faction_summaries(&mut tx, &ids).await.unwrap();
        assert_eq!(summaries.len(), factions.len());
        assert!(summaries.values().all(|s| s.actions["trade"] == 105));
        assert!(summaries.values().all(|s| s.actions.len() == 1));
    }
}
