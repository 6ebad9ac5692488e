//! Band distributions over a population.

use std::collections::BTreeMap;

use polity_db::{DbError, PersonFilter, Transaction, TupleFilter};
use polity_types::{BandCounts, Relation};
use serde::Serialize;

use crate::ID_CHUNK;

/// How a set of people is spread across the person-side relations.
///
/// Every map is keyed by the relation's object (a religion, profession or
/// faction) and counts how many people fall in each band toward it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Demographics {
    /// People visited.
    pub total: u64,
    /// Devotion per religion.
    pub faith: BTreeMap<String, BandCounts>,
    /// Skill per profession.
    pub skill: BTreeMap<String, BandCounts>,
    /// Affiliation per faction.
    pub affiliation: BTreeMap<String, BandCounts>,
    /// Rank per faction.
    pub rank: BTreeMap<String, BandCounts>,
}

#[derive(Debug, Clone, Copy)]
enum Bucket {
    Faith,
    Skill,
    Affiliation,
    Rank,
}

impl Bucket {
    const fn slot(self, demographics: &mut Demographics) -> &mut BTreeMap<String, BandCounts> {
        match self {
            Self::Faith => &mut demographics.faith,
            Self::Skill => &mut demographics.skill,
            Self::Affiliation => &mut demographics.affiliation,
            Self::Rank => &mut demographics.rank,
        }
    }
}

const BUCKETS: [(Relation, Bucket); 4] = [
    (Relation::FaithPersonToReligion, Bucket::Faith),
    (Relation::SkillPersonToProfession, Bucket::Skill),
    (Relation::AffiliationPersonToFaction, Bucket::Affiliation),
    (Relation::RankPersonToFaction, Bucket::Rank),
];

/// Band counts for every person matching any of `filters`.
///
/// Values are taken at the stored tick, so active modifiers count.
///
/// # Errors
///
/// Propagates any store error.
pub async fn demographics(
    tx: &mut Transaction,
    filters: &[PersonFilter],
) -> Result<Demographics, DbError> {
    let tick = tx.tick().await?;
    let mut out = Demographics::default();
    drain!(|token| tx.people(&token, filters), |page| {
        let ids: Vec<String> = page.into_iter().map(|p| p.id).collect();
        out.total = out
            .total
            .saturating_add(u64::try_from(ids.len()).unwrap_or(u64::MAX));
        for chunk in ids.chunks(ID_CHUNK) {
            let subjects = [TupleFilter {
                subjects: chunk.to_vec(),
                ..TupleFilter::default()
            }];
            for (relation, bucket) in BUCKETS {
                drain!(|inner| tx.compute_tuples(relation, &inner, tick, &subjects), |rows| {
                    let slot = bucket.slot(&mut out);
                    for row in rows {
                        slot.entry(row.object).or_default().add(row.value);
                    }
                });
            }
        }
    });
    tracing::debug!(total = out.total, tick, "Built demographics");
    Ok(out)
}
