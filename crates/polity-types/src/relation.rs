//! The static registry of relations.
//!
//! A relation is a named category of pairwise integer facts. Each relation
//! owns its own `tuples_<name>` table (and `modifiers_<name>` table when it
//! accepts modifiers) so unrelated facts are never queryable together.

use serde::{Deserialize, Serialize};

/// What kind of key a relation stores in its subject or object column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyKind {
    /// An entity identifier (see [`crate::ids::is_valid_id`]).
    Id,
    /// A symbolic name such as a profession (see [`crate::ids::is_valid_name`]).
    Name,
}

/// A named category of pairwise facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    // --- Person subjects ---
    /// How much one person trusts another.
    TrustPersonToPerson,
    /// Kinship or friendship strength between two people.
    RelationshipPersonToPerson,
    /// How strongly a person identifies with a faction.
    AffiliationPersonToFaction,
    /// A person's standing inside a faction's hierarchy.
    RankPersonToFaction,
    /// A person's devotion to a religion (a religious faction).
    FaithPersonToReligion,
    /// A person's skill at a profession.
    SkillPersonToProfession,

    // --- Faction subjects ---
    /// How much one faction trusts another.
    TrustFactionToFaction,
    /// Treaty / rivalry strength between two factions.
    RelationshipFactionToFaction,
    /// How much a faction values a profession among its members.
    WeightFactionToProfession,
    /// How inclined a faction is to take an action.
    WeightFactionToAction,
    /// How far a faction has progressed on a research topic.
    ProgressFactionToResearch,
    /// How much a faction cares about a commodity.
    ImportanceFactionToCommodity,
}

impl Relation {
    /// Every registered relation, in table-creation order.
    pub const ALL: [Self; 12] = [
        Self::TrustPersonToPerson,
        Self::RelationshipPersonToPerson,
        Self::AffiliationPersonToFaction,
        Self::RankPersonToFaction,
        Self::FaithPersonToReligion,
        Self::SkillPersonToProfession,
        Self::TrustFactionToFaction,
        Self::RelationshipFactionToFaction,
        Self::WeightFactionToProfession,
        Self::WeightFactionToAction,
        Self::ProgressFactionToResearch,
        Self::ImportanceFactionToCommodity,
    ];

    /// Unique name, also used as the table suffix.
    pub const fn name(self) -> &'static str {
        match self {
            Self::TrustPersonToPerson => "trust_person_to_person",
            Self::RelationshipPersonToPerson => "relationship_person_to_person",
            Self::AffiliationPersonToFaction => "affiliation_person_to_faction",
            Self::RankPersonToFaction => "rank_person_to_faction",
            Self::FaithPersonToReligion => "faith_person_to_religion",
            Self::SkillPersonToProfession => "skill_person_to_profession",
            Self::TrustFactionToFaction => "trust_faction_to_faction",
            Self::RelationshipFactionToFaction => "relationship_faction_to_faction",
            Self::WeightFactionToProfession => "weight_faction_to_profession",
            Self::WeightFactionToAction => "weight_faction_to_action",
            Self::ProgressFactionToResearch => "progress_faction_to_research",
            Self::ImportanceFactionToCommodity => "importance_faction_to_commodity",
        }
    }

    /// Look a relation up by [`Relation::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.name() == name)
    }

    /// Whether temporary modifiers may be layered on this relation.
    pub const fn supports_modifiers(self) -> bool {
        matches!(
            self,
            Self::TrustPersonToPerson
                | Self::AffiliationPersonToFaction
                | Self::FaithPersonToReligion
                | Self::TrustFactionToFaction
                | Self::WeightFactionToAction
        )
    }

    /// Key kind of the subject column. Every relation has an entity subject.
    pub const fn subject_kind(self) -> KeyKind {
        KeyKind::Id
    }

    /// Key kind of the object column.
    pub const fn object_kind(self) -> KeyKind {
        match self {
            Self::SkillPersonToProfession
            | Self::WeightFactionToProfession
            | Self::WeightFactionToAction
            | Self::ProgressFactionToResearch
            | Self::ImportanceFactionToCommodity => KeyKind::Name,
            _ => KeyKind::Id,
        }
    }

    /// Name of the base value table.
    pub fn tuples_table(self) -> String {
        format!("tuples_{}", self.name())
    }

    /// Name of the modifier table. Only exists when [`Relation::supports_modifiers`].
    pub fn modifiers_table(self) -> String {
        format!("modifiers_{}", self.name())
    }
}

impl core::fmt::Display for Relation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
