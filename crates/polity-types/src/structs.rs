//! Core entity structs and relation rows.
//!
//! Every struct here maps onto one table row, so all of them derive
//! [`sqlx::FromRow`] and decode from either backend. Optional references
//! to other entities are `None` rather than an empty string.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::enums::{JobState, LawKind};

// ---------------------------------------------------------------------------
// Relation rows
// ---------------------------------------------------------------------------

/// The durable base value of one relation instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tuple {
    /// Subject key.
    pub subject: String,
    /// Object key.
    pub object: String,
    /// Value, within `[MIN_VALUE, MAX_VALUE]` once stored.
    pub value: i64,
}

impl Tuple {
    /// Build a tuple.
    pub fn new(subject: impl Into<String>, object: impl Into<String>, value: i64) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            value,
        }
    }
}

/// A temporary delta layered on a [`Tuple`].
///
/// Active while the current tick is strictly less than `tick_expires`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Modifier {
    /// Subject key.
    pub subject: String,
    /// Object key.
    pub object: String,
    /// Delta applied while active.
    pub value: i64,
    /// First tick at which the modifier no longer applies.
    pub tick_expires: i64,
    /// Provenance: what kind of thing caused this modifier.
    pub meta_key: String,
    /// Provenance: which instance of `meta_key`.
    pub meta_val: String,
    /// Provenance: free-form reason.
    pub meta_reason: String,
}

impl Modifier {
    /// Build a modifier without provenance.
    pub fn new(
        subject: impl Into<String>,
        object: impl Into<String>,
        value: i64,
        tick_expires: i64,
    ) -> Self {
        Self {
            subject: subject.into(),
            object: object.into(),
            value,
            tick_expires,
            meta_key: String::new(),
            meta_val: String::new(),
            meta_reason: String::new(),
        }
    }

    /// Attach provenance.
    #[must_use]
    pub fn with_meta(
        mut self,
        key: impl Into<String>,
        val: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        self.meta_key = key.into();
        self.meta_val = val.into();
        self.meta_reason = reason.into();
        self
    }

    /// Whether the modifier still applies at `tick`.
    pub const fn is_active(&self, tick: i64) -> bool {
        tick < self.tick_expires
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// A region of the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Area {
    /// Unique identifier.
    pub id: String,
    /// Government with jurisdiction, if any.
    pub government_id: Option<String>,
    /// Terrain label used by generators.
    pub biome: String,
}

/// An organised group: guild, clan, church, state, criminal ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Faction {
    /// Unique identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Area where the faction is headquartered.
    pub home_area_id: Option<String>,
    /// Government the faction answers to, or is.
    pub government_id: Option<String>,
    /// Faction this one splintered from.
    pub parent_faction_id: Option<String>,
    /// Official religion.
    pub religion_id: Option<String>,
    /// Operates in secret.
    pub is_covert: bool,
    /// Acts as a government.
    pub is_government: bool,
    /// Acts as a religion.
    pub is_religion: bool,
    /// Liquid wealth.
    pub wealth: i64,
    /// Internal unity.
    pub cohesion: i64,
    /// Internal corruption.
    pub corruption: i64,
    /// Member head count, maintained by callers.
    pub members: i64,
    /// Tick the faction was founded.
    pub tick_created: i64,
}

/// An individual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Person {
    /// Unique identifier.
    pub id: String,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Area the person lives in.
    pub area_id: String,
    /// Job currently held.
    pub job_id: Option<String>,
    /// Family the person was born into.
    pub birth_family_id: Option<String>,
    /// Profession the person would rather practise.
    pub preferred_profession: Option<String>,
    /// Faction the person would rather work for.
    pub preferred_faction_id: Option<String>,
    /// Tick of birth.
    pub birth_tick: i64,
    /// Tick of death; zero while alive.
    pub death_tick: i64,
    /// Why the person died.
    pub death_reason: Option<String>,
    /// Sex, used by family generation.
    pub is_male: bool,
}

impl Person {
    /// Whether the person is still alive.
    pub const fn is_alive(&self) -> bool {
        self.death_tick == 0
    }
}

/// A couple and their household.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Family {
    /// Unique identifier.
    pub id: String,
    /// Area the household lives in.
    pub area_id: String,
    /// Faction the household belongs to.
    pub faction_id: Option<String>,
    /// Male partner.
    pub male_id: String,
    /// Female partner.
    pub female_id: String,
    /// Whether the couple may still have children.
    pub is_child_bearing: bool,
    /// Last tick children may be born.
    pub max_child_bearing_tick: i64,
    /// Tick a current pregnancy ends; zero if none.
    pub pregnancy_end: i64,
    /// Children born so far.
    pub number_of_children: i64,
}

/// The sets of things a government forbids.
///
/// Stored as one `laws` row per entry and reassembled on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Laws {
    /// Outlawed faction IDs.
    pub factions: BTreeSet<String>,
    /// Outlawed action names.
    pub actions: BTreeSet<String>,
    /// Outlawed commodity names.
    pub commodities: BTreeSet<String>,
    /// Outlawed research topic names.
    pub research: BTreeSet<String>,
    /// Outlawed religion (faction) IDs.
    pub religions: BTreeSet<String>,
}

impl Laws {
    /// The set holding entries of `kind`.
    pub const fn set(&self, kind: LawKind) -> &BTreeSet<String> {
        match kind {
            LawKind::Faction => &self.factions,
            LawKind::Action => &self.actions,
            LawKind::Commodity => &self.commodities,
            LawKind::Research => &self.research,
            LawKind::Religion => &self.religions,
        }
    }

    /// Mutable access to the set holding entries of `kind`.
    pub const fn set_mut(&mut self, kind: LawKind) -> &mut BTreeSet<String> {
        match kind {
            LawKind::Faction => &mut self.factions,
            LawKind::Action => &mut self.actions,
            LawKind::Commodity => &mut self.commodities,
            LawKind::Research => &mut self.research,
            LawKind::Religion => &mut self.religions,
        }
    }

    /// Flatten into `(kind, subject)` pairs.
    pub fn entries(&self) -> Vec<(LawKind, &str)> {
        [
            LawKind::Faction,
            LawKind::Action,
            LawKind::Commodity,
            LawKind::Research,
            LawKind::Religion,
        ]
        .into_iter()
        .flat_map(|kind| self.set(kind).iter().map(move |s| (kind, s.as_str())))
        .collect()
    }

    /// Whether nothing is outlawed.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

/// A governing body and its laws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Government {
    /// Unique identifier.
    pub id: String,
    /// Fraction of income taken as tax.
    pub tax_rate: f64,
    /// Ticks between tax collections.
    pub tax_frequency: i64,
    /// What the government forbids.
    #[sqlx(skip)]
    pub outlawed: Laws,
}

/// A unit of organised work one faction undertakes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    /// Unique identifier.
    pub id: String,
    /// Job this one was split from.
    pub parent_job_id: Option<String>,
    /// Faction running the job.
    pub source_faction_id: String,
    /// Area the job is organised from.
    pub source_area_id: String,
    /// Action name being performed.
    pub action: String,
    /// Faction the job is aimed at.
    pub target_faction_id: Option<String>,
    /// Area the job takes place in.
    pub target_area_id: String,
    /// Extra target description key.
    pub target_meta_key: Option<String>,
    /// Extra target description value.
    pub target_meta_val: Option<String>,
    /// Fewest people needed.
    pub people_min: i64,
    /// Most people accepted.
    pub people_max: i64,
    /// Tick the job was posted.
    pub tick_created: i64,
    /// Tick work starts.
    pub tick_starts: i64,
    /// Tick work ends.
    pub tick_ends: i64,
    /// How hard the job is to detect.
    pub secrecy: i64,
    /// Whether the action is illegal where it happens.
    pub is_illegal: bool,
    /// Lifecycle state.
    #[sqlx(try_from = "String")]
    pub state: JobState,
}

/// A right over a parcel of land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plot {
    /// Unique identifier.
    pub id: String,
    /// Area the land lies in.
    pub area_id: String,
    /// Faction holding the right.
    pub owner_faction_id: Option<String>,
    /// Commodity the land produces.
    pub commodity: Option<String>,
    /// Output per harvest.
    pub crop_yield: i64,
    /// Parcel size.
    pub size: i64,
    /// Whether the owner is headquartered here.
    pub is_headquarters: bool,
}

/// A travel link between two areas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Route {
    /// Origin.
    pub source_area_id: String,
    /// Destination.
    pub target_area_id: String,
    /// Ticks to travel.
    pub travel_time: i64,
}
