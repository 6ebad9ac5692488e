//! Typed filters, one per queryable table.
//!
//! Every field left at its default (`None` or an empty `Vec`) is
//! unconstrained. `Vec` fields become `IN` clauses; `*_above` and
//! `*_below` fields are strict comparisons.

use polity_types::JobState;

use crate::query::{Clause, Filter, Op, SqlValue};

/// Accumulates clauses for the set fields of a filter.
#[derive(Default)]
struct Clauses(Vec<Clause>);

impl Clauses {
    fn text(mut self, column: &'static str, value: Option<&String>) -> Self {
        if let Some(v) = value {
            self.0
                .push(Clause::new(column, Op::Equal, SqlValue::Text(v.clone())));
        }
        self
    }

    fn texts(mut self, column: &'static str, values: &[String]) -> Self {
        if !values.is_empty() {
            let list = values.iter().cloned().map(SqlValue::Text).collect();
            self.0.push(Clause::new(column, Op::In, SqlValue::List(list)));
        }
        self
    }

    fn flag(mut self, column: &'static str, value: Option<bool>) -> Self {
        if let Some(v) = value {
            self.0.push(Clause::new(column, Op::Equal, SqlValue::Bool(v)));
        }
        self
    }

    fn above(mut self, column: &'static str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.0.push(Clause::new(column, Op::Greater, SqlValue::Int(v)));
        }
        self
    }

    fn below(mut self, column: &'static str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.0.push(Clause::new(column, Op::Less, SqlValue::Int(v)));
        }
        self
    }

    fn push(mut self, clause: Option<Clause>) -> Self {
        self.0.extend(clause);
        self
    }

    fn done(self) -> Vec<Clause> {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Filter over `areas`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
    /// Governed by this government.
    pub government_id: Option<String>,
    /// With this biome.
    pub biome: Option<String>,
}

impl Filter for AreaFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .texts("id", &self.ids)
            .text("government_id", self.government_id.as_ref())
            .text("biome", self.biome.as_ref())
            .done()
    }
}

/// Filter over `factions`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FactionFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
    /// Answering to this government.
    pub government_id: Option<String>,
    /// Following this religion.
    pub religion_id: Option<String>,
    /// Headquartered in this area.
    pub home_area_id: Option<String>,
    /// Splintered from this faction.
    pub parent_faction_id: Option<String>,
    /// Covert or not.
    pub is_covert: Option<bool>,
    /// Governments only, or non-governments only.
    pub is_government: Option<bool>,
    /// Religions only, or non-religions only.
    pub is_religion: Option<bool>,
    /// More members than this.
    pub members_above: Option<i64>,
}

impl FactionFilter {
    /// Match any of `ids`.
    pub fn ids(ids: &[String]) -> Self {
        Self {
            ids: ids.to_vec(),
            ..Self::default()
        }
    }
}

impl Filter for FactionFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .texts("id", &self.ids)
            .text("government_id", self.government_id.as_ref())
            .text("religion_id", self.religion_id.as_ref())
            .text("home_area_id", self.home_area_id.as_ref())
            .text("parent_faction_id", self.parent_faction_id.as_ref())
            .flag("is_covert", self.is_covert)
            .flag("is_government", self.is_government)
            .flag("is_religion", self.is_religion)
            .above("members", self.members_above)
            .done()
    }
}

/// Filter over `people`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
    /// Living in this area.
    pub area_id: Option<String>,
    /// Holding this job.
    pub job_id: Option<String>,
    /// Born into this family.
    pub birth_family_id: Option<String>,
    /// Preferring this profession.
    pub preferred_profession: Option<String>,
    /// Preferring this faction.
    pub preferred_faction_id: Option<String>,
    /// By sex.
    pub is_male: Option<bool>,
    /// Living (`death_tick == 0`) or dead.
    pub alive: Option<bool>,
}

impl Filter for PersonFilter {
    fn clauses(&self) -> Vec<Clause> {
        let alive = self.alive.map(|alive| {
            let op = if alive { Op::Equal } else { Op::Greater };
            Clause::new("death_tick", op, SqlValue::Int(0))
        });
        Clauses::default()
            .texts("id", &self.ids)
            .text("area_id", self.area_id.as_ref())
            .text("job_id", self.job_id.as_ref())
            .text("birth_family_id", self.birth_family_id.as_ref())
            .text("preferred_profession", self.preferred_profession.as_ref())
            .text("preferred_faction_id", self.preferred_faction_id.as_ref())
            .flag("is_male", self.is_male)
            .push(alive)
            .done()
    }
}

/// Filter over `families`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
    /// Living in this area.
    pub area_id: Option<String>,
    /// Belonging to this faction.
    pub faction_id: Option<String>,
    /// With this male partner.
    pub male_id: Option<String>,
    /// With this female partner.
    pub female_id: Option<String>,
    /// Still able to have children, or not.
    pub is_child_bearing: Option<bool>,
}

impl Filter for FamilyFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .texts("id", &self.ids)
            .text("area_id", self.area_id.as_ref())
            .text("faction_id", self.faction_id.as_ref())
            .text("male_id", self.male_id.as_ref())
            .text("female_id", self.female_id.as_ref())
            .flag("is_child_bearing", self.is_child_bearing)
            .done()
    }
}

/// Filter over `governments`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernmentFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
}

impl Filter for GovernmentFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default().texts("id", &self.ids).done()
    }
}

/// Filter over `jobs`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
    /// Split from this job.
    pub parent_job_id: Option<String>,
    /// Run by this faction.
    pub source_faction_id: Option<String>,
    /// Organised from this area.
    pub source_area_id: Option<String>,
    /// Aimed at this faction.
    pub target_faction_id: Option<String>,
    /// Taking place in this area.
    pub target_area_id: Option<String>,
    /// Performing this action.
    pub action: Option<String>,
    /// In this state.
    pub state: Option<JobState>,
    /// Ending after this tick.
    pub ends_after: Option<i64>,
    /// Ending before this tick.
    pub ends_before: Option<i64>,
}

impl Filter for JobFilter {
    fn clauses(&self) -> Vec<Clause> {
        let state = self
            .state
            .map(|s| Clause::new("state", Op::Equal, SqlValue::Text(s.as_str().to_owned())));
        Clauses::default()
            .texts("id", &self.ids)
            .text("parent_job_id", self.parent_job_id.as_ref())
            .text("source_faction_id", self.source_faction_id.as_ref())
            .text("source_area_id", self.source_area_id.as_ref())
            .text("target_faction_id", self.target_faction_id.as_ref())
            .text("target_area_id", self.target_area_id.as_ref())
            .text("action", self.action.as_ref())
            .push(state)
            .above("tick_ends", self.ends_after)
            .below("tick_ends", self.ends_before)
            .done()
    }
}

/// Filter over `plots`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlotFilter {
    /// Any of these IDs.
    pub ids: Vec<String>,
    /// In any of these areas.
    pub area_ids: Vec<String>,
    /// Owned by any of these factions.
    pub owner_faction_ids: Vec<String>,
    /// Producing this commodity.
    pub commodity: Option<String>,
    /// Headquarters only, or non-headquarters only.
    pub is_headquarters: Option<bool>,
}

impl Filter for PlotFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .texts("id", &self.ids)
            .texts("area_id", &self.area_ids)
            .texts("owner_faction_id", &self.owner_faction_ids)
            .text("commodity", self.commodity.as_ref())
            .flag("is_headquarters", self.is_headquarters)
            .done()
    }
}

/// Filter over `routes`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilter {
    /// Leaving from this area.
    pub source_area_id: Option<String>,
    /// Arriving at this area.
    pub target_area_id: Option<String>,
    /// Shorter than this many ticks.
    pub travel_time_below: Option<i64>,
}

impl Filter for RouteFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .text("source_area_id", self.source_area_id.as_ref())
            .text("target_area_id", self.target_area_id.as_ref())
            .below("travel_time", self.travel_time_below)
            .done()
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Filter over one relation's tuples (or computed tuples).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    /// This subject.
    pub subject: Option<String>,
    /// Any of these subjects.
    pub subjects: Vec<String>,
    /// This object.
    pub object: Option<String>,
    /// Any of these objects.
    pub objects: Vec<String>,
    /// Value strictly greater than this.
    pub value_above: Option<i64>,
    /// Value strictly less than this.
    pub value_below: Option<i64>,
}

impl TupleFilter {
    /// Match exactly one (subject, object) pair.
    pub fn pair(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            object: Some(object.into()),
            ..Self::default()
        }
    }

    /// Match every tuple with this subject.
    pub fn subject(subject: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    /// Match every tuple with this object.
    pub fn object(object: impl Into<String>) -> Self {
        Self {
            object: Some(object.into()),
            ..Self::default()
        }
    }
}

impl Filter for TupleFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .text("subject", self.subject.as_ref())
            .texts("subject", &self.subjects)
            .text("object", self.object.as_ref())
            .texts("object", &self.objects)
            .above("value", self.value_above)
            .below("value", self.value_below)
            .done()
    }
}

/// Filter over one relation's modifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifierFilter {
    /// This subject.
    pub subject: Option<String>,
    /// Any of these subjects.
    pub subjects: Vec<String>,
    /// This object.
    pub object: Option<String>,
    /// Any of these objects.
    pub objects: Vec<String>,
    /// Expiring strictly after this tick, i.e. still active at it.
    pub expires_after: Option<i64>,
    /// Expiring strictly before this tick.
    pub expires_before: Option<i64>,
    /// With this provenance key.
    pub meta_key: Option<String>,
    /// With this provenance value.
    pub meta_val: Option<String>,
    /// With this provenance reason.
    pub meta_reason: Option<String>,
}

impl ModifierFilter {
    /// Match exactly one (subject, object) pair.
    pub fn pair(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: Some(subject.into()),
            object: Some(object.into()),
            ..Self::default()
        }
    }

    /// Only modifiers still active at `tick`.
    #[must_use]
    pub const fn active_at(mut self, tick: i64) -> Self {
        self.expires_after = Some(tick);
        self
    }
}

impl Filter for ModifierFilter {
    fn clauses(&self) -> Vec<Clause> {
        Clauses::default()
            .text("subject", self.subject.as_ref())
            .texts("subject", &self.subjects)
            .text("object", self.object.as_ref())
            .texts("object", &self.objects)
            .above("tick_expires", self.expires_after)
            .below("tick_expires", self.expires_before)
            .text("meta_key", self.meta_key.as_ref())
            .text("meta_val", self.meta_val.as_ref())
            .text("meta_reason", self.meta_reason.as_ref())
            .done()
    }
}
