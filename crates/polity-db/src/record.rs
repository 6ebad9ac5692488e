//! Table mappings for entity rows.
//!
//! Each entity implements [`Record`], which names its table, columns and
//! key. The same description drives schema generation, generic listing and
//! generic upserts, so a column is declared exactly once.

use polity_types::{
    Area, Faction, Family, Government, Job, KeyKind, LawKind, Person, Plot, Route, is_valid_id,
    is_valid_name,
};
use sqlx::FromRow;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;

use crate::dialect::{ColumnKind, Param};
use crate::error::DbError;

/// Separator between key parts in [`Record::key`].
pub(crate) const KEY_SEPARATOR: char = '\u{1f}';

/// One column of a table.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Column {
    pub(crate) name: &'static str,
    pub(crate) kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

/// A row type stored in its own table.
pub(crate) trait Record:
    Sized + Send + Unpin + for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, PgRow>
{
    /// Table name.
    const TABLE: &'static str;
    /// Human-readable entity kind, for errors and logs.
    const KIND: &'static str;
    /// Every column, in bind order.
    const COLUMNS: &'static [Column];
    /// Primary key columns; also the listing order.
    const KEY: &'static [&'static str];
    /// Columns worth a secondary index.
    const INDEXES: &'static [&'static str];

    /// Values for [`Record::COLUMNS`], in order.
    fn params(&self) -> Vec<Param>;

    /// Primary key as one string, for collapsing duplicates in a batch.
    fn key(&self) -> String;

    /// Reject malformed identifiers before anything is written.
    fn validate(&self) -> Result<(), DbError>;
}

/// Comma-separated column names of `R`.
pub(crate) fn column_list(columns: &[Column]) -> String {
    columns
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Fail unless `value` is a valid identifier.
pub(crate) fn check_id(field: &'static str, value: &str) -> Result<(), DbError> {
    if is_valid_id(value) {
        Ok(())
    } else {
        Err(DbError::InvalidId {
            field,
            value: value.to_owned(),
        })
    }
}

/// Fail unless `value` is absent or a valid identifier.
pub(crate) fn check_opt_id(field: &'static str, value: Option<&String>) -> Result<(), DbError> {
    value.map_or(Ok(()), |v| check_id(field, v))
}

/// Fail unless `value` is a valid symbolic name.
pub(crate) fn check_name(field: &'static str, value: &str) -> Result<(), DbError> {
    if is_valid_name(value) {
        Ok(())
    } else {
        Err(DbError::InvalidId {
            field,
            value: value.to_owned(),
        })
    }
}

/// Fail unless `value` is absent or a valid symbolic name.
pub(crate) fn check_opt_name(field: &'static str, value: Option<&String>) -> Result<(), DbError> {
    value.map_or(Ok(()), |v| check_name(field, v))
}

/// Validate a relation key according to its [`KeyKind`].
pub(crate) fn check_key(kind: KeyKind, field: &'static str, value: &str) -> Result<(), DbError> {
    match kind {
        KeyKind::Id => check_id(field, value),
        KeyKind::Name => check_name(field, value),
    }
}

fn text(value: &str) -> Param {
    Param::Text(value.to_owned())
}

fn opt(value: Option<&String>) -> Param {
    Param::OptText(value.cloned())
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

impl Record for Area {
    const TABLE: &'static str = "areas";
    const KIND: &'static str = "area";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("government_id", ColumnKind::OptText),
        col("biome", ColumnKind::Text),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &["government_id"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            opt(self.government_id.as_ref()),
            text(&self.biome),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("area id", &self.id)?;
        check_opt_id("government_id", self.government_id.as_ref())
    }
}

impl Record for Faction {
    const TABLE: &'static str = "factions";
    const KIND: &'static str = "faction";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("name", ColumnKind::Text),
        col("home_area_id", ColumnKind::OptText),
        col("government_id", ColumnKind::OptText),
        col("parent_faction_id", ColumnKind::OptText),
        col("religion_id", ColumnKind::OptText),
        col("is_covert", ColumnKind::Bool),
        col("is_government", ColumnKind::Bool),
        col("is_religion", ColumnKind::Bool),
        col("wealth", ColumnKind::Int),
        col("cohesion", ColumnKind::Int),
        col("corruption", ColumnKind::Int),
        col("members", ColumnKind::Int),
        col("tick_created", ColumnKind::Int),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &["government_id", "religion_id"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            text(&self.name),
            opt(self.home_area_id.as_ref()),
            opt(self.government_id.as_ref()),
            opt(self.parent_faction_id.as_ref()),
            opt(self.religion_id.as_ref()),
            Param::Bool(self.is_covert),
            Param::Bool(self.is_government),
            Param::Bool(self.is_religion),
            Param::Int(self.wealth),
            Param::Int(self.cohesion),
            Param::Int(self.corruption),
            Param::Int(self.members),
            Param::Int(self.tick_created),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("faction id", &self.id)?;
        check_opt_id("home_area_id", self.home_area_id.as_ref())?;
        check_opt_id("government_id", self.government_id.as_ref())?;
        check_opt_id("parent_faction_id", self.parent_faction_id.as_ref())?;
        check_opt_id("religion_id", self.religion_id.as_ref())
    }
}

impl Record for Person {
    const TABLE: &'static str = "people";
    const KIND: &'static str = "person";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("first_name", ColumnKind::Text),
        col("last_name", ColumnKind::Text),
        col("area_id", ColumnKind::Text),
        col("job_id", ColumnKind::OptText),
        col("birth_family_id", ColumnKind::OptText),
        col("preferred_profession", ColumnKind::OptText),
        col("preferred_faction_id", ColumnKind::OptText),
        col("birth_tick", ColumnKind::Int),
        col("death_tick", ColumnKind::Int),
        col("death_reason", ColumnKind::OptText),
        col("is_male", ColumnKind::Bool),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &["area_id", "job_id", "birth_family_id"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            text(&self.first_name),
            text(&self.last_name),
            text(&self.area_id),
            opt(self.job_id.as_ref()),
            opt(self.birth_family_id.as_ref()),
            opt(self.preferred_profession.as_ref()),
            opt(self.preferred_faction_id.as_ref()),
            Param::Int(self.birth_tick),
            Param::Int(self.death_tick),
            opt(self.death_reason.as_ref()),
            Param::Bool(self.is_male),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("person id", &self.id)?;
        check_id("area_id", &self.area_id)?;
        check_opt_id("job_id", self.job_id.as_ref())?;
        check_opt_id("birth_family_id", self.birth_family_id.as_ref())?;
        check_opt_name("preferred_profession", self.preferred_profession.as_ref())?;
        check_opt_id("preferred_faction_id", self.preferred_faction_id.as_ref())
    }
}

impl Record for Family {
    const TABLE: &'static str = "families";
    const KIND: &'static str = "family";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("area_id", ColumnKind::Text),
        col("faction_id", ColumnKind::OptText),
        col("male_id", ColumnKind::Text),
        col("female_id", ColumnKind::Text),
        col("is_child_bearing", ColumnKind::Bool),
        col("max_child_bearing_tick", ColumnKind::Int),
        col("pregnancy_end", ColumnKind::Int),
        col("number_of_children", ColumnKind::Int),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &["area_id", "faction_id"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            text(&self.area_id),
            opt(self.faction_id.as_ref()),
            text(&self.male_id),
            text(&self.female_id),
            Param::Bool(self.is_child_bearing),
            Param::Int(self.max_child_bearing_tick),
            Param::Int(self.pregnancy_end),
            Param::Int(self.number_of_children),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("family id", &self.id)?;
        check_id("area_id", &self.area_id)?;
        check_opt_id("faction_id", self.faction_id.as_ref())?;
        check_id("male_id", &self.male_id)?;
        check_id("female_id", &self.female_id)
    }
}

impl Record for Government {
    const TABLE: &'static str = "governments";
    const KIND: &'static str = "government";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("tax_rate", ColumnKind::Real),
        col("tax_frequency", ColumnKind::Int),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &[];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            Param::Real(self.tax_rate),
            Param::Int(self.tax_frequency),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("government id", &self.id)?;
        for (kind, subject) in self.outlawed.entries() {
            match kind {
                LawKind::Faction | LawKind::Religion => check_id("outlawed faction", subject)?,
                LawKind::Action | LawKind::Commodity | LawKind::Research => {
                    check_name("outlawed name", subject)?;
                }
            }
        }
        Ok(())
    }
}

/// One denormalised entry of a government's laws.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub(crate) struct LawRow {
    pub(crate) government_id: String,
    #[sqlx(try_from = "String")]
    pub(crate) kind: LawKind,
    pub(crate) subject: String,
}

impl LawRow {
    /// Flatten a government's laws into rows.
    pub(crate) fn from_government(government: &Government) -> Vec<Self> {
        government
            .outlawed
            .entries()
            .into_iter()
            .map(|(kind, subject)| Self {
                government_id: government.id.clone(),
                kind,
                subject: subject.to_owned(),
            })
            .collect()
    }
}

impl Record for LawRow {
    const TABLE: &'static str = "laws";
    const KIND: &'static str = "law";
    const COLUMNS: &'static [Column] = &[
        col("government_id", ColumnKind::Text),
        col("kind", ColumnKind::Text),
        col("subject", ColumnKind::Text),
    ];
    const KEY: &'static [&'static str] = &["government_id", "kind", "subject"];
    const INDEXES: &'static [&'static str] = &[];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.government_id),
            text(self.kind.as_str()),
            text(&self.subject),
        ]
    }

    fn key(&self) -> String {
        format!(
            "{}{KEY_SEPARATOR}{}{KEY_SEPARATOR}{}",
            self.government_id,
            self.kind.as_str(),
            self.subject
        )
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("government_id", &self.government_id)
    }
}

impl Record for Job {
    const TABLE: &'static str = "jobs";
    const KIND: &'static str = "job";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("parent_job_id", ColumnKind::OptText),
        col("source_faction_id", ColumnKind::Text),
        col("source_area_id", ColumnKind::Text),
        col("action", ColumnKind::Text),
        col("target_faction_id", ColumnKind::OptText),
        col("target_area_id", ColumnKind::Text),
        col("target_meta_key", ColumnKind::OptText),
        col("target_meta_val", ColumnKind::OptText),
        col("people_min", ColumnKind::Int),
        col("people_max", ColumnKind::Int),
        col("tick_created", ColumnKind::Int),
        col("tick_starts", ColumnKind::Int),
        col("tick_ends", ColumnKind::Int),
        col("secrecy", ColumnKind::Int),
        col("is_illegal", ColumnKind::Bool),
        col("state", ColumnKind::Text),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &["source_faction_id", "target_area_id", "state"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            opt(self.parent_job_id.as_ref()),
            text(&self.source_faction_id),
            text(&self.source_area_id),
            text(&self.action),
            opt(self.target_faction_id.as_ref()),
            text(&self.target_area_id),
            opt(self.target_meta_key.as_ref()),
            opt(self.target_meta_val.as_ref()),
            Param::Int(self.people_min),
            Param::Int(self.people_max),
            Param::Int(self.tick_created),
            Param::Int(self.tick_starts),
            Param::Int(self.tick_ends),
            Param::Int(self.secrecy),
            Param::Bool(self.is_illegal),
            text(self.state.as_str()),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("job id", &self.id)?;
        check_opt_id("parent_job_id", self.parent_job_id.as_ref())?;
        check_id("source_faction_id", &self.source_faction_id)?;
        check_id("source_area_id", &self.source_area_id)?;
        check_name("action", &self.action)?;
        check_opt_id("target_faction_id", self.target_faction_id.as_ref())?;
        check_id("target_area_id", &self.target_area_id)
    }
}

impl Record for Plot {
    const TABLE: &'static str = "plots";
    const KIND: &'static str = "plot";
    const COLUMNS: &'static [Column] = &[
        col("id", ColumnKind::Text),
        col("area_id", ColumnKind::Text),
        col("owner_faction_id", ColumnKind::OptText),
        col("commodity", ColumnKind::OptText),
        col("crop_yield", ColumnKind::Int),
        col("size", ColumnKind::Int),
        col("is_headquarters", ColumnKind::Bool),
    ];
    const KEY: &'static [&'static str] = &["id"];
    const INDEXES: &'static [&'static str] = &["area_id", "owner_faction_id"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.id),
            text(&self.area_id),
            opt(self.owner_faction_id.as_ref()),
            opt(self.commodity.as_ref()),
            Param::Int(self.crop_yield),
            Param::Int(self.size),
            Param::Bool(self.is_headquarters),
        ]
    }

    fn key(&self) -> String {
        self.id.clone()
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("plot id", &self.id)?;
        check_id("area_id", &self.area_id)?;
        check_opt_id("owner_faction_id", self.owner_faction_id.as_ref())?;
        check_opt_name("commodity", self.commodity.as_ref())
    }
}

impl Record for Route {
    const TABLE: &'static str = "routes";
    const KIND: &'static str = "route";
    const COLUMNS: &'static [Column] = &[
        col("source_area_id", ColumnKind::Text),
        col("target_area_id", ColumnKind::Text),
        col("travel_time", ColumnKind::Int),
    ];
    const KEY: &'static [&'static str] = &["source_area_id", "target_area_id"];
    const INDEXES: &'static [&'static str] = &["target_area_id"];

    fn params(&self) -> Vec<Param> {
        vec![
            text(&self.source_area_id),
            text(&self.target_area_id),
            Param::Int(self.travel_time),
        ]
    }

    fn key(&self) -> String {
        format!("{}{KEY_SEPARATOR}{}", self.source_area_id, self.target_area_id)
    }

    fn validate(&self) -> Result<(), DbError> {
        check_id("source_area_id", &self.source_area_id)?;
        check_id("target_area_id", &self.target_area_id)
    }
}

#[cfg(test)]
mod tests {
    use polity_types::{JobState, Laws, new_id};

    use super::*;

    fn area(id: &str) -> Area {
        Area {
            id: id.to_owned(),
            government_id: None,
            biome: String::from("steppe"),
        }
    }

    #[test]
    fn params_match_columns() {
        let a = area(&new_id());
        assert_eq!(a.params().len(), Area::COLUMNS.len());

        let job = Job {
            id: new_id(),
            parent_job_id: None,
            source_faction_id: new_id(),
            source_area_id: new_id(),
            action: String::from("raid"),
            target_faction_id: None,
            target_area_id: new_id(),
            target_meta_key: None,
            target_meta_val: None,
            people_min: 1,
            people_max: 5,
            tick_created: 0,
            tick_starts: 1,
            tick_ends: 9,
            secrecy: 0,
            is_illegal: false,
            state: JobState::Pending,
        };
        assert_eq!(job.params().len(), Job::COLUMNS.len());
        assert!(job.validate().is_ok());
    }

    #[test]
    fn rejects_bad_ids() {
        let err = area("area-1").validate().err();
        assert!(matches!(err, Some(DbError::InvalidId { field: "area id", .. })));

        let mut bad_ref = area(&new_id());
        bad_ref.government_id = Some(String::from("nope"));
        assert!(bad_ref.validate().is_err());
    }

    #[test]
    fn government_laws_are_validated() {
        let mut laws = Laws::default();
        laws.actions.insert(String::from("Smuggle!"));
        let government = Government {
            id: new_id(),
            tax_rate: 0.1,
            tax_frequency: 30,
            outlawed: laws,
        };
        assert!(government.validate().is_err());
    }

    #[test]
    fn law_rows_flatten_government() {
        let mut laws = Laws::default();
        laws.research.insert(String::from("gunpowder"));
        laws.factions.insert(new_id());
        let government = Government {
            id: new_id(),
            tax_rate: 0.2,
            tax_frequency: 10,
            outlawed: laws,
        };
        let rows = LawRow::from_government(&government);
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.government_id == government.id));
    }

    #[test]
    fn route_key_joins_both_ends() {
        let route = Route {
            source_area_id: String::from("a"),
            target_area_id: String::from("b"),
            travel_time: 3,
        };
        assert_eq!(route.key(), "a\u{1f}b");
    }
}
