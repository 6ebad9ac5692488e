//! Generated DDL.
//!
//! The schema is derived from the [`Record`] column lists and the
//! [`Relation`] registry rather than kept in migration files, so adding a
//! relation only means adding a variant. Every statement is idempotent
//! (`IF NOT EXISTS`), which keeps re-running it on an up-to-date database
//! harmless.

use polity_types::{Area, Faction, Family, Government, Job, Person, Plot, Relation, Route};

use crate::dialect::{ColumnKind, Dialect};
use crate::record::{Column, LawRow, Record};

/// Newest schema version this build writes and understands.
pub const SCHEMA_VERSION: i64 = 1;

/// `meta` key holding the schema version.
pub(crate) const SCHEMA_VERSION_KEY: &str = "schema_version";

/// Columns of every `tuples_<relation>` table.
pub(crate) const TUPLE_COLUMNS: &[Column] = &[
    Column {
        name: "subject",
        kind: ColumnKind::Text,
    },
    Column {
        name: "object",
        kind: ColumnKind::Text,
    },
    Column {
        name: "value",
        kind: ColumnKind::Int,
    },
];

/// Columns of every `modifiers_<relation>` table, excluding `seq`.
pub(crate) const MODIFIER_COLUMNS: &[Column] = &[
    Column {
        name: "subject",
        kind: ColumnKind::Text,
    },
    Column {
        name: "object",
        kind: ColumnKind::Text,
    },
    Column {
        name: "value",
        kind: ColumnKind::Int,
    },
    Column {
        name: "tick_expires",
        kind: ColumnKind::Int,
    },
    Column {
        name: "meta_key",
        kind: ColumnKind::Text,
    },
    Column {
        name: "meta_val",
        kind: ColumnKind::Text,
    },
    Column {
        name: "meta_reason",
        kind: ColumnKind::Text,
    },
];

/// Every DDL statement for `dialect`, in execution order.
pub(crate) fn statements(dialect: Dialect) -> Vec<String> {
    let mut out = vec![String::from(
        "CREATE TABLE IF NOT EXISTS meta (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    )];

    entity::<Area>(dialect, &mut out);
    entity::<Faction>(dialect, &mut out);
    entity::<Person>(dialect, &mut out);
    entity::<Family>(dialect, &mut out);
    entity::<Government>(dialect, &mut out);
    entity::<LawRow>(dialect, &mut out);
    entity::<Job>(dialect, &mut out);
    entity::<Plot>(dialect, &mut out);
    entity::<Route>(dialect, &mut out);

    for relation in Relation::ALL {
        relation_tables(dialect, relation, &mut out);
    }
    out
}

fn column_defs(dialect: Dialect, columns: &[Column]) -> Vec<String> {
    columns
        .iter()
        .map(|c| format!("{} {}", c.name, dialect.column_type(c.kind)))
        .collect()
}

fn entity<R: Record>(dialect: Dialect, out: &mut Vec<String>) {
    let mut defs = column_defs(dialect, R::COLUMNS);
    defs.push(format!("PRIMARY KEY ({})", R::KEY.join(", ")));
    out.push(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        R::TABLE,
        defs.join(", ")
    ));
    for column in R::INDEXES {
        out.push(format!(
            "CREATE INDEX IF NOT EXISTS idx_{table}_{column} ON {table} ({column})",
            table = R::TABLE
        ));
    }
}

fn relation_tables(dialect: Dialect, relation: Relation, out: &mut Vec<String>) {
    let tuples = relation.tuples_table();
    let mut defs = column_defs(dialect, TUPLE_COLUMNS);
    defs.push(String::from("PRIMARY KEY (subject, object)"));
    out.push(format!(
        "CREATE TABLE IF NOT EXISTS {tuples} ({})",
        defs.join(", ")
    ));
    out.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{tuples}_object ON {tuples} (object)"
    ));

    if !relation.supports_modifiers() {
        return;
    }
    let modifiers = relation.modifiers_table();
    let mut defs = vec![dialect.seq_column().to_owned()];
    defs.extend(column_defs(dialect, MODIFIER_COLUMNS));
    out.push(format!(
        "CREATE TABLE IF NOT EXISTS {modifiers} ({})",
        defs.join(", ")
    ));
    out.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{modifiers}_pair ON {modifiers} (subject, object)"
    ));
    out.push(format!(
        "CREATE INDEX IF NOT EXISTS idx_{modifiers}_expires ON {modifiers} (tick_expires)"
    ));
}
