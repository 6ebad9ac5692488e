//! Backend-agnostic filter algebra.
//!
//! A [`Query`] is an OR of AND groups:
//!
//! ```text
//! Query = OR( AND(clause, clause, ...), AND(clause, ...), ... )
//! ```
//!
//! Each group comes from one [`Filter`] value, so all fields set on a single
//! filter must match together, while separate filters are alternatives.
//! Backends only see the rendered `WHERE` text and bound parameters.

use crate::dialect::{Param, Statement};

/// Comparison operator of a [`Clause`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `column = value`
    Equal,
    /// `column <> value`
    NotEqual,
    /// `column IN (values...)`
    In,
    /// `column > value`
    Greater,
    /// `column < value`
    Less,
}

impl Op {
    const fn sql(self) -> &'static str {
        match self {
            Self::Equal => " = ",
            Self::NotEqual => " <> ",
            Self::In => " IN ",
            Self::Greater => " > ",
            Self::Less => " < ",
        }
    }
}

/// A literal compared against a column.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// Integer.
    Int(i64),
    /// Float.
    Real(f64),
    /// Text.
    Text(String),
    /// Boolean.
    Bool(bool),
    /// A list, used with [`Op::In`].
    List(Vec<SqlValue>),
}

/// One `column op value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    /// Column name. Only filters inside this crate construct clauses, so the
    /// name is always a known column.
    pub column: &'static str,
    /// Operator.
    pub op: Op,
    /// Right-hand side.
    pub value: SqlValue,
}

impl Clause {
    /// Build a clause.
    pub const fn new(column: &'static str, op: Op, value: SqlValue) -> Self {
        Self { column, op, value }
    }

    fn render(&self, stmt: &mut Statement) {
        match &self.value {
            SqlValue::List(values) if values.is_empty() => {
                stmt.push("1 = 0");
            }
            SqlValue::List(values) => {
                stmt.push(self.column).push(self.op.sql()).push("(");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        stmt.push(", ");
                    }
                    stmt.bind(scalar_param(value));
                }
                stmt.push(")");
            }
            value => {
                stmt.push(self.column).push(self.op.sql()).bind(scalar_param(value));
            }
        }
    }
}

/// A nested list has no scalar form and binds as its debug text.
fn scalar_param(value: &SqlValue) -> Param {
    match value {
        SqlValue::Int(v) => Param::Int(*v),
        SqlValue::Real(v) => Param::Real(*v),
        SqlValue::Text(v) => Param::Text(v.clone()),
        SqlValue::Bool(v) => Param::Bool(*v),
        SqlValue::List(v) => Param::Text(format!("{v:?}")),
    }
}

/// Something that constrains rows of one table.
///
/// Unset fields contribute no clauses; a filter with no clauses matches
/// every row.
pub trait Filter {
    /// The clauses that must all hold.
    fn clauses(&self) -> Vec<Clause>;
}

/// An OR of AND groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    groups: Vec<Vec<Clause>>,
}

impl Query {
    /// A query matching every row.
    pub const fn new() -> Self {
        Self { groups: Vec::new() }
    }

    /// A query matching rows that satisfy every field of `filter`.
    pub fn filter<F: Filter + ?Sized>(filter: &F) -> Self {
        Self::new().or(filter)
    }

    /// Also match rows that satisfy every field of `filter`.
    #[must_use]
    pub fn or<F: Filter + ?Sized>(mut self, filter: &F) -> Self {
        self.groups.push(filter.clauses());
        self
    }

    /// OR together a list of filters.
    pub fn from_filters<F: Filter>(filters: &[F]) -> Self {
        filters.iter().fold(Self::new(), |query, f| query.or(f))
    }

    /// Also match rows satisfying every clause in `clauses`.
    #[must_use]
    pub fn or_clauses(mut self, clauses: Vec<Clause>) -> Self {
        self.groups.push(clauses);
        self
    }

    /// Whether the query excludes anything at all.
    ///
    /// False when there are no groups, or when any group is empty (an empty
    /// group matches every row, which makes the whole OR match every row).
    pub fn constrains(&self) -> bool {
        !self.groups.is_empty() && self.groups.iter().all(|g| !g.is_empty())
    }

    /// Drop every clause not on one of `columns`.
    ///
    /// The result matches a superset of the rows this query matches, so it
    /// can pre-filter an inner query whose other columns are computed later.
    #[must_use]
    pub(crate) fn relax_to(&self, columns: &[&str]) -> Self {
        Self {
            groups: self
                .groups
                .iter()
                .map(|g| {
                    g.iter()
                        .filter(|c| columns.contains(&c.column))
                        .cloned()
                        .collect()
                })
                .collect(),
        }
    }

    /// Append ` WHERE ...` (or nothing, when unconstrained) to `stmt`.
    pub(crate) fn render_where(&self, stmt: &mut Statement) {
        if !self.constrains() {
            return;
        }
        stmt.push(" WHERE ");
        self.render_groups(stmt);
    }

    /// Append ` AND (...)` (or nothing, when unconstrained) to `stmt`, for
    /// statements that already carry a `WHERE`.
    pub(crate) fn render_and(&self, stmt: &mut Statement) {
        if !self.constrains() {
            return;
        }
        stmt.push(" AND (");
        self.render_groups(stmt);
        stmt.push(")");
    }

    fn render_groups(&self, stmt: &mut Statement) {
        for (i, group) in self.groups.iter().enumerate() {
            if i > 0 {
                stmt.push(" OR ");
            }
            stmt.push("(");
            for (j, clause) in group.iter().enumerate() {
                if j > 0 {
                    stmt.push(" AND ");
                }
                clause.render(stmt);
            }
            stmt.push(")");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;

    struct Fields(Vec<Clause>);

    impl Filter for Fields {
        fn clauses(&self) -> Vec<Clause> {
            self.0.clone()
        }
    }

    fn eq(column: &'static str, v: i64) -> Clause {
        Clause::new(column, Op::Equal, SqlValue::Int(v))
    }

    fn rendered(query: &Query, dialect: Dialect) -> Statement {
        let mut stmt = Statement::with_sql(dialect, "SELECT * FROM t");
        query.render_where(&mut stmt);
        stmt
    }

    #[test]
    fn and_within_or_across() {
        let query = Query::filter(&Fields(vec![eq("a", 1), eq("b", 2)])).or(&Fields(vec![eq("c", 3)]));
        let stmt = rendered(&query, Dialect::Postgres);
        assert_eq!(
            stmt.sql,
            "SELECT * FROM t WHERE (a = $1 AND b = $2) OR (c = $3)"
        );
        assert_eq!(
            stmt.params,
            vec![Param::Int(1), Param::Int(2), Param::Int(3)]
        );
    }

    #[test]
    fn empty_query_renders_nothing() {
        let stmt = rendered(&Query::new(), Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT * FROM t");
        assert!(!Query::new().constrains());
    }

    #[test]
    fn empty_group_unconstrains_everything() {
        let query = Query::filter(&Fields(vec![eq("a", 1)])).or(&Fields(Vec::new()));
        assert!(!query.constrains());
        assert_eq!(rendered(&query, Dialect::Sqlite).sql, "SELECT * FROM t");
    }

    #[test]
    fn in_lists() {
        let clause = Clause::new(
            "id",
            Op::In,
            SqlValue::List(vec![SqlValue::Text("x".into()), SqlValue::Text("y".into())]),
        );
        let stmt = rendered(&Query::new().or_clauses(vec![clause]), Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE (id IN (?, ?))");

        let empty = Clause::new("id", Op::In, SqlValue::List(Vec::new()));
        let stmt = rendered(&Query::new().or_clauses(vec![empty]), Dialect::Sqlite);
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE (1 = 0)");
        assert!(stmt.params.is_empty());
    }

    #[test]
    fn relax_keeps_only_named_columns() {
        let query = Query::filter(&Fields(vec![eq("subject", 1), eq("value", 2)]));
        let relaxed = query.relax_to(&["subject", "object"]);
        assert!(relaxed.constrains());
        assert_eq!(
            rendered(&relaxed, Dialect::Postgres).sql,
            "SELECT * FROM t WHERE (subject = $1)"
        );

        let value_only = Query::filter(&Fields(vec![eq("value", 2)])).relax_to(&["subject"]);
        assert!(!value_only.constrains());
    }

    #[test]
    fn render_and_appends() {
        let mut stmt = Statement::with_sql(Dialect::Postgres, "SELECT * FROM t WHERE x > ");
        stmt.bind(Param::Int(0));
        Query::filter(&Fields(vec![eq("a", 1)])).render_and(&mut stmt);
        assert_eq!(stmt.sql, "SELECT * FROM t WHERE x > $1 AND ((a = $2))");
    }
}
