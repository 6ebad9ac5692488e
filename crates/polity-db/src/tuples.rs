//! Relation tuples, temporary modifiers and the decay computation.
//!
//! The effective value of a (subject, object) pair at tick `T` is its base
//! tuple value plus every modifier on the pair whose `tick_expires > T`. It
//! is computed in SQL on every read and never stored, so purging expired
//! modifiers with [`Transaction::delete_modifiers`] changes storage size but
//! never a result.

use polity_types::{Modifier, Relation, Tuple, clamp, clamp_delta};

use crate::dialect::Param;
use crate::error::DbError;
use crate::filters::{ModifierFilter, TupleFilter};
use crate::query::Query;
use crate::record::{KEY_SEPARATOR, check_key, column_list};
use crate::schema::{MODIFIER_COLUMNS, TUPLE_COLUMNS};
use crate::transaction::{Transaction, last_wins};

/// Columns a decayed read can push into its inner selects.
const PAIR_COLUMNS: &[&str] = &["subject", "object"];

const PAIR_ORDER: &str = "subject, object";

/// Fail with [`DbError::Capability`] unless `relation` takes modifiers.
const fn require_modifiers(relation: Relation) -> Result<(), DbError> {
    if relation.supports_modifiers() {
        Ok(())
    } else {
        Err(DbError::Capability(relation))
    }
}

fn check_pair(relation: Relation, subject: &str, object: &str) -> Result<(), DbError> {
    check_key(relation.subject_kind(), "subject", subject)?;
    check_key(relation.object_kind(), "object", object)
}

impl Transaction {
    /// Base tuples of `relation` matching any of `filters`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn tuples(
        &mut self,
        relation: Relation,
        token: &str,
        filters: &[TupleFilter],
    ) -> Result<(Vec<Tuple>, String), DbError> {
        let mut stmt = self.statement(format!(
            "SELECT {} FROM {}",
            column_list(TUPLE_COLUMNS),
            relation.tuples_table()
        ));
        Query::from_filters(filters).render_where(&mut stmt);
        self.page(stmt, PAIR_ORDER, token).await
    }

    /// Insert or replace base tuples, clamping every value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidId`] before writing anything if any key is
    /// malformed for `relation`.
    pub async fn set_tuples(&mut self, relation: Relation, tuples: &[Tuple]) -> Result<u64, DbError> {
        for tuple in tuples {
            check_pair(relation, &tuple.subject, &tuple.object)?;
        }
        let rows = last_wins(tuples, |t| {
            format!("{}{KEY_SEPARATOR}{}", t.subject, t.object)
        });
        let count = rows.len();
        let written = self
            .write_rows(
                &relation.tuples_table(),
                TUPLE_COLUMNS,
                Some(PAIR_COLUMNS),
                rows.into_iter().map(|t| {
                    vec![
                        Param::Text(t.subject.clone()),
                        Param::Text(t.object.clone()),
                        Param::Int(clamp(t.value)),
                    ]
                }),
            )
            .await?;
        tracing::debug!(relation = %relation, count, "Set tuples");
        Ok(written)
    }

    /// Add `delta` to every matching tuple, clamping the result.
    ///
    /// An unconstrained filter set is refused with a warning and writes
    /// nothing, so a blanket increment can never happen by accident.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Backend`] if the update fails.
    pub async fn incr_tuples(
        &mut self,
        relation: Relation,
        delta: i64,
        filters: &[TupleFilter],
    ) -> Result<u64, DbError> {
        let query = Query::from_filters(filters);
        if !query.constrains() {
            tracing::warn!(relation = %relation, delta, "Refusing unfiltered tuple increment");
            return Ok(0);
        }
        let mut stmt = self.statement(format!("UPDATE {} SET value = ", relation.tuples_table()));
        stmt.push_clamped_add("value", Param::Int(clamp_delta(delta)));
        query.render_where(&mut stmt);
        let updated = self.execute(stmt).await?;
        tracing::debug!(relation = %relation, delta, updated, "Incremented tuples");
        Ok(updated)
    }

    /// Effective tuples of `relation` at `tick`: base value plus every
    /// modifier still active at `tick`.
    ///
    /// `filters` apply to the computed rows, so `value_above` and
    /// `value_below` see the effective value. Pairs that only have
    /// modifiers count their base as 0. On a relation without modifiers
    /// this is exactly [`Transaction::tuples`].
    ///
    /// # Errors
    ///
    /// Returns [`DbError::InvalidToken`] for a malformed token, or
    /// [`DbError::Backend`] if the read fails.
    pub async fn compute_tuples(
        &mut self,
        relation: Relation,
        token: &str,
        tick: i64,
        filters: &[TupleFilter],
    ) -> Result<(Vec<Tuple>, String), DbError> {
        if !relation.supports_modifiers() {
            return self.tuples(relation, token, filters).await;
        }

        let query = Query::from_filters(filters);
        let pushdown = query.relax_to(PAIR_COLUMNS);

        let mut stmt = self.statement(format!(
            "SELECT subject, object, value FROM (\
             SELECT subject, object, CAST(SUM(value) AS BIGINT) AS value FROM (\
             SELECT subject, object, value FROM {}",
            relation.tuples_table()
        ));
        pushdown.render_where(&mut stmt);
        stmt.push(" UNION ALL SELECT subject, object, value FROM ")
            .push(&relation.modifiers_table())
            .push(" WHERE tick_expires > ")
            .bind(Param::Int(tick));
        pushdown.render_and(&mut stmt);
        stmt.push(") AS parts GROUP BY subject, object) AS effective");
        query.render_where(&mut stmt);

        self.page(stmt, PAIR_ORDER, token).await
    }

    /// Modifiers of `relation` matching any of `filters`, in insertion
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Capability`] if `relation` takes no modifiers.
    pub async fn modifiers(
        &mut self,
        relation: Relation,
        token: &str,
        filters: &[ModifierFilter],
    ) -> Result<(Vec<Modifier>, String), DbError> {
        require_modifiers(relation)?;
        let mut stmt = self.statement(format!(
            "SELECT {} FROM {}",
            column_list(MODIFIER_COLUMNS),
            relation.modifiers_table()
        ));
        Query::from_filters(filters).render_where(&mut stmt);
        self.page(stmt, "seq", token).await
    }

    /// Append modifiers, clamping every value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Capability`] if `relation` takes no modifiers, or
    /// [`DbError::InvalidId`] if any key is malformed. Nothing is written in
    /// either case.
    pub async fn set_modifiers(
        &mut self,
        relation: Relation,
        modifiers: &[Modifier],
    ) -> Result<u64, DbError> {
        require_modifiers(relation)?;
        for modifier in modifiers {
            check_pair(relation, &modifier.subject, &modifier.object)?;
        }
        let written = self
            .write_rows(
                &relation.modifiers_table(),
                MODIFIER_COLUMNS,
                None,
                modifiers.iter().map(|m| {
                    vec![
                        Param::Text(m.subject.clone()),
                        Param::Text(m.object.clone()),
                        Param::Int(clamp(m.value)),
                        Param::Int(m.tick_expires),
                        Param::Text(m.meta_key.clone()),
                        Param::Text(m.meta_val.clone()),
                        Param::Text(m.meta_reason.clone()),
                    ]
                }),
            )
            .await?;
        tracing::debug!(relation = %relation, count = modifiers.len(), "Inserted modifiers");
        Ok(written)
    }

    /// Sum of matching modifier values per (subject, object).
    ///
    /// `filters` select individual modifier rows before summing; pass
    /// [`ModifierFilter::active_at`] to sum only what applies at a tick.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Capability`] if `relation` takes no modifiers.
    pub async fn modifiers_sum(
        &mut self,
        relation: Relation,
        token: &str,
        filters: &[ModifierFilter],
    ) -> Result<(Vec<Tuple>, String), DbError> {
        require_modifiers(relation)?;
        let mut stmt = self.statement(format!(
            "SELECT subject, object, CAST(SUM(value) AS BIGINT) AS value FROM {}",
            relation.modifiers_table()
        ));
        Query::from_filters(filters).render_where(&mut stmt);
        stmt.push(" GROUP BY subject, object");
        self.page(stmt, PAIR_ORDER, token).await
    }

    /// Add `delta` to every matching modifier, clamping the result.
    ///
    /// Refused with a warning when `filters` constrain nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Capability`] if `relation` takes no modifiers.
    pub async fn incr_modifiers(
        &mut self,
        relation: Relation,
        delta: i64,
        filters: &[ModifierFilter],
    ) -> Result<u64, DbError> {
        require_modifiers(relation)?;
        let query = Query::from_filters(filters);
        if !query.constrains() {
            tracing::warn!(relation = %relation, delta, "Refusing unfiltered modifier increment");
            return Ok(0);
        }
        let mut stmt = self.statement(format!(
            "UPDATE {} SET value = ",
            relation.modifiers_table()
        ));
        stmt.push_clamped_add("value", Param::Int(clamp_delta(delta)));
        query.render_where(&mut stmt);
        let updated = self.execute(stmt).await?;
        tracing::debug!(relation = %relation, delta, updated, "Incremented modifiers");
        Ok(updated)
    }

    /// Purge modifiers that are no longer active at `tick`, returning how
    /// many were removed. Running it twice for the same tick removes
    /// nothing the second time.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Capability`] if `relation` takes no modifiers.
    pub async fn delete_modifiers(&mut self, relation: Relation, tick: i64) -> Result<u64, DbError> {
        require_modifiers(relation)?;
        let mut stmt = self.statement(format!(
            "DELETE FROM {} WHERE tick_expires <= ",
            relation.modifiers_table()
        ));
        stmt.bind(Param::Int(tick));
        let deleted = self.execute(stmt).await?;
        tracing::debug!(relation = %relation, tick, deleted, "Purged expired modifiers");
        Ok(deleted)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use polity_types::{MAX_VALUE, MIN_VALUE, new_id};

    use super::*;
    use crate::store::Store;

    const TRUST: Relation = Relation::TrustPersonToPerson;

    #[tokio::test]
    async fn set_clamps_values() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b) = (new_id(), new_id());
        tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 50_000)])
            .await
            .unwrap();
        let (rows, _) = tx.tuples(TRUST, "", &[]).await.unwrap();
        assert_eq!(rows, vec![Tuple::new(&a, &b, MAX_VALUE)]);
    }

    #[tokio::test]
    async fn incr_clamps_at_both_ends() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b) = (new_id(), new_id());
        tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 0)]).await.unwrap();

        let pair = [TupleFilter::pair(&a, &b)];
        tx.incr_tuples(TRUST, i64::MAX, &pair).await.unwrap();
        let (rows, _) = tx.tuples(TRUST, "", &pair).await.unwrap();
        assert_eq!(rows.first().map(|t| t.value), Some(MAX_VALUE));

        tx.incr_tuples(TRUST, i64::MIN, &pair).await.unwrap();
        let (rows, _) = tx.tuples(TRUST, "", &pair).await.unwrap();
        assert_eq!(rows.first().map(|t| t.value), Some(MIN_VALUE));
    }

    #[tokio::test]
    async fn unfiltered_incr_is_refused() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b) = (new_id(), new_id());
        tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 5)]).await.unwrap();
        assert_eq!(tx.incr_tuples(TRUST, 10, &[]).await.unwrap(), 0);
        assert_eq!(
            tx.incr_tuples(TRUST, 10, &[TupleFilter::default()])
                .await
                .unwrap(),
            0
        );
        let (rows, _) = tx.tuples(TRUST, "", &[]).await.unwrap();
        assert_eq!(rows.first().map(|t| t.value), Some(5));
    }

    #[tokio::test]
    async fn capability_is_checked_first() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let rank = Relation::RankPersonToFaction;
        let err = tx
            .set_modifiers(rank, &[Modifier::new(new_id(), new_id(), 1, 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Capability(Relation::RankPersonToFaction)));
        assert!(tx.delete_modifiers(rank, 1).await.is_err());
        assert!(tx.modifiers_sum(rank, "", &[]).await.is_err());
    }

    #[tokio::test]
    async fn name_objects_are_validated() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let skill = Relation::SkillPersonToProfession;
        assert!(
            tx.set_tuples(skill, &[Tuple::new(new_id(), "smith", 10)])
                .await
                .is_ok()
        );
        let err = tx
            .set_tuples(skill, &[Tuple::new(new_id(), "Black Smith", 10)])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::InvalidId { field: "object", .. }));
    }

    #[tokio::test]
    async fn modifier_only_pairs_start_from_zero() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b) = (new_id(), new_id());
        tx.set_modifiers(TRUST, &[Modifier::new(&a, &b, 7, 10)])
            .await
            .unwrap();
        let (rows, _) = tx.compute_tuples(TRUST, "", 3, &[]).await.unwrap();
        assert_eq!(rows, vec![Tuple::new(&a, &b, 7)]);
        let (rows, _) = tx.compute_tuples(TRUST, "", 10, &[]).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn value_filters_see_effective_value() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b, c) = (new_id(), new_id(), new_id());
        tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 100), Tuple::new(&a, &c, 100)])
            .await
            .unwrap();
        tx.set_modifiers(TRUST, &[Modifier::new(&a, &c, 500, 10)])
            .await
            .unwrap();
        let above = [TupleFilter {
            subject: Some(a.clone()),
            value_above: Some(300),
            ..TupleFilter::default()
        }];
        let (rows, _) = tx.compute_tuples(TRUST, "", 1, &above).await.unwrap();
        assert_eq!(rows, vec![Tuple::new(&a, &c, 600)]);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b) = (new_id(), new_id());
        tx.set_modifiers(
            TRUST,
            &[
                Modifier::new(&a, &b, 1, 5),
                Modifier::new(&a, &b, 2, 6),
                Modifier::new(&a, &b, 3, 9),
            ],
        )
        .await
        .unwrap();
        assert_eq!(tx.delete_modifiers(TRUST, 6).await.unwrap(), 2);
        assert_eq!(tx.delete_modifiers(TRUST, 6).await.unwrap(), 0);
        let (left, _) = tx.modifiers(TRUST, "", &[]).await.unwrap();
        assert_eq!(left, vec![Modifier::new(&a, &b, 3, 9)]);
    }

    #[tokio::test]
    async fn modifiers_sum_groups_pairs() {
        let store = Store::memory().await.unwrap();
        let mut tx = store.begin().await.unwrap();
        let (a, b) = (new_id(), new_id());
        tx.set_modifiers(
            TRUST,
            &[
                Modifier::new(&a, &b, 4, 5),
                Modifier::new(&a, &b, 6, 20).with_meta("event", "feast", "shared a meal"),
            ],
        )
        .await
        .unwrap();
        let (all, _) = tx.modifiers_sum(TRUST, "", &[]).await.unwrap();
        assert_eq!(all, vec![Tuple::new(&a, &b, 10)]);

        let active = [ModifierFilter::pair(&a, &b).active_at(10)];
        let (later, _) = tx.modifiers_sum(TRUST, "", &active).await.unwrap();
        assert_eq!(later, vec![Tuple::new(&a, &b, 6)]);
    }
}
