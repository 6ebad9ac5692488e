//! Behaviour tests for the relation store against embedded `SQLite`.
//!
//! Every test opens its own in-memory store, so they need no services and
//! run with a plain `cargo test -p polity-db`.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::collections::BTreeSet;
use std::time::Duration;

use polity_db::{
    AreaFilter, DbError, FactionFilter, ModifierFilter, PersonFilter, Pump, PumpConfig,
    StoreConfig, Store, TupleFilter, first_page,
};
use polity_types::{
    Area, Faction, MAX_VALUE, MIN_VALUE, Modifier, Person, Relation, Tuple, new_id,
};
use tracing_subscriber::EnvFilter;

const TRUST: Relation = Relation::TrustPersonToPerson;

// =============================================================================
// Helpers
// =============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn store() -> Store {
    init_tracing();
    Store::memory().await.expect("in-memory store")
}

fn area() -> Area {
    Area {
        id: new_id(),
        government_id: None,
        biome: String::from("plains"),
    }
}

fn faction(members: i64, is_covert: bool, is_religion: bool) -> Faction {
    Faction {
        id: new_id(),
        name: String::from("guild"),
        home_area_id: None,
        government_id: None,
        parent_faction_id: None,
        religion_id: None,
        is_covert,
        is_government: false,
        is_religion,
        wealth: 0,
        cohesion: 0,
        corruption: 0,
        members,
        tick_created: 0,
    }
}

fn person(area_id: &str) -> Person {
    Person {
        id: new_id(),
        first_name: String::from("Tam"),
        last_name: String::from("Reed"),
        area_id: area_id.to_owned(),
        job_id: None,
        birth_family_id: None,
        preferred_profession: None,
        preferred_faction_id: None,
        birth_tick: 0,
        death_tick: 0,
        death_reason: None,
        is_male: true,
    }
}

async fn read_pair(store: &Store, subject: &str, object: &str) -> Option<i64> {
    let mut tx = store.begin().await.unwrap();
    let (rows, _) = tx
        .tuples(TRUST, "", &[TupleFilter::pair(subject, object)])
        .await
        .unwrap();
    rows.first().map(|t| t.value)
}

async fn effective(store: &Store, subject: &str, object: &str, tick: i64) -> Option<i64> {
    let mut tx = store.begin().await.unwrap();
    let (rows, _) = tx
        .compute_tuples(TRUST, "", tick, &[TupleFilter::pair(subject, object)])
        .await
        .unwrap();
    rows.first().map(|t| t.value)
}

// =============================================================================
// End-to-end
// =============================================================================

#[tokio::test]
async fn set_then_increment_then_clamp() {
    let store = store().await;
    let (p1, p2) = (new_id(), new_id());
    let pair = [TupleFilter::pair(&p1, &p2)];

    let mut tx = store.begin().await.unwrap();
    tx.set_tuples(TRUST, &[Tuple::new(&p1, &p2, 10)])
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.incr_tuples(TRUST, 10, &pair).await.unwrap(), 1);
    tx.commit().await.unwrap();
    assert_eq!(read_pair(&store, &p1, &p2).await, Some(20));

    let mut tx = store.begin().await.unwrap();
    tx.incr_tuples(TRUST, -100, &pair).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(read_pair(&store, &p1, &p2).await, Some(-80));

    let mut tx = store.begin().await.unwrap();
    tx.incr_tuples(TRUST, -100 * 200, &pair).await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(read_pair(&store, &p1, &p2).await, Some(MIN_VALUE));
}

// =============================================================================
// Clamping
// =============================================================================

#[tokio::test]
async fn every_write_path_clamps() {
    let store = store().await;
    let (a, b, c) = (new_id(), new_id(), new_id());
    let mut tx = store.begin().await.unwrap();

    tx.set_tuples(
        TRUST,
        &[Tuple::new(&a, &b, 99_999), Tuple::new(&a, &c, -99_999)],
    )
    .await
    .unwrap();
    let (rows, _) = tx.tuples(TRUST, "", &[TupleFilter::subject(&a)]).await.unwrap();
    assert!(rows.iter().all(|t| (MIN_VALUE..=MAX_VALUE).contains(&t.value)));

    tx.incr_tuples(TRUST, 5, &[TupleFilter::pair(&a, &b)])
        .await
        .unwrap();
    let (rows, _) = tx.tuples(TRUST, "", &[TupleFilter::pair(&a, &b)]).await.unwrap();
    assert_eq!(rows[0].value, MAX_VALUE);

    tx.set_modifiers(TRUST, &[Modifier::new(&a, &b, -50_000, 100)])
        .await
        .unwrap();
    let (mods, _) = tx.modifiers(TRUST, "", &[]).await.unwrap();
    assert_eq!(mods[0].value, MIN_VALUE);

    tx.incr_modifiers(TRUST, i64::MAX, &[ModifierFilter::pair(&a, &b)])
        .await
        .unwrap();
    let (mods, _) = tx.modifiers(TRUST, "", &[]).await.unwrap();
    assert_eq!(mods[0].value, MAX_VALUE);
}

#[tokio::test]
async fn decayed_sum_is_not_clamped() {
    let store = store().await;
    let (a, b) = (new_id(), new_id());
    let mut tx = store.begin().await.unwrap();
    tx.set_tuples(TRUST, &[Tuple::new(&a, &b, MAX_VALUE)])
        .await
        .unwrap();
    tx.set_modifiers(TRUST, &[Modifier::new(&a, &b, 5_000, 10)])
        .await
        .unwrap();
    tx.commit().await.unwrap();
    assert_eq!(effective(&store, &a, &b, 0).await, Some(MAX_VALUE + 5_000));
}

// =============================================================================
// Decay
// =============================================================================

#[tokio::test]
async fn modifiers_fall_away_as_ticks_pass() {
    let store = store().await;
    let (a, b) = (new_id(), new_id());
    let (v, x, y, z) = (100, 10, 20, 30);

    let mut tx = store.begin().await.unwrap();
    tx.set_tuples(TRUST, &[Tuple::new(&a, &b, v)]).await.unwrap();
    tx.set_modifiers(
        TRUST,
        &[
            Modifier::new(&a, &b, x, 10),
            Modifier::new(&a, &b, y, 12),
            Modifier::new(&a, &b, z, 15),
        ],
    )
    .await
    .unwrap();
    tx.commit().await.unwrap();

    assert_eq!(effective(&store, &a, &b, 5).await, Some(v + x + y + z));
    assert_eq!(effective(&store, &a, &b, 11).await, Some(v + y + z));
    assert_eq!(effective(&store, &a, &b, 13).await, Some(v + z));
    assert_eq!(effective(&store, &a, &b, 16).await, Some(v));

    // Purging is invisible to reads.
    let mut tx = store.begin().await.unwrap();
    assert_eq!(tx.delete_modifiers(TRUST, 13).await.unwrap(), 2);
    tx.commit().await.unwrap();
    assert_eq!(effective(&store, &a, &b, 13).await, Some(v + z));
    assert_eq!(effective(&store, &a, &b, 16).await, Some(v));
}

#[tokio::test]
async fn non_capable_relation_computes_base_tuples() {
    let store = store().await;
    let rank = Relation::RankPersonToFaction;
    let (p, f) = (new_id(), new_id());
    let mut tx = store.begin().await.unwrap();
    tx.set_tuples(rank, &[Tuple::new(&p, &f, 3_000)]).await.unwrap();
    let (base, _) = tx.tuples(rank, "", &[]).await.unwrap();
    let (computed, _) = tx.compute_tuples(rank, "", 99, &[]).await.unwrap();
    assert_eq!(base, computed);
}

// =============================================================================
// Capability
// =============================================================================

#[tokio::test]
async fn capability_errors_write_nothing() {
    let store = store().await;
    let rank = Relation::RankPersonToFaction;
    let (p, f) = (new_id(), new_id());
    let mut tx = store.begin().await.unwrap();
    tx.set_tuples(rank, &[Tuple::new(&p, &f, 1)]).await.unwrap();

    let err = tx
        .set_modifiers(rank, &[Modifier::new(&p, &f, 50, 10)])
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Capability(Relation::RankPersonToFaction)));
    assert!(err.is_validation());
    assert!(matches!(
        tx.incr_modifiers(rank, 1, &[ModifierFilter::pair(&p, &f)]).await,
        Err(DbError::Capability(_))
    ));
    assert!(matches!(
        tx.modifiers(rank, "", &[]).await,
        Err(DbError::Capability(_))
    ));

    // No SQL ran, so the transaction is still healthy and unchanged.
    let (rows, _) = tx.compute_tuples(rank, "", 0, &[]).await.unwrap();
    assert_eq!(rows, vec![Tuple::new(&p, &f, 1)]);
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn invalid_ids_fail_the_whole_batch() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    let good = Tuple::new(new_id(), new_id(), 1);
    let bad = Tuple::new("p1", new_id(), 1);
    let err = tx.set_tuples(TRUST, &[good, bad]).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidId { field: "subject", .. }));
    let (rows, _) = tx.tuples(TRUST, "", &[]).await.unwrap();
    assert!(rows.is_empty());
}

// =============================================================================
// Pagination
// =============================================================================

async fn drain_areas(store: &Store, page_size: u64) -> (Vec<Area>, usize) {
    let mut tx = store.begin().await.unwrap();
    let mut token = first_page(page_size).unwrap();
    let mut seen = Vec::new();
    let mut calls = 0;
    loop {
        let (page, next) = tx.areas(&token, &[]).await.unwrap();
        calls += 1;
        assert!(page.len() <= usize::try_from(page_size).unwrap());
        seen.extend(page);
        if next.is_empty() {
            break;
        }
        token = next;
    }
    (seen, calls)
}

#[tokio::test]
async fn pagination_visits_every_row_once() {
    let store = store().await;
    let areas: Vec<Area> = (0..23).map(|_| area()).collect();
    let mut tx = store.begin().await.unwrap();
    tx.set_areas(&areas).await.unwrap();
    tx.commit().await.unwrap();

    let (seen, calls) = drain_areas(&store, 5).await;
    assert_eq!(calls, 5);
    let ids: BTreeSet<String> = seen.iter().map(|a| a.id.clone()).collect();
    assert_eq!(ids.len(), 23);
    assert_eq!(
        ids,
        areas.iter().map(|a| a.id.clone()).collect::<BTreeSet<_>>()
    );

    // Ordered by primary key.
    let ordered: Vec<String> = seen.iter().map(|a| a.id.clone()).collect();
    let mut sorted = ordered.clone();
    sorted.sort();
    assert_eq!(ordered, sorted);
}

#[tokio::test]
async fn exact_multiple_needs_no_extra_call() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    tx.set_areas(&(0..10).map(|_| area()).collect::<Vec<_>>())
        .await
        .unwrap();
    tx.commit().await.unwrap();
    let (seen, calls) = drain_areas(&store, 5).await;
    assert_eq!((seen.len(), calls), (10, 2));
}

#[tokio::test]
async fn empty_table_takes_one_call() {
    let store = store().await;
    let (seen, calls) = drain_areas(&store, 5).await;
    assert_eq!((seen.len(), calls), (0, 1));
}

#[tokio::test]
async fn bad_tokens_are_rejected() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    let err = tx.areas("%%%", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::InvalidToken(_)));
}

#[tokio::test]
async fn configured_page_size_applies_to_empty_token() {
    init_tracing();
    let config = StoreConfig {
        page_size: 4,
        ..StoreConfig::default()
    };
    let store = Store::open(&config).await.unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.set_areas(&(0..6).map(|_| area()).collect::<Vec<_>>())
        .await
        .unwrap();
    let (first, next) = tx.areas("", &[]).await.unwrap();
    assert_eq!(first.len(), 4);
    let (rest, last) = tx.areas(&next, &[]).await.unwrap();
    assert_eq!(rest.len(), 2);
    assert!(last.is_empty());
}

/// Read every page of `$fetch`, starting from a `$page_size` token, and
/// return the rows plus the number of calls it took.
macro_rules! drain_pages {
    ($page_size:expr, |$token:ident| $fetch:expr) => {{
        let mut $token = first_page($page_size).unwrap();
        let mut rows = Vec::new();
        let mut calls = 0_usize;
        loop {
            let (page, next) = $fetch.await.unwrap();
            calls += 1;
            assert!(page.len() <= usize::try_from($page_size).unwrap());
            rows.extend(page);
            if next.is_empty() {
                break;
            }
            $token = next;
        }
        (rows, calls)
    }};
}

fn pairs_of(rows: &[Tuple]) -> BTreeSet<(String, String)> {
    rows.iter()
        .map(|t| (t.subject.clone(), t.object.clone()))
        .collect()
}

#[tokio::test]
async fn decayed_and_modifier_reads_page_without_gaps() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    let pairs: Vec<(String, String)> = (0..11).map(|_| (new_id(), new_id())).collect();
    let base: Vec<Tuple> = pairs
        .iter()
        .map(|(s, o)| Tuple::new(s, o, 9_000))
        .collect();
    tx.set_tuples(TRUST, &base).await.unwrap();
    let modifiers: Vec<Modifier> = pairs
        .iter()
        .flat_map(|(s, o)| {
            [
                Modifier::new(s, o, -1, 20),
                Modifier::new(s, o, -1, 20),
                // Already expired at tick 5.
                Modifier::new(s, o, 500, 3),
            ]
        })
        .collect();
    tx.set_modifiers(TRUST, &modifiers).await.unwrap();
    let expected = pairs.iter().cloned().collect::<BTreeSet<_>>();

    let (computed, calls) = drain_pages!(3, |token| tx.compute_tuples(TRUST, &token, 5, &[]));
    assert_eq!(calls, 4);
    assert_eq!(computed.len(), 11);
    assert_eq!(pairs_of(&computed), expected);
    assert!(computed.iter().all(|t| t.value == 8_998));

    let (summed, calls) = drain_pages!(3, |token| tx.modifiers_sum(TRUST, &token, &[]));
    assert_eq!(calls, 4);
    assert_eq!(pairs_of(&summed), expected);
    assert!(summed.iter().all(|t| t.value == 498));

    let active = [ModifierFilter::default().active_at(5)];
    let (summed, _) = drain_pages!(3, |token| tx.modifiers_sum(TRUST, &token, &active));
    assert_eq!(summed.len(), 11);
    assert!(summed.iter().all(|t| t.value == -2));

    // 33 rows at 3 per page end on a full page with no trailing call.
    let (listed, calls) = drain_pages!(3, |token| tx.modifiers(TRUST, &token, &[]));
    assert_eq!(calls, 11);
    assert_eq!(listed, modifiers);
}

#[tokio::test]
async fn filtered_decay_pages_see_effective_values() {
    let store = store().await;
    let mut tx = store.begin().await.unwrap();
    let subject = new_id();
    let objects: Vec<String> = (0..10).map(|_| new_id()).collect();
    let base: Vec<Tuple> = objects
        .iter()
        .map(|o| Tuple::new(&subject, o, 100))
        .collect();
    tx.set_tuples(TRUST, &base).await.unwrap();
    // Half the objects get pushed over the threshold while the modifier lasts.
    let boosts: Vec<Modifier> = objects
        .iter()
        .step_by(2)
        .map(|o| Modifier::new(&subject, o, 1_000, 10))
        .collect();
    tx.set_modifiers(TRUST, &boosts).await.unwrap();
    let strong = [TupleFilter {
        subjects: vec![subject.clone()],
        value_above: Some(500),
        ..TupleFilter::default()
    }];

    let (rows, calls) = drain_pages!(2, |token| tx.compute_tuples(TRUST, &token, 4, &strong));
    assert_eq!((rows.len(), calls), (5, 3));
    assert!(rows.iter().all(|t| t.value == 1_100));
    let boosted: BTreeSet<String> = objects.iter().step_by(2).cloned().collect();
    assert_eq!(
        rows.iter().map(|t| t.object.clone()).collect::<BTreeSet<_>>(),
        boosted
    );

    let (rows, calls) = drain_pages!(2, |token| tx.compute_tuples(TRUST, &token, 10, &strong));
    assert_eq!((rows.len(), calls), (0, 1));
}

// =============================================================================
// Filter algebra
// =============================================================================

#[tokio::test]
async fn or_across_filters_and_within_filter() {
    let store = store().await;
    let big_covert = faction(500, true, false);
    let big_open = faction(500, false, false);
    let small_covert = faction(5, true, false);
    let church = faction(50, false, true);
    let mut tx = store.begin().await.unwrap();
    tx.set_factions(&[
        big_covert.clone(),
        big_open.clone(),
        small_covert.clone(),
        church.clone(),
    ])
    .await
    .unwrap();

    let ids = |rows: Vec<Faction>| rows.into_iter().map(|f| f.id).collect::<BTreeSet<_>>();

    // AND within: covert and large.
    let both = FactionFilter {
        is_covert: Some(true),
        members_above: Some(100),
        ..FactionFilter::default()
    };
    let (rows, _) = tx.factions("", &[both.clone()]).await.unwrap();
    assert_eq!(ids(rows), BTreeSet::from([big_covert.id.clone()]));

    // OR across: the above, or any religion.
    let religion = FactionFilter {
        is_religion: Some(true),
        ..FactionFilter::default()
    };
    let (rows, _) = tx.factions("", &[both, religion]).await.unwrap();
    assert_eq!(
        ids(rows),
        BTreeSet::from([big_covert.id.clone(), church.id.clone()])
    );

    // IN over ids.
    let (rows, _) = tx
        .factions("", &[FactionFilter::ids(&[small_covert.id.clone(), big_open.id.clone()])])
        .await
        .unwrap();
    assert_eq!(ids(rows), BTreeSet::from([small_covert.id, big_open.id]));

    // An empty id list leaves the field unconstrained.
    let (rows, _) = tx.factions("", &[FactionFilter::ids(&[])]).await.unwrap();
    assert_eq!(rows.len(), 4);
}

#[tokio::test]
async fn alive_filter_uses_death_tick() {
    let store = store().await;
    let home = new_id();
    let living = person(&home);
    let mut dead = person(&home);
    dead.death_tick = 40;
    dead.death_reason = Some(String::from("plague"));

    let mut tx = store.begin().await.unwrap();
    tx.set_people(&[living.clone(), dead.clone()]).await.unwrap();
    let alive = PersonFilter {
        alive: Some(true),
        ..PersonFilter::default()
    };
    let (rows, _) = tx.people("", &[alive]).await.unwrap();
    assert_eq!(rows, vec![living]);
    assert_eq!(tx.person(&dead.id).await.unwrap(), dead);
}

#[tokio::test]
async fn area_filters_match_optional_columns() {
    let store = store().await;
    let government = new_id();
    let mut governed = area();
    governed.government_id = Some(government.clone());
    let mut tx = store.begin().await.unwrap();
    tx.set_areas(&[governed.clone(), area()]).await.unwrap();
    let by_government = AreaFilter {
        government_id: Some(government),
        ..AreaFilter::default()
    };
    let (rows, _) = tx.areas("", &[by_government]).await.unwrap();
    assert_eq!(rows, vec![governed]);
}

// =============================================================================
// Atomicity
// =============================================================================

#[tokio::test]
async fn in_transaction_commits_or_rolls_back_as_a_unit() {
    let store = store().await;
    let (a, b, c) = (new_id(), new_id(), new_id());

    let failed: Result<(), DbError> = store
        .in_transaction(|tx| {
            let (a, b, c) = (a.clone(), b.clone(), c.clone());
            Box::pin(async move {
                tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 1)]).await?;
                tx.set_tuples(TRUST, &[Tuple::new(&a, "bogus", 1)]).await?;
                tx.set_tuples(TRUST, &[Tuple::new(&a, &c, 1)]).await?;
                Ok(())
            })
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(read_pair(&store, &a, &b).await, None);

    let written = store
        .in_transaction(|tx| {
            let (a, b, c) = (a.clone(), b.clone(), c.clone());
            Box::pin(async move {
                let first = tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 1)]).await?;
                let second = tx.set_tuples(TRUST, &[Tuple::new(&a, &c, 2)]).await?;
                Ok::<_, DbError>(first + second)
            })
        })
        .await
        .unwrap();
    assert_eq!(written, 2);
    assert_eq!(read_pair(&store, &a, &b).await, Some(1));
    assert_eq!(read_pair(&store, &a, &c).await, Some(2));
}

#[tokio::test]
async fn dropped_transaction_rolls_back() {
    let store = store().await;
    let (a, b) = (new_id(), new_id());
    {
        let mut tx = store.begin().await.unwrap();
        tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 9)]).await.unwrap();
    }
    assert_eq!(read_pair(&store, &a, &b).await, None);
}

// =============================================================================
// Pump
// =============================================================================

async fn count_people(store: &Store) -> usize {
    let mut tx = store.begin().await.unwrap();
    let (rows, _) = tx.people(&first_page(1000).unwrap(), &[]).await.unwrap();
    rows.len()
}

#[tokio::test]
async fn pump_flushes_at_threshold_without_timer() {
    let store = store().await;
    let config = PumpConfig {
        flush_threshold: 5,
        flush_interval: Duration::from_secs(3600),
        ..PumpConfig::default()
    };
    let pump = Pump::spawn(store.clone(), &config);
    let home = new_id();
    pump.handle()
        .set_people((0..5).map(|_| person(&home)))
        .await
        .unwrap();

    let flushed = tokio::time::timeout(Duration::from_secs(5), async {
        while count_people(&store).await < 5 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(flushed.is_ok(), "threshold flush never happened");

    let stats = pump.close().await.unwrap();
    assert_eq!(stats.flushes, 1);
    assert_eq!(stats.items, 5);
}

#[tokio::test]
async fn pump_flushes_below_threshold_once_on_close() {
    let store = store().await;
    let config = PumpConfig {
        flush_threshold: 100,
        flush_interval: Duration::from_secs(3600),
        ..PumpConfig::default()
    };
    let pump = Pump::spawn(store.clone(), &config);
    let home = new_id();
    let handle = pump.handle();
    handle
        .set_people((0..7).map(|_| person(&home)))
        .await
        .unwrap();
    let (a, b) = (new_id(), new_id());
    handle
        .set_modifiers(TRUST, [Modifier::new(&a, &b, 3, 50)])
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count_people(&store).await, 0);

    let stats = pump.close().await.unwrap();
    assert_eq!(stats.flushes, 2);
    assert_eq!(stats.items, 8);
    assert_eq!(count_people(&store).await, 7);
    assert_eq!(effective(&store, &a, &b, 0).await, Some(3));
}

#[tokio::test]
async fn pump_timer_flushes_partial_buffers() {
    let store = store().await;
    let config = PumpConfig {
        flush_threshold: 1000,
        flush_interval: Duration::from_millis(20),
        ..PumpConfig::default()
    };
    let pump = Pump::spawn(store.clone(), &config);
    let (a, b) = (new_id(), new_id());
    pump.handle()
        .set_tuples(TRUST, [Tuple::new(&a, &b, 42)])
        .await
        .unwrap();

    let flushed = tokio::time::timeout(Duration::from_secs(5), async {
        while read_pair(&store, &a, &b).await.is_none() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(flushed.is_ok(), "timer flush never happened");
    pump.close().await.unwrap();
}

// =============================================================================
// Schema
// =============================================================================

#[tokio::test]
async fn file_store_survives_reopen() {
    init_tracing();
    let path = std::env::temp_dir().join(format!("polity-{}.db", new_id()));
    let url = format!("sqlite://{}", path.display());
    let (a, b) = (new_id(), new_id());

    let store = Store::sqlite(&url).await.unwrap();
    let mut tx = store.begin().await.unwrap();
    tx.set_tuples(TRUST, &[Tuple::new(&a, &b, 77)]).await.unwrap();
    tx.set_tick(12).await.unwrap();
    tx.commit().await.unwrap();
    store.close().await;

    let reopened = Store::sqlite(&url).await.unwrap();
    assert_eq!(read_pair(&reopened, &a, &b).await, Some(77));
    let mut tx = reopened.begin().await.unwrap();
    assert_eq!(tx.tick().await.unwrap(), 12);
    tx.set_meta("schema_version", "999").await.unwrap();
    tx.commit().await.unwrap();
    reopened.close().await;

    let err = Store::sqlite(&url).await.unwrap_err();
    assert!(matches!(err, DbError::SchemaVersion { found: 999, .. }));

    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
    }
}
