//! Batched background writer.
//!
//! High-volume producers (population generators, relation churn) hand rows
//! to a [`PumpHandle`] instead of writing them one transaction at a time. A
//! single worker task owns the buffers and writes them in bulk:
//!
//! ```text
//! producers --> [people] [families] [tuples] [modifiers]   (bounded mpsc)
//!                          |
//!                       worker  <-- interval tick, shutdown signal
//!                          |
//!                   one transaction per flushed buffer
//! ```
//!
//! A buffer flushes as soon as it holds `flush_threshold` items, and every
//! non-empty buffer flushes on each interval tick. [`Pump::close`] drains
//! whatever is still queued, flushes it, and waits for the worker to exit.

use std::collections::BTreeMap;
use std::time::Duration;

use polity_types::{Family, Modifier, Person, Relation, Tuple};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::DbError;
use crate::store::Store;
use crate::transaction::Transaction;

/// Tuning for a [`Pump`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PumpConfig {
    /// Buffer length that triggers an immediate flush.
    pub flush_threshold: usize,
    /// Time between timed flushes of every non-empty buffer.
    pub flush_interval: Duration,
    /// Capacity of each input queue. Enqueueing waits while a queue is full.
    pub queue_capacity: usize,
    /// Capacity of the error channel.
    pub error_capacity: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            flush_threshold: 1000,
            flush_interval: Duration::from_secs(10),
            queue_capacity: 2048,
            error_capacity: 64,
        }
    }
}

/// What a pump did over its lifetime, returned by [`Pump::close`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Committed flushes.
    pub flushes: u64,
    /// Items written by committed flushes.
    pub items: u64,
    /// Flushes that failed and were rolled back.
    pub failures: u64,
}

/// Cloneable producer side of a [`Pump`].
#[derive(Debug, Clone)]
pub struct PumpHandle {
    people: mpsc::Sender<Person>,
    families: mpsc::Sender<Family>,
    tuples: mpsc::Sender<(Relation, Tuple)>,
    modifiers: mpsc::Sender<(Relation, Modifier)>,
}

impl PumpHandle {
    /// Queue people for upsert.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PumpClosed`] once the worker has stopped.
    pub async fn set_people(&self, people: impl IntoIterator<Item = Person>) -> Result<(), DbError> {
        for person in people {
            if self.people.send(person).await.is_err() {
                return Err(DbError::PumpClosed);
            }
        }
        Ok(())
    }

    /// Queue families for upsert.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PumpClosed`] once the worker has stopped.
    pub async fn set_families(
        &self,
        families: impl IntoIterator<Item = Family>,
    ) -> Result<(), DbError> {
        for family in families {
            if self.families.send(family).await.is_err() {
                return Err(DbError::PumpClosed);
            }
        }
        Ok(())
    }

    /// Queue tuples of `relation` for upsert.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PumpClosed`] once the worker has stopped.
    pub async fn set_tuples(
        &self,
        relation: Relation,
        tuples: impl IntoIterator<Item = Tuple>,
    ) -> Result<(), DbError> {
        for tuple in tuples {
            if self.tuples.send((relation, tuple)).await.is_err() {
                return Err(DbError::PumpClosed);
            }
        }
        Ok(())
    }

    /// Queue modifiers of `relation` for insertion.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Capability`] without queueing anything if
    /// `relation` takes no modifiers, or [`DbError::PumpClosed`] once the
    /// worker has stopped.
    pub async fn set_modifiers(
        &self,
        relation: Relation,
        modifiers: impl IntoIterator<Item = Modifier>,
    ) -> Result<(), DbError> {
        if !relation.supports_modifiers() {
            return Err(DbError::Capability(relation));
        }
        for modifier in modifiers {
            if self.modifiers.send((relation, modifier)).await.is_err() {
                return Err(DbError::PumpClosed);
            }
        }
        Ok(())
    }
}

/// A running batched writer.
#[derive(Debug)]
pub struct Pump {
    handle: PumpHandle,
    shutdown: oneshot::Sender<()>,
    worker: JoinHandle<PumpStats>,
    errors: Option<mpsc::Receiver<DbError>>,
}

impl Pump {
    /// Start the worker on the current tokio runtime.
    ///
    /// Each flush opens its own transaction on `store`. An in-memory store
    /// has a single connection, so there a flush waits until any
    /// [`crate::Transaction`] the caller holds is committed or dropped, and
    /// fails with a backend error if that takes longer than the store's
    /// connect timeout.
    pub fn spawn(store: Store, config: &PumpConfig) -> Self {
        let capacity = config.queue_capacity.max(1);
        let (people_tx, people_rx) = mpsc::channel(capacity);
        let (families_tx, families_rx) = mpsc::channel(capacity);
        let (tuples_tx, tuples_rx) = mpsc::channel(capacity);
        let (modifiers_tx, modifiers_rx) = mpsc::channel(capacity);
        let (errors_tx, errors_rx) = mpsc::channel(config.error_capacity.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = Worker {
            store,
            threshold: config.flush_threshold.max(1),
            people: Vec::new(),
            families: Vec::new(),
            tuples: BTreeMap::new(),
            modifiers: BTreeMap::new(),
            errors: errors_tx,
            stats: PumpStats::default(),
        };
        let queues = Queues {
            people: people_rx,
            families: families_rx,
            tuples: tuples_rx,
            modifiers: modifiers_rx,
        };
        let interval = config.flush_interval.max(Duration::from_millis(1));
        let worker = tokio::spawn(worker.run(queues, shutdown_rx, interval));

        tracing::info!(
            flush_threshold = config.flush_threshold,
            flush_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            queue_capacity = capacity,
            "Pump started"
        );

        Self {
            handle: PumpHandle {
                people: people_tx,
                families: families_tx,
                tuples: tuples_tx,
                modifiers: modifiers_tx,
            },
            shutdown: shutdown_tx,
            worker,
            errors: Some(errors_rx),
        }
    }

    /// A producer handle. Clone it freely.
    pub fn handle(&self) -> PumpHandle {
        self.handle.clone()
    }

    /// Take the receiving end of the error channel. Returns `None` after
    /// the first call.
    ///
    /// The owner must keep draining it: the worker waits when it is full.
    pub const fn take_errors(&mut self) -> Option<mpsc::Receiver<DbError>> {
        self.errors.take()
    }

    /// Stop accepting work, flush everything still queued, and wait for the
    /// worker to finish.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::PumpClosed`] if the worker task panicked.
    pub async fn close(self) -> Result<PumpStats, DbError> {
        let Self {
            handle,
            shutdown,
            worker,
            errors,
        } = self;
        drop(handle);
        // An untaken receiver is dropped so final flush failures are logged.
        drop(errors);
        if shutdown.send(()).is_err() {
            tracing::debug!("Pump worker already stopped");
        }
        match worker.await {
            Ok(stats) => {
                tracing::info!(
                    flushes = stats.flushes,
                    items = stats.items,
                    failures = stats.failures,
                    "Pump closed"
                );
                Ok(stats)
            }
            Err(err) => {
                tracing::error!(error = %err, "Pump worker did not finish cleanly");
                Err(DbError::PumpClosed)
            }
        }
    }
}

struct Queues {
    people: mpsc::Receiver<Person>,
    families: mpsc::Receiver<Family>,
    tuples: mpsc::Receiver<(Relation, Tuple)>,
    modifiers: mpsc::Receiver<(Relation, Modifier)>,
}

impl Queues {
    fn close(&mut self) {
        self.people.close();
        self.families.close();
        self.tuples.close();
        self.modifiers.close();
    }
}

/// Rows written together in one flush.
enum Batch {
    People(Vec<Person>),
    Families(Vec<Family>),
    Tuples(Relation, Vec<Tuple>),
    Modifiers(Relation, Vec<Modifier>),
}

impl Batch {
    const fn len(&self) -> usize {
        match self {
            Self::People(rows) => rows.len(),
            Self::Families(rows) => rows.len(),
            Self::Tuples(_, rows) => rows.len(),
            Self::Modifiers(_, rows) => rows.len(),
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::People(_) => "people",
            Self::Families(_) => "families",
            Self::Tuples(..) => "tuples",
            Self::Modifiers(..) => "modifiers",
        }
    }

    async fn write(&self, tx: &mut Transaction) -> Result<u64, DbError> {
        match self {
            Self::People(rows) => tx.set_people(rows).await,
            Self::Families(rows) => tx.set_families(rows).await,
            Self::Tuples(relation, rows) => tx.set_tuples(*relation, rows).await,
            Self::Modifiers(relation, rows) => tx.set_modifiers(*relation, rows).await,
        }
    }
}

struct Worker {
    store: Store,
    threshold: usize,
    people: Vec<Person>,
    families: Vec<Family>,
    tuples: BTreeMap<Relation, Vec<Tuple>>,
    modifiers: BTreeMap<Relation, Vec<Modifier>>,
    errors: mpsc::Sender<DbError>,
    stats: PumpStats,
}

impl Worker {
    async fn run(
        mut self,
        mut queues: Queues,
        mut shutdown: oneshot::Receiver<()>,
        interval: Duration,
    ) -> PumpStats {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                Some(person) = queues.people.recv() => {
                    self.people.push(person);
                    if self.people.len() >= self.threshold {
                        self.flush_people().await;
                    }
                }
                Some(family) = queues.families.recv() => {
                    self.families.push(family);
                    if self.families.len() >= self.threshold {
                        self.flush_families().await;
                    }
                }
                Some((relation, tuple)) = queues.tuples.recv() => {
                    let buffer = self.tuples.entry(relation).or_default();
                    buffer.push(tuple);
                    if buffer.len() >= self.threshold {
                        self.flush_tuples(relation).await;
                    }
                }
                Some((relation, modifier)) = queues.modifiers.recv() => {
                    let buffer = self.modifiers.entry(relation).or_default();
                    buffer.push(modifier);
                    if buffer.len() >= self.threshold {
                        self.flush_modifiers(relation).await;
                    }
                }
                _ = ticker.tick() => self.flush_all().await,
                _ = &mut shutdown => break,
            }
        }

        queues.close();
        while let Some(person) = queues.people.recv().await {
            self.people.push(person);
        }
        while let Some(family) = queues.families.recv().await {
            self.families.push(family);
        }
        while let Some((relation, tuple)) = queues.tuples.recv().await {
            self.tuples.entry(relation).or_default().push(tuple);
        }
        while let Some((relation, modifier)) = queues.modifiers.recv().await {
            self.modifiers.entry(relation).or_default().push(modifier);
        }
        self.threshold = 1;
        self.flush_all().await;
        self.stats
    }

    async fn flush_all(&mut self) {
        self.flush_people().await;
        self.flush_families().await;
        let relations: Vec<Relation> = self.tuples.keys().copied().collect();
        for relation in relations {
            self.flush_tuples(relation).await;
        }
        let relations: Vec<Relation> = self.modifiers.keys().copied().collect();
        for relation in relations {
            self.flush_modifiers(relation).await;
        }
    }

    async fn flush_people(&mut self) {
        let rows = std::mem::take(&mut self.people);
        self.flush(Batch::People(rows)).await;
    }

    async fn flush_families(&mut self) {
        let rows = std::mem::take(&mut self.families);
        self.flush(Batch::Families(rows)).await;
    }

    async fn flush_tuples(&mut self, relation: Relation) {
        let rows = self.tuples.remove(&relation).unwrap_or_default();
        self.flush(Batch::Tuples(relation, rows)).await;
    }

    async fn flush_modifiers(&mut self, relation: Relation) {
        let rows = self.modifiers.remove(&relation).unwrap_or_default();
        self.flush(Batch::Modifiers(relation, rows)).await;
    }

    async fn flush(&mut self, batch: Batch) {
        let count = batch.len();
        if count == 0 {
            return;
        }
        let kind = batch.kind();
        let result = self
            .store
            .in_transaction(move |tx| Box::pin(async move { batch.write(tx).await }))
            .await;
        match result {
            Ok(_) => {
                self.stats.flushes = self.stats.flushes.saturating_add(1);
                self.stats.items = self
                    .stats
                    .items
                    .saturating_add(u64::try_from(count).unwrap_or(u64::MAX));
                tracing::debug!(kind, count, "Pump flushed");
            }
            Err(err) => {
                self.stats.failures = self.stats.failures.saturating_add(1);
                if let Err(mpsc::error::SendError(err)) = self.errors.send(err).await {
                    tracing::error!(kind, count, error = %err, "Pump flush failed");
                }
            }
        }
    }
}
