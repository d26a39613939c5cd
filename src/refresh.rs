//! Periodic fetch → normalize → publish cycles.
//!
//! Every (sport, liveness) pair is handled on its own: a failed fetch keeps
//! that pair's previous snapshot, a malformed record is dropped from its
//! batch, and neither affects any other pair. The next scheduled cycle is
//! the only retry.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{CacheKey, MatchCache};
use crate::sports::normalizer::DroppedRecord;
use crate::sports::{normalize_batch, FetchError, MatchSource};

/// Receiving side of the shutdown signal.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    /// Returns the trigger and a signal that fires once `true` is sent.
    pub fn channel() -> (watch::Sender<bool>, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (tx, Shutdown { rx })
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown is requested or the trigger is dropped.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        // An error means the sender is gone; treat that as shutdown too.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// What happened to one pair during a cycle.
#[derive(Debug)]
pub enum PairOutcome {
    Published {
        key: CacheKey,
        matches: usize,
        dropped: Vec<DroppedRecord>,
    },
    Failed {
        key: CacheKey,
        error: FetchError,
    },
}

impl PairOutcome {
    pub fn key(&self) -> CacheKey {
        match self {
            PairOutcome::Published { key, .. } | PairOutcome::Failed { key, .. } => *key,
        }
    }
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub outcomes: Vec<PairOutcome>,
}

impl CycleReport {
    /// First pair that could not be fetched, in key order.
    pub fn first_error(&self) -> Option<(CacheKey, &FetchError)> {
        self.outcomes.iter().find_map(|o| match o {
            PairOutcome::Failed { error, .. } => Some((o.key(), error)),
            PairOutcome::Published { .. } => None,
        })
    }

    pub fn published(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, PairOutcome::Published { .. }))
            .count()
    }
}

#[derive(Debug, Default)]
pub struct RefreshStats {
    cycles: AtomicU64,
    pairs_published: AtomicU64,
    fetch_failures: AtomicU64,
    records_dropped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatsView {
    pub cycles: u64,
    pub pairs_published: u64,
    pub fetch_failures: u64,
    pub records_dropped: u64,
}

impl RefreshStats {
    pub fn view(&self) -> StatsView {
        StatsView {
            cycles: self.cycles.load(Ordering::Relaxed),
            pairs_published: self.pairs_published.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
        }
    }
}

pub struct Refresher {
    source: Arc<dyn MatchSource>,
    cache: MatchCache,
    keys: Vec<CacheKey>,
    fetch_deadline: Duration,
    stats: RefreshStats,
}

impl Refresher {
    pub fn new(source: Arc<dyn MatchSource>, cache: MatchCache, fetch_deadline: Duration) -> Self {
        Refresher {
            source,
            cache,
            keys: CacheKey::all(),
            fetch_deadline,
            stats: RefreshStats::default(),
        }
    }

    pub fn stats(&self) -> StatsView {
        self.stats.view()
    }

    /// Run one full cycle over every pair. Pairs are fetched concurrently;
    /// each successful pair is published as soon as it is normalized.
    pub async fn run_once(&self, shutdown: &Shutdown) -> CycleReport {
        let cycles = self.stats.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "Refresh cycle {} started ({} pairs from {})",
            cycles,
            self.keys.len(),
            self.source.name()
        );

        let futures: Vec<_> = self
            .keys
            .iter()
            .map(|&key| self.refresh_pair(key, shutdown))
            .collect();
        let outcomes = futures_util::future::join_all(futures).await;

        let report = CycleReport { outcomes };
        info!(
            "Refresh cycle {} finished: {}/{} pairs published",
            cycles,
            report.published(),
            report.outcomes.len()
        );
        report
    }

    async fn refresh_pair(&self, key: CacheKey, shutdown: &Shutdown) -> PairOutcome {
        let raws = match self.fetch(key, shutdown).await {
            Ok(raws) => raws,
            Err(error) => {
                self.stats.fetch_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Fetching {} failed, keeping previous snapshot: {}", key, error);
                return PairOutcome::Failed { key, error };
            }
        };

        let fetched = raws.len();
        let batch = normalize_batch(key.sport, raws);
        let matches = batch.matches.len();
        self.stats
            .records_dropped
            .fetch_add(batch.dropped.len() as u64, Ordering::Relaxed);

        self.cache.put(key.sport, key.live, batch.matches).await;
        self.stats.pairs_published.fetch_add(1, Ordering::Relaxed);
        info!(
            "Updated {}: {} matches ({} fetched, {} dropped)",
            key,
            matches,
            fetched,
            batch.dropped.len()
        );

        PairOutcome::Published {
            key,
            matches,
            dropped: batch.dropped,
        }
    }

    async fn fetch(
        &self,
        key: CacheKey,
        shutdown: &Shutdown,
    ) -> Result<Vec<crate::sports::RawMatch>, FetchError> {
        if shutdown.is_triggered() {
            return Err(FetchError::Cancelled);
        }
        let request = tokio::time::timeout(
            self.fetch_deadline,
            self.source.fetch_matches(key.sport, key.live),
        );
        tokio::select! {
            res = request => match res {
                Ok(result) => result,
                Err(_) => Err(FetchError::DeadlineExceeded(self.fetch_deadline)),
            },
            _ = shutdown.triggered() => Err(FetchError::Cancelled),
        }
    }

    /// Spawn the background task that runs a cycle every `every`, starting
    /// one interval from now. Returns once `shutdown` fires.
    pub fn spawn(self: Arc<Self>, every: Duration, shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Refresher started (interval={:?})", every);
            let mut interval =
                tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.triggered() => break,
                }
                let report = self.run_once(&shutdown).await;
                if let Some((key, error)) = report.first_error() {
                    warn!("Refresh cycle incomplete, first failure {}: {}", key, error);
                }
                if shutdown.is_triggered() {
                    break;
                }
            }
            info!("Refresher stopped");
        })
    }
}
