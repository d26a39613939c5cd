//! In-memory snapshot cache for instant reads on the request path.
//!
//! The refresher replaces a key's whole match list once per cycle; readers
//! get a shared handle to whichever complete list was current when they
//! looked. Nothing is ever evicted.
//!
//! The set of keys is closed (every sport, live and scheduled), so each key
//! gets its own lock up front. Writers to different keys never contend and
//! a write only holds its lock long enough to swap one `Arc`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::sports::{Match, Sport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CacheKey {
    pub sport: Sport,
    pub live: bool,
}

impl CacheKey {
    pub fn new(sport: Sport, live: bool) -> Self {
        CacheKey { sport, live }
    }

    /// Every (sport, liveness) pair, live first within each sport.
    pub fn all() -> Vec<CacheKey> {
        Sport::ALL
            .iter()
            .flat_map(|&sport| [CacheKey::new(sport, true), CacheKey::new(sport, false)])
            .collect()
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.live {
            write!(f, "{}/live", self.sport)
        } else {
            write!(f, "{}/all", self.sport)
        }
    }
}

/// One published match list. Cloning shares the list.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub matches: Arc<[Match]>,
    pub refreshed_at: DateTime<Utc>,
}

/// Thread-safe match cache keyed by sport and liveness.
#[derive(Clone)]
pub struct MatchCache {
    slots: Arc<HashMap<CacheKey, RwLock<Option<Snapshot>>>>,
}

impl MatchCache {
    pub fn new() -> Self {
        let slots = CacheKey::all()
            .into_iter()
            .map(|key| (key, RwLock::new(None)))
            .collect();
        MatchCache {
            slots: Arc::new(slots),
        }
    }

    /// Latest snapshot for the key, or `None` if nothing was ever published.
    /// An empty list is a valid snapshot and is returned as `Some`.
    pub async fn get(&self, sport: Sport, live: bool) -> Option<Snapshot> {
        let slot = self.slots.get(&CacheKey::new(sport, live))?;
        slot.read().await.clone()
    }

    /// Replace the whole list for one key.
    pub async fn put(&self, sport: Sport, live: bool, matches: Vec<Match>) {
        let key = CacheKey::new(sport, live);
        let snapshot = Snapshot {
            matches: matches.into(),
            refreshed_at: Utc::now(),
        };
        let count = snapshot.matches.len();
        if let Some(slot) = self.slots.get(&key) {
            *slot.write().await = Some(snapshot);
            debug!("MatchCache: {} now holds {} matches", key, count);
        }
    }

    /// Keys that have been published at least once, with their snapshot.
    pub async fn populated(&self) -> Vec<(CacheKey, Snapshot)> {
        let mut out = Vec::new();
        for key in CacheKey::all() {
            if let Some(slot) = self.slots.get(&key) {
                if let Some(snapshot) = slot.read().await.clone() {
                    out.push((key, snapshot));
                }
            }
        }
        out
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sports::models::{Score, Team};

    fn make_match(sport: Sport, home: &str, away: &str) -> Match {
        Match {
            sport,
            home: Team { name: home.into() },
            away: Team { name: away.into() },
            score: Score {
                home: vec!["6".into()],
                away: vec!["4".into()],
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_all_keys_cover_every_pair() {
        let keys = CacheKey::all();
        assert_eq!(keys.len(), Sport::ALL.len() * 2);
        assert!(keys.contains(&CacheKey::new(Sport::Basketball, false)));
        assert_eq!(CacheKey::new(Sport::Tennis, true).to_string(), "tennis/live");
    }

    #[tokio::test]
    async fn test_unknown_key_is_not_found() {
        let cache = MatchCache::new();
        assert!(cache.get(Sport::Basketball, false).await.is_none());
    }

    #[tokio::test]
    async fn test_empty_list_is_found() {
        let cache = MatchCache::new();
        cache.put(Sport::Basketball, false, vec![]).await;
        let snap = cache.get(Sport::Basketball, false).await.expect("published");
        assert!(snap.matches.is_empty());
    }

    #[tokio::test]
    async fn test_put_replaces_whole_list() {
        let cache = MatchCache::new();
        cache
            .put(
                Sport::Tennis,
                true,
                vec![
                    make_match(Sport::Tennis, "Nadal", "Federer"),
                    make_match(Sport::Tennis, "Murray", "Djokovic"),
                ],
            )
            .await;
        cache
            .put(Sport::Tennis, true, vec![make_match(Sport::Tennis, "Swiatek", "Gauff")])
            .await;

        let snap = cache.get(Sport::Tennis, true).await.unwrap();
        assert_eq!(snap.matches.len(), 1);
        assert_eq!(snap.matches[0].home.name, "Swiatek");
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let cache = MatchCache::new();
        cache
            .put(Sport::Tennis, false, vec![make_match(Sport::Tennis, "A", "B")])
            .await;
        cache
            .put(Sport::Basketball, true, vec![make_match(Sport::Basketball, "C", "D")])
            .await;

        cache
            .put(Sport::Tennis, true, vec![make_match(Sport::Tennis, "E", "F")])
            .await;

        let tennis_all = cache.get(Sport::Tennis, false).await.unwrap();
        assert_eq!(tennis_all.matches[0].home.name, "A");
        let basketball_live = cache.get(Sport::Basketball, true).await.unwrap();
        assert_eq!(basketball_live.matches[0].home.name, "C");
        assert!(cache.get(Sport::Basketball, false).await.is_none());
    }

    #[tokio::test]
    async fn test_reader_keeps_old_snapshot_after_put() {
        let cache = MatchCache::new();
        cache
            .put(Sport::Tennis, true, vec![make_match(Sport::Tennis, "Old", "Old")])
            .await;
        let held = cache.get(Sport::Tennis, true).await.unwrap();

        cache
            .put(Sport::Tennis, true, vec![make_match(Sport::Tennis, "New", "New")])
            .await;

        assert_eq!(held.matches[0].home.name, "Old");
        assert_eq!(cache.get(Sport::Tennis, true).await.unwrap().matches[0].home.name, "New");
    }

    #[tokio::test]
    async fn test_populated_lists_only_published_keys() {
        let cache = MatchCache::new();
        assert!(cache.populated().await.is_empty());
        cache.put(Sport::Basketball, true, vec![]).await;
        let populated = cache.populated().await;
        assert_eq!(populated.len(), 1);
        assert_eq!(populated[0].0, CacheKey::new(Sport::Basketball, true));
    }

    /// Writers alternate between two lists whose every entry is tagged with
    /// the list's generation; readers must never see two generations at once.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_readers_never_see_torn_lists() {
        let cache = MatchCache::new();
        let batch = |generation: usize, len: usize| -> Vec<Match> {
            (0..len)
                .map(|i| make_match(Sport::Tennis, &format!("gen{}", generation), &i.to_string()))
                .collect()
        };
        cache.put(Sport::Tennis, true, batch(0, 3)).await;

        let writer = {
            let cache = cache.clone();
            tokio::spawn(async move {
                for generation in 1..500usize {
                    let len = if generation % 2 == 0 { 3 } else { 7 };
                    cache.put(Sport::Tennis, true, batch(generation, len)).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    for _ in 0..2000 {
                        let snap = cache.get(Sport::Tennis, true).await.unwrap();
                        let generation = &snap.matches[0].home.name;
                        assert!(snap.matches.iter().all(|m| &m.home.name == generation));
                        let expected_len = match generation.trim_start_matches("gen").parse::<usize>() {
                            Ok(g) if g % 2 == 1 => 7,
                            _ => 3,
                        };
                        assert_eq!(snap.matches.len(), expected_len);
                        for (i, m) in snap.matches.iter().enumerate() {
                            assert_eq!(m.away.name, i.to_string());
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for r in readers {
            r.await.unwrap();
        }
    }
}
