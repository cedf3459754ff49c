//! In-process LRU cache with per-entry TTL.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::recency::RecencyList;
use super::service::CacheService;
use crate::error::ConfigError;

#[derive(Debug)]
struct CacheEntry {
    key: String,
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct CacheState {
    index: HashMap<String, usize>,
    order: RecencyList<CacheEntry>,
}

impl CacheState {
    fn remove_at(&mut self, idx: usize) -> Option<CacheEntry> {
        let entry = self.order.remove(idx)?;
        self.index.remove(&entry.key);
        Some(entry)
    }
}

/// Bounded in-process cache combining LRU eviction with a sliding TTL.
///
/// - A successful [`LocalCache::get_entry`] refreshes the entry's TTL and makes it
///   the most recently used entry.
/// - Inserting a new key while full evicts the least recently used entry.
/// - Expired entries are dropped lazily on read and actively by
///   [`LocalCache::clean_up`].
///
/// A single mutex guards the index and the recency order; `get` mutates both,
/// so reads take the lock exclusively too.
#[derive(Debug)]
pub struct LocalCache {
    state: Mutex<CacheState>,
    max_entries: usize,
    ttl: Duration,
}

impl LocalCache {
    /// Creates a cache holding at most `max_entries` entries, each living
    /// `ttl` after its last touch.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if `max_entries <= 1`
    /// or `ttl` is zero.
    pub fn new(max_entries: usize, ttl: Duration) -> Result<Self, ConfigError> {
        if max_entries <= 1 {
            return Err(ConfigError::invalid(format!(
                "local cache max entries must be greater than 1, got {}",
                max_entries
            )));
        }
        if ttl.is_zero() {
            return Err(ConfigError::invalid("local cache TTL must be positive"));
        }

        Ok(Self {
            state: Mutex::new(CacheState {
                index: HashMap::with_capacity(max_entries),
                order: RecencyList::with_capacity(max_entries),
            }),
            max_entries,
            ttl,
        })
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.state.lock().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Looks up `key`, promoting it and refreshing its TTL on a live hit.
    pub fn get_entry(&self, key: &str) -> Option<String> {
        self.get_entry_at(key, Instant::now())
    }

    fn get_entry_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut state = self.state.lock();

        let idx = *state.index.get(key)?;
        let expired = state.order.get(idx).is_none_or(|e| e.is_expired(now));
        if expired {
            state.remove_at(idx);
            debug!("Local cache entry expired on read: {}", key);
            return None;
        }

        state.order.move_to_front(idx);
        let entry = state.order.get_mut(idx)?;
        entry.expires_at = now + self.ttl;
        Some(entry.value.clone())
    }

    /// Inserts or replaces `key`, making it the most recently used entry.
    pub fn set_entry(&self, key: &str, value: &str) {
        self.set_entry_at(key, value, Instant::now())
    }

    fn set_entry_at(&self, key: &str, value: &str, now: Instant) {
        let mut state = self.state.lock();

        if let Some(&idx) = state.index.get(key) {
            state.order.move_to_front(idx);
            if let Some(entry) = state.order.get_mut(idx) {
                entry.value = value.to_owned();
                entry.expires_at = now + self.ttl;
            }
            return;
        }

        if state.index.len() >= self.max_entries
            && let Some(evicted) = state.order.pop_back()
        {
            state.index.remove(&evicted.key);
            debug!("Local cache evicted least recently used: {}", evicted.key);
        }

        let idx = state.order.push_front(CacheEntry {
            key: key.to_owned(),
            value: value.to_owned(),
            expires_at: now + self.ttl,
        });
        state.index.insert(key.to_owned(), idx);
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn clean_up(&self) -> usize {
        self.clean_up_at(Instant::now())
    }

    fn clean_up_at(&self, now: Instant) -> usize {
        let mut state = self.state.lock();

        let expired: Vec<usize> = state
            .order
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(idx, _)| idx)
            .collect();

        let removed = expired
            .into_iter()
            .filter_map(|idx| state.remove_at(idx))
            .count();

        if removed > 0 {
            info!("Local cache: removed {} expired entries during cleanup", removed);
        } else {
            debug!("Local cache: no entries were removed");
        }

        removed
    }

    /// Keys ordered from most to least recently used.
    pub fn keys(&self) -> Vec<String> {
        let state = self.state.lock();
        state.order.iter().map(|(_, e)| e.key.clone()).collect()
    }

    /// Checks that the recency chain and the key index describe exactly the
    /// same set of live entries.
    pub fn is_consistent(&self) -> bool {
        let state = self.state.lock();
        if !state.order.is_consistent() || state.order.len() != state.index.len() {
            return false;
        }
        if state.index.len() > self.max_entries {
            return false;
        }

        state
            .order
            .iter()
            .all(|(idx, entry)| state.index.get(&entry.key) == Some(&idx))
    }

    /// Spawns a task running [`Self::clean_up`] every `interval` until
    /// `shutdown` is cancelled.
    pub fn spawn_cleanup(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache = Arc::clone(self);

        tokio::spawn(async move {
            info!("Local cache cleanup started (interval: {:?})", interval);
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = cache.clean_up();
                        metrics::counter!("local_cache_expired_total").increment(removed as u64);
                    }
                }
            }

            info!("Local cache cleanup stopped");
        })
    }
}

#[async_trait]
impl CacheService for LocalCache {
    async fn get(&self, short_url: &str) -> Option<String> {
        self.get_entry(short_url)
    }

    async fn set(&self, short_url: &str, long_url: &str) {
        self.set_entry(short_url, long_url)
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
