//! Time-to-live cache for retrieved market data
//!
//! Expiry is passive: a lookup treats an entry whose age has reached its TTL
//! as absent. [`TtlCache::spawn_sweeper`] optionally reclaims the memory held
//! by expired entries.

use crate::clock::SharedClock;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

pub fn fundamentals_key(symbol: &str) -> String {
    format!("fundamentals_{}", symbol)
}

/// Option chains are cached per requested expiry; an unspecified expiry has its own key
pub fn options_key(symbol: &str, expiration: Option<i64>) -> String {
    match expiration {
        Some(expiry) => format!("options_{}_{}", symbol, expiry),
        None => format!("options_{}_default", symbol),
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        // A clock that moved backwards yields a negative age, which never expires
        match (now - self.inserted_at).to_std() {
            Ok(age) => age >= self.ttl,
            Err(_) => false,
        }
    }
}

/// TTLs for the two caches and the sweep period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub fundamentals_ttl: Duration,
    pub options_ttl: Duration,
    /// Zero disables the background sweep
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fundamentals_ttl: Duration::from_secs(120),
            options_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<&config::CacheSettings> for CacheConfig {
    fn from(settings: &config::CacheSettings) -> Self {
        Self {
            fundamentals_ttl: Duration::from_secs(settings.fundamentals_ttl_seconds),
            options_ttl: Duration::from_secs(settings.options_ttl_seconds),
            sweep_interval: Duration::from_secs(settings.sweep_interval_seconds),
        }
    }
}

#[derive(Debug)]
pub struct TtlCache<V> {
    name: &'static str,
    ttl: Duration,
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    clock: SharedClock,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &'static str, ttl: Duration, clock: SharedClock) -> Self {
        Self {
            name,
            ttl,
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.get_entry(key).map(|entry| entry.value)
    }

    /// Live entry for `key`, including its insertion time
    pub fn get_entry(&self, key: &str) -> Option<CacheEntry<V>> {
        let now = self.clock.now();
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.clone()),
            _ => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        let entry = CacheEntry {
            value,
            inserted_at: self.clock.now(),
            ttl: self.ttl,
        };
        self.entries.write().insert(key.into(), entry);
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.entries.write().remove(key).map(|entry| entry.value)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - entries.len();

        if purged > 0 {
            debug!(cache = self.name, purged, remaining = entries.len(), "Purged expired entries");
        }
        purged
    }

    /// Number of stored entries, expired or not
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    /// Periodically purge expired entries until the cache is dropped.
    ///
    /// Returns `None` when `period` is zero.
    pub fn spawn_sweeper(self: &Arc<Self>, period: Duration) -> Option<JoinHandle<()>> {
        if period.is_zero() {
            return None;
        }

        let cache: Weak<Self> = Arc::downgrade(self);
        let name = self.name;

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match cache.upgrade() {
                    Some(cache) => {
                        cache.purge_expired();
                    }
                    None => {
                        debug!(cache = name, "Cache dropped, stopping sweeper");
                        break;
                    }
                }
            }
        }))
    }
}
