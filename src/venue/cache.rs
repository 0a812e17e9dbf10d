//! TTL caches used inside venue drivers
//!
//! Balance and position reads are served from a short cache so the trading
//! loop and the drawdown monitor can both poll without hammering the venue.
//! Every successful order placement invalidates both caches on its driver.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Single cached value with an expiry
#[derive(Debug)]
pub struct TtlCell<T> {
    slot: RwLock<Option<(T, Instant)>>,
    ttl: Duration,
}

impl<T: Clone> TtlCell<T> {
    /// Empty cell with the given lifetime
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    /// Value if present and fresh
    pub async fn get(&self) -> Option<T> {
        let guard = self.slot.read().await;
        match guard.as_ref() {
            Some((value, stored)) if stored.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Store a fresh value
    pub async fn put(&self, value: T) {
        *self.slot.write().await = Some((value, Instant::now()));
    }

    /// Drop whatever is cached
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

/// Keyed TTL map (per-symbol precision, contract metadata)
#[derive(Debug)]
pub struct TtlMap<V> {
    entries: RwLock<HashMap<String, (V, Instant)>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    /// Empty map with the given per-entry lifetime
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Value for a key if present and fresh
    pub async fn get(&self, key: &str) -> Option<V> {
        let guard = self.entries.read().await;
        match guard.get(key) {
            Some((value, stored)) if stored.elapsed() < self.ttl => Some(value.clone()),
            _ => None,
        }
    }

    /// Store a value for a key
    pub async fn put(&self, key: &str, value: V) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, Instant::now()));
    }
}
