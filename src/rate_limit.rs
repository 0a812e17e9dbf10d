//! Request pacing for venue drivers
//!
//! Token-bucket limiter shared by a driver instance. Buckets are keyed by
//! operation class rather than endpoint path so every venue maps onto the
//! same categories.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Operation classes with distinct venue-side budgets
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum OpClass {
    /// Order placement and cancellation
    Trading,
    /// Balance and position reads
    Account,
    /// Prices and instrument metadata
    MarketData,
    /// Trade/PnL history pulls
    History,
}

/// Token bucket for one operation class
#[derive(Debug)]
struct TokenBucket {
    capacity: u32,
    tokens: u32,
    refill_rate: u32,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, refill_rate: u32) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_rate,
            last_refill: Instant::now(),
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn time_until_token(&self) -> Duration {
        if self.tokens > 0 {
            Duration::from_secs(0)
        } else {
            Duration::from_secs_f64(1.0 / self.refill_rate as f64)
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let tokens_to_add = (elapsed.as_secs_f64() * self.refill_rate as f64) as u32;
        if tokens_to_add > 0 {
            self.tokens = (self.tokens + tokens_to_add).min(self.capacity);
            self.last_refill = now;
        }
    }
}

/// Per-driver request pacer
#[derive(Debug, Clone)]
pub struct RequestPacer {
    buckets: Arc<Mutex<HashMap<OpClass, TokenBucket>>>,
}

impl RequestPacer {
    /// Budgets comfortably under every supported venue's documented limits.
    pub fn new() -> Self {
        let mut buckets = HashMap::new();
        buckets.insert(OpClass::Trading, TokenBucket::new(20, 10));
        buckets.insert(OpClass::Account, TokenBucket::new(30, 10));
        buckets.insert(OpClass::MarketData, TokenBucket::new(60, 20));
        buckets.insert(OpClass::History, TokenBucket::new(10, 2));
        Self {
            buckets: Arc::new(Mutex::new(buckets)),
        }
    }

    /// Block until the class has budget for one request
    pub async fn acquire(&self, class: OpClass) {
        loop {
            let wait = {
                let mut buckets = self.buckets.lock().await;
                let bucket = buckets.get_mut(&class).expect("op class registered");
                if bucket.try_consume() {
                    return;
                }
                bucket.time_until_token()
            };
            if wait > Duration::from_secs(0) {
                sleep(wait).await;
            } else {
                sleep(Duration::from_millis(10)).await;
            }
        }
    }

    /// Non-blocking variant used by tests
    pub async fn try_acquire(&self, class: OpClass) -> bool {
        let mut buckets = self.buckets.lock().await;
        let bucket = buckets.get_mut(&class).expect("op class registered");
        bucket.try_consume()
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new()
    }
}
