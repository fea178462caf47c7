//! # Limiter Registry & Sweeper
//!
//! A `LimiterRegistry` is a concurrent associative map from credential
//! identity to a lazily-created [`TokenBucket`] plus its last-access
//! instant (§4.7). Two instances exist per process: one parameterized for
//! the request-rate policy, one for the token-rate policy.
//!
//! Backed by [`dashmap::DashMap`], which shards its internal table so
//! lookups/inserts for different keys rarely contend — a stand-in for the
//! "sharded maps reduce contention" guidance the registry contract calls
//! for, without hand-rolling sharding.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::watch;
use tokio::time::interval;

use crate::token_bucket::TokenBucket;

struct Entry {
    bucket: Arc<TokenBucket>,
    last_access: Instant,
}

/// Parameters shared by every bucket a given registry creates.
#[derive(Debug, Clone, Copy)]
pub struct RegistryParams {
    pub refill_rate: f64,
    pub burst: u64,
    pub ttl: Duration,
}

/// Per-credential index of token buckets for one rate policy (request-rate
/// or token-rate — the registry itself is policy-agnostic, only its
/// `RegistryParams` differ between the two instances a pipeline holds).
pub struct LimiterRegistry {
    entries: DashMap<String, Entry>,
    params: RegistryParams,
}

impl LimiterRegistry {
    pub fn new(params: RegistryParams) -> Self {
        Self {
            entries: DashMap::new(),
            params,
        }
    }

    /// Returns the bucket for `credential`, creating one at full capacity on
    /// first touch. Concurrent first-touches for the same credential are
    /// resolved by `DashMap::entry`'s locked-shard access, so exactly one
    /// bucket is ever created per credential. Updates `last_access`
    /// regardless of whether the entry already existed.
    pub fn bucket_for(&self, credential: &str, now: Instant) -> Arc<TokenBucket> {
        let mut entry = self
            .entries
            .entry(credential.to_string())
            .or_insert_with(|| Entry {
                bucket: Arc::new(TokenBucket::new(self.params.refill_rate, self.params.burst)),
                last_access: now,
            });
        entry.last_access = now;
        entry.bucket.clone()
    }

    /// Number of live entries, exposed for metrics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `credential` currently has a live entry. Test/observability
    /// helper; not on the hot path.
    pub fn contains(&self, credential: &str) -> bool {
        self.entries.contains_key(credential)
    }

    /// Removes entries whose `now - last_access` exceeds the registry's TTL.
    /// Returns the number evicted. Safe to call concurrently with
    /// `bucket_for`: `DashMap::retain` only locks the shards it visits, and
    /// any credential touched again after being scanned simply survives
    /// (its `last_access` was already bumped by `bucket_for`, so this
    /// sweep's `now` snapshot cannot wrongly evict it — the retain closure
    /// re-reads `last_access` per entry under that entry's own lock).
    pub fn sweep(&self, now: Instant) -> usize {
        let ttl = self.params.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_credential, entry| now.saturating_duration_since(entry.last_access) <= ttl);
        before - self.entries.len()
    }
}

/// Background task that periodically sweeps one or more registries. Holds
/// the receiving end of a stop channel so shutdown can signal it cleanly
/// without an abrupt task abort (§4.7, §5 cancellation model).
pub struct Sweeper {
    stop_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl Sweeper {
    /// Spawns the sweeper loop. `on_evict` is called with the eviction
    /// count after each tick for metrics collaborators; it is not invoked
    /// for zero-eviction ticks' worth of bookkeeping beyond the count
    /// itself (always invoked, callers can ignore zeros).
    pub fn spawn(
        registries: Vec<Arc<LimiterRegistry>>,
        sweep_interval: Duration,
        on_evict: impl Fn(usize) + Send + Sync + 'static,
    ) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = interval(sweep_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let now = Instant::now();
                        let mut evicted = 0;
                        for registry in &registries {
                            evicted += registry.sweep(now);
                        }
                        on_evict(evicted);
                    }
                    _ = stop_rx.changed() => {
                        if *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
        });

        Self { stop_tx, handle }
    }

    /// Signals the sweeper loop to exit and waits for it to finish. No
    /// bucket is mutated by the sweeper after this returns.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(ttl_ms: u64) -> RegistryParams {
        RegistryParams {
            refill_rate: 1.0,
            burst: 10,
            ttl: Duration::from_millis(ttl_ms),
        }
    }

    #[test]
    fn first_touch_creates_full_bucket() {
        let registry = LimiterRegistry::new(params(1000));
        let now = Instant::now();
        let bucket = registry.bucket_for("a", now);
        assert_eq!(bucket.tokens(now), 10.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn repeated_touches_share_one_bucket() {
        // Part of P4/registry invariant: one credential maps to at most
        // one bucket.
        let registry = LimiterRegistry::new(params(1000));
        let now = Instant::now();
        let first = registry.bucket_for("a", now);
        first.try_consume(5, now);
        let second = registry.bucket_for("a", now);
        assert_eq!(second.tokens(now), 5.0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn distinct_credentials_get_distinct_buckets() {
        let registry = LimiterRegistry::new(params(1000));
        let now = Instant::now();
        registry.bucket_for("a", now).try_consume(10, now);
        let b = registry.bucket_for("b", now);
        assert_eq!(b.tokens(now), 10.0);
    }

    #[test]
    fn sweep_evicts_only_stale_entries() {
        // P8: entries within TTL survive, stale ones are removed.
        let registry = LimiterRegistry::new(params(100));
        let t0 = Instant::now();
        registry.bucket_for("fresh", t0);
        registry.bucket_for("stale", t0);

        let t1 = t0 + Duration::from_millis(50);
        registry.bucket_for("fresh", t1);

        let t2 = t0 + Duration::from_millis(200);
        let evicted = registry.sweep(t2);

        assert_eq!(evicted, 1);
        assert!(registry.contains("fresh"));
        assert!(!registry.contains("stale"));
    }

    #[tokio::test]
    async fn sweeper_evicts_then_stops_cleanly() {
        let registry = Arc::new(LimiterRegistry::new(params(50)));
        registry.bucket_for("x", Instant::now());

        let evicted = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let evicted_clone = evicted.clone();
        let sweeper = Sweeper::spawn(
            vec![registry.clone()],
            Duration::from_millis(20),
            move |n| {
                evicted_clone.fetch_add(n, std::sync::atomic::Ordering::SeqCst);
            },
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
        sweeper.stop().await;

        assert!(registry.is_empty());
        assert!(evicted.load(std::sync::atomic::Ordering::SeqCst) >= 1);
    }
}
