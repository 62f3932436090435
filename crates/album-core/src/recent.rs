//! Expiring record of recently published keys.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Messages produced by a recent publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentEntry {
    pub message_ids: Vec<i32>,
    pub caption: Option<String>,
    pub expires_at: Instant,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, RecentEntry>,
    in_flight: HashSet<String>,
}

/// Suppresses duplicate publishes of a key while its messages are visible.
///
/// Entries are evicted lazily on read and by a periodic sweep.
#[derive(Debug, Default)]
pub struct RecentPublishCache {
    state: Mutex<CacheState>,
}

/// Reservation for a key whose publish is in progress.
///
/// Dropping it without calling [`Claim::mark`] releases the key.
#[derive(Debug)]
pub struct Claim<'a> {
    cache: &'a RecentPublishCache,
    key: String,
    marked: bool,
}

impl Claim<'_> {
    /// Record the publish and turn the reservation into a live entry.
    pub fn mark(mut self, message_ids: Vec<i32>, caption: Option<String>, ttl: Duration) {
        self.cache.mark(&self.key, message_ids, caption, ttl);
        self.marked = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if !self.marked {
            self.cache.release(&self.key);
        }
    }
}

impl RecentPublishCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reserve `key` for publishing.
    ///
    /// Returns `None` if the key is live or another publish holds it.
    pub fn claim(&self, key: &str) -> Option<Claim<'_>> {
        let mut state = self.lock();
        if state.in_flight.contains(key) || live_entry(&mut state, key).is_some() {
            return None;
        }
        state.in_flight.insert(key.to_string());
        Some(Claim {
            cache: self,
            key: key.to_string(),
            marked: false,
        })
    }

    /// Drop a reservation without recording anything.
    pub fn release(&self, key: &str) {
        self.lock().in_flight.remove(key);
    }

    /// Record a publish of `key` that stays live for `ttl`.
    pub fn mark(&self, key: &str, message_ids: Vec<i32>, caption: Option<String>, ttl: Duration) {
        let mut state = self.lock();
        state.in_flight.remove(key);
        state.entries.insert(
            key.to_string(),
            RecentEntry {
                message_ids,
                caption,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    pub fn is_live(&self, key: &str) -> bool {
        live_entry(&mut self.lock(), key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<RecentEntry> {
        live_entry(&mut self.lock(), key).cloned()
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|_, entry| now < entry.expires_at);
        before - state.entries.len()
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawn a task that sweeps every `interval`.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.sweep();
                if removed > 0 {
                    debug!(removed, "Swept expired publish entries");
                }
            }
        })
    }
}

fn live_entry<'a>(state: &'a mut CacheState, key: &str) -> Option<&'a RecentEntry> {
    let expired = match state.entries.get(key) {
        Some(entry) => Instant::now() >= entry.expires_at,
        None => return None,
    };
    if expired {
        state.entries.remove(key);
        return None;
    }
    state.entries.get(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_mark_and_expire() {
        let cache = RecentPublishCache::new();
        cache.mark("k", vec![1, 2], Some("hi".to_string()), Duration::from_secs(30));

        assert!(cache.is_live("k"));
        assert_eq!(cache.get("k").unwrap().message_ids, vec![1, 2]);

        tokio::time::advance(Duration::from_secs(29)).await;
        assert!(cache.is_live("k"));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.is_live("k"));
        // Lazy eviction removed it
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_blocks_second_claim() {
        let cache = RecentPublishCache::new();
        let claim = cache.claim("k").unwrap();
        assert!(cache.claim("k").is_none());

        drop(claim);
        let claim = cache.claim("k").unwrap();
        claim.mark(vec![1], None, Duration::from_secs(10));
        assert!(cache.claim("k").is_none());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(cache.claim("k").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = RecentPublishCache::new();
        cache.mark("short", vec![1], None, Duration::from_secs(5));
        cache.mark("long", vec![2], None, Duration::from_secs(50));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.is_live("long"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper() {
        let cache = Arc::new(RecentPublishCache::new());
        cache.mark("k", vec![1], None, Duration::from_secs(5));
        let sweeper = cache.start_sweeper(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(cache.len(), 0);
        sweeper.abort();
    }
}
