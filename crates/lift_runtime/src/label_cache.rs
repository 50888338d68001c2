//! Ephemeral per-auction label store with delayed eviction.
//!
//! Labels are a convenience hoist for events emitted after label
//! computation: an entry only needs to survive a bounded window past its
//! auction's end. Eviction is therefore a property of the store — a
//! deadline stamped on the entry when `auctionEnd` is observed, enforced
//! lazily by `get` and reclaimed by a periodic `sweep`. A fresh upsert
//! clears the deadline, so a stale deadline never clobbers new labels.
//!
//! No capacity bound, no persistence; lost on restart by design.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lift_types::LabelSet;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Grace window between an auction's end event and eviction of its labels.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct CacheEntry {
    labels: LabelSet,
    /// Eviction deadline; `None` while the auction is still live.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-memory expiring map keyed by auction id. Last-writer-wins.
pub struct LabelCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    grace: Duration,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::with_grace(DEFAULT_GRACE)
    }

    pub fn with_grace(grace: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            grace,
        }
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Most recent non-empty label set seen for this auction, if still live.
    pub async fn get(&self, auction_id: &str) -> Option<LabelSet> {
        let entries = self.entries.read().await;
        let entry = entries.get(auction_id)?;
        if entry.is_expired(Instant::now()) {
            return None;
        }
        Some(entry.labels.clone())
    }

    /// Upsert: overwrites the value and clears any pending eviction deadline.
    pub async fn insert(&self, auction_id: &str, labels: LabelSet) {
        let mut entries = self.entries.write().await;
        entries.insert(
            auction_id.to_string(),
            CacheEntry {
                labels,
                expires_at: None,
            },
        );
    }

    /// Stamp the entry to expire one grace window from now. No-op when the
    /// auction has no cached entry — there is nothing to evict.
    pub async fn expire_after_grace(&self, auction_id: &str) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get_mut(auction_id) {
            entry.expires_at = Some(Instant::now() + self.grace);
        }
    }

    pub async fn remove(&self, auction_id: &str) -> bool {
        self.entries.write().await.remove(auction_id).is_some()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Reclaim every entry past its deadline; returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

impl Default for LabelCache {
    fn default() -> Self {
        Self::new()
    }
}
