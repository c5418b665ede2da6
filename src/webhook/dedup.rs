use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::debug;

/// Build the idempotency key for a webhook event: a digest of the best
/// transaction identifier plus the normalized status strings.
///
/// The normalized forms exist only for keying; business branching always
/// uses the raw provider-cased status.
pub fn idempotency_key(
    identifier: &str,
    normalized_status: &str,
    normalized_escrow_status: Option<&str>,
) -> String {
    let mut raw = format!("{}|{}", identifier, normalized_status);
    if let Some(escrow) = normalized_escrow_status.filter(|s| !s.is_empty()) {
        raw.push('|');
        raw.push_str(escrow);
    }
    hex::encode(Sha256::digest(raw.as_bytes()))
}

/// Lowercase and strip all whitespace. Providers vary status formatting
/// ("In Progress" vs "inprogress"); normalization keeps duplicate events
/// keyed identically.
pub fn normalize_status(status: &str) -> String {
    status
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<String>()
}

/// Dedup records and inflight markers for webhook processing.
///
/// A dedup record means an identical event was already fully processed and
/// suppresses reprocessing for the retention window. An inflight marker is
/// a short-lived mutual-exclusion lock across concurrent deliveries of the
/// same event; its TTL is a safety net against crashed handlers.
pub struct IdempotencyStore {
    processed: Mutex<HashMap<String, DateTime<Utc>>>,
    inflight: Mutex<HashMap<String, DateTime<Utc>>>,
    retention: Duration,
    inflight_ttl: Duration,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::with_windows(Duration::days(7), Duration::seconds(30))
    }

    pub fn with_windows(retention: Duration, inflight_ttl: Duration) -> Self {
        Self {
            processed: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            retention,
            inflight_ttl,
        }
    }

    /// Whether an identical event was already processed within the
    /// retention window.
    pub async fn is_processed(&self, key: &str) -> bool {
        let processed = self.processed.lock().await;
        processed
            .get(key)
            .map(|at| Utc::now() - *at < self.retention)
            .unwrap_or(false)
    }

    pub async fn mark_processed(&self, key: &str) {
        let mut processed = self.processed.lock().await;
        processed.insert(key.to_string(), Utc::now());
    }

    /// Atomically acquire the inflight marker for `key`. Returns false when
    /// another delivery of the same event is already being handled. The
    /// occupied-check and the insert happen under one lock; a plain
    /// read-then-write pair would race.
    pub async fn try_acquire(&self, key: &str) -> bool {
        let mut inflight = self.inflight.lock().await;
        let now = Utc::now();

        if let Some(acquired_at) = inflight.get(key) {
            if now - *acquired_at < self.inflight_ttl {
                return false;
            }
            // Stale marker from a crashed handler; reclaim it.
            debug!("Reclaiming stale inflight marker");
        }

        inflight.insert(key.to_string(), now);
        true
    }

    /// Release the marker. Must run on every exit path after acquisition.
    pub async fn release(&self, key: &str) {
        let mut inflight = self.inflight.lock().await;
        inflight.remove(key);
    }

    /// Drop dedup records past retention. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut processed = self.processed.lock().await;
        let now = Utc::now();
        let before = processed.len();
        processed.retain(|_, at| now - *at < self.retention);
        before - processed.len()
    }
}

impl Default for IdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}
