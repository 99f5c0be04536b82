//! Offline response cache
//!
//! Stores the last successful response per exact prompt and serves them when
//! a provider is in offline mode. The fallback chain is best-effort by
//! design: exact hit, then the most recently cached response of any prompt,
//! then a fixed placeholder. Callers must not treat a fallback as a correct
//! answer to the prompt.

use std::collections::HashMap;

use tokio::sync::Mutex;
use tracing::debug;

/// Returned when offline mode is active and nothing was ever cached.
pub const OFFLINE_PLACEHOLDER: &str =
    "No response available: provider is offline and no responses have been cached yet.";

struct CacheInner {
    entries: HashMap<String, String>,
    last_response: Option<String>,
}

/// Prompt-keyed response cache with last-write-wins semantics.
///
/// All access goes through one async mutex so the map and the last-response
/// slot stay coherent under a threaded runtime. Entries have no TTL; they
/// live until [`OfflineCache::clear`] or process exit.
pub struct OfflineCache {
    inner: Mutex<CacheInner>,
}

impl OfflineCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                last_response: None,
            }),
        }
    }

    /// Unconditional upsert; also records the response as the most recent
    /// one for cross-prompt fallback.
    pub async fn cache_response(&self, prompt: &str, response: &str) {
        let mut inner = self.inner.lock().await;
        inner
            .entries
            .insert(prompt.to_string(), response.to_string());
        inner.last_response = Some(response.to_string());
    }

    /// Exact-match lookup only; prompts are case-sensitive.
    pub async fn cached_response(&self, prompt: &str) -> Option<String> {
        self.inner.lock().await.entries.get(prompt).cloned()
    }

    /// The most recently cached response of any prompt
    pub async fn fallback_response(&self) -> Option<String> {
        self.inner.lock().await.last_response.clone()
    }

    /// Resolve a prompt while offline: exact hit, then last response of any
    /// prompt, then the fixed placeholder. Never fails.
    pub async fn resolve_offline(&self, prompt: &str) -> String {
        let inner = self.inner.lock().await;
        if let Some(hit) = inner.entries.get(prompt) {
            return hit.clone();
        }
        if let Some(last) = &inner.last_response {
            debug!("offline cache miss, serving most recent cached response");
            return last.clone();
        }
        debug!("offline cache empty, serving placeholder");
        OFFLINE_PLACEHOLDER.to_string()
    }

    /// Drop all entries and the last-response slot
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
        inner.last_response = None;
    }

    /// Number of distinct cached prompts
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    /// Whether no prompt has been cached
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }
}

impl Default for OfflineCache {
    fn default() -> Self {
        Self::new()
    }
}
