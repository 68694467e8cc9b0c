//! Client-side query cache with namespaced invalidation
//!
//! Every read goes through [`QueryCache::fetch`], keyed by a [`QueryKey`]
//! made of the operation namespace followed by its parameters. Mutations
//! invalidate by key prefix, so invalidating `["emails"]` marks every email
//! listing stale regardless of filter. Invalidated entries keep their last
//! value for display but are refetched on the next read.
//!
//! The cache is an ordinary value: construct one and share it (`Arc`)
//! between the services that need it.

use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::Result;

pub const EMAILS_NAMESPACE: &str = "emails";
pub const EMAIL_NAMESPACE: &str = "email";
pub const DRAFTS_NAMESPACE: &str = "drafts";

/// Cache key: namespace first, then parameters
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn namespace(namespace: &str) -> Self {
        Self(vec![namespace.to_string()])
    }

    /// Listing from `/api/emails` for one filter
    pub fn email_list(query: &str, max_results: u32) -> Self {
        Self::new([EMAILS_NAMESPACE, "list", query, &max_results.to_string()])
    }

    /// Listing from `/api/gmail/emails`
    pub fn gmail_list(query: &str, max_results: u32) -> Self {
        Self::new([EMAILS_NAMESPACE, "gmail", query, &max_results.to_string()])
    }

    pub fn email(id: &str) -> Self {
        Self::new([EMAIL_NAMESPACE, id])
    }

    pub fn gmail_email(id: &str) -> Self {
        Self::new([EMAIL_NAMESPACE, "gmail", id])
    }

    pub fn drafts(email_id: &str) -> Self {
        Self::new([DRAFTS_NAMESPACE, email_id])
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: serde_json::Value,
    fetched_at: Instant,
    invalidated: bool,
}

#[derive(Debug)]
struct CacheState {
    entries: LruCache<QueryKey, CacheEntry>,
    /// Bumped by every invalidation; a fetch that straddles one stores its
    /// result as already stale.
    invalidation_epoch: u64,
}

pub struct QueryCache {
    state: Mutex<CacheState>,
    stale_time: Duration,
}

impl QueryCache {
    pub fn new(stale_time: Duration, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(CacheState {
                entries: LruCache::new(capacity),
                invalidation_epoch: 0,
            }),
            stale_time,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.stale_time(), config.capacity)
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value if fresh, otherwise run `fetcher` and store
    /// its result. A failed fetch leaves any previous entry untouched.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, fetcher: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.fetch_with(key, self.stale_time, fetcher).await
    }

    /// Like [`fetch`](Self::fetch) with a per-query freshness window
    pub async fn fetch_with<T, F, Fut>(
        &self,
        key: QueryKey,
        stale_time: Duration,
        fetcher: F,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let epoch = {
            let mut state = self.lock();
            if let Some(entry) = state.entries.get(&key) {
                if !entry.invalidated && entry.fetched_at.elapsed() < stale_time {
                    debug!("Cache hit for {}", key);
                    return Ok(serde_json::from_value(entry.value.clone())?);
                }
            }
            state.invalidation_epoch
        };

        debug!("Cache miss for {}, fetching", key);
        let value = fetcher().await?;
        let json = serde_json::to_value(&value)?;

        let mut state = self.lock();
        let invalidated = state.invalidation_epoch != epoch;
        if invalidated {
            debug!("{} was invalidated while fetching, storing as stale", key);
        }
        state.entries.put(
            key,
            CacheEntry {
                value: json,
                fetched_at: Instant::now(),
                invalidated,
            },
        );
        Ok(value)
    }

    /// Last stored value for `key`, fresh or not
    pub fn peek<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        let state = self.lock();
        let entry = state.entries.peek(key)?;
        serde_json::from_value(entry.value.clone()).ok()
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        let state = self.lock();
        state
            .entries
            .peek(key)
            .map(|e| !e.invalidated && e.fetched_at.elapsed() < self.stale_time)
            .unwrap_or(false)
    }

    /// Replace the entry for `key` with a fresh value
    pub fn set<T: Serialize>(&self, key: QueryKey, value: &T) -> Result<()> {
        let json = serde_json::to_value(value)?;
        self.lock().entries.put(
            key,
            CacheEntry {
                value: json,
                fetched_at: Instant::now(),
                invalidated: false,
            },
        );
        Ok(())
    }

    /// Mark every entry under `prefix` stale. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut state = self.lock();
        state.invalidation_epoch += 1;
        let mut matched = 0;
        for (key, entry) in state.entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                matched += 1;
            }
        }
        debug!("Invalidated {} cached queries under {}", matched, prefix);
        matched
    }

    pub fn clear(&self) {
        let mut state = self.lock();
        state.invalidation_epoch += 1;
        state.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
