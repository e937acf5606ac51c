//! Process-wide glossary cache.
//!
//! Glossary terms only influence prompt hints, so a stale read is
//! acceptable; the cache refreshes from the store every ten minutes.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::record::GlossaryTerm;
use crate::store::GlossaryStore;

const CACHE_TTL: Duration = Duration::from_secs(600);

struct CacheEntry {
    terms: Vec<GlossaryTerm>,
    fetched_at: Instant,
}

pub struct GlossaryCache {
    store: Arc<dyn GlossaryStore>,
    entry: Mutex<Option<CacheEntry>>,
    ttl: Duration,
}

impl GlossaryCache {
    pub fn new(store: Arc<dyn GlossaryStore>) -> Self {
        Self::with_ttl(store, CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<dyn GlossaryStore>, ttl: Duration) -> Self {
        Self {
            store,
            entry: Mutex::new(None),
            ttl,
        }
    }

    /// Current glossary terms, refreshed at most once per TTL window.
    /// A refresh failure falls back to the stale set when one exists.
    pub async fn terms(&self) -> Result<Vec<GlossaryTerm>> {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return Ok(cached.terms.clone());
            }
        }

        match self.store.list_terms().await {
            Ok(terms) => {
                debug!("Glossary cache refreshed: {} terms", terms.len());
                *entry = Some(CacheEntry {
                    terms: terms.clone(),
                    fetched_at: Instant::now(),
                });
                Ok(terms)
            }
            Err(e) => match entry.as_ref() {
                Some(stale) => {
                    warn!("Glossary refresh failed, serving stale set: {e:#}");
                    Ok(stale.terms.clone())
                }
                None => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingStore {
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl GlossaryStore for CountingStore {
        async fn list_terms(&self) -> Result<Vec<GlossaryTerm>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                anyhow::bail!("store unavailable");
            }
            Ok(vec![GlossaryTerm {
                term_id: "g1".into(),
                term: "EKS".into(),
                aliases: vec![],
                definition: String::new(),
                created_at: "t0".into(),
            }])
        }
    }

    #[tokio::test]
    async fn test_cache_hits_within_ttl() {
        let store = CountingStore::new();
        let cache = GlossaryCache::with_ttl(store.clone(), Duration::from_secs(60));

        assert_eq!(cache.terms().await.unwrap().len(), 1);
        assert_eq!(cache.terms().await.unwrap().len(), 1);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_refreshes_after_ttl() {
        let store = CountingStore::new();
        let cache = GlossaryCache::with_ttl(store.clone(), Duration::from_millis(10));

        cache.terms().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.terms().await.unwrap();
        assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_stale_set_served_on_refresh_failure() {
        let store = CountingStore::new();
        let cache = GlossaryCache::with_ttl(store.clone(), Duration::from_millis(10));

        cache.terms().await.unwrap();
        store.fail.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let terms = cache.terms().await.unwrap();
        assert_eq!(terms.len(), 1);
    }
}
