//! Versioned cache storage
//!
//! Named caches holding request/response snapshots. One cache name is
//! current per worker build; activation evicts every other name.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::{CacheError, Network, Request, Response};

/// A single named cache of request/response snapshots
#[derive(Debug, Default)]
pub struct NamedCache {
    entries: BTreeMap<String, Response>,
}

impl NamedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot; an entry under the same key is overwritten.
    pub fn put(&mut self, key: String, response: Response) {
        self.entries.insert(key, response);
    }

    /// Exact-match lookup by cache key
    pub fn get(&self, key: &str) -> Option<&Response> {
        self.entries.get(key)
    }

    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// All cached keys
    pub fn keys(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Outcome of bulk population: which URLs made it into the cache and
/// which failed. Population itself never fails.
#[derive(Debug, Clone, Default)]
pub struct PopulationReport {
    pub succeeded: usize,
    /// Failed URL plus the reason it failed
    pub failed: Vec<(String, String)>,
}

impl PopulationReport {
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn failed_urls(&self) -> Vec<&str> {
        self.failed.iter().map(|(url, _)| url.as_str()).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Cache storage: every named cache known to this origin
#[derive(Debug, Default)]
pub struct CacheStore {
    caches: RwLock<BTreeMap<String, NamedCache>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (create if missing) a named cache. Idempotent.
    pub fn open(&self, name: &str) {
        let mut caches = self.caches.write().unwrap();
        caches.entry(name.to_string()).or_default();
    }

    pub fn has(&self, name: &str) -> bool {
        self.caches.read().unwrap().contains_key(name)
    }

    /// Delete a named cache and every entry in it
    pub fn delete(&self, name: &str) -> bool {
        self.caches.write().unwrap().remove(name).is_some()
    }

    /// All known cache names
    pub fn keys(&self) -> Vec<String> {
        self.caches.read().unwrap().keys().cloned().collect()
    }

    /// Number of entries in a named cache (0 if absent)
    pub fn entry_count(&self, name: &str) -> usize {
        self.caches
            .read()
            .unwrap()
            .get(name)
            .map(|c| c.len())
            .unwrap_or(0)
    }

    /// Delete every cache whose name differs from `current`. All
    /// deletions complete before this returns; the deleted names are
    /// reported for logging.
    pub fn evict_others(&self, current: &str) -> Vec<String> {
        let mut caches = self.caches.write().unwrap();
        let stale: Vec<String> = caches
            .keys()
            .filter(|name| name.as_str() != current)
            .cloned()
            .collect();
        for name in &stale {
            caches.remove(name);
            log::info!("Deleted stale cache {}", name);
        }
        stale
    }

    /// Exact-match lookup across every cache, current-name order
    /// (alphabetical over names; a request lives in at most one under
    /// normal operation).
    pub fn lookup(&self, request: &Request) -> Option<Response> {
        let key = request.cache_key();
        let caches = self.caches.read().unwrap();
        for cache in caches.values() {
            if let Some(response) = cache.get(&key) {
                return Some(response.clone());
            }
        }
        None
    }

    /// Exact-match lookup restricted to one named cache
    pub fn lookup_in(&self, name: &str, request: &Request) -> Option<Response> {
        let caches = self.caches.read().unwrap();
        caches.get(name)?.get(&request.cache_key()).cloned()
    }

    /// Write-back from the fetch interceptor. Rejects anything that is
    /// not a GET for a 200 same-origin response.
    pub fn store(
        &self,
        name: &str,
        request: &Request,
        response: Response,
    ) -> Result<(), CacheError> {
        if !request.method.is_cacheable() {
            return Err(CacheError::NotCacheable(format!(
                "{} {}",
                request.method.as_str(),
                request.url
            )));
        }
        if !response.is_cacheable() {
            return Err(CacheError::NotCacheable(format!(
                "status {} for {}",
                response.status, request.url
            )));
        }
        self.store_unchecked(name, request, response);
        Ok(())
    }

    /// Install-time store: population accepts any successful response,
    /// including cross-origin CDN assets.
    fn store_unchecked(&self, name: &str, request: &Request, response: Response) {
        let mut caches = self.caches.write().unwrap();
        caches
            .entry(name.to_string())
            .or_default()
            .put(request.cache_key(), response);
    }

    /// Fetch-and-store every URL independently. All requests are issued
    /// together; completion waits for all of them regardless of order.
    /// A failing URL is reported, never fatal: third-party CDN assets
    /// must not block the app shell from being cached.
    pub async fn populate(
        &self,
        name: &str,
        urls: &[String],
        network: &Arc<dyn Network>,
    ) -> PopulationReport {
        self.open(name);

        let mut tasks = Vec::with_capacity(urls.len());
        for url in urls {
            let network = Arc::clone(network);
            let request = Request::get(url);
            let url = url.clone();
            tasks.push(smol::spawn(async move {
                let result = smol::unblock(move || network.fetch(&request)).await;
                (url, result)
            }));
        }

        let mut report = PopulationReport::default();
        for task in tasks {
            let (url, result) = task.await;
            match result {
                Ok(response) if response.is_success() => {
                    self.store_unchecked(name, &Request::get(&url), response);
                    report.succeeded += 1;
                }
                Ok(response) => {
                    log::warn!("Failed to cache {}: HTTP {}", url, response.status);
                    report.failed.push((url, format!("HTTP {}", response.status)));
                }
                Err(e) => {
                    log::warn!("Failed to cache {}: {}", url, e);
                    report.failed.push((url, e.to_string()));
                }
            }
        }

        log::info!(
            "Cache population for {}: {} successful, {} failed",
            name,
            report.succeeded,
            report.failed_count()
        );
        report
    }
}
