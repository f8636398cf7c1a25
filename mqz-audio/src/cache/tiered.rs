//! Tiered narration cache
//!
//! Lookup order for a request `(text, lang, static_id?)`:
//!
//! 1. memory, by resolved key
//! 2. packaged static asset (only with a static id); a hit is stored in
//!    memory under both the static key and the text-derived key
//! 3. durable store, by resolved key; a hit is stored in memory
//! 4. miss
//!
//! Every failure below tier 1 (fetch, decode, store read) is logged and
//! counts as a miss at that tier. Static hits are never written to the
//! durable store.
//!
//! # In-flight sharing
//!
//! Lookups past tier 1 run as spawned tasks wrapped in a [`Shared`] future.
//! Callers asking for a key that already has a lookup running await the same
//! outcome. A lookup always runs to completion, even when every caller has
//! gone away; the task removes its own in-flight entry after publishing its
//! result to memory.

use crate::audio::decoder::SimpleDecoder;
use crate::audio::pcm;
use crate::audio::types::AudioAsset;
use crate::cache::keys::{resolve_key, text_key, CacheKey};
use crate::cache::static_assets::StaticAssetSource;
use crate::db::store::DurableStore;
use crate::error::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

type Lookup = Shared<BoxFuture<'static, Option<Arc<AudioAsset>>>>;

/// Counters reported by [`TieredAudioCache::stats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub static_hits: u64,
    pub store_hits: u64,
    pub misses: u64,
    /// Keys currently held in memory (aliases count separately)
    pub memory_entries: usize,
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    static_hits: AtomicU64,
    store_hits: AtomicU64,
    misses: AtomicU64,
}

struct CacheInner {
    memory: RwLock<HashMap<CacheKey, Arc<AudioAsset>>>,
    in_flight: Mutex<HashMap<CacheKey, Lookup>>,
    statics: Option<Arc<dyn StaticAssetSource>>,
    store: Option<Arc<dyn DurableStore>>,
    counters: Counters,
}

/// Memory → static asset → durable store cache with shared in-flight lookups.
///
/// Cloning is cheap and every clone shares the same tiers.
#[derive(Clone)]
pub struct TieredAudioCache {
    inner: Arc<CacheInner>,
}

impl TieredAudioCache {
    /// Build a cache. Either backing tier may be absent; a cache with neither
    /// is memory-only.
    pub fn new(
        statics: Option<Arc<dyn StaticAssetSource>>,
        store: Option<Arc<dyn DurableStore>>,
    ) -> Self {
        if store.is_none() {
            info!("Durable store unavailable, narration cache has no persistent tier");
        }

        Self {
            inner: Arc::new(CacheInner {
                memory: RwLock::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                statics,
                store,
                counters: Counters::default(),
            }),
        }
    }

    /// Start a lookup and keep the result in memory.
    ///
    /// Returns immediately; never fails. Outside a tokio runtime nothing is
    /// started and the request stays a miss.
    pub fn preload(&self, text: &str, lang: &str, static_id: Option<&str>) {
        let key = resolve_key(text, lang, static_id);
        if self.contains(key.as_str()) {
            return;
        }
        // Result lands in memory; nobody needs to wait for it
        let _ = self.lookup(key, text_key(text, lang), static_id);
    }

    /// Resolve to an asset, or `None` on a miss at every tier.
    ///
    /// Awaits a lookup already running for the same key instead of starting
    /// a new one.
    pub async fn resolve(
        &self,
        text: &str,
        lang: &str,
        static_id: Option<&str>,
    ) -> Option<Arc<AudioAsset>> {
        let key = resolve_key(text, lang, static_id);

        if let Some(asset) = self.memory_get(&key) {
            self.inner.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!("Memory hit for '{}'", key);
            return Some(asset);
        }

        match self.lookup(key, text_key(text, lang), static_id) {
            Ok(asset) => asset,
            Err(lookup) => lookup.await,
        }
    }

    /// Encode `asset` into the durable store under `key` (overwriting) and
    /// keep it in memory.
    pub async fn persist(&self, key: &str, asset: Arc<AudioAsset>) -> Result<()> {
        let store = self
            .inner
            .store
            .as_ref()
            .ok_or_else(|| Error::NotFound("durable store".to_string()))?;

        let payload = pcm::encode_base64(&asset)?;
        store.put(key, &payload).await?;

        // Memory holds what a later store read would decode to
        let stored = pcm::decode_base64(&payload)?;
        self.memory_insert(&[CacheKey::from_raw(key)], Arc::new(stored));
        Ok(())
    }

    /// Memory-tier membership
    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .memory
            .read()
            .map(|m| m.contains_key(&CacheKey::from_raw(key)))
            .unwrap_or(false)
    }

    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            memory_hits: c.memory_hits.load(Ordering::Relaxed),
            static_hits: c.static_hits.load(Ordering::Relaxed),
            store_hits: c.store_hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            memory_entries: self.inner.memory.read().map(|m| m.len()).unwrap_or(0),
        }
    }

    fn memory_get(&self, key: &CacheKey) -> Option<Arc<AudioAsset>> {
        self.inner.memory.read().ok()?.get(key).cloned()
    }

    fn memory_insert(&self, keys: &[CacheKey], asset: Arc<AudioAsset>) {
        if let Ok(mut memory) = self.inner.memory.write() {
            for key in keys {
                memory.insert(key.clone(), Arc::clone(&asset));
            }
        }
    }

    /// Join or start the lookup for `key`.
    ///
    /// `Ok` carries a memory result found under the in-flight lock (the
    /// previous lookup finished in between); `Err` carries the shared lookup
    /// to await.
    fn lookup(
        &self,
        key: CacheKey,
        alias: CacheKey,
        static_id: Option<&str>,
    ) -> std::result::Result<Option<Arc<AudioAsset>>, Lookup> {
        let mut in_flight = match self.inner.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(asset) = self.memory_get(&key) {
            return Ok(Some(asset));
        }

        if let Some(existing) = in_flight.get(&key) {
            debug!("Joining in-flight lookup for '{}'", key);
            return Err(existing.clone());
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("No runtime for narration lookup of '{}': {}", key, e);
                return Ok(None);
            }
        };

        let static_id = static_id.filter(|id| !id.is_empty()).map(str::to_string);
        let cache = self.clone();
        let task_key = key.clone();

        // The task cannot remove its entry before it is inserted: removal
        // needs the lock held here.
        let handle = runtime.spawn(async move {
            let result = cache.run_tiers(&task_key, &alias, static_id).await;
            if let Ok(mut in_flight) = cache.inner.in_flight.lock() {
                in_flight.remove(&task_key);
            }
            result
        });

        let shared = handle
            .map(|joined| match joined {
                Ok(result) => result,
                Err(e) => {
                    warn!("Narration lookup task failed: {}", e);
                    None
                }
            })
            .boxed()
            .shared();

        in_flight.insert(key, shared.clone());
        Err(shared)
    }

    async fn run_tiers(
        &self,
        key: &CacheKey,
        alias: &CacheKey,
        static_id: Option<String>,
    ) -> Option<Arc<AudioAsset>> {
        if let Some(id) = static_id.as_deref() {
            match self.from_static(id).await {
                Ok(Some(asset)) => {
                    self.inner.counters.static_hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Static hit for '{}', aliased as '{}'", key, alias);
                    let asset = Arc::new(asset);
                    self.memory_insert(&[key.clone(), alias.clone()], Arc::clone(&asset));
                    return Some(asset);
                }
                Ok(None) => debug!("No static asset '{}'", id),
                Err(e) => warn!("Static asset '{}' unusable: {}", id, e),
            }
        }

        match self.from_store(key).await {
            Ok(Some(asset)) => {
                self.inner.counters.store_hits.fetch_add(1, Ordering::Relaxed);
                debug!("Store hit for '{}'", key);
                let asset = Arc::new(asset);
                self.memory_insert(&[key.clone()], Arc::clone(&asset));
                return Some(asset);
            }
            Ok(None) => {}
            Err(e) => warn!("Store lookup for '{}' failed: {}", key, e),
        }

        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Miss for '{}'", key);
        None
    }

    async fn from_static(&self, static_id: &str) -> Result<Option<AudioAsset>> {
        let Some(statics) = self.inner.statics.as_ref() else {
            return Ok(None);
        };

        let Some(bytes) = statics.fetch(static_id).await? else {
            return Ok(None);
        };

        let hint = Path::new(static_id)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_string);

        let asset = tokio::task::spawn_blocking(move || {
            SimpleDecoder::decode_bytes(bytes, hint.as_deref())
        })
        .await
        .map_err(|e| Error::Decode(format!("Decode task failed: {}", e)))??;

        Ok(Some(asset))
    }

    async fn from_store(&self, key: &CacheKey) -> Result<Option<AudioAsset>> {
        let Some(store) = self.inner.store.as_ref() else {
            return Ok(None);
        };

        match store.get(key.as_str()).await? {
            Some(payload) => Ok(Some(pcm::decode_base64(&payload)?)),
            None => Ok(None),
        }
    }
}
