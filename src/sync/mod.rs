// Group attribute synchronizer
//
// Owns the per-group state arena, the debounced recomputation timers,
// and the periodic cache-to-store flush. Groups are created and
// destroyed by the host UI; this module only annotates them and keeps
// the annotations alive across restarts.
//
// Every extraction is tagged with a generation number drawn from one
// process-wide counter at schedule time. A completion whose generation
// no longer matches the group's current generation lost the race to a
// newer membership change (or to an evict-and-re-register of the same
// id) and is discarded instead of overwriting the cache with stale data.


use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::cache::AttributeCache;
use crate::color::Rgb;
use crate::config::SyncConfig;
use crate::extract::{self, ExtractParams, FileFetcher, ImageFetcher};
use crate::store::{self, Doc, Store};

/// Callback returning a group's current member image sources.
pub type SourcesProvider = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// The attribute view handed back to the host for reapplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupAttribute {
    pub color: Option<Rgb>,
    pub icon: Option<String>,
}

struct GroupState {
    provider: SourcesProvider,
    generation: u64,
    debounce: Option<JoinHandle<()>>,
}

struct Inner {
    config: SyncConfig,
    params: ExtractParams,
    store: Arc<dyn Store>,
    fetcher: Arc<dyn ImageFetcher>,
    cache: Mutex<AttributeCache>,
    groups: Mutex<HashMap<String, GroupState>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    // Never reused across group incarnations; 0 means "never extracted"
    next_generation: AtomicU64,
}

pub struct GroupSynchronizer {
    inner: Arc<Inner>,
}

impl GroupSynchronizer {
    /// Create a synchronizer with the default backends: the probed
    /// file store (or its in-memory fallback) and the file fetcher.
    pub async fn new(config: SyncConfig) -> Self {
        let data_dir = config.resolve_data_dir();
        let store = store::select_store(data_dir.as_deref());
        Self::with_backend(config, store, Arc::new(FileFetcher)).await
    }

    /// Create a synchronizer over explicit backends (embedding hosts
    /// and tests). Loads both persisted documents into the cache.
    pub async fn with_backend(
        config: SyncConfig,
        store: Arc<dyn Store>,
        fetcher: Arc<dyn ImageFetcher>,
    ) -> Self {
        let colors = match store.read(Doc::Colors).await {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Failed to read saved colors: {}", e);
                Default::default()
            }
        };
        let icons = match store.read(Doc::Icons).await {
            Ok(doc) => doc,
            Err(e) => {
                log::warn!("Failed to read saved icons: {}", e);
                Default::default()
            }
        };
        let cache = AttributeCache::load(&colors, &icons);
        log::info!("Loaded {} saved group attribute records", cache.len());

        let params = ExtractParams::from(&config);
        GroupSynchronizer {
            inner: Arc::new(Inner {
                config,
                params,
                store,
                fetcher,
                cache: Mutex::new(cache),
                groups: Mutex::new(HashMap::new()),
                flush_task: Mutex::new(None),
                next_generation: AtomicU64::new(0),
            }),
        }
    }

    /// Spawn the periodic flush task. Call once after setup; calling
    /// again is a no-op.
    pub fn start(&self) {
        let mut task = self.inner.flush_task.lock().unwrap();
        if task.is_some() {
            return;
        }
        let inner = Arc::clone(&self.inner);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                flush(&inner).await;
            }
        }));
    }

    /// Track a newly discovered group. Idempotent: re-registering a
    /// tracked group changes nothing. When the group has no cached
    /// color yet, an extraction is scheduled immediately.
    pub fn register_group<F>(&self, group_id: &str, provider: F)
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        {
            let mut groups = self.inner.groups.lock().unwrap();
            if groups.contains_key(group_id) {
                return;
            }
            groups.insert(
                group_id.to_string(),
                GroupState {
                    provider: Arc::new(provider),
                    generation: 0,
                    debounce: None,
                },
            );
        }
        log::debug!("Tracking group {}", group_id);

        let has_color = {
            let cache = self.inner.cache.lock().unwrap();
            cache.get(group_id).map_or(false, |r| r.color.is_some())
        };
        if !has_color {
            begin_extraction(&self.inner, group_id);
        }
    }

    /// Debounced recomputation trigger. Each call supersedes the
    /// group's pending timer; only the last call in a burst leads to an
    /// extraction, using the membership current when the timer fires.
    /// Unknown group ids are ignored.
    pub fn notify_membership_changed(&self, group_id: &str) {
        let mut groups = self.inner.groups.lock().unwrap();
        let Some(state) = groups.get_mut(group_id) else {
            return;
        };
        if let Some(pending) = state.debounce.take() {
            pending.abort();
        }

        let inner = Arc::clone(&self.inner);
        let id = group_id.to_string();
        let window = self.inner.config.debounce;
        state.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            {
                let mut groups = inner.groups.lock().unwrap();
                if let Some(state) = groups.get_mut(&id) {
                    state.debounce = None;
                }
            }
            begin_extraction(&inner, &id);
        }));
    }

    /// Stop tracking a group and drop its attributes from the cache and
    /// (best-effort, asynchronously) from both backend documents.
    /// Idempotent: unknown or already evicted ids are a no-op.
    pub fn evict_group(&self, group_id: &str) {
        let was_tracked = {
            let mut groups = self.inner.groups.lock().unwrap();
            match groups.remove(group_id) {
                Some(mut state) => {
                    if let Some(pending) = state.debounce.take() {
                        pending.abort();
                    }
                    true
                }
                None => false,
            }
        };
        let had_attributes = self.inner.cache.lock().unwrap().remove(group_id);
        if !was_tracked && !had_attributes {
            return;
        }
        log::debug!("Evicted group {}", group_id);

        let inner = Arc::clone(&self.inner);
        let id = group_id.to_string();
        tokio::spawn(async move {
            for doc in [Doc::Colors, Doc::Icons] {
                match inner.store.read(doc).await {
                    Ok(mut content) => {
                        if content.remove(&id).is_some() {
                            if let Err(e) = inner.store.write(doc, &content).await {
                                log::warn!(
                                    "Failed to remove group {} from {}: {}",
                                    id,
                                    doc.file_name(),
                                    e
                                );
                            }
                        }
                    }
                    Err(e) => log::warn!("Failed to read {}: {}", doc.file_name(), e),
                }
            }
        });
    }

    /// Set or clear a group's icon and schedule a flush. Accepted for
    /// ids that were never registered: icon choice is keyed by raw
    /// group id, independent of tracking state.
    pub fn set_icon(&self, group_id: &str, icon: Option<String>) {
        {
            let mut cache = self.inner.cache.lock().unwrap();
            match icon {
                Some(uri) => cache.set_icon(group_id, uri),
                None => cache.clear_icon(group_id),
            }
        }
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            flush(&inner).await;
        });
    }

    /// Current attributes for a group, for reapplication on redraw.
    /// Unknown ids yield the empty attribute set.
    pub fn get_attribute(&self, group_id: &str) -> GroupAttribute {
        let cache = self.inner.cache.lock().unwrap();
        match cache.get(group_id) {
            Some(record) => GroupAttribute {
                color: record.color,
                icon: record.icon.uri().map(str::to_string),
            },
            None => GroupAttribute::default(),
        }
    }

    /// Serialize the cache snapshot into both documents and write them.
    /// Write failures are logged; the cache stays authoritative and the
    /// next flush retries.
    pub async fn flush_now(&self) {
        flush(&self.inner).await;
    }

    /// Best-effort teardown: stop the background tasks and flush once.
    pub async fn shutdown(&self) {
        if let Some(task) = self.inner.flush_task.lock().unwrap().take() {
            task.abort();
        }
        {
            let mut groups = self.inner.groups.lock().unwrap();
            for state in groups.values_mut() {
                if let Some(pending) = state.debounce.take() {
                    pending.abort();
                }
            }
        }
        flush(&self.inner).await;
    }
}

/// Stamp the group with a fresh generation, snapshot its current
/// sources, and run one extraction job. The result is applied only if
/// the generation is still current when the job completes.
fn begin_extraction(inner: &Arc<Inner>, group_id: &str) {
    let (provider, generation) = {
        let mut groups = inner.groups.lock().unwrap();
        let Some(state) = groups.get_mut(group_id) else {
            return;
        };
        state.generation = inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        (Arc::clone(&state.provider), state.generation)
    };
    let sources = provider();

    let inner = Arc::clone(inner);
    let group_id = group_id.to_string();
    tokio::spawn(async move {
        let result =
            extract::extract_color(&group_id, &sources, Arc::clone(&inner.fetcher), &inner.params)
                .await;
        // A None result never clobbers a previously cached color
        let Some(color) = result else {
            return;
        };

        {
            let groups = inner.groups.lock().unwrap();
            match groups.get(&group_id) {
                Some(state) if state.generation == generation => {}
                _ => {
                    log::debug!("Discarding superseded color for group {}", group_id);
                    return;
                }
            }
        }

        inner.cache.lock().unwrap().set_color(&group_id, color);
        log::debug!("Group {} color set to {}", group_id, color);
        flush(&inner).await;
    });
}

async fn flush(inner: &Inner) {
    let (colors, icons) = inner.cache.lock().unwrap().to_documents();

    let mut ok = true;
    if let Err(e) = inner.store.write(Doc::Colors, &colors).await {
        log::warn!("Color flush failed (will retry next cycle): {}", e);
        ok = false;
    }
    if let Err(e) = inner.store.write(Doc::Icons, &icons).await {
        log::warn!("Icon flush failed (will retry next cycle): {}", e);
        ok = false;
    }
    if ok {
        // Cleared icon markers have now reached the backend
        inner.cache.lock().unwrap().prune();
    }
}
