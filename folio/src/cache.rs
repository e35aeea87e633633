//! A cache of rendered rasters and the renderers producing them.

use crate::raster::Raster;
use crate::renderer::{Renderer, Rotation};
use crate::util::lock;
use folio_interpret::{SharedTask, StatusHandle, StopHandle, TaskState, Watchable};
use kurbo::Rect;
use log::debug;
use lru::LruCache;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

/// Identifies a rendered image of a page.
#[derive(Debug, Copy, Clone)]
pub struct ImageRequestKey {
    /// The width of the raster.
    pub width: u16,
    /// The height of the raster.
    pub height: u16,
    /// The part of the page that is rendered, in page space, or `None` for
    /// the whole page.
    pub clip: Option<Rect>,
    /// The rotation of the page.
    pub rotation: Rotation,
}

impl ImageRequestKey {
    fn clip_bits(&self) -> Option<[u64; 4]> {
        self.clip
            .map(|r| [r.x0.to_bits(), r.y0.to_bits(), r.x1.to_bits(), r.y1.to_bits()])
    }
}

impl PartialEq for ImageRequestKey {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.clip_bits() == other.clip_bits()
            && self.rotation == other.rotation
    }
}

impl Eq for ImageRequestKey {}

impl Hash for ImageRequestKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.width.hash(state);
        self.height.hash(state);
        self.clip_bits().hash(state);
        self.rotation.hash(state);
    }
}

/// Settings of a [`RenderCache`].
#[derive(Debug, Copy, Clone)]
pub struct CacheSettings {
    /// The maximum number of rasters kept. Must be at least one.
    pub max_rasters: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self { max_rasters: 16 }
    }
}

/// The result of a cache lookup.
#[derive(Debug, Clone)]
pub struct CacheLookup {
    /// The raster for the request, possibly not drawn completely yet.
    pub raster: Arc<Raster>,
    /// The renderer drawing the raster, if it has not finished yet.
    pub renderer: Option<SharedTask<Renderer>>,
    /// Whether the raster and renderer were just created. The caller is
    /// responsible for driving a new renderer.
    pub created: bool,
}

#[derive(Debug)]
struct Entry {
    raster: Arc<Raster>,
    renderer: Option<SharedTask<Renderer>>,
    status: StatusHandle,
    stop: StopHandle,
}

impl Entry {
    /// The renderer of the entry, if it can still make progress.
    fn live_renderer(&mut self) -> Option<SharedTask<Renderer>> {
        if self.status.get().is_terminal() {
            self.renderer = None;
        }

        self.renderer.clone()
    }

    /// Whether the renderer ended without completing the raster.
    fn is_stale(&self) -> bool {
        !self.raster.is_complete() && self.status.get().is_terminal()
    }
}

/// Maps image requests to rasters and the renderers producing them.
///
/// There is at most one live renderer per request: while a renderer is in
/// flight, all lookups for its request return it together with its partially
/// drawn raster. A renderer that stopped before completing its raster makes
/// the entry stale, and the next lookup starts over. Entries are evicted in
/// least recently used order, so a miss is always possible. Renderers only
/// hold weak references to their rasters, so renderers of evicted entries
/// stop once no caller uses the raster anymore.
#[derive(Debug)]
pub struct RenderCache {
    entries: Mutex<LruCache<ImageRequestKey, Entry>>,
}

impl RenderCache {
    /// Create a new cache.
    pub fn new(settings: CacheSettings) -> Self {
        let capacity = NonZeroUsize::new(settings.max_rasters).unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Look up the raster for `key`, creating it together with its renderer
    /// using `make_renderer` if necessary.
    pub fn get_or_create(
        &self,
        key: ImageRequestKey,
        make_renderer: impl FnOnce(&Arc<Raster>) -> Renderer,
    ) -> CacheLookup {
        let mut entries = lock(&self.entries);

        if let Some(entry) = entries.get_mut(&key) {
            if !entry.is_stale() {
                return CacheLookup {
                    raster: entry.raster.clone(),
                    renderer: entry.live_renderer(),
                    created: false,
                };
            }

            debug!("discarding stale raster for {key:?}");
        }

        let raster = Arc::new(Raster::new(key.width, key.height));
        let watchable = Watchable::new(make_renderer(&raster));
        let status = watchable.status();
        let stop = watchable.stop_handle();
        let renderer = Arc::new(Mutex::new(watchable));

        entries.put(
            key,
            Entry {
                raster: raster.clone(),
                renderer: Some(renderer.clone()),
                status,
                stop,
            },
        );

        CacheLookup {
            raster,
            renderer: Some(renderer),
            created: true,
        }
    }

    /// Return the raster for `key` without creating it.
    pub fn get(&self, key: &ImageRequestKey) -> Option<Arc<Raster>> {
        lock(&self.entries).get(key).map(|e| e.raster.clone())
    }

    /// Request the renderer for `key` to stop. Returns whether there was a
    /// live renderer.
    ///
    /// The entry is removed unless its raster was already complete.
    pub fn stop(&self, key: &ImageRequestKey) -> bool {
        let mut entries = lock(&self.entries);

        let Some(entry) = entries.peek(key) else {
            return false;
        };

        let live = !entry.status.get().is_terminal();
        entry.stop.stop();

        if !entry.raster.is_complete() {
            entries.pop(key);
        }

        live
    }

    /// Stop all renderers and remove all entries.
    pub fn clear(&self) {
        let mut entries = lock(&self.entries);

        for (_, entry) in entries.iter() {
            entry.stop.stop();
        }

        entries.clear();
    }

    /// Remove the entry for `key`.
    pub fn evict(&self, key: &ImageRequestKey) -> Option<Arc<Raster>> {
        lock(&self.entries).pop(key).map(|e| e.raster)
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether the cache has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The state of the renderer for `key`, if there is one.
    pub fn renderer_state(&self, key: &ImageRequestKey) -> Option<TaskState> {
        lock(&self.entries).peek(key).map(|e| e.status.get())
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}
