//! Bounded media cache with per-kind LRU eviction
//!
//! **Why**: Slideshow navigation revisits the last few images constantly.
//! Keeping them decoded makes "back" instant, but full-resolution bitmaps are
//! large, so the cache holds a small fixed number per kind.
//!
//! **Used by**: Loader (lookup on request, insert after decode)
//!
//! # Structure
//!
//! Two `LruCache`s (stills, animated) behind ONE mutex. Bound check, eviction
//! and insert happen in a single critical section, so the entry count of a
//! kind never exceeds its bound, not even transiently.
//!
//! Animated entries hold only an `AnimatedSource` (poster + path); playback
//! state lives in handles and is never cached.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::debug;
use lru::LruCache;

use crate::entities::{AnimatedSource, CacheKey, MediaKind, Orientation, StillImage};

/// Default number of decoded stills kept
pub const DEFAULT_STILL_CAPACITY: usize = 5;
/// Default number of animated sources kept
pub const DEFAULT_ANIMATED_CAPACITY: usize = 2;

/// Cache statistics for monitoring performance
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.hits() + self.misses()
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

/// Decoded payload held by the cache
#[derive(Debug, Clone)]
pub enum CachedMedia {
    Still(Arc<StillImage>),
    Animated(Arc<AnimatedSource>),
}

impl CachedMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            CachedMedia::Still(_) => MediaKind::Still,
            CachedMedia::Animated(_) => MediaKind::Animated,
        }
    }

    /// Resident bytes of the payload
    pub fn mem(&self) -> usize {
        match self {
            CachedMedia::Still(img) => img.mem(),
            CachedMedia::Animated(src) => src.mem(),
        }
    }
}

/// One cached asset. Cloning is cheap (payload is behind `Arc`).
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub media: CachedMedia,
    pub orientation: Orientation,
    /// Width hint the payload was decoded with
    pub decode_width: Option<u32>,
    /// Refreshed on every promoting `get`
    pub last_access: Instant,
}

impl CacheEntry {
    pub fn new(media: CachedMedia, orientation: Orientation, decode_width: Option<u32>) -> Self {
        Self {
            media,
            orientation,
            decode_width,
            last_access: Instant::now(),
        }
    }

    pub fn still(image: Arc<StillImage>, orientation: Orientation, decode_width: Option<u32>) -> Self {
        Self::new(CachedMedia::Still(image), orientation, decode_width)
    }

    pub fn animated(source: Arc<AnimatedSource>, decode_width: Option<u32>) -> Self {
        Self::new(CachedMedia::Animated(source), Orientation::Normal, decode_width)
    }

    pub fn kind(&self) -> MediaKind {
        self.media.kind()
    }
}

#[derive(Debug)]
struct Inner {
    still: LruCache<CacheKey, CacheEntry>,
    animated: LruCache<CacheKey, CacheEntry>,
}

impl Inner {
    /// Videos are never cached, so they have no bucket
    fn bucket(&self, kind: MediaKind) -> Option<&LruCache<CacheKey, CacheEntry>> {
        match kind {
            MediaKind::Still => Some(&self.still),
            MediaKind::Animated => Some(&self.animated),
            MediaKind::Video => None,
        }
    }

    fn bucket_mut(&mut self, kind: MediaKind) -> Option<&mut LruCache<CacheKey, CacheEntry>> {
        match kind {
            MediaKind::Still => Some(&mut self.still),
            MediaKind::Animated => Some(&mut self.animated),
            MediaKind::Video => None,
        }
    }
}

/// Thread-safe, bounded, per-kind LRU cache of decoded media
#[derive(Debug)]
pub struct CacheStore {
    inner: Mutex<Inner>,
    stats: CacheStats,
}

fn bound(capacity: usize) -> NonZeroUsize {
    NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)
}

impl CacheStore {
    /// Create a store. A capacity of 0 is raised to 1.
    pub fn new(still_capacity: usize, animated_capacity: usize) -> Self {
        let still = bound(still_capacity);
        let animated = bound(animated_capacity);

        debug!("CacheStore created: still={}, animated={}", still, animated);

        Self {
            inner: Mutex::new(Inner {
                still: LruCache::new(still),
                animated: LruCache::new(animated),
            }),
            stats: CacheStats::new(),
        }
    }

    /// Maximum entry count for a kind (0 for uncached kinds)
    pub fn capacity(&self, kind: MediaKind) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bucket(kind).map_or(0, |b| b.cap().get())
    }

    /// Look up an entry and promote it to most-recent.
    pub fn get(&self, key: &CacheKey, kind: MediaKind) -> Option<CacheEntry> {
        self.lookup(key, kind, |_| true)
    }

    /// Look up an entry decoded with exactly `decode_width`.
    ///
    /// An entry with another width counts as a miss and is left untouched.
    pub fn get_for_width(&self, key: &CacheKey, kind: MediaKind, decode_width: Option<u32>) -> Option<CacheEntry> {
        self.lookup(key, kind, |entry| entry.decode_width == decode_width)
    }

    fn lookup(&self, key: &CacheKey, kind: MediaKind, accept: impl Fn(&CacheEntry) -> bool) -> Option<CacheEntry> {
        let result = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let bucket = inner.bucket_mut(kind)?;

            let usable = bucket.peek(key).is_some_and(&accept);
            if usable {
                // get_mut promotes to most-recent
                bucket.get_mut(key).map(|entry| {
                    entry.last_access = Instant::now();
                    entry.clone()
                })
            } else {
                None
            }
        };

        if result.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        result
    }

    /// Check presence without promoting
    pub fn contains(&self, key: &CacheKey, kind: MediaKind) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bucket(kind).is_some_and(|b| b.contains(key))
    }

    /// Like `get_for_width`, but leaves LRU order, access time and stats alone
    pub fn peek_for_width(&self, key: &CacheKey, kind: MediaKind, decode_width: Option<u32>) -> Option<CacheEntry> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .bucket(kind)?
            .peek(key)
            .filter(|entry| entry.decode_width == decode_width)
            .cloned()
    }

    /// Insert (or replace) an entry as most-recent.
    ///
    /// At the bound, exactly one least-recent entry of the same kind is
    /// evicted first. Replacing an existing key evicts nothing.
    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        let kind = entry.kind();
        let size = entry.media.mem();

        let evicted = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let Some(bucket) = inner.bucket_mut(kind) else {
                return;
            };
            match bucket.push(key.clone(), entry) {
                Some((old_key, _)) if old_key != key => Some(old_key),
                _ => None,
            }
        };

        self.stats.record_insert();
        debug!("Cached {:?} {} ({} bytes)", kind, key, size);

        if let Some(old_key) = evicted {
            self.stats.record_eviction();
            debug!("LRU evicted {:?} {}", kind, old_key);
        }
    }

    /// Remove a key from every bucket. No-op if absent.
    pub fn remove(&self, key: &CacheKey) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let still = inner.still.pop(key).is_some();
        let animated = inner.animated.pop(key).is_some();
        if still || animated {
            debug!("Removed {} from cache", key);
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let count = inner.still.len() + inner.animated.len();
        inner.still.clear();
        inner.animated.clear();
        debug!("Cache cleared ({} entries)", count);
    }

    /// Entry count of a kind
    pub fn len(&self, kind: MediaKind) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.bucket(kind).map_or(0, |b| b.len())
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.still.is_empty() && inner.animated.is_empty()
    }

    /// Bytes held by all cached payloads
    pub fn resident_bytes(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .still
            .iter()
            .chain(inner.animated.iter())
            .map(|(_, entry)| entry.media.mem())
            .sum()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_STILL_CAPACITY, DEFAULT_ANIMATED_CAPACITY)
    }
}
