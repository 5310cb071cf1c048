//! Loader façade - the public entry point for slideshow media
//!
//! **Why**: The UI thread must never block on decode. Every request returns a
//! `LoadTicket` immediately; hits resolve on the spot, misses are decoded on
//! the worker pool and resolved from there.
//!
//! **Used by**: presentation layer (`load_image`, `load_animated`), Preloader
//!
//! # Request flow
//!
//! ```text
//! path ──► is_file? ──no──► Failure (cache untouched)
//!             │
//!            yes
//!             ▼
//!   CacheStore hit (same width) ──► resolved ticket
//!             │ miss
//!             ▼
//!   in-flight table: attach to pending decode, or queue a new job
//!             ▼
//!   worker: orientation + decode ──► insert ──► resolve all waiters
//! ```
//!
//! Failed decodes are never cached, so the next request retries. A panic
//! inside the decoder is reported as a failed decode.
//!
//! # Preload epoch
//!
//! Every `warm_neighbors` call bumps the epoch. A queued preload whose epoch
//! is stale when a worker reaches it is dropped, unless a foreground request
//! attached to it meanwhile (the entry is then pinned).

use std::collections::HashMap;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError, bounded};
use log::{debug, trace, warn};

use super::cache_store::{CacheEntry, CacheStore, CachedMedia};
use super::workers::Workers;
use crate::config::LoaderConfig;
use crate::entities::{
    AnimatedHandle, CacheKey, DecodeError, ImageDecoder, MediaDecoder, MediaKind, Orientation, StillImage,
};

/// Outcome of a load. Causes are logged, never surfaced.
#[derive(Debug)]
pub enum LoadResult<T> {
    Success { payload: T, orientation: Orientation },
    Failure,
}

impl<T> LoadResult<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, LoadResult::Success { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            LoadResult::Success { payload, .. } => Some(payload),
            LoadResult::Failure => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            LoadResult::Success { payload, .. } => Some(payload),
            LoadResult::Failure => None,
        }
    }

    pub fn orientation(&self) -> Option<Orientation> {
        match self {
            LoadResult::Success { orientation, .. } => Some(*orientation),
            LoadResult::Failure => None,
        }
    }
}

/// Pending load. Resolves exactly once.
///
/// Dropping a ticket is fine: the decode still completes and is cached.
#[derive(Debug)]
pub struct LoadTicket<T> {
    rx: Receiver<LoadResult<T>>,
    taken: bool,
}

pub type ImageTicket = LoadTicket<Arc<StillImage>>;
pub type AnimatedTicket = LoadTicket<AnimatedHandle>;

impl<T> LoadTicket<T> {
    fn resolved(result: LoadResult<T>) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(result);
        Self { rx, taken: false }
    }

    /// Non-blocking poll for UI loops. Returns the result once, None before
    /// it is ready and after it was taken.
    pub fn try_take(&mut self) -> Option<LoadResult<T>> {
        if self.taken {
            return None;
        }
        let result = match self.rx.try_recv() {
            Ok(result) => result,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => LoadResult::Failure,
        };
        self.taken = true;
        Some(result)
    }

    /// Block until resolved
    pub fn wait(self) -> LoadResult<T> {
        if self.taken {
            return LoadResult::Failure;
        }
        self.rx.recv().unwrap_or(LoadResult::Failure)
    }

    /// Block up to `timeout`. None if still pending (or already taken).
    pub fn wait_timeout(&mut self, timeout: Duration) -> Option<LoadResult<T>> {
        if self.taken {
            return None;
        }
        let result = match self.rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => return None,
            Err(RecvTimeoutError::Disconnected) => LoadResult::Failure,
        };
        self.taken = true;
        Some(result)
    }
}

/// Payload types a ticket can carry, and how they come out of a cache entry
pub trait Payload: Sized + Send + 'static {
    const KIND: MediaKind;

    fn from_entry(entry: &CacheEntry) -> Option<Self>;
}

impl Payload for Arc<StillImage> {
    const KIND: MediaKind = MediaKind::Still;

    fn from_entry(entry: &CacheEntry) -> Option<Self> {
        match &entry.media {
            CachedMedia::Still(img) => Some(Arc::clone(img)),
            CachedMedia::Animated(_) => None,
        }
    }
}

/// Every delivery opens a fresh handle with its own playback position
impl Payload for AnimatedHandle {
    const KIND: MediaKind = MediaKind::Animated;

    fn from_entry(entry: &CacheEntry) -> Option<Self> {
        match &entry.media {
            CachedMedia::Animated(source) => Some(source.open()),
            CachedMedia::Still(_) => None,
        }
    }
}

/// Resolves one ticket from the finished entry (None = failure)
type Waiter = Box<dyn FnOnce(Option<&CacheEntry>) + Send>;

fn ticket_pair<T: Payload>() -> (LoadTicket<T>, Waiter) {
    let (tx, rx) = bounded(1);
    let waiter: Waiter = Box::new(move |entry: Option<&CacheEntry>| {
        let result = entry
            .and_then(|e| {
                T::from_entry(e).map(|payload| LoadResult::Success {
                    payload,
                    orientation: e.orientation,
                })
            })
            .unwrap_or(LoadResult::Failure);
        let _ = tx.send(result);
    });
    (LoadTicket { rx, taken: false }, waiter)
}

/// Identity of a decode job: same file, same width, same kind
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JobKey {
    key: CacheKey,
    width: Option<u32>,
    kind: MediaKind,
}

struct Inflight {
    waiters: Vec<Waiter>,
    /// Preload epoch; None once a foreground request is attached (pinned)
    epoch: Option<u64>,
}

struct Shared {
    cache: CacheStore,
    decoder: Arc<dyn MediaDecoder>,
    inflight: Mutex<HashMap<JobKey, Inflight>>,
    epoch: AtomicU64,
    /// Bumped by `shutdown`; decodes started before it are not cached
    generation: AtomicU64,
}

/// Resolves the job's waiters to Failure if the job unwinds before finishing
struct InflightGuard<'a> {
    shared: &'a Shared,
    job: &'a JobKey,
    armed: bool,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let pending = {
            let mut table = self.shared.inflight.lock().unwrap_or_else(|e| e.into_inner());
            table.remove(self.job)
        };
        if let Some(pending) = pending {
            warn!("Load job for {} aborted, failing {} waiter(s)", self.job.key, pending.waiters.len());
            for waiter in pending.waiters {
                waiter(None);
            }
        }
    }
}

/// Asynchronous, cached media loader
pub struct Loader {
    shared: Arc<Shared>,
    workers: Workers,
}

impl Loader {
    /// Loader with the default image decoder
    pub fn new(config: &LoaderConfig) -> io::Result<Self> {
        Self::with_decoder(config, Arc::new(ImageDecoder))
    }

    /// Loader with a custom decoding backend
    pub fn with_decoder(config: &LoaderConfig, decoder: Arc<dyn MediaDecoder>) -> io::Result<Self> {
        let workers = Workers::new(config.worker_count())?;
        debug!(
            "Loader created: still={}, animated={}, workers={}",
            config.still_capacity,
            config.animated_capacity,
            workers.len()
        );

        Ok(Self {
            shared: Arc::new(Shared {
                cache: CacheStore::new(config.still_capacity, config.animated_capacity),
                decoder,
                inflight: Mutex::new(HashMap::new()),
                epoch: AtomicU64::new(0),
                generation: AtomicU64::new(0),
            }),
            workers,
        })
    }

    /// Load a still image, downscaled to `target_width` when smaller
    pub fn load_image(&self, path: impl AsRef<Path>, target_width: Option<u32>) -> ImageTicket {
        self.request(path.as_ref(), target_width, None)
    }

    /// Load an animation. Every call yields an independent handle.
    pub fn load_animated(&self, path: impl AsRef<Path>, target_width: Option<u32>) -> AnimatedTicket {
        self.request(path.as_ref(), target_width, None)
    }

    /// Warm-up load tagged with a preload epoch. The result is discarded.
    pub(crate) fn preload_image(&self, path: &Path, target_width: Option<u32>, epoch: u64) {
        let _ticket: ImageTicket = self.request(path, target_width, Some(epoch));
    }

    pub fn cache(&self) -> &CacheStore {
        &self.shared.cache
    }

    /// Start a new preload round, returning its epoch
    pub fn increment_epoch(&self) -> u64 {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Cancel queued preloads and drop every cached entry.
    ///
    /// Decodes already running still resolve their tickets but are not cached.
    pub fn shutdown(&self) {
        let epoch = self.increment_epoch();
        {
            // Same lock that guards the insert at the end of a job
            let _table = self.shared.inflight.lock().unwrap_or_else(|e| e.into_inner());
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
            self.shared.cache.clear();
        }
        debug!("Loader shut down (epoch {})", epoch);
    }

    fn request<T: Payload>(&self, path: &Path, target_width: Option<u32>, preload: Option<u64>) -> LoadTicket<T> {
        let width = target_width.filter(|&w| w > 0);

        let is_file = fs::metadata(path).map(|m| m.is_file()).unwrap_or(false);
        if !is_file {
            debug!("Not a file, skipping: {}", path.display());
            return LoadTicket::resolved(LoadResult::Failure);
        }

        let job = JobKey {
            key: CacheKey::new(path),
            width,
            kind: T::KIND,
        };

        let (ticket, spawn, generation) = {
            // Inflight lock held across the lookup so a finishing job cannot
            // slip between "cache miss" and "no pending decode".
            let mut table = self.shared.inflight.lock().unwrap_or_else(|e| e.into_inner());

            // Warm-ups neither promote nor count towards hit rate
            let cached = match preload {
                Some(_) => self.shared.cache.peek_for_width(&job.key, job.kind, width),
                None => self.shared.cache.get_for_width(&job.key, job.kind, width),
            };
            if let Some(entry) = cached {
                drop(table);
                trace!("Cache hit: {}", job.key);
                let result = T::from_entry(&entry)
                    .map(|payload| LoadResult::Success {
                        payload,
                        orientation: entry.orientation,
                    })
                    .unwrap_or(LoadResult::Failure);
                return LoadTicket::resolved(result);
            }

            let (ticket, waiter) = ticket_pair::<T>();
            match table.get_mut(&job) {
                Some(pending) => {
                    trace!("Joining pending decode: {}", job.key);
                    pending.waiters.push(waiter);
                    pending.epoch = match (pending.epoch, preload) {
                        (None, _) | (_, None) => None,
                        (Some(old), Some(new)) => Some(old.max(new)),
                    };
                    (ticket, false, 0)
                }
                None => {
                    table.insert(
                        job.clone(),
                        Inflight {
                            waiters: vec![waiter],
                            epoch: preload,
                        },
                    );
                    (ticket, true, self.shared.generation.load(Ordering::SeqCst))
                }
            }
        };

        if spawn {
            let shared = Arc::clone(&self.shared);
            let path = path.to_path_buf();
            self.workers.execute(move || shared.run_job(job, path, generation));
        }
        ticket
    }
}

impl Shared {
    fn run_job(&self, job: JobKey, path: PathBuf, generation: u64) {
        if self.skip_if_stale(&job) {
            return;
        }

        let mut guard = InflightGuard {
            shared: self,
            job: &job,
            armed: true,
        };

        // A panicking codec must not take the in-flight entry down with it
        let decoded = panic::catch_unwind(AssertUnwindSafe(|| self.decode_entry(&path, job.kind, job.width)))
            .unwrap_or_else(|payload| Err(DecodeError::from_panic(payload.as_ref())));
        let entry = decoded.as_ref().ok().cloned();

        let finished = {
            let mut table = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(entry) = &entry {
                if self.generation.load(Ordering::SeqCst) == generation {
                    self.cache.insert(job.key.clone(), entry.clone());
                } else {
                    debug!("Loader shut down during decode, not caching {}", job.key);
                }
            }
            table.remove(&job)
        };
        guard.armed = false;

        let Some(finished) = finished else {
            return;
        };

        if let Err(e) = &decoded {
            if finished.epoch.is_none() {
                warn!("Failed to load {}: {}", path.display(), e);
            } else {
                debug!("Preload failed for {}: {}", path.display(), e);
            }
        }

        for waiter in finished.waiters {
            waiter(entry.as_ref());
        }
    }

    /// Drop a queued preload from an earlier epoch. Its waiters see Failure.
    fn skip_if_stale(&self, job: &JobKey) -> bool {
        let current = self.epoch.load(Ordering::SeqCst);
        let mut table = self.inflight.lock().unwrap_or_else(|e| e.into_inner());

        let stale = matches!(table.get(job), Some(Inflight { epoch: Some(e), .. }) if *e != current);
        if stale {
            table.remove(job);
            trace!("Skipping stale preload: {}", job.key);
        }
        stale
    }

    fn decode_entry(&self, path: &Path, kind: MediaKind, width: Option<u32>) -> Result<CacheEntry, DecodeError> {
        match kind {
            MediaKind::Still => {
                let orientation = self.decoder.read_orientation(path);
                let image = self.decoder.decode_still(path, width)?;
                Ok(CacheEntry::still(Arc::new(image), orientation, width))
            }
            MediaKind::Animated => {
                let source = self.decoder.decode_animated(path, width)?;
                Ok(CacheEntry::animated(Arc::new(source), width))
            }
            MediaKind::Video => Err(DecodeError::Unsupported(format!("video: {}", path.display()))),
        }
    }
}
