//! Neighbor preloader - warms the cache around the current slide.
//!
//! On each navigation step the next and previous stills of the (circular)
//! sequence are queued for decode. Results are discarded: the cache is the
//! only output. Animations and videos are never warmed.
//!
//! Each call starts a new preload epoch, so rapid navigation does not leave a
//! backlog of warm-ups for slides the user already skipped past.

use std::sync::Arc;

use log::trace;

use super::loader::Loader;
use crate::entities::{MediaItem, MediaKind};

/// Fire-and-forget cache warming for slideshow navigation.
///
/// # Usage
/// ```ignore
/// // On every slide change:
/// preloader.warm_neighbors(&items, index, Some(viewport_width));
/// let ticket = loader.load_image(&items[index].path, Some(viewport_width));
/// ```
#[derive(Clone)]
pub struct Preloader {
    loader: Arc<Loader>,
    enabled: bool,
}

impl Preloader {
    pub fn new(loader: Arc<Loader>) -> Self {
        Self { loader, enabled: true }
    }

    /// Turn warming on or off (e.g. from config)
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Queue warm-up decodes for the neighbors of `current`.
    ///
    /// No-op for sequences of 0 or 1 items and out-of-range indices.
    pub fn warm_neighbors(&self, sequence: &[MediaItem], current: usize, target_width: Option<u32>) {
        if !self.enabled {
            return;
        }

        let neighbors = neighbor_indices(sequence.len(), current);
        if neighbors.is_empty() {
            return;
        }

        let epoch = self.loader.increment_epoch();
        for idx in neighbors {
            let item = &sequence[idx];
            if item.kind != MediaKind::Still {
                trace!("Not warming {:?} item {}", item.kind, item.path.display());
                continue;
            }
            trace!("Warming [{}] {} (epoch {})", idx, item.path.display(), epoch);
            self.loader.preload_image(&item.path, target_width, epoch);
        }
    }
}

/// Next and previous index in a circular sequence, without duplicates
pub fn neighbor_indices(len: usize, current: usize) -> Vec<usize> {
    if len <= 1 || current >= len {
        return Vec::new();
    }

    let next = (current + 1) % len;
    let prev = (current + len - 1) % len;
    if next == prev { vec![next] } else { vec![next, prev] }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::tests::{CountingDecoder, counting_loader};
    use crate::entities::CacheKey;
    use crate::test_util;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    /// Poll until `cond` holds or a generous deadline passes
    fn eventually(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(10);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        cond()
    }

    #[test]
    fn test_neighbor_indices() {
        assert!(neighbor_indices(0, 0).is_empty());
        assert!(neighbor_indices(1, 0).is_empty());
        assert!(neighbor_indices(5, 5).is_empty());
        assert_eq!(neighbor_indices(2, 0), vec![1]);
        assert_eq!(neighbor_indices(5, 0), vec![1, 4]);
        assert_eq!(neighbor_indices(5, 4), vec![0, 3]);
        assert_eq!(neighbor_indices(5, 2), vec![3, 1]);
    }

    #[test]
    fn test_singleton_sequence_decodes_nothing() {
        let dir = TempDir::new().unwrap();
        let only = test_util::write_png(dir.path(), "only.png", 4, 4);
        let decoder = Arc::new(CountingDecoder::default());
        let preloader = Preloader::new(Arc::new(counting_loader(&decoder, 1)));

        preloader.warm_neighbors(&[MediaItem::new(&only)], 0, None);
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(decoder.stills(), 0);
    }

    #[test]
    fn test_warms_both_neighbors() {
        let dir = TempDir::new().unwrap();
        let items: Vec<MediaItem> = (0..4)
            .map(|i| MediaItem::new(test_util::write_png(dir.path(), &format!("{}.png", i), 8, 8)))
            .collect();
        let decoder = Arc::new(CountingDecoder::default());
        let loader = Arc::new(counting_loader(&decoder, 2));
        let preloader = Preloader::new(Arc::clone(&loader));

        preloader.warm_neighbors(&items, 0, Some(4));

        let cached = |i: usize| loader.cache().contains(&CacheKey::new(&items[i].path), MediaKind::Still);
        assert!(eventually(|| cached(1) && cached(3)));
        assert!(!cached(0));
        assert!(!cached(2));

        // Navigating forward hits the warm entry without a new decode
        let hit = loader.load_image(&items[1].path, Some(4)).wait();
        assert_eq!(hit.payload().unwrap().width(), 4);
        assert_eq!(decoder.stills(), 2);
    }

    #[test]
    fn test_skips_animated_and_video() {
        let dir = TempDir::new().unwrap();
        let still = test_util::write_png(dir.path(), "s.png", 4, 4);
        let gif = test_util::write_gif(dir.path(), "a.gif", 4, 4, 2);
        let video = test_util::write_bytes(dir.path(), "v.mp4", b"not decoded");
        let items = vec![MediaItem::new(&still), MediaItem::new(&gif), MediaItem::new(&video)];
        let decoder = Arc::new(CountingDecoder::default());
        let preloader = Preloader::new(Arc::new(counting_loader(&decoder, 1)));

        // Neighbors of the still are the gif and the video
        preloader.warm_neighbors(&items, 0, None);
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(decoder.stills(), 0);
        assert_eq!(decoder.animations(), 0);
    }

    #[test]
    fn test_missing_neighbor_is_silent() {
        let dir = TempDir::new().unwrap();
        let here = test_util::write_png(dir.path(), "here.png", 4, 4);
        let items = vec![
            MediaItem::new(&here),
            MediaItem::new(PathBuf::from(dir.path()).join("gone.png")),
        ];
        let decoder = Arc::new(CountingDecoder::default());
        let loader = Arc::new(counting_loader(&decoder, 1));
        let preloader = Preloader::new(Arc::clone(&loader));

        preloader.warm_neighbors(&items, 0, None);
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(decoder.stills(), 0);
        assert!(loader.cache().is_empty());
    }

    #[test]
    fn test_disabled_preloader_is_inert() {
        let dir = TempDir::new().unwrap();
        let items: Vec<MediaItem> = (0..3)
            .map(|i| MediaItem::new(test_util::write_png(dir.path(), &format!("{}.png", i), 4, 4)))
            .collect();
        let decoder = Arc::new(CountingDecoder::default());
        let loader = Arc::new(counting_loader(&decoder, 1));
        let mut preloader = Preloader::new(Arc::clone(&loader));
        preloader.set_enabled(false);

        let epoch = loader.current_epoch();
        preloader.warm_neighbors(&items, 1, None);
        std::thread::sleep(Duration::from_millis(100));

        assert_eq!(decoder.stills(), 0);
        assert_eq!(loader.current_epoch(), epoch);
    }
}
