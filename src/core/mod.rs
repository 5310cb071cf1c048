//! Core engine modules - cache, loader, preloader, workers
//!
//! These modules form the decode pipeline, independent of any UI.

pub mod cache_store;
pub mod loader;
pub mod preloader;
pub mod workers;

// Re-exports for convenience
pub use cache_store::{CacheEntry, CacheStats, CacheStore, CachedMedia};
pub use loader::{AnimatedTicket, ImageTicket, LoadResult, LoadTicket, Loader, Payload};
pub use preloader::Preloader;
pub use workers::Workers;
