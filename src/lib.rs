//! slidecache - media asset cache and asynchronous decode pipeline for slideshows
//!
//! Re-exports all modules for use by binary targets.

// Decode pipeline (cache, loader, preloader, workers)
pub mod core;

// Media types, metadata, decoding
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod paths;

#[cfg(test)]
mod test_util;

// Re-export commonly used types
pub use config::LoaderConfig;
pub use core::{AnimatedTicket, CacheStore, ImageTicket, LoadResult, LoadTicket, Loader, Preloader};
pub use entities::{
    AnimFrame, AnimatedHandle, CacheKey, DecodeError, MediaItem, MediaKind, Orientation, StillImage,
};
