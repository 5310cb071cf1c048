//! Entities module - media types, metadata and decoding
//!
//! Everything here is independent of caching and threading:
//! - `keys`, `media`: file identity and classification
//! - `metadata`, `decoder`, `animated`: reading bytes into displayable pixels
//! - `traits`: the decoding seam `core` depends on

pub mod animated;
pub mod decoder;
pub mod frame;
pub mod keys;
pub mod media;
pub mod metadata;
pub mod traits;

pub use animated::{AnimFrame, AnimatedHandle, AnimatedSource};
pub use decoder::DecodeError;
pub use frame::StillImage;
pub use keys::CacheKey;
pub use media::{MediaItem, MediaKind};
pub use metadata::Orientation;
pub use traits::{ImageDecoder, MediaDecoder};
