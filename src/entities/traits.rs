//! Abstract traits for dependency inversion.
//!
//! The loader in `core/` only knows how to ask for orientation and pixels;
//! the concrete codecs live behind `MediaDecoder`. Tests substitute counting
//! or slow decoders through the same seam.

use std::path::Path;
use std::sync::Arc;

use super::animated::AnimatedSource;
use super::decoder::{self, DecodeError};
use super::frame::StillImage;
use super::metadata::{self, Orientation};

/// Decoding backend used by the loader's workers.
///
/// Called from worker threads, so implementations must be `Send + Sync`.
pub trait MediaDecoder: Send + Sync {
    /// Orientation from embedded metadata. Never fails.
    fn read_orientation(&self, path: &Path) -> Orientation;

    /// Decode a still image, downscaled to `target_width` when smaller.
    fn decode_still(&self, path: &Path, target_width: Option<u32>) -> Result<StillImage, DecodeError>;

    /// Open an animation for streaming.
    fn decode_animated(&self, path: &Path, target_width: Option<u32>) -> Result<AnimatedSource, DecodeError>;
}

/// Default backend: `kamadak-exif` for metadata, `jpeg-decoder` and `image` for pixels
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageDecoder;

impl MediaDecoder for ImageDecoder {
    fn read_orientation(&self, path: &Path) -> Orientation {
        metadata::read_orientation(path)
    }

    fn decode_still(&self, path: &Path, target_width: Option<u32>) -> Result<StillImage, DecodeError> {
        decoder::decode_still(path, target_width)
    }

    fn decode_animated(&self, path: &Path, target_width: Option<u32>) -> Result<AnimatedSource, DecodeError> {
        decoder::decode_animated(path, target_width)
    }
}

/// Blanket impl: Arc<T> implements the trait if T does
impl<T: MediaDecoder + ?Sized> MediaDecoder for Arc<T> {
    fn read_orientation(&self, path: &Path) -> Orientation {
        (**self).read_orientation(path)
    }

    fn decode_still(&self, path: &Path, target_width: Option<u32>) -> Result<StillImage, DecodeError> {
        (**self).decode_still(path, target_width)
    }

    fn decode_animated(&self, path: &Path, target_width: Option<u32>) -> Result<AnimatedSource, DecodeError> {
        (**self).decode_animated(path, target_width)
    }
}
