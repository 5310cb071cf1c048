//! Decoded still image - immutable RGBA8 pixel buffer
//!
//! **Why**: Once a still is decoded it is shared by the cache, the renderer and
//! any number of concurrent callers. Making it immutable lets everyone hold an
//! `Arc<StillImage>` without locking.
//!
//! **Used by**: Decoder (produces), CacheStore (owns), AnimatedHandle (frames)

use std::fmt;

use image::RgbaImage;

/// Immutable, display-ready RGBA8 bitmap
#[derive(Clone, PartialEq, Eq)]
pub struct StillImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>, // RGBA8, row-major, width * height * 4
}

impl StillImage {
    /// Wrap an RGBA buffer produced by the decoder
    pub fn from_rgba(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    /// Build from raw RGBA8 bytes. Returns None on size mismatch.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if pixels.len() != expected {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Width and height in pixels
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// RGBA8 pixel data
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy into an `image` buffer for further processing by the caller
    pub fn to_rgba_image(&self) -> Option<RgbaImage> {
        RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    /// Memory footprint of the pixel buffer in bytes
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }
}

// Pixel dumps are useless in logs
impl fmt::Debug for StillImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StillImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgba() {
        let img = RgbaImage::from_pixel(4, 2, image::Rgba([1, 2, 3, 255]));
        let still = StillImage::from_rgba(img);
        assert_eq!(still.dimensions(), (4, 2));
        assert_eq!(still.mem(), 4 * 2 * 4);
        assert_eq!(&still.pixels()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_from_raw_rejects_size_mismatch() {
        assert!(StillImage::from_raw(2, 2, vec![0; 16]).is_some());
        assert!(StillImage::from_raw(2, 2, vec![0; 15]).is_none());
    }

    #[test]
    fn test_debug_omits_pixels() {
        let still = StillImage::from_raw(1, 1, vec![9, 9, 9, 9]).unwrap();
        let dbg = format!("{:?}", still);
        assert!(dbg.contains("width: 1"));
        assert!(!dbg.contains("[9, 9"));
    }
}
