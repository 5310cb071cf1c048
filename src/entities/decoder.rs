//! Still and animated image decoding with decode-time downscale
//!
//! **Why**: Slideshow viewports are far smaller than camera output. Decoding a
//! 24MP JPEG at full size to show it 1920px wide wastes ~90MB and most of the
//! decode time, so the width hint is applied inside the decoder.
//!
//! **Used by**: `ImageDecoder` (default `MediaDecoder`), frame pump of `AnimatedHandle`
//!
//! # Backends
//!
//! - JPEG: `jpeg-decoder` with DCT scaling (1/2, 1/4, 1/8), then an exact
//!   resize to the requested width. The full-size raster never exists.
//! - Everything else `image` can read: full decode, then resize.
//! - Animations (GIF, WebP): `image` frame iterators, pulled one frame at a time.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::codecs::gif::GifDecoder;
use image::codecs::webp::WebPDecoder;
use image::imageops::{self, FilterType};
use image::{AnimationDecoder, Frame, Frames, ImageFormat, ImageReader, RgbaImage};
use jpeg_decoder::PixelFormat as JpegPixelFormat;
use log::{debug, trace};
use thiserror::Error;

use super::animated::AnimatedSource;
use super::frame::StillImage;

/// Resampling filter for the final exact-width resize
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Frame delay used when a file asks for (nearly) zero
const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Delays below this are treated as "unspecified", like browsers do
const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);

/// Decode failure. The loader collapses every variant into one `Failure`;
/// the variants only exist so logs say what went wrong.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JPEG error: {0}")]
    Jpeg(#[from] jpeg_decoder::Error),

    #[error("Animation has no frames")]
    NoFrames,

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Decoder panicked: {0}")]
    Panicked(String),
}

impl DecodeError {
    /// Wrap a payload caught by `catch_unwind`
    pub fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        DecodeError::Panicked(msg)
    }
}

/// Output size for a width hint: exact `target` width when it is smaller
/// than the source, otherwise the source size (never upscales).
pub fn fit_width(src_width: u32, src_height: u32, target: Option<u32>) -> (u32, u32) {
    match target {
        Some(w) if w > 0 && w < src_width => {
            let h = (u64::from(src_height) * u64::from(w) + u64::from(src_width) / 2)
                / u64::from(src_width);
            (w, (h as u32).max(1))
        }
        _ => (src_width, src_height),
    }
}

/// Resize unless already at the requested size
pub(crate) fn resize_to(img: RgbaImage, width: u32, height: u32) -> RgbaImage {
    if img.dimensions() == (width, height) {
        img
    } else {
        imageops::resize(&img, width, height, RESIZE_FILTER)
    }
}

/// Decode a still image into an immutable RGBA8 bitmap.
///
/// With a positive `target_width` below the source width the result is
/// exactly `target_width` wide, aspect preserved.
///
/// # Errors
///
/// Missing/unreadable file, unknown format, corrupt data.
pub fn decode_still(path: &Path, target_width: Option<u32>) -> Result<StillImage, DecodeError> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;

    match reader.format() {
        Some(ImageFormat::Jpeg) => decode_jpeg_scaled(path, target_width),
        Some(_) => {
            debug!("Decoding {} (full size, hint {:?})", path.display(), target_width);
            let img = reader.decode()?.into_rgba8();
            let (w, h) = fit_width(img.width(), img.height(), target_width);
            Ok(StillImage::from_rgba(resize_to(img, w, h)))
        }
        None => Err(DecodeError::Unsupported(path.display().to_string())),
    }
}

/// Generic path for JPEG flavors `jpeg-decoder` hands back in odd layouts
fn decode_generic(path: &Path, target_width: Option<u32>) -> Result<StillImage, DecodeError> {
    let img = image::open(path)?.into_rgba8();
    let (w, h) = fit_width(img.width(), img.height(), target_width);
    Ok(StillImage::from_rgba(resize_to(img, w, h)))
}

fn decode_jpeg_scaled(path: &Path, target_width: Option<u32>) -> Result<StillImage, DecodeError> {
    let file = File::open(path)?;
    let mut decoder = jpeg_decoder::Decoder::new(BufReader::new(file));
    decoder.read_info()?;

    let info = decoder
        .info()
        .ok_or_else(|| DecodeError::Unsupported("JPEG without frame header".to_string()))?;

    // CMYK and 16-bit lossless are rare enough to take the slow path
    if !matches!(info.pixel_format, JpegPixelFormat::RGB24 | JpegPixelFormat::L8) {
        debug!("JPEG {:?} in {}, using generic decoder", info.pixel_format, path.display());
        return decode_generic(path, target_width);
    }

    let (src_w, src_h) = (u32::from(info.width), u32::from(info.height));
    let (out_w, out_h) = fit_width(src_w, src_h, target_width);

    let (dec_w, dec_h) = if out_w < src_w {
        let req_w = u16::try_from(out_w).unwrap_or(u16::MAX);
        let req_h = u16::try_from(out_h).unwrap_or(u16::MAX);
        let (w, h) = decoder.scale(req_w, req_h)?;
        (u32::from(w), u32::from(h))
    } else {
        (src_w, src_h)
    };

    trace!(
        "JPEG {}: {}x{} -> DCT {}x{} -> {}x{}",
        path.display(), src_w, src_h, dec_w, dec_h, out_w, out_h
    );

    let raw = decoder.decode()?;
    let rgba = match info.pixel_format {
        JpegPixelFormat::L8 => raw.iter().flat_map(|&l| [l, l, l, 255]).collect::<Vec<u8>>(),
        _ => raw
            .chunks_exact(3)
            .flat_map(|px| [px[0], px[1], px[2], 255])
            .collect::<Vec<u8>>(),
    };

    let img = RgbaImage::from_raw(dec_w, dec_h, rgba)
        .ok_or_else(|| DecodeError::Unsupported("JPEG buffer size mismatch".to_string()))?;

    Ok(StillImage::from_rgba(resize_to(img, out_w, out_h)))
}

/// Detect an animation container, rejecting formats without frame iterators
pub(crate) fn animation_format(path: &Path) -> Result<ImageFormat, DecodeError> {
    match ImageReader::open(path)?.with_guessed_format()?.format() {
        Some(fmt @ (ImageFormat::Gif | ImageFormat::WebP)) => Ok(fmt),
        Some(other) => Err(DecodeError::Unsupported(format!("{:?} is not an animation", other))),
        None => Err(DecodeError::Unsupported(path.display().to_string())),
    }
}

/// Open a lazy frame iterator. Frames are decoded only when pulled.
pub(crate) fn open_frames(path: &Path, format: ImageFormat) -> Result<Frames<'static>, DecodeError> {
    let reader = BufReader::new(File::open(path)?);
    match format {
        ImageFormat::Gif => Ok(GifDecoder::new(reader)?.into_frames()),
        ImageFormat::WebP => Ok(WebPDecoder::new(reader)?.into_frames()),
        other => Err(DecodeError::Unsupported(format!("{:?} is not an animation", other))),
    }
}

/// Display delay of a frame
pub(crate) fn frame_delay(frame: &Frame) -> Duration {
    let (numer, denom) = frame.delay().numer_denom_ms();
    let delay = if denom == 0 {
        Duration::ZERO
    } else {
        Duration::from_millis(u64::from(numer) / u64::from(denom))
    };
    if delay < MIN_FRAME_DELAY { DEFAULT_FRAME_DELAY } else { delay }
}

/// Open an animation for streaming playback.
///
/// Only the first frame is decoded here (as the poster); the rest is pulled
/// by each handle's frame pump.
pub fn decode_animated(path: &Path, target_width: Option<u32>) -> Result<AnimatedSource, DecodeError> {
    let format = animation_format(path)?;
    let mut frames = open_frames(path, format)?;

    let first = frames.next().ok_or(DecodeError::NoFrames)??;
    let delay = frame_delay(&first);
    let buffer = first.into_buffer();
    let (src_w, src_h) = buffer.dimensions();
    let (w, h) = fit_width(src_w, src_h, target_width);

    debug!(
        "Animation {} ({:?}): {}x{} -> {}x{}",
        path.display(), format, src_w, src_h, w, h
    );

    let poster = Arc::new(StillImage::from_rgba(resize_to(buffer, w, h)));
    Ok(AnimatedSource::new(path.to_path_buf(), format, target_width, poster, delay))
}
