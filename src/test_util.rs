//! Fixture writers shared by unit tests.

use std::fs::File;
use std::io::{BufWriter, Cursor};
use std::path::{Path, PathBuf};

use image::codecs::gif::GifEncoder;
use image::{Delay, DynamicImage, Frame, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

/// Gradient so encoders cannot collapse the image to a single color
fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    })
}

pub fn write_bytes(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

pub fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    gradient(width, height).save_with_format(&path, ImageFormat::Png).unwrap();
    path
}

/// Baseline JPEG, optionally carrying an EXIF orientation tag
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32, orientation: Option<u16>) -> PathBuf {
    write_jpeg_with_ifds(dir, name, width, height, orientation, None)
}

/// Baseline JPEG with separate orientation tags for IFD0 (primary image)
/// and IFD1 (thumbnail). Any tag adds an Exif segment.
pub fn write_jpeg_with_ifds(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    primary: Option<u16>,
    thumbnail: Option<u16>,
) -> PathBuf {
    let mut encoded = Vec::new();
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut Cursor::new(&mut encoded), ImageFormat::Jpeg)
        .unwrap();

    let bytes = if primary.is_some() || thumbnail.is_some() {
        splice_exif(&encoded, width as u16, primary, thumbnail)
    } else {
        encoded
    };
    write_bytes(dir, name, &bytes)
}

const TAG_IMAGE_WIDTH: u16 = 0x0100;
const TAG_ORIENTATION: u16 = 0x0112;

/// One IFD of SHORT entries (sorted by tag) followed by the next-IFD offset
fn short_ifd(entries: &[(u16, u16)], next: u32) -> Vec<u8> {
    let mut ifd = Vec::new();
    ifd.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for &(tag, value) in entries {
        ifd.extend_from_slice(&tag.to_le_bytes());
        ifd.extend_from_slice(&3u16.to_le_bytes());
        ifd.extend_from_slice(&1u32.to_le_bytes());
        ifd.extend_from_slice(&value.to_le_bytes());
        ifd.extend_from_slice(&[0, 0]);
    }
    ifd.extend_from_slice(&next.to_le_bytes());
    ifd
}

/// Insert an APP1 Exif segment right after SOI.
///
/// IFD0 always carries ImageWidth so it is never empty. IFD1 is only
/// written when a thumbnail orientation is given.
fn splice_exif(jpeg: &[u8], width: u16, primary: Option<u16>, thumbnail: Option<u16>) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG");

    let mut ifd0_entries = vec![(TAG_IMAGE_WIDTH, width)];
    if let Some(value) = primary {
        ifd0_entries.push((TAG_ORIENTATION, value));
    }
    let ifd1_offset = 8 + 2 + 12 * ifd0_entries.len() as u32 + 4;

    // Little-endian TIFF header, IFD0 at offset 8, IFD1 right behind it
    let mut tiff = Vec::new();
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    match thumbnail {
        Some(value) => {
            tiff.extend(short_ifd(&ifd0_entries, ifd1_offset));
            tiff.extend(short_ifd(&[(TAG_ORIENTATION, value)], 0));
        }
        None => tiff.extend(short_ifd(&ifd0_entries, 0)),
    }

    let seg_len = (2 + 6 + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + seg_len as usize + 2);
    out.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE1]);
    out.extend_from_slice(&seg_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Animated GIF with `frames` solid-color frames of 100ms each
pub fn write_gif(dir: &Path, name: &str, width: u32, height: u32, frames: usize) -> PathBuf {
    let path = dir.join(name);
    let file = File::create(&path).unwrap();
    {
        let mut encoder = GifEncoder::new(BufWriter::new(file));
        let frames = (0..frames).map(|i| {
            let shade = (i * 60 % 256) as u8;
            let buffer = RgbaImage::from_pixel(width, height, Rgba([shade, 255 - shade, 0, 255]));
            Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(100, 1))
        });
        encoder.encode_frames(frames).unwrap();
    }
    path
}
