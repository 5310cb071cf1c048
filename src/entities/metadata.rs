//! Orientation metadata reader.
//!
//! Reads the EXIF orientation tag without touching pixel data. Only the two
//! quarter-turns matter for slideshow display; every other tag value (mirrors,
//! 180°) is shown as-is. Failures never propagate: a file we cannot parse is
//! simply shown without rotation and the decoder gets its own chance at it.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exif::{In, Reader, Tag};
use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// Where to look for the orientation tag, in order
const ORIENTATION_QUERIES: &[(Tag, In)] = &[
    (Tag::Orientation, In::PRIMARY),
    (Tag::Orientation, In::THUMBNAIL),
];

/// Display rotation derived from embedded metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Orientation {
    /// Shown as stored
    #[default]
    Normal,
    /// Rotate 90° clockwise at render time (EXIF 6)
    Rotate90,
    /// Rotate 270° clockwise at render time (EXIF 8)
    Rotate270,
}

impl Orientation {
    /// Map a raw EXIF orientation value
    pub fn from_exif(value: u32) -> Self {
        match value {
            6 => Orientation::Rotate90,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    /// Clockwise rotation in degrees
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Normal => 0,
            Orientation::Rotate90 => 90,
            Orientation::Rotate270 => 270,
        }
    }

    /// True if displayed width/height are the stored height/width
    pub fn swaps_dimensions(self) -> bool {
        !matches!(self, Orientation::Normal)
    }

    /// Size of the bitmap once the renderer has rotated it
    pub fn display_size(self, width: u32, height: u32) -> (u32, u32) {
        if self.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        }
    }
}

/// Read the orientation of a still image.
///
/// Returns `Orientation::Normal` when the file is missing, unreadable, has no
/// EXIF block or no orientation tag.
pub fn read_orientation(path: &Path) -> Orientation {
    match read_exif_orientation(path) {
        Ok(Some(value)) => {
            let orientation = Orientation::from_exif(value);
            trace!("Orientation {} ({:?}): {}", value, orientation, path.display());
            orientation
        }
        Ok(None) => Orientation::Normal,
        Err(e) => {
            debug!("No orientation for {}: {}", path.display(), e);
            Orientation::Normal
        }
    }
}

fn read_exif_orientation(path: &Path) -> Result<Option<u32>, exif::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut reader)?;

    Ok(ORIENTATION_QUERIES
        .iter()
        .filter_map(|&(tag, ifd)| exif.get_field(tag, ifd))
        .find_map(|field| field.value.get_uint(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use tempfile::TempDir;

    #[test]
    fn test_exif_mapping() {
        assert_eq!(Orientation::from_exif(6), Orientation::Rotate90);
        assert_eq!(Orientation::from_exif(8), Orientation::Rotate270);
        for other in [0, 1, 2, 3, 4, 5, 7, 9, 255] {
            assert_eq!(Orientation::from_exif(other), Orientation::Normal, "value {}", other);
        }
    }

    #[test]
    fn test_display_size() {
        assert_eq!(Orientation::Normal.display_size(40, 30), (40, 30));
        assert_eq!(Orientation::Rotate90.display_size(40, 30), (30, 40));
        assert_eq!(Orientation::Rotate270.display_size(40, 30), (30, 40));
        assert_eq!(Orientation::Rotate270.degrees(), 270);
    }

    #[test]
    fn test_read_tagged_jpegs() {
        let dir = TempDir::new().unwrap();
        let cw = test_util::write_jpeg(dir.path(), "cw.jpg", 32, 16, Some(6));
        let ccw = test_util::write_jpeg(dir.path(), "ccw.jpg", 32, 16, Some(8));
        let flip = test_util::write_jpeg(dir.path(), "flip.jpg", 32, 16, Some(3));

        assert_eq!(read_orientation(&cw), Orientation::Rotate90);
        assert_eq!(read_orientation(&ccw), Orientation::Rotate270);
        assert_eq!(read_orientation(&flip), Orientation::Normal);
    }

    #[test]
    fn test_thumbnail_ifd_fallback() {
        let dir = TempDir::new().unwrap();
        let thumb_only = test_util::write_jpeg_with_ifds(dir.path(), "t.jpg", 16, 8, None, Some(6));
        let thumb_ccw = test_util::write_jpeg_with_ifds(dir.path(), "t8.jpg", 16, 8, None, Some(8));

        assert_eq!(read_orientation(&thumb_only), Orientation::Rotate90);
        assert_eq!(read_orientation(&thumb_ccw), Orientation::Rotate270);
    }

    #[test]
    fn test_primary_ifd_wins_over_thumbnail() {
        let dir = TempDir::new().unwrap();
        let both = test_util::write_jpeg_with_ifds(dir.path(), "both.jpg", 16, 8, Some(8), Some(6));
        // An explicit "upright" in IFD0 is still an answer
        let upright = test_util::write_jpeg_with_ifds(dir.path(), "up.jpg", 16, 8, Some(1), Some(6));

        assert_eq!(read_orientation(&both), Orientation::Rotate270);
        assert_eq!(read_orientation(&upright), Orientation::Normal);
    }

    #[test]
    fn test_untagged_and_broken_files_are_normal() {
        let dir = TempDir::new().unwrap();
        let plain = test_util::write_jpeg(dir.path(), "plain.jpg", 8, 8, None);
        let png = test_util::write_png(dir.path(), "plain.png", 8, 8);
        let junk = test_util::write_bytes(dir.path(), "junk.jpg", b"definitely not a jpeg");

        assert_eq!(read_orientation(&plain), Orientation::Normal);
        assert_eq!(read_orientation(&png), Orientation::Normal);
        assert_eq!(read_orientation(&junk), Orientation::Normal);
        assert_eq!(read_orientation(&dir.path().join("missing.jpg")), Orientation::Normal);
    }
}
