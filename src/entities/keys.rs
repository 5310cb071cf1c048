//! Cache keys - normalized file identity.
//!
//! A key is the file path folded to lowercase with `/` as the only separator,
//! so `C:\Photos\IMG.JPG` and `c:/photos//img.jpg` address the same entry.

use std::fmt;
use std::path::Path;

/// Case- and separator-insensitive file identity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a key from any path
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::from_str_lossy(&path.as_ref().to_string_lossy())
    }

    fn from_str_lossy(raw: &str) -> Self {
        let mut key = String::with_capacity(raw.len());
        let mut prev_sep = false;

        for ch in raw.chars() {
            if ch == '/' || ch == '\\' {
                if !prev_sep {
                    key.push('/');
                }
                prev_sep = true;
            } else {
                key.extend(ch.to_lowercase());
                prev_sep = false;
            }
        }

        // Keep a lone root ("/") intact
        if key.len() > 1 && key.ends_with('/') {
            key.pop();
        }

        Self(key)
    }

    /// Normalized path string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&Path> for CacheKey {
    fn from(path: &Path) -> Self {
        Self::new(path)
    }
}

impl From<&str> for CacheKey {
    fn from(path: &str) -> Self {
        Self::from_str_lossy(path)
    }
}
