//! Image Cache
//!
//! Content-addressed by URL: `<root>/images/<hex(sha256(url))><ext>`.
//! A file's existence is the only hit signal. Nothing here ever rewrites or
//! deletes an entry.

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

const IMAGES_DIR: &str = "images";
const DEFAULT_EXT: &str = ".png";

#[derive(Debug, Clone)]
pub struct ImageCache {
    root: PathBuf,
}

impl ImageCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join(IMAGES_DIR)
    }

    /// Where the image for `url` lives (or will live)
    pub fn path_for(&self, url: &str) -> PathBuf {
        let filename = format!("{}{}", cache_key(url), extension(url));
        self.images_dir().join(filename)
    }
}

/// Lowercase hex SHA-256 of the URL bytes
pub fn cache_key(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Extension of the URL path including the dot, `.png` when there is none.
/// Query strings and fragments are ignored.
fn extension(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };

    Path::new(&path)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_else(|| DEFAULT_EXT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_sha256_hex() {
        // sha256("abc")
        assert_eq!(
            cache_key("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_extension() {
        assert_eq!(extension("http://example.com/image.png"), ".png");
        assert_eq!(extension("https://cdn.example.com/a/b.jpeg?size=64"), ".jpeg");
        assert_eq!(extension("https://example.com/avatar"), ".png");
        assert_eq!(extension("https://example.com"), ".png");
        assert_eq!(extension("not a url.gif"), ".gif");
    }

    #[test]
    fn test_path_for() {
        let cache = ImageCache::new("/cache");
        let url = "http://example.com/image.gif";
        assert_eq!(
            cache.path_for(url),
            PathBuf::from("/cache/images").join(format!("{}.gif", cache_key(url)))
        );
    }
}
