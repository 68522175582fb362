//! Where meshes and images come from.
//!
//! Loaders never touch the filesystem directly; they ask an [`AssetSource`] for
//! the bytes behind a URL. Sources are shared with worker threads, so they are
//! `Send + Sync` and handed around as `Arc<dyn AssetSource>`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Errors produced when fetching an asset.
#[derive(Debug)]
pub enum FetchError {
    /// The asset does not exist.
    NotFound(String),
    /// Reading the asset failed.
    Io { url: String, source: std::io::Error },
    /// The bytes arrived but could not be decoded as an image.
    Decode { url: String, source: image::ImageError },
    /// The worker fetching the asset panicked.
    WorkerLost(String),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::NotFound(url) => write!(f, "asset not found: {}", url),
            FetchError::Io { url, source } => write!(f, "failed to read '{}': {}", url, source),
            FetchError::Decode { url, source } => {
                write!(f, "failed to decode image '{}': {}", url, source)
            }
            FetchError::WorkerLost(url) => write!(f, "worker loading '{}' was lost", url),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FetchError::NotFound(_) | FetchError::WorkerLost(_) => None,
            FetchError::Io { source, .. } => Some(source),
            FetchError::Decode { source, .. } => Some(source),
        }
    }
}

/// A provider of asset bytes by URL.
pub trait AssetSource: Send + Sync {
    /// Fetches the complete contents behind `url`.
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;

    /// Fetches `url` and decodes it as an RGBA image.
    fn fetch_image(&self, url: &str) -> Result<image::RgbaImage, FetchError> {
        let bytes = self.fetch(url)?;
        image::load_from_memory(&bytes)
            .map(|img| img.to_rgba8())
            .map_err(|source| FetchError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

/// Serves assets from a directory on disk; URLs are paths relative to it.
#[derive(Clone, Debug)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let path = self.root.join(url.trim_start_matches('/'));
        log::debug!("fetching {}", path.display());
        std::fs::read(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                FetchError::NotFound(url.to_string())
            } else {
                FetchError::Io {
                    url: url.to_string(),
                    source,
                }
            }
        })
    }
}

/// Serves assets from memory. Useful for embedded data and tests.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    files: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the asset at `url`.
    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), bytes.into());
    }
}

impl AssetSource for MemorySource {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.files
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_serves_inserted_bytes() {
        let source = MemorySource::new().with("a.txt", b"hello".to_vec());
        assert_eq!(source.fetch("a.txt").unwrap(), b"hello");
        assert!(matches!(source.fetch("b.txt"), Err(FetchError::NotFound(_))));
    }

    #[test]
    fn undecodable_image_is_a_decode_error() {
        let source = MemorySource::new().with("bad.jpg", vec![1, 2, 3]);
        let err = source.fetch_image("bad.jpg").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
        assert!(err.to_string().contains("bad.jpg"));
    }

    #[test]
    fn png_bytes_decode_to_rgba() {
        let mut bytes = std::io::Cursor::new(Vec::new());
        crate::texture::solid(2, 3, [9, 8, 7, 255])
            .write_to(&mut bytes, image::ImageFormat::Png)
            .unwrap();
        let source = MemorySource::new().with("tiny.png", bytes.into_inner());
        let image = source.fetch_image("tiny.png").unwrap();
        assert_eq!(image.dimensions(), (2, 3));
        assert_eq!(image.get_pixel(1, 2).0, [9, 8, 7, 255]);
    }

    #[test]
    fn file_source_reports_missing_files() {
        let source = FileSource::new(std::env::temp_dir());
        let err = source.fetch("definitely/not/here.obj").unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }
}
