//! Asset sources
//!
//! Widgets fetch shaders, meshes and images through an [`AssetSource`].
//! Paths are relative, `/`-separated and resolved by the source.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;

use thiserror::Error;

use crate::backend::ImageData;
use crate::resources::{decode_image, ImageDecodeError};

/// Error loading an asset
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Asset `{path}` not found")]
    NotFound { path: String },
    #[error("Failed to read asset `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to fetch asset `{path}`: {message}")]
    Fetch { path: String, message: String },
    #[error("Asset `{path}` is not valid UTF-8")]
    NotText { path: String },
    #[error("Failed to decode image `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: ImageDecodeError,
    },
}

/// Asynchronous provider of asset bytes, text and decoded images
pub trait AssetSource {
    fn load_bytes(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, AssetError>>;

    fn load_text(&self, path: &str) -> impl Future<Output = Result<String, AssetError>> {
        async move {
            let bytes = self.load_bytes(path).await?;
            String::from_utf8(bytes).map_err(|_| AssetError::NotText {
                path: path.to_string(),
            })
        }
    }

    fn load_image(&self, path: &str) -> impl Future<Output = Result<ImageData, AssetError>> {
        async move {
            let bytes = self.load_bytes(path).await?;
            decode_image(&bytes).map_err(|source| AssetError::Image {
                path: path.to_string(),
                source,
            })
        }
    }
}

/// Assets read from a directory
#[derive(Debug, Clone)]
pub struct FsAssetSource {
    root: PathBuf,
}

impl FsAssetSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, path: &str) -> PathBuf {
        path.split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }
}

impl AssetSource for FsAssetSource {
    async fn load_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        let full = self.resolve(path);
        log::debug!("Reading asset {}", full.display());
        std::fs::read(&full).map_err(|source| match source.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound {
                path: path.to_string(),
            },
            _ => AssetError::Io {
                path: path.to_string(),
                source,
            },
        })
    }
}

/// Assets held in memory, for tests and embedded content
#[derive(Debug, Clone, Default)]
pub struct MemoryAssetSource {
    files: HashMap<String, Vec<u8>>,
    images: HashMap<String, ImageData>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    /// Register an already decoded image
    pub fn insert_image(&mut self, path: impl Into<String>, image: ImageData) {
        self.images.insert(path.into(), image);
    }

    pub fn with(mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }

    pub fn with_image(mut self, path: impl Into<String>, image: ImageData) -> Self {
        self.insert_image(path, image);
        self
    }
}

impl AssetSource for MemoryAssetSource {
    async fn load_bytes(&self, path: &str) -> Result<Vec<u8>, AssetError> {
        self.files.get(path).cloned().ok_or_else(|| AssetError::NotFound {
            path: path.to_string(),
        })
    }

    async fn load_image(&self, path: &str) -> Result<ImageData, AssetError> {
        if let Some(image) = self.images.get(path) {
            return Ok(image.clone());
        }
        let bytes = self.load_bytes(path).await?;
        decode_image(&bytes).map_err(|source| AssetError::Image {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source() {
        let assets = MemoryAssetSource::new()
            .with("shaders/a.wgsl", "fn main() {}")
            .with("bad.txt", vec![0xFF, 0xFE])
            .with_image("img.png", ImageData::solid([1, 2, 3, 4]));

        pollster::block_on(async {
            assert_eq!(
                assets.load_text("shaders/a.wgsl").await.unwrap(),
                "fn main() {}"
            );
            assert!(matches!(
                assets.load_text("bad.txt").await,
                Err(AssetError::NotText { .. })
            ));
            assert!(matches!(
                assets.load_bytes("missing").await,
                Err(AssetError::NotFound { .. })
            ));
            assert_eq!(
                assets.load_image("img.png").await.unwrap(),
                ImageData::solid([1, 2, 3, 4])
            );
            assert!(matches!(
                assets.load_image("shaders/a.wgsl").await,
                Err(AssetError::Image { .. })
            ));
        });
    }

    #[test]
    fn test_fs_resolve() {
        let assets = FsAssetSource::new("/srv/assets");
        assert_eq!(
            assets.resolve("./models//star.binobj"),
            PathBuf::from("/srv/assets/models/star.binobj")
        );
    }

    #[test]
    fn test_fs_missing_file() {
        let assets = FsAssetSource::new(std::env::temp_dir().join("ornaments-no-such-dir"));
        let result = pollster::block_on(assets.load_bytes("nothing.bin"));
        assert!(matches!(result, Err(AssetError::NotFound { .. })));
    }
}
