//! Scene byte sources.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

use crate::error::EnvError;

/// Abstraction for fetching raw scene bytes (a splat PLY file).
///
/// # Implementations
///
/// - **Production**: `FileSource` - reads from a directory via tokio fs
/// - **Testing**: `MemorySource` - serves byte buffers registered up front
///
/// Loads may complete out of order; the caller pairs each fetch with a
/// load token so stale completions can be discarded.
#[async_trait]
pub trait SceneSource: Send + Sync {
    /// Fetches the complete byte buffer behind `locator`.
    ///
    /// # Returns
    /// * `Ok(bytes)` - The full scene file
    /// * `Err(EnvError::NotFound)` - Nothing stored under the locator
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, EnvError>;
}

/// Reads scenes from files below a root directory.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    /// Creates a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolves a locator to a path inside the root.
    ///
    /// Absolute paths and `..` components are rejected.
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, EnvError> {
        let relative = Path::new(locator);
        if locator.is_empty() {
            return Err(EnvError::invalid_locator("<empty>"));
        }
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(EnvError::invalid_locator(locator));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl SceneSource for FileSource {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, EnvError> {
        let path = self.resolve(locator)?;
        debug!("reading scene bytes from {}", path.display());
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EnvError::not_found(locator))
            }
            Err(e) => Err(EnvError::Io(e)),
        }
    }
}

/// In-memory scene store.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scenes: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `bytes` under `locator`, replacing any previous entry.
    pub fn insert(&mut self, locator: impl Into<String>, bytes: Vec<u8>) {
        self.scenes.insert(locator.into(), bytes);
    }

    /// Builder-style variant of [`MemorySource::insert`].
    pub fn with_scene(mut self, locator: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.insert(locator, bytes);
        self
    }
}

#[async_trait]
impl SceneSource for MemorySource {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, EnvError> {
        self.scenes
            .get(locator)
            .cloned()
            .ok_or_else(|| EnvError::not_found(locator))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_fetch() {
        let source = MemorySource::new().with_scene("a.ply", vec![1, 2, 3]);

        assert_eq!(source.fetch("a.ply").await.unwrap(), vec![1, 2, 3]);
        assert!(matches!(
            source.fetch("missing.ply").await,
            Err(EnvError::NotFound(_))
        ));
    }

    #[test]
    fn test_file_source_rejects_escaping_locators() {
        let source = FileSource::new("/srv/scenes");

        assert!(source.resolve("frames/01.ply").is_ok());
        assert!(matches!(
            source.resolve("../secret.ply"),
            Err(EnvError::InvalidLocator(_))
        ));
        assert!(matches!(
            source.resolve("/etc/passwd"),
            Err(EnvError::InvalidLocator(_))
        ));
        assert!(matches!(source.resolve(""), Err(EnvError::InvalidLocator(_))));
    }

    #[tokio::test]
    async fn test_file_source_reads_and_reports_missing() {
        let dir = std::env::temp_dir().join(format!("splatcam_env_{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("scene.ply"), b"ply\n").await.unwrap();

        let source = FileSource::new(&dir);
        assert_eq!(source.fetch("scene.ply").await.unwrap(), b"ply\n".to_vec());
        assert!(matches!(
            source.fetch("other.ply").await,
            Err(EnvError::NotFound(_))
        ));

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
