use super::{ContentLocation, Storage, StorageError, StoredObject};
use crate::models::Image;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// Stores images as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Opens the storage root, creating it when missing.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a relative reference onto the root, refusing anything that could
    /// escape it.
    fn resolve(&self, storage_ref: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(storage_ref);
        let plain = !storage_ref.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(StorageError::InvalidReference(storage_ref.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn save(
        &self,
        file_name: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let path = self.resolve(file_name)?;
        tokio::fs::write(&path, bytes).await?;

        Ok(StoredObject {
            storage_ref: file_name.to_string(),
            public_id: None,
        })
    }

    async fn remove(&self, storage_ref: &str, _public_id: Option<&str>) -> Result<(), StorageError> {
        let path = self.resolve(storage_ref)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Stored file already missing");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn locate(&self, image: &Image) -> Result<ContentLocation, StorageError> {
        self.resolve(&image.storage_ref).map(ContentLocation::File)
    }
}
