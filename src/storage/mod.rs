//! Binary content storage for uploaded images.
//!
//! Image metadata lives in the image registry; the bytes themselves live in
//! one of two backends picked once at startup:
//! - [`LocalStorage`] writes files under an uploads directory
//! - [`RemoteStorage`] pushes them to a Cloudinary-compatible media host

mod local;
mod remote;

pub use local::LocalStorage;
pub use remote::{RemoteStorage, RemoteStorageConfig, DEFAULT_API_BASE};

use crate::models::Image;
use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("media host request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("media host rejected request: {0}")]
    Rejected(String),
    #[error("invalid storage reference: {0}")]
    InvalidReference(String),
}

/// Where a stored object ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub storage_ref: String,
    pub public_id: Option<String>,
}

/// How a download should be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentLocation {
    File(PathBuf),
    Redirect(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Short backend name for logs.
    fn kind(&self) -> &'static str;

    async fn save(
        &self,
        file_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError>;

    /// Releases a stored object. An object that is already gone counts as
    /// removed.
    async fn remove(&self, storage_ref: &str, public_id: Option<&str>) -> Result<(), StorageError>;

    fn locate(&self, image: &Image) -> Result<ContentLocation, StorageError>;
}
