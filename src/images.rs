use crate::db::ImageRepository;
use crate::error::{AppError, MAX_UPLOAD_BYTES};
use crate::models::{Image, NewImage};
use crate::storage::{ContentLocation, Storage};
use axum::body::Bytes;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// MIME types accepted for upload, with the extension used on disk.
pub const ALLOWED_IMAGE_TYPES: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
];

/// An image file as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
    pub original_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug)]
pub struct Download {
    pub image: Image,
    pub location: ContentLocation,
}

/// Picks the MIME type for an upload: the declared one if present, otherwise a
/// guess from the file name. Returns the allow-listed type and its extension.
pub fn resolve_image_type(upload: &Upload) -> Result<(&'static str, &'static str), AppError> {
    let declared = upload
        .content_type
        .as_deref()
        .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_ascii_lowercase())
        .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

    let mime = match declared {
        Some(ct) if ct == "image/jpg" => "image/jpeg".to_string(),
        Some(ct) => ct,
        None => mime_guess::from_path(&upload.original_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    };

    ALLOWED_IMAGE_TYPES
        .iter()
        .find(|(allowed, _)| *allowed == mime)
        .copied()
        .ok_or(AppError::UnsupportedMediaType(mime))
}

/// Keeps only the final path component of a client supplied name.
fn clean_original_name(name: &str) -> String {
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .unwrap_or_default()
        .to_string()
}

/// Image metadata plus the storage backend holding the bytes. Metadata and
/// binary are kept in step: a record exists only while its binary does.
pub struct ImageRegistry {
    images: Arc<dyn ImageRepository>,
    storage: Arc<dyn Storage>,
}

impl ImageRegistry {
    pub fn new(images: Arc<dyn ImageRepository>, storage: Arc<dyn Storage>) -> Self {
        Self { images, storage }
    }

    pub async fn create(
        &self,
        upload: Upload,
        category_id: i64,
        uploaded_by: &str,
    ) -> Result<Image, AppError> {
        if upload.bytes.is_empty() {
            return Err(AppError::invalid_input("No file uploaded"));
        }
        if upload.bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::PayloadTooLarge);
        }
        let (content_type, extension) = resolve_image_type(&upload)?;

        let file_name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            extension
        );
        let original_name = match clean_original_name(&upload.original_name) {
            name if name.is_empty() => file_name.clone(),
            name => name,
        };

        let stored = self
            .storage
            .save(&file_name, &upload.bytes, content_type)
            .await?;

        let new_image = NewImage {
            file_name,
            original_name,
            storage_ref: stored.storage_ref,
            storage_public_id: stored.public_id,
            content_type: content_type.to_string(),
            size: upload.bytes.len() as u64,
            category_id,
            uploaded_by: uploaded_by.to_string(),
        };

        match self.images.insert(new_image.clone()).await {
            Ok(image) => {
                tracing::info!(
                    image_id = image.id,
                    category_id,
                    size = image.size,
                    backend = self.storage.kind(),
                    "Stored image"
                );
                Ok(image)
            }
            Err(e) => {
                if let Err(cleanup) = self
                    .storage
                    .remove(&new_image.storage_ref, new_image.storage_public_id.as_deref())
                    .await
                {
                    tracing::error!(
                        error = %cleanup,
                        storage_ref = %new_image.storage_ref,
                        "Failed to remove binary after metadata insert failed"
                    );
                }
                Err(e.into())
            }
        }
    }

    pub async fn list(&self, category_id: Option<i64>) -> Result<Vec<Image>, AppError> {
        Ok(self.images.list(category_id).await?)
    }

    pub async fn get(&self, id: i64) -> Result<Image, AppError> {
        self.images.get(id).await?.ok_or(AppError::NotFound("Image"))
    }

    /// Removes the binary first and the record only once that succeeded, so a
    /// failed removal leaves both in place.
    pub async fn delete(&self, id: i64) -> Result<(), AppError> {
        let image = self.get(id).await?;

        self.storage
            .remove(&image.storage_ref, image.storage_public_id.as_deref())
            .await?;

        self.images
            .remove(id)
            .await?
            .ok_or(AppError::NotFound("Image"))?;
        tracing::info!(image_id = id, backend = self.storage.kind(), "Deleted image");
        Ok(())
    }

    pub async fn download(&self, id: i64) -> Result<Download, AppError> {
        let image = self.get(id).await?;
        let location = self.storage.locate(&image)?;
        Ok(Download { image, location })
    }
}
