use super::{ContentLocation, Storage, StorageError, StoredObject};
use crate::models::Image;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Clone)]
pub struct RemoteStorageConfig {
    pub api_base: String,
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub folder: String,
}

/// Cloudinary-compatible media host client.
#[derive(Debug, Clone)]
pub struct RemoteStorage {
    config: RemoteStorageConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

impl RemoteStorage {
    pub fn new(config: RemoteStorageConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("gallery/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();

        Self {
            config,
            http_client,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!(
            "{}/{}/image/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.cloud_name,
            action
        )
    }

    fn sign(&self, params: &[(&str, &str)]) -> String {
        sign_params(params, &self.config.api_secret)
    }
}

/// Signs request parameters: sorted `key=value` pairs joined by `&`, the API
/// secret appended, SHA-1, lowercase hex.
pub(crate) fn sign_params(params: &[(&str, &str)], api_secret: &str) -> String {
    let mut sorted = params.to_vec();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha1::new();
    hasher.update(joined.as_bytes());
    hasher.update(api_secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Public ids are the file name without its extension.
fn public_id_for(file_name: &str) -> &str {
    file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name)
}

#[async_trait]
impl Storage for RemoteStorage {
    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn save(
        &self,
        file_name: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<StoredObject, StorageError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let public_id = public_id_for(file_name);
        let signature = self.sign(&[
            ("folder", self.config.folder.as_str()),
            ("public_id", public_id),
            ("timestamp", timestamp.as_str()),
        ]);

        let file = Part::bytes(bytes.to_vec())
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("folder", self.config.folder.clone())
            .text("public_id", public_id.to_string())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let response = self
            .http_client
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected(format!("upload returned {status}: {body}")));
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(public_id = %uploaded.public_id, "Uploaded image to media host");

        Ok(StoredObject {
            storage_ref: uploaded.secure_url,
            public_id: Some(uploaded.public_id),
        })
    }

    async fn remove(&self, storage_ref: &str, public_id: Option<&str>) -> Result<(), StorageError> {
        let public_id =
            public_id.ok_or_else(|| StorageError::InvalidReference(storage_ref.to_string()))?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", public_id), ("timestamp", timestamp.as_str())]);

        let params = [
            ("public_id", public_id),
            ("api_key", self.config.api_key.as_str()),
            ("timestamp", timestamp.as_str()),
            ("signature", signature.as_str()),
        ];

        let response = self
            .http_client
            .post(self.endpoint("destroy"))
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected(format!("destroy returned {status}: {body}")));
        }

        let destroyed: DestroyResponse = response.json().await?;
        match destroyed.result.as_str() {
            "ok" => Ok(()),
            "not found" => {
                tracing::warn!(public_id, "Media host had no asset to destroy");
                Ok(())
            }
            other => Err(StorageError::Rejected(format!("destroy result: {other}"))),
        }
    }

    fn locate(&self, image: &Image) -> Result<ContentLocation, StorageError> {
        Ok(ContentLocation::Redirect(image.storage_ref.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Router};

    /// Serves `body` with `status` for every upload and destroy call and
    /// returns a storage pointed at it.
    async fn stub_host(status: StatusCode, body: &'static str) -> RemoteStorage {
        let reply = move |_body: axum::body::Bytes| async move {
            (status, [("content-type", "application/json")], body)
        };
        let app = Router::new()
            .route("/demo/image/upload", post(reply))
            .route("/demo/image/destroy", post(reply));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        RemoteStorage::new(RemoteStorageConfig {
            api_base: format!("http://{addr}"),
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "gallery".to_string(),
        })
    }

    fn storage() -> RemoteStorage {
        RemoteStorage::new(RemoteStorageConfig {
            api_base: "https://media.example.com/v1_1/".to_string(),
            cloud_name: "demo".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            folder: "gallery".to_string(),
        })
    }

    #[test]
    fn test_signature_is_order_independent() {
        let a = sign_params(&[("timestamp", "1"), ("public_id", "x")], "s");
        let b = sign_params(&[("public_id", "x"), ("timestamp", "1")], "s");
        assert_eq!(a, b);

        let mut hasher = Sha1::new();
        hasher.update(b"public_id=x&timestamp=1s");
        assert_eq!(a, hex::encode(hasher.finalize()));
    }

    #[test]
    fn test_signature_depends_on_secret() {
        let params = [("public_id", "x"), ("timestamp", "1")];
        assert_ne!(sign_params(&params, "one"), sign_params(&params, "two"));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        assert_eq!(
            storage().endpoint("upload"),
            "https://media.example.com/v1_1/demo/image/upload"
        );
    }

    #[test]
    fn test_public_id_strips_extension() {
        assert_eq!(public_id_for("123-abc.png"), "123-abc");
        assert_eq!(public_id_for("noext"), "noext");
    }

    #[test]
    fn test_locate_redirects_to_stored_url() {
        let image = Image {
            id: 1,
            file_name: "a.png".to_string(),
            original_name: "a.png".to_string(),
            storage_ref: "https://cdn.example.com/a.png".to_string(),
            storage_public_id: Some("gallery/a".to_string()),
            content_type: "image/png".to_string(),
            size: 1,
            category_id: 1,
            uploaded_by: "admin".to_string(),
            uploaded_at: chrono::Utc::now(),
        };

        assert_eq!(
            storage().locate(&image).unwrap(),
            ContentLocation::Redirect("https://cdn.example.com/a.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_upload_maps_host_response() {
        let storage = stub_host(
            StatusCode::OK,
            r#"{"secure_url":"https://cdn.example.com/gallery/1-a.png","public_id":"gallery/1-a","bytes":4}"#,
        )
        .await;

        let stored = storage.save("1-a.png", b"fake", "image/png").await.unwrap();

        assert_eq!(stored.storage_ref, "https://cdn.example.com/gallery/1-a.png");
        assert_eq!(stored.public_id.as_deref(), Some("gallery/1-a"));
    }

    #[tokio::test]
    async fn test_upload_error_status_is_rejected() {
        let storage = stub_host(
            StatusCode::INTERNAL_SERVER_ERROR,
            r#"{"error":{"message":"boom"}}"#,
        )
        .await;

        assert!(matches!(
            storage.save("1-a.png", b"fake", "image/png").await.unwrap_err(),
            StorageError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_destroy_ok_and_not_found_count_as_removed() {
        let ok = stub_host(StatusCode::OK, r#"{"result":"ok"}"#).await;
        ok.remove("https://cdn/a.png", Some("gallery/a")).await.unwrap();

        let missing = stub_host(StatusCode::OK, r#"{"result":"not found"}"#).await;
        missing.remove("https://cdn/a.png", Some("gallery/a")).await.unwrap();
    }

    #[tokio::test]
    async fn test_destroy_other_result_fails() {
        let storage = stub_host(StatusCode::OK, r#"{"result":"error"}"#).await;

        assert!(matches!(
            storage.remove("https://cdn/a.png", Some("gallery/a")).await.unwrap_err(),
            StorageError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_destroy_error_status_fails() {
        let storage = stub_host(StatusCode::INTERNAL_SERVER_ERROR, r#"{"result":"ok"}"#).await;

        assert!(matches!(
            storage.remove("https://cdn/a.png", Some("gallery/a")).await.unwrap_err(),
            StorageError::Rejected(_)
        ));
    }

    #[tokio::test]
    async fn test_remove_without_public_id_is_invalid() {
        assert!(matches!(
            storage().remove("https://cdn/a.png", None).await.unwrap_err(),
            StorageError::InvalidReference(_)
        ));
    }
}
