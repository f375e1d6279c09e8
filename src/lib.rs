pub mod auth;
pub mod background;
pub mod categories;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod images;
pub mod models;
pub mod policy;
pub mod session;
pub mod storage;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{delete, get, post},
    Router,
};
use axum_extra::extract::cookie::Key;
use sha2::{Digest, Sha512};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use auth::CredentialStore;
use categories::CategoryRegistry;
use db::{CategoryRepository, ImageRepository, UserRepository};
use error::MAX_UPLOAD_BYTES;
use images::ImageRegistry;
use session::SessionAuthority;
use storage::Storage;

/// Headroom on top of the image size for multipart boundaries and the
/// `categoryId` field.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct StateSettings {
    pub session_secret: String,
    pub session_ttl: chrono::Duration,
    pub cookie_secure: bool,
    pub bcrypt_cost: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub credentials: Arc<CredentialStore>,
    pub sessions: Arc<SessionAuthority>,
    pub categories: Arc<CategoryRegistry>,
    pub images: Arc<ImageRegistry>,
    pub cookie_key: Key,
    pub cookie_secure: bool,
}

impl AppState {
    pub fn new<R>(repository: Arc<R>, storage: Arc<dyn Storage>, settings: &StateSettings) -> Self
    where
        R: UserRepository + CategoryRepository + ImageRepository + 'static,
    {
        let users: Arc<dyn UserRepository> = repository.clone();
        let categories: Arc<dyn CategoryRepository> = repository.clone();
        let images: Arc<dyn ImageRepository> = repository;

        Self {
            credentials: Arc::new(CredentialStore::new(users, settings.bcrypt_cost)),
            sessions: Arc::new(SessionAuthority::new(settings.session_ttl)),
            categories: Arc::new(CategoryRegistry::new(categories)),
            images: Arc::new(ImageRegistry::new(images, storage)),
            cookie_key: derive_cookie_key(&settings.session_secret),
            cookie_secure: settings.cookie_secure,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Stretches the configured secret to the 64 bytes a signing key needs.
pub fn derive_cookie_key(secret: &str) -> Key {
    let digest = Sha512::digest(secret.as_bytes());
    Key::from(digest.as_slice())
}

pub fn create_router(state: AppState) -> Router {
    let upload: Router<AppState> = Router::new()
        .route("/api/upload", post(handlers::upload_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + MULTIPART_OVERHEAD_BYTES));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/signup", post(handlers::signup))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/check-auth", get(handlers::check_auth))
        .route(
            "/api/categories",
            get(handlers::list_categories).post(handlers::create_category),
        )
        .route("/api/images", get(handlers::list_images))
        .route("/api/images/:id", delete(handlers::delete_image))
        .route("/api/download/:id", get(handlers::download_image))
        .merge(upload)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
