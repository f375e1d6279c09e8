use crate::models::{Category, Image, NewImage, NewUser, User};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Duplicate,
    #[error("backend error: {0}")]
    Backend(String),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user, rejecting a taken username. The first user ever
    /// inserted is flagged admin.
    async fn insert(&self, user: NewUser<'_>) -> RepositoryResult<User>;
    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>>;
    async fn count(&self) -> RepositoryResult<usize>;
}

#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn insert(&self, name: &str) -> RepositoryResult<Category>;
    async fn list(&self) -> RepositoryResult<Vec<Category>>;
}

#[async_trait]
pub trait ImageRepository: Send + Sync {
    async fn insert(&self, image: NewImage) -> RepositoryResult<Image>;
    async fn list(&self, category_id: Option<i64>) -> RepositoryResult<Vec<Image>>;
    async fn get(&self, id: i64) -> RepositoryResult<Option<Image>>;
    async fn remove(&self, id: i64) -> RepositoryResult<Option<Image>>;
}

/// Monotonic id source. Ids start at 1 and are never handed out twice.
#[derive(Debug)]
struct IdSequence(AtomicI64);

impl IdSequence {
    fn new() -> Self {
        Self(AtomicI64::new(1))
    }

    fn next(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

/// Process-memory store backing all three repositories. Contents are lost on
/// restart.
#[derive(Debug)]
pub struct MemoryStore {
    users: RwLock<Vec<User>>,
    categories: RwLock<Vec<Category>>,
    images: RwLock<Vec<Image>>,
    user_ids: IdSequence,
    category_ids: IdSequence,
    image_ids: IdSequence,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(Vec::new()),
            categories: RwLock::new(Vec::new()),
            images: RwLock::new(Vec::new()),
            user_ids: IdSequence::new(),
            category_ids: IdSequence::new(),
            image_ids: IdSequence::new(),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

pub fn establish_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: NewUser<'_>) -> RepositoryResult<User> {
        let mut users = self.users.write();
        if users.iter().any(|u| u.username == user.username) {
            return Err(RepositoryError::Duplicate);
        }

        let record = User {
            id: self.user_ids.next(),
            username: user.username.to_string(),
            password_hash: user.password_hash.to_string(),
            is_admin: users.is_empty(),
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn find_by_username(&self, username: &str) -> RepositoryResult<Option<User>> {
        Ok(self
            .users
            .read()
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn count(&self) -> RepositoryResult<usize> {
        Ok(self.users.read().len())
    }
}

#[async_trait]
impl CategoryRepository for MemoryStore {
    async fn insert(&self, name: &str) -> RepositoryResult<Category> {
        let mut categories = self.categories.write();
        let category = Category {
            id: self.category_ids.next(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        categories.push(category.clone());
        Ok(category)
    }

    async fn list(&self) -> RepositoryResult<Vec<Category>> {
        Ok(self.categories.read().clone())
    }
}

#[async_trait]
impl ImageRepository for MemoryStore {
    async fn insert(&self, image: NewImage) -> RepositoryResult<Image> {
        let mut images = self.images.write();
        let record = Image {
            id: self.image_ids.next(),
            file_name: image.file_name,
            original_name: image.original_name,
            storage_ref: image.storage_ref,
            storage_public_id: image.storage_public_id,
            content_type: image.content_type,
            size: image.size,
            category_id: image.category_id,
            uploaded_by: image.uploaded_by,
            uploaded_at: Utc::now(),
        };
        images.push(record.clone());
        Ok(record)
    }

    async fn list(&self, category_id: Option<i64>) -> RepositoryResult<Vec<Image>> {
        let images = self.images.read();
        Ok(match category_id {
            Some(id) => images.iter().filter(|i| i.category_id == id).cloned().collect(),
            None => images.clone(),
        })
    }

    async fn get(&self, id: i64) -> RepositoryResult<Option<Image>> {
        Ok(self.images.read().iter().find(|i| i.id == id).cloned())
    }

    async fn remove(&self, id: i64) -> RepositoryResult<Option<Image>> {
        let mut images = self.images.write();
        Ok(images
            .iter()
            .position(|i| i.id == id)
            .map(|index| images.remove(index)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_image(category_id: i64, name: &str) -> NewImage {
        NewImage {
            file_name: format!("{name}.png"),
            original_name: format!("{name}.png"),
            storage_ref: format!("{name}.png"),
            storage_public_id: None,
            content_type: "image/png".to_string(),
            size: 3,
            category_id,
            uploaded_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_first_user_is_admin() {
        let store = MemoryStore::new();
        let first = UserRepository::insert(&store, NewUser { username: "a", password_hash: "h" })
            .await
            .unwrap();
        let second = UserRepository::insert(&store, NewUser { username: "b", password_hash: "h" })
            .await
            .unwrap();

        assert!(first.is_admin);
        assert!(!second.is_admin);
        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryStore::new();
        UserRepository::insert(&store, NewUser { username: "a", password_hash: "h1" })
            .await
            .unwrap();
        let err = UserRepository::insert(&store, NewUser { username: "a", password_hash: "h2" })
            .await
            .unwrap_err();

        assert!(matches!(err, RepositoryError::Duplicate));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_image_filter_preserves_order() {
        let store = MemoryStore::new();
        for (category, name) in [(1, "a"), (2, "b"), (1, "c"), (3, "d")] {
            ImageRepository::insert(&store, new_image(category, name))
                .await
                .unwrap();
        }

        let names: Vec<_> = ImageRepository::list(&store, Some(1))
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.original_name)
            .collect();
        assert_eq!(names, vec!["a.png", "c.png"]);
        assert!(ImageRepository::list(&store, Some(99)).await.unwrap().is_empty());
        assert_eq!(ImageRepository::list(&store, None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_remove_is_exact_and_ids_not_reused() {
        let store = MemoryStore::new();
        let a = ImageRepository::insert(&store, new_image(1, "a")).await.unwrap();
        let b = ImageRepository::insert(&store, new_image(1, "b")).await.unwrap();

        assert_eq!(store.remove(a.id).await.unwrap().map(|i| i.id), Some(a.id));
        assert!(store.remove(a.id).await.unwrap().is_none());
        assert_eq!(store.get(b.id).await.unwrap(), Some(b.clone()));

        let c = ImageRepository::insert(&store, new_image(1, "c")).await.unwrap();
        assert_eq!(c.id, 3);
    }

    #[tokio::test]
    async fn test_category_ids_monotonic() {
        let store = MemoryStore::new();
        let first = CategoryRepository::insert(&store, "Nature").await.unwrap();
        let second = CategoryRepository::insert(&store, "City").await.unwrap();

        assert_eq!((first.id, second.id), (1, 2));
        let names: Vec<_> = CategoryRepository::list(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Nature", "City"]);
    }
}
