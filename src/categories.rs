use crate::db::CategoryRepository;
use crate::error::AppError;
use crate::models::Category;
use std::sync::Arc;

pub struct CategoryRegistry {
    categories: Arc<dyn CategoryRepository>,
}

impl CategoryRegistry {
    pub fn new(categories: Arc<dyn CategoryRepository>) -> Self {
        Self { categories }
    }

    pub async fn create(&self, name: &str) -> Result<Category, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::invalid_input("Category name is required"));
        }

        let category = self.categories.insert(name).await?;
        tracing::info!(category_id = category.id, name = %category.name, "Created category");
        Ok(category)
    }

    pub async fn list_all(&self) -> Result<Vec<Category>, AppError> {
        Ok(self.categories.list().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[tokio::test]
    async fn test_create_and_list_in_order() {
        let registry = CategoryRegistry::new(Arc::new(MemoryStore::new()));
        let nature = registry.create("Nature").await.unwrap();
        let city = registry.create("  City  ").await.unwrap();

        assert_eq!(nature.id, 1);
        assert_eq!(city.id, 2);
        assert_eq!(city.name, "City");
        assert_eq!(registry.list_all().await.unwrap(), vec![nature, city]);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let registry = CategoryRegistry::new(Arc::new(MemoryStore::new()));
        for name in ["", "   "] {
            assert!(matches!(
                registry.create(name).await.unwrap_err(),
                AppError::InvalidInput(_)
            ));
        }
        assert!(registry.list_all().await.unwrap().is_empty());
    }
}
