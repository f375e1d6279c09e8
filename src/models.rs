use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_admin: bool,
}

#[derive(Debug)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub password_hash: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub id: i64,
    pub file_name: String,
    pub original_name: String,
    /// Path relative to the uploads root, or the remote URL.
    pub storage_ref: String,
    /// Handle the remote host needs to delete the asset.
    pub storage_public_id: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub category_id: i64,
    pub uploaded_by: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub file_name: String,
    pub original_name: String,
    pub storage_ref: String,
    pub storage_public_id: Option<String>,
    pub content_type: String,
    pub size: u64,
    pub category_id: i64,
    pub uploaded_by: String,
}

/// Identity resolved from a live session. Handlers receive this by value and
/// never write back into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedIdentity {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for AuthenticatedIdentity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_password_hash() {
        let user = User {
            id: 1,
            username: "alice".to_string(),
            password_hash: "$2b$04$secret".to_string(),
            is_admin: true,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["isAdmin"], true);
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_image_uses_camel_case_fields() {
        let image = Image {
            id: 7,
            file_name: "1700000000000-abc.png".to_string(),
            original_name: "cat.png".to_string(),
            storage_ref: "1700000000000-abc.png".to_string(),
            storage_public_id: None,
            content_type: "image/png".to_string(),
            size: 42,
            category_id: 3,
            uploaded_by: "admin".to_string(),
            uploaded_at: Utc::now(),
        };

        let json = serde_json::to_value(&image).unwrap();
        assert_eq!(json["fileName"], "1700000000000-abc.png");
        assert_eq!(json["originalName"], "cat.png");
        assert_eq!(json["categoryId"], 3);
        assert_eq!(json["uploadedBy"], "admin");
        assert!(json["storagePublicId"].is_null());
        assert!(json.get("uploadedAt").is_some());
    }
}
