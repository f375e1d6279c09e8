use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::{NewUser, User};
use bcrypt::{hash, verify};
use rand::Rng;
use std::sync::{Arc, OnceLock};

/// bcrypt only looks at the first 72 bytes of a password.
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Cost bounds accepted by `bcrypt::hash` (the crate keeps its own private).
pub const BCRYPT_MIN_COST: u32 = 4;
pub const BCRYPT_MAX_COST: u32 = 31;

pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    hash(password, cost)
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    verify(password, hash).unwrap_or(false)
}

pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

/// Hash checked for unknown usernames so both login failure paths cost the
/// same.
fn dummy_hash(cost: u32) -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password(&generate_token(), cost).unwrap_or_default())
}

/// User records plus password hashing.
pub struct CredentialStore {
    users: Arc<dyn UserRepository>,
    cost: u32,
}

impl CredentialStore {
    /// `cost` is the bcrypt work factor; production uses
    /// [`bcrypt::DEFAULT_COST`].
    pub fn new(users: Arc<dyn UserRepository>, cost: u32) -> Self {
        Self { users, cost }
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, AppError> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AppError::invalid_input("Username and password are required"));
        }
        if password.len() > MAX_PASSWORD_BYTES {
            return Err(AppError::invalid_input(format!(
                "Password must be at most {MAX_PASSWORD_BYTES} bytes"
            )));
        }

        if self.users.find_by_username(username).await?.is_some() {
            return Err(AppError::DuplicateUsername);
        }

        let password = password.to_string();
        let cost = self.cost;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password(&password, cost)).await??;

        // The repository re-checks uniqueness under its lock; a concurrent
        // signup for the same name can still lose here.
        let user = self
            .users
            .insert(NewUser {
                username,
                password_hash: &password_hash,
            })
            .await?;

        tracing::info!(user_id = user.id, username = %user.username, is_admin = user.is_admin, "Created user");
        Ok(user)
    }

    pub async fn verify_user(&self, username: &str, password: &str) -> Result<User, AppError> {
        let user = self.users.find_by_username(username.trim()).await?;

        let stored_hash = match &user {
            Some(user) => user.password_hash.clone(),
            None => dummy_hash(self.cost).to_string(),
        };
        let password_len = password.len();
        let password = password.to_string();
        let matches =
            tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash)).await?;

        match user {
            Some(user) if matches && password_len <= MAX_PASSWORD_BYTES => Ok(user),
            _ => Err(AppError::InvalidCredentials),
        }
    }

    /// Seeds the configured admin account into an empty store. Being the
    /// first user, it receives admin rights.
    pub async fn ensure_admin(&self, username: &str, password: &str) -> Result<(), AppError> {
        if self.users.count().await? > 0 {
            tracing::debug!("Users already exist, skipping admin bootstrap");
            return Ok(());
        }

        let user = self.create_user(username, password).await?;
        tracing::info!(username = %user.username, "Bootstrapped admin user");
        Ok(())
    }
}
