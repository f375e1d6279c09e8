use crate::storage::{RemoteStorageConfig, DEFAULT_API_BASE};
use crate::StateSettings;
use anyhow::{bail, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

const MIN_SESSION_SECRET_LEN: usize = 16;
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Local,
    Remote,
}

/// Service configuration. Every option can come from a flag or the
/// environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "gallery", version, about = "Authenticated image gallery service")]
pub struct Config {
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Secret used to sign session cookies
    #[arg(long, env = "SESSION_SECRET", hide_env_values = true)]
    pub session_secret: String,

    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = 24)]
    pub session_ttl_hours: i64,

    /// Mark the session cookie Secure (enable behind HTTPS)
    #[arg(long, env = "COOKIE_SECURE", default_value_t = false)]
    pub cookie_secure: bool,

    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,

    /// Account created on startup when no users exist
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    #[arg(long = "storage", env = "STORAGE_BACKEND", value_enum, default_value_t = StorageBackend::Local)]
    pub storage_backend: StorageBackend,

    #[arg(long, env = "UPLOADS_DIR", default_value = "uploads")]
    pub uploads_dir: PathBuf,

    #[arg(long, env = "MEDIA_CLOUD_NAME")]
    pub media_cloud_name: Option<String>,

    #[arg(long, env = "MEDIA_API_KEY")]
    pub media_api_key: Option<String>,

    #[arg(long, env = "MEDIA_API_SECRET", hide_env_values = true)]
    pub media_api_secret: Option<String>,

    #[arg(long, env = "MEDIA_API_BASE", default_value = DEFAULT_API_BASE)]
    pub media_api_base: String,

    #[arg(long, env = "MEDIA_FOLDER", default_value = "gallery")]
    pub media_folder: String,

    /// URL pinged every 14 minutes to keep the host awake
    #[arg(long, env = "KEEPALIVE_URL")]
    pub keepalive_url: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.session_secret.len() < MIN_SESSION_SECRET_LEN {
            bail!("SESSION_SECRET must be at least {MIN_SESSION_SECRET_LEN} bytes");
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.session_ttl_hours) {
            bail!("SESSION_TTL_HOURS must be between 1 and {MAX_SESSION_TTL_HOURS}");
        }
        if !(crate::auth::BCRYPT_MIN_COST..=crate::auth::BCRYPT_MAX_COST).contains(&self.bcrypt_cost) {
            bail!(
                "BCRYPT_COST must be between {} and {}",
                crate::auth::BCRYPT_MIN_COST,
                crate::auth::BCRYPT_MAX_COST
            );
        }
        if self.admin_username.is_some() != self.admin_password.is_some() {
            bail!("ADMIN_USERNAME and ADMIN_PASSWORD must be set together");
        }
        if self.storage_backend == StorageBackend::Remote {
            self.remote_storage()?;
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn admin_account(&self) -> Option<(&str, &str)> {
        self.admin_username
            .as_deref()
            .zip(self.admin_password.as_deref())
    }

    pub fn state_settings(&self) -> StateSettings {
        StateSettings {
            session_secret: self.session_secret.clone(),
            session_ttl: chrono::Duration::hours(self.session_ttl_hours),
            cookie_secure: self.cookie_secure,
            bcrypt_cost: self.bcrypt_cost,
        }
    }

    pub fn remote_storage(&self) -> Result<RemoteStorageConfig> {
        match (
            &self.media_cloud_name,
            &self.media_api_key,
            &self.media_api_secret,
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Ok(RemoteStorageConfig {
                api_base: self.media_api_base.clone(),
                cloud_name: cloud_name.clone(),
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
                folder: self.media_folder.clone(),
            }),
            _ => bail!(
                "remote storage requires MEDIA_CLOUD_NAME, MEDIA_API_KEY and MEDIA_API_SECRET"
            ),
        }
    }
}
