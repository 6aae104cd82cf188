use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::guard::DEFAULT_FILLER_BYTES;

pub const CONFIG_FILE_NAME: &str = "geoping.toml";

/// Longest accepted retention window, in days.
pub const MAX_RETENTION_DAYS: u32 = 1_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,

    /// Shared secret for signing bearer credentials.
    pub jwt_secret: String,
    pub token_ttl_secs: i64,
    /// Login accepted by `POST /auth` for admin credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_token: Option<String>,
    /// Argon2id PHC hash of the admin password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password_hash: Option<String>,
    /// When false, `POST /jwt` without an org issues a credential for the admin token.
    pub with_auth: bool,

    /// Secret for encrypted submissions. Encrypted requests are rejected when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption_secret: Option<String>,

    /// Organizations that receive the tarpit response on ingestion.
    pub abuse_orgs: Vec<String>,
    pub filler_bytes: u64,

    pub retention_days: u32,
    pub retention_batch_size: usize,

    /// Log every ingested payload at debug level.
    pub log_payloads: bool,

    /// Per-organization retention windows in days.
    pub retention_overrides: HashMap<String, u32>,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> std::result::Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("geoping.db")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid config file: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(format!("cannot encode config: {e}")))
    }

    pub fn validate(&self) -> Result<()> {
        if self.jwt_secret.is_empty() {
            return Err(Error::Config("jwt_secret must be set".to_string()));
        }
        let windows = std::iter::once(&self.retention_days).chain(self.retention_overrides.values());
        for days in windows {
            if *days == 0 || *days > MAX_RETENTION_DAYS {
                return Err(Error::Config(format!(
                    "retention windows must be between 1 and {MAX_RETENTION_DAYS} days"
                )));
            }
        }
        if self.retention_batch_size == 0 {
            return Err(Error::Config("retention_batch_size must be positive".to_string()));
        }
        if self.admin_password_hash.is_some() != self.admin_token.is_some() {
            return Err(Error::Config(
                "admin_token and admin_password_hash must be set together".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: PathBuf::from("./data"),
            jwt_secret: String::new(),
            token_ttl_secs: 7 * 24 * 60 * 60,
            admin_token: None,
            admin_password_hash: None,
            with_auth: true,
            encryption_secret: None,
            abuse_orgs: Vec::new(),
            filler_bytes: DEFAULT_FILLER_BYTES,
            retention_days: 30,
            retention_batch_size: 500,
            log_payloads: false,
            retention_overrides: HashMap::new(),
        }
    }
}
