//! Server configuration from environment variables (a `.env` file is honored).
//!
//! | Variable                 | Default               |
//! |--------------------------|-----------------------|
//! | `MONGODB_URI`            | required              |
//! | `DOCVAULT_HTTP_PORT`     | 8000                  |
//! | `DOCVAULT_DB_NAME`       | `document_management` |
//! | `DOCVAULT_UPLOAD_DIR`    | `uploads`             |
//! | `DOCVAULT_MAX_UPLOAD_MB` | 25                    |
//!
//! `MONGODB_URI=memory://` selects the in-process record store.

use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::warn;

use crate::file_store::DEFAULT_URL_PREFIX;
use crate::record_store::mongo::DEFAULT_DATABASE;
use crate::record_store::MEMORY_URI;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_MAX_UPLOAD_MB: usize = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub http_port: u16,
    pub mongodb_uri: String,
    pub database_name: String,
    pub upload_dir: PathBuf,
    pub uploads_url_prefix: String,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            mongodb_uri: MEMORY_URI.to_string(),
            database_name: DEFAULT_DATABASE.to_string(),
            upload_dir: PathBuf::from(DEFAULT_UPLOAD_DIR),
            uploads_url_prefix: DEFAULT_URL_PREFIX.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        let mongodb_uri = lookup("MONGODB_URI")
            .filter(|v| !v.trim().is_empty())
            .context("MONGODB_URI must be set (use memory:// for an in-process store)")?;
        let max_upload_mb: usize = parse_or(&lookup, "DOCVAULT_MAX_UPLOAD_MB", DEFAULT_MAX_UPLOAD_MB)?;
        Ok(ServerConfig {
            http_port: parse_or(&lookup, "DOCVAULT_HTTP_PORT", defaults.http_port)?,
            mongodb_uri,
            database_name: lookup("DOCVAULT_DB_NAME").unwrap_or(defaults.database_name),
            upload_dir: lookup("DOCVAULT_UPLOAD_DIR").map(PathBuf::from).unwrap_or(defaults.upload_dir),
            uploads_url_prefix: defaults.uploads_url_prefix,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| {
            warn!(target: "docvault::config", "Invalid {key} value '{raw}': {e}");
            anyhow::anyhow!("invalid {key} value '{raw}': {e}")
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_uri_is_set() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[("MONGODB_URI", "mongodb://localhost:27017")])).unwrap();
        assert_eq!(cfg.mongodb_uri, "mongodb://localhost:27017");
        assert_eq!(cfg.http_port, 8000);
        assert_eq!(cfg.database_name, "document_management");
        assert_eq!(cfg.upload_dir, PathBuf::from("uploads"));
        assert_eq!(cfg.uploads_url_prefix, "/uploads");
        assert_eq!(cfg.max_upload_bytes, 25 * 1024 * 1024);
    }

    #[test]
    fn missing_uri_is_an_error() {
        assert!(ServerConfig::from_lookup(lookup_from(&[])).is_err());
        assert!(ServerConfig::from_lookup(lookup_from(&[("MONGODB_URI", "  ")])).is_err());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = ServerConfig::from_lookup(lookup_from(&[
            ("MONGODB_URI", "memory://"),
            ("DOCVAULT_HTTP_PORT", "9191"),
            ("DOCVAULT_DB_NAME", "records"),
            ("DOCVAULT_UPLOAD_DIR", "/srv/files"),
            ("DOCVAULT_MAX_UPLOAD_MB", "2"),
        ])).unwrap();
        assert_eq!(cfg.http_port, 9191);
        assert_eq!(cfg.database_name, "records");
        assert_eq!(cfg.upload_dir, PathBuf::from("/srv/files"));
        assert_eq!(cfg.max_upload_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let err = ServerConfig::from_lookup(lookup_from(&[("MONGODB_URI", "memory://"), ("DOCVAULT_HTTP_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("DOCVAULT_HTTP_PORT"));
    }
}
