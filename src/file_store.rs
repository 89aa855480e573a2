//!
//! docvault file store
//! -------------------
//! Uploaded bytes live on the local filesystem under a two-level layout:
//! `<root>/<client_id>/<uuid><.ext>`. The generated name keeps the original
//! file's extension and is unique across clients and concurrent writers, so no
//! locking is needed. Files are created with `create_new`; a name is never reused.
//!
//! The same tree is served read-only by the HTTP layer under a URL prefix
//! (default `/uploads`), which is what `public_url` produces.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DEFAULT_URL_PREFIX: &str = "/uploads";

/// Location and references for a file that has just been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Generated name on disk.
    pub filename: String,
    pub original_name: String,
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
    url_prefix: String,
}

impl FileStore {
    /// Create a FileStore rooted at the given directory, creating it if needed.
    pub fn new<P: AsRef<Path>>(root: P, url_prefix: &str) -> AppResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let url_prefix = format!("/{}", url_prefix.trim_matches('/'));
        Ok(Self { root, url_prefix })
    }

    pub fn root_path(&self) -> &Path { &self.root }

    pub fn url_prefix(&self) -> &str { &self.url_prefix }

    pub fn client_dir(&self, client_id: &str) -> AppResult<PathBuf> {
        validate_segment(client_id)?;
        Ok(self.root.join(client_id))
    }

    pub fn public_url(&self, client_id: &str, filename: &str) -> String {
        format!("{}/{}/{}", self.url_prefix, client_id, filename)
    }

    /// Persist `bytes` for a client under a freshly generated name.
    ///
    /// A failed write leaves whatever was written in place.
    pub async fn store(&self, client_id: &str, original_name: &str, bytes: &[u8]) -> AppResult<StoredFile> {
        let dir = self.client_dir(client_id)?;
        tokio::fs::create_dir_all(&dir).await?;

        let filename = generated_name(original_name);
        let path = dir.join(&filename);
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(target: "docvault::file_store", "stored client='{}' file='{}' size={} original='{}'", client_id, filename, bytes.len(), original_name);
        Ok(StoredFile {
            url: self.public_url(client_id, &filename),
            filename,
            original_name: original_name.to_string(),
            path,
        })
    }

    /// Path of a stored file when it exists as a regular file.
    pub async fn locate(&self, client_id: &str, filename: &str) -> AppResult<Option<PathBuf>> {
        validate_segment(filename)?;
        let path = self.client_dir(client_id)?.join(filename);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(path)),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn exists(&self, client_id: &str, filename: &str) -> AppResult<bool> {
        Ok(self.locate(client_id, filename).await?.is_some())
    }
}

/// Final extension of `original_name` including the dot, or an empty string.
pub fn extension_of(original_name: &str) -> String {
    // Client-side paths may use either separator
    let base = original_name.rsplit(['/', '\\']).next().unwrap_or(original_name);
    match base.rfind('.') {
        Some(0) | None => String::new(),
        Some(idx) => {
            let ext = &base[idx..];
            if ext.len() > 1 && ext[1..].chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
                ext.to_string()
            } else {
                String::new()
            }
        }
    }
}

fn generated_name(original_name: &str) -> String {
    format!("{}{}", Uuid::new_v4(), extension_of(original_name))
}

/// A single path segment: non-empty, no separators, no NUL, not `.` or `..`.
pub fn validate_segment(segment: &str) -> AppResult<()> {
    if segment.is_empty() {
        return Err(AppError::user("invalid_path", "path segment cannot be empty"));
    }
    if segment == "." || segment == ".." {
        return Err(AppError::user("invalid_path", "'.' and '..' are not allowed"));
    }
    if segment.chars().any(|c| c == '/' || c == '\\' || c == '\u{0000}') {
        return Err(AppError::user("invalid_path", format!("invalid characters in path segment '{}'", segment.escape_default())));
    }
    Ok(())
}

#[cfg(test)]
#[path = "file_store_tests.rs"]
mod file_store_tests;
