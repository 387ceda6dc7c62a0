//! Durable token-file storage
//!
//! Holds the latest `TokenRecord` as JSON. Writes go to a temp file in the
//! same directory and are renamed over the canonical path, so a reader sees
//! either the old complete file or the new one. A missing or unparseable
//! file loads as absent: losing the cache costs one extra acquisition.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::record::TokenRecord;

/// Token file at a fixed path.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record.
    ///
    /// Missing file → `Ok(None)`. Invalid JSON or a record violating its
    /// invariants → `Ok(None)` with a warning. Other read failures (e.g.
    /// permissions) → `Error::Persistence`.
    pub async fn load(&self) -> Result<Option<TokenRecord>> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "token file not found");
                return Ok(None);
            }
            Err(e) => {
                return Err(Error::Persistence(format!(
                    "reading token file {}: {e}",
                    self.path.display()
                )));
            }
        };

        let record: TokenRecord = match serde_json::from_str(&contents) {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "token file is not valid JSON, ignoring");
                return Ok(None);
            }
        };

        if let Err(e) = record.validate() {
            warn!(path = %self.path.display(), error = %e, "token file holds an invalid record, ignoring");
            return Ok(None);
        }

        debug!(
            path = %self.path.display(),
            expires_at = record.expires_at(),
            has_refresh_token = record.refresh_token().is_some(),
            "loaded token record"
        );
        Ok(Some(record))
    }

    /// Persist `record`, replacing the file atomically.
    pub async fn save(&self, record: &TokenRecord) -> Result<()> {
        write_atomic(&self.path, record).await
    }
}

/// Write the record to a temp file beside `path`, then rename it into place.
///
/// Permissions are set to 0600 before the rename since the file holds bearer
/// and refresh tokens.
async fn write_atomic(path: &Path, record: &TokenRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| Error::Persistence(format!("serializing token record: {e}")))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Persistence(format!("token path {} has no file name", path.display())))?;
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    if !dir.as_os_str().is_empty() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Persistence(format!("creating token directory {}: {e}", dir.display())))?;
    }

    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name.to_string_lossy(),
        std::process::id()
    ));

    if let Err(e) = write_synced(&tmp_path, json.as_bytes()).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Persistence(format!("writing temp token file: {e}")));
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        if let Err(e) = tokio::fs::set_permissions(&tmp_path, perms).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Error::Persistence(format!("setting token file permissions: {e}")));
        }
    }

    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(Error::Persistence(format!("renaming temp token file: {e}")));
    }

    debug!(path = %path.display(), "persisted token record");
    Ok(())
}

/// Write `bytes` and flush them to disk before the caller renames the file.
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}
