//! Session directory owned by the messaging client
//!
//! The directory layout and credential format belong to the external client.
//! This store only guarantees the directory exists, round-trips the
//! credential file as opaque JSON, and lists the files for export.

use pairgate_core::CREDENTIALS_FILE;
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for pairgate_core::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => pairgate_core::Error::Io(e),
            StoreError::Json(e) => pairgate_core::Error::Json(e),
        }
    }
}

/// Session directory with credential persistence
pub struct SessionStore {
    /// Root of the session directory
    dir: PathBuf,
    /// Serializes credential writes
    write_lock: Mutex<()>,
}

impl SessionStore {
    /// Open the session directory, creating it if absent
    pub fn open(dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let dir = dir.into();
        if !dir.exists() {
            info!("Creating session directory {:?}", dir);
        }
        std::fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Root of the session directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the credential file
    pub fn credentials_path(&self) -> PathBuf {
        self.dir.join(CREDENTIALS_FILE)
    }

    /// Load stored credentials, if any
    ///
    /// A corrupt credential file is treated as absent so pairing can start
    /// fresh.
    pub async fn load_credentials(&self) -> StoreResult<Option<Value>> {
        let path = self.credentials_path();
        if !tokio::fs::try_exists(&path).await? {
            debug!("No stored credentials at {:?}", path);
            return Ok(None);
        }

        let contents = tokio::fs::read_to_string(&path).await?;
        match serde_json::from_str(&contents) {
            Ok(creds) => {
                info!("Loaded credentials from {:?}", path);
                Ok(Some(creds))
            }
            Err(e) => {
                warn!("Failed to parse stored credentials, starting fresh: {}", e);
                Ok(None)
            }
        }
    }

    /// Persist credentials emitted by the messaging client
    pub async fn save_credentials(&self, creds: &Value) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(creds)?;
        let path = self.credentials_path();
        let tmp = path.with_extension("json.tmp");

        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Saved credentials to {:?}", path);
        Ok(())
    }

    /// Every regular file under the session directory, relative to its root
    ///
    /// Sorted so archives are reproducible.
    pub fn files(&self) -> StoreResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        collect_files(&self.dir, Path::new(""), &mut files)?;
        files.sort();
        Ok(files)
    }
}

fn collect_files(root: &Path, relative: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(root.join(relative))? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let path = relative.join(entry.file_name());

        if file_type.is_dir() {
            collect_files(root, &path, out)?;
        } else if file_type.is_file() {
            out.push(path);
        }
    }
    Ok(())
}
