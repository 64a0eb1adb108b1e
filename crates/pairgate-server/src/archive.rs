//! Session directory export
//!
//! Zips the session directory into a per-request temporary file, streams it
//! to the client as `session-<id>.zip` and deletes the file once the body is
//! finished or dropped. Only building the zip is serialized; streaming is not.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::Stream;
use pairgate_auth::{SessionId, SessionStore};
use pairgate_core::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempPath;
use tokio::io::AsyncReadExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Deflate level used for session archives
const COMPRESSION_LEVEL: i64 = 9;

/// Bytes read per body chunk
const CHUNK_SIZE: usize = 64 * 1024;

/// File name of the archive for `id`
pub fn archive_name(id: &SessionId) -> String {
    format!("session-{}.zip", id)
}

/// Builds download archives from the session directory
pub struct ArchiveExporter {
    store: Arc<SessionStore>,
    archive_dir: PathBuf,
    build_lock: Mutex<()>,
}

impl ArchiveExporter {
    pub fn new(store: Arc<SessionStore>, archive_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            archive_dir: archive_dir.into(),
            build_lock: Mutex::new(()),
        }
    }

    /// Zip the session directory for `id`
    ///
    /// Each call writes its own temporary file, so a slow download never
    /// holds up the next one.
    pub async fn export(&self, id: &SessionId) -> Result<SessionArchive> {
        let name = archive_name(id);
        let (out, path) = tempfile::Builder::new()
            .prefix(&format!("session-{}-", id))
            .suffix(".zip")
            .tempfile_in(&self.archive_dir)?
            .into_parts();
        let temp = TempArchive(Some(path));

        let count = {
            let _building = self.build_lock.lock().await;
            let source = self.store.dir().to_path_buf();
            let files = self.store.files()?;
            let count = files.len();

            tokio::task::spawn_blocking(move || write_zip(&source, &files, out))
                .await
                .map_err(|e| Error::archive(format!("archive task failed: {}", e)))??;
            count
        };

        let file = tokio::fs::File::open(temp.path()).await?;
        let len = file.metadata().await?.len();
        info!("Built {} ({} files, {} bytes)", name, count, len);

        Ok(SessionArchive {
            name,
            len,
            file,
            temp,
        })
    }
}

/// Write `files` (relative to `source`) as a zip into `out`
fn write_zip(source: &Path, files: &[PathBuf], out: std::fs::File) -> Result<()> {
    let mut zip = ZipWriter::new(std::io::BufWriter::new(out));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL));

    for relative in files {
        zip.start_file(entry_name(relative), options)
            .map_err(|e| Error::archive(e.to_string()))?;
        let mut input = std::fs::File::open(source.join(relative))?;
        std::io::copy(&mut input, &mut zip)?;
    }

    let mut out = zip.finish().map_err(|e| Error::archive(e.to_string()))?;
    out.flush()?;
    Ok(())
}

/// Entry name with `/` separators and no leading folder
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Archive file on disk, removed on drop
struct TempArchive(Option<TempPath>);

impl TempArchive {
    fn path(&self) -> &Path {
        self.0.as_deref().unwrap_or_else(|| Path::new(""))
    }
}

impl Drop for TempArchive {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let removed = path.to_path_buf();
            match path.close() {
                Ok(()) => debug!("Removed {:?}", removed),
                Err(e) => warn!("Failed to remove {:?}: {}", removed, e),
            }
        }
    }
}

/// A built archive ready to stream
pub struct SessionArchive {
    name: String,
    len: u64,
    file: tokio::fs::File,
    temp: TempArchive,
}

impl SessionArchive {
    /// Download file name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Size in bytes
    pub fn content_length(&self) -> u64 {
        self.len
    }

    /// Path of the temporary file
    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    /// Stream the archive; the file is deleted when the stream ends or drops
    pub fn into_stream(self) -> impl Stream<Item = std::io::Result<Bytes>> + Send + 'static {
        let state = (self.file, self.temp);
        futures::stream::try_unfold(state, |(mut file, temp)| async move {
            let mut buf = vec![0u8; CHUNK_SIZE];
            let n = file.read(&mut buf).await?;
            if n == 0 {
                return Ok(None);
            }
            buf.truncate(n);
            Ok::<_, std::io::Error>(Some((Bytes::from(buf), (file, temp))))
        })
    }
}

impl IntoResponse for SessionArchive {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.name);
        let len = self.len;

        (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/zip".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
                (header::CONTENT_LENGTH, len.to_string()),
            ],
            Body::from_stream(self.into_stream()),
        )
            .into_response()
    }
}
