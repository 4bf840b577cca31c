//! Persistent snapshot storage.
//!
//! The whole user table lives in one JSON file. Saves go to a sibling temp
//! file which is synced and then renamed over the target, so a reader sees
//! either the old snapshot or the new one, never a mix.

use crate::error::{Error, Result};
use crate::models::LedgerSnapshot;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Default bound on a single load or save.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(5);

/// File-backed snapshot store.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    io_timeout: Duration,
    temp_counter: AtomicU64,
}

impl Store {
    /// Snapshot file name inside a data directory.
    pub const FILE_NAME: &'static str = "referrals.json";

    /// Store backed by the given file. Nothing is touched until the first load or save.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            io_timeout: DEFAULT_IO_TIMEOUT,
            temp_counter: AtomicU64::new(0),
        }
    }

    /// Store backed by `referrals.json` inside `dir`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::open(dir.as_ref().join(Self::FILE_NAME))
    }

    /// Override the I/O bound.
    pub fn with_timeout(mut self, io_timeout: Duration) -> Self {
        self.io_timeout = io_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. A missing file is an empty snapshot.
    pub async fn load(&self) -> Result<LedgerSnapshot> {
        let bytes = match self.bounded(tokio::fs::read(&self.path)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LedgerSnapshot::new());
            }
            Err(source) => {
                return Err(Error::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        LedgerSnapshot::from_json(&bytes).map_err(|source| Error::CorruptStore {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the persisted snapshot.
    ///
    /// On error nothing has changed on disk and the temp file is removed.
    pub async fn save(&self, snapshot: &LedgerSnapshot) -> Result<()> {
        let payload = snapshot.to_json().map_err(|e| Error::Io {
            path: self.path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
        })?;

        let temp_path = self.temp_path();
        let staged = self.bounded(write_temp(&temp_path, &self.path, &payload)).await;
        // The rename is the commit point: once it succeeds the save has happened.
        let committed = match staged {
            Ok(()) => tokio::fs::rename(&temp_path, &self.path).await,
            Err(e) => Err(e),
        };

        if let Err(source) = committed {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(Error::Io {
                path: self.path.clone(),
                source,
            });
        }

        if let Err(e) = self.bounded(sync_parent(&self.path)).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Snapshot directory sync failed"
            );
        }

        tracing::debug!(path = %self.path.display(), users = snapshot.len(), "Saved snapshot");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(format!(".{}.{}.tmp", std::process::id(), n));
        self.path.with_file_name(name)
    }

    async fn bounded<T, F>(&self, op: F) -> std::io::Result<T>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match tokio::time::timeout(self.io_timeout, op).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("store I/O exceeded {:?}", self.io_timeout),
            )),
        }
    }
}

/// Write `payload` to the temp file and sync it. Nothing visible changes.
async fn write_temp(temp_path: &Path, path: &Path, payload: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = tokio::fs::File::create(temp_path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}

/// Make a rename in `path`'s directory durable. Not supported everywhere.
async fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => tokio::fs::File::open(parent).await?.sync_all().await,
        None => Ok(()),
    }
}
