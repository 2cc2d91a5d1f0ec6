//! Temp artifacts produced for dispatch
//!
//! Files are created with a fixed prefix inside the artifact directory so the
//! orphan sweep only ever touches files this service wrote.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// File-name prefix of every artifact
pub const ARTIFACT_PREFIX: &str = "print-job-";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `bytes` to a new artifact and return its path.
    ///
    /// The file outlives this call; the caller owns its deletion.
    pub async fn write(&self, bytes: Vec<u8>, suffix: &str) -> io::Result<PathBuf> {
        let dir = self.dir.clone();
        let suffix = suffix.to_string();
        let path = tokio::task::spawn_blocking(move || write_blocking(&dir, &bytes, &suffix))
            .await
            .map_err(io::Error::other)??;

        debug!("Wrote artifact {}", path.display());
        Ok(path)
    }

    /// Delete `path` after `delay`, leaving the OS spooler time to read it
    pub fn schedule_cleanup(&self, path: PathBuf, delay: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            remove_now(&path).await;
        })
    }

    /// Remove artifacts older than `max_age`; returns how many were deleted
    pub async fn sweep_orphans(&self, max_age: Duration) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        let mut removed = 0;

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            if !name.to_string_lossy().starts_with(ARTIFACT_PREFIX) {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .unwrap_or_default();
            if age >= max_age {
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    Err(e) => warn!("Failed to sweep {}: {}", entry.path().display(), e),
                }
            }
        }

        if removed > 0 {
            debug!("Swept {} orphaned artifacts", removed);
        }
        Ok(removed)
    }

    /// Run [`ArtifactStore::sweep_orphans`] every `interval`
    pub fn spawn_orphan_sweep(&self, interval: Duration, max_age: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if let Err(e) = store.sweep_orphans(max_age).await {
                    warn!("Artifact sweep failed: {}", e);
                }
            }
        })
    }
}

fn write_blocking(dir: &Path, bytes: &[u8], suffix: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::Builder::new()
        .prefix(ARTIFACT_PREFIX)
        .suffix(suffix)
        .tempfile_in(dir)?;
    file.write_all(bytes)?;
    file.flush()?;

    file.into_temp_path().keep().map_err(io::Error::from)
}

/// Delete an artifact right away; a missing file is not an error
pub async fn remove_now(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed artifact {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove artifact {}: {}", path.display(), e),
    }
}
