use crate::{OtoError, Result};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Subfolder that receives the files of earlier runs.
pub const ARCHIVE_DIR: &str = "Archive";

/// Destination for finished datasets.
#[async_trait]
pub trait Archive: Send + Sync {
    /// Store a local file, returning a reference to the stored copy.
    async fn store(&self, file: &Path) -> Result<String>;
}

/// Archive backed by a directory (for example a synced drive folder).
///
/// Files already in the directory are moved into `Archive/` before the new one
/// is copied in; archived files are never overwritten.
#[derive(Debug, Clone)]
pub struct LocalArchive {
    root: PathBuf,
}

impl LocalArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.root.join(ARCHIVE_DIR)
    }

    /// Move every regular file in the root into the archive folder.
    async fn archive_existing(&self, keep: &Path) -> Result<usize> {
        let archive_dir = self.archive_dir();
        fs::create_dir_all(&archive_dir).await?;

        let mut moved = 0;
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            if fs::canonicalize(&path).await? == keep {
                continue;
            }
            let destination = free_destination(&archive_dir, &entry.file_name()).await?;
            fs::rename(&path, &destination).await?;
            debug!(from = %path.display(), to = %destination.display(), "Archived file");
            moved += 1;
        }
        Ok(moved)
    }
}

/// First path in `dir` named `name`, or `stem (n).ext` when that is taken.
async fn free_destination(dir: &Path, name: &OsStr) -> Result<PathBuf> {
    let candidate = dir.join(name);
    if !fs::try_exists(&candidate).await? {
        return Ok(candidate);
    }

    let name = Path::new(name);
    let stem = name
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{} ({}){}", stem, n, extension));
        if !fs::try_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

#[async_trait]
impl Archive for LocalArchive {
    async fn store(&self, file: &Path) -> Result<String> {
        if !fs::metadata(file).await.map(|m| m.is_file()).unwrap_or(false) {
            return Err(OtoError::Archive(format!(
                "local file not found: {}",
                file.display()
            )));
        }
        let name = file
            .file_name()
            .ok_or_else(|| OtoError::Archive(format!("not a file path: {}", file.display())))?;

        fs::create_dir_all(&self.root).await?;
        let source = fs::canonicalize(file).await?;
        let moved = self.archive_existing(&source).await?;

        let destination = self.root.join(name);
        if fs::canonicalize(&self.root).await?.join(name) != source {
            fs::copy(&source, &destination).await?;
        }

        info!(
            file = %destination.display(),
            archived = moved,
            "Stored dataset"
        );
        Ok(destination.display().to_string())
    }
}
