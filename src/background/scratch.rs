use anyhow::{Context, Result};
use log::{info, warn};
use path_clean::PathClean;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Scratch directory holding the per-task media files produced between
/// pipeline stages. All paths handed out by this type live directly inside
/// the root, and removal refuses anything else.
#[derive(Debug)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    /// Create the directory if missing and pin its canonical absolute path.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into().clean();
        fs::create_dir_all(&root)
            .context(format!("failed to create scratch directory {:?}", root))?;
        let root = fs::canonicalize(&root)
            .context(format!("failed to resolve scratch directory {:?}", root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn video_path(&self, task_id: Uuid) -> PathBuf {
        self.root.join(format!("video_{}.mp4", task_id))
    }

    pub fn audio_path(&self, task_id: Uuid) -> PathBuf {
        self.root.join(format!("audio_{}.wav", task_id))
    }

    /// Remove one scratch file if it exists. Only plain files inside the
    /// scratch root are touched; anything else is logged and left alone.
    /// Never fails: a leftover file must not change a task's outcome.
    pub fn discard(&self, path: &Path) {
        let path = path.clean();
        if !path.starts_with(&self.root) {
            warn!(
                "Refusing to remove path outside the scratch directory: {:?}",
                path
            );
            return;
        }
        match fs::symlink_metadata(&path) {
            Ok(meta) if meta.is_file() => match fs::remove_file(&path) {
                Ok(()) => info!("Cleaned up file: {:?}", path),
                Err(err) => warn!("Failed to clean up {:?}: {}", path, err),
            },
            Ok(_) => warn!("Skipping cleanup of non-file: {:?}", path),
            Err(_) => {}
        }
    }

    /// Delete files left behind by a previous run. Tasks do not survive a
    /// restart, so anything in the scratch root at startup is stale.
    pub fn sweep(&self) {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Failed to scan scratch directory {:?}: {}", self.root, err);
                return;
            }
        };

        let mut removed = 0usize;
        for entry in entries.flatten() {
            let path = entry.path();
            let is_file = entry.file_type().map(|ft| ft.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(err) => warn!("Failed to remove stale file {:?}: {}", path, err),
            }
        }
        if removed > 0 {
            info!(
                "Cleared {} stale scratch file(s) from {:?}",
                removed, self.root
            );
        }
    }
}
