//! Per-request scratch directories
//!
//! Every download gets a private subdirectory of the scratch root, so the
//! extension scan fallback can never pick up another request's file. The
//! directory is removed on drop, including when the download future is
//! cancelled mid-run.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// Extensions treated as video
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm"];
/// Extensions treated as image
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// Lowercased extension of `path`
#[must_use]
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// Extension is a recognized video or image type
#[must_use]
pub fn is_media_extension(ext: &str) -> bool {
    VIDEO_EXTENSIONS.contains(&ext) || IMAGE_EXTENSIONS.contains(&ext)
}

/// A uniquely named directory removed after use
#[derive(Debug)]
pub struct ScratchDir {
    path: PathBuf,
    removed: bool,
}

impl ScratchDir {
    /// Create a fresh subdirectory under `root`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn create(root: &Path) -> std::io::Result<Self> {
        let path = root.join(Uuid::new_v4().as_simple().to_string());
        tokio::fs::create_dir_all(&path).await?;
        debug!(path = %path.display(), "Created scratch directory");
        Ok(Self {
            path,
            removed: false,
        })
    }

    /// Directory path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// First file with a recognized media extension, by file name order
    pub async fn find_media_file(&self) -> Option<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.path).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to scan scratch directory");
                return None;
            }
        };

        let mut candidates = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if extension_of(&path).is_some_and(|ext| is_media_extension(&ext)) {
                candidates.push(path);
            }
        }
        candidates.sort();
        candidates.into_iter().next()
    }

    /// Remove the directory; failures are logged and swallowed
    pub async fn remove(mut self) {
        self.removed = true;
        if let Err(e) = tokio::fs::remove_dir_all(&self.path).await {
            warn!(error = %e, path = %self.path.display(), "Failed to clean up scratch directory");
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        // Reached when the owning future was dropped before `remove` ran
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed abandoned scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Failed to clean up scratch directory");
            }
        }
    }
}
