//! Output directory layout and image persistence.
//!
//! ```text
//! <out>/desktop/<name>_dt.png        <out>/mobile/<name>_mb.png
//! <out>/desktop/<name>_popup_dt.png  <out>/mobile/<name>_popup_mb.png
//! ```

use crate::config::CaptureConfig;
use crate::error::{PageError, WebshotsError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Extensions treated as stale images by [`OutputWriter::prepare`].
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// Which of a page's images a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shot {
    Desktop,
    Mobile,
    DesktopPopup,
    MobilePopup,
}

impl Shot {
    /// File-name suffix after the page name.
    pub fn suffix(self) -> &'static str {
        match self {
            Shot::Desktop => "dt",
            Shot::Mobile => "mb",
            Shot::DesktopPopup => "popup_dt",
            Shot::MobilePopup => "popup_mb",
        }
    }

    pub fn is_mobile(self) -> bool {
        matches!(self, Shot::Mobile | Shot::MobilePopup)
    }
}

/// Owns the `desktop/` and `mobile/` directories of one run.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    desktop_dir: PathBuf,
    mobile_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            desktop_dir: config.desktop_dir(),
            mobile_dir: config.mobile_dir(),
        }
    }

    pub fn desktop_dir(&self) -> &Path {
        &self.desktop_dir
    }

    pub fn mobile_dir(&self) -> &Path {
        &self.mobile_dir
    }

    /// Where `shot` of page `name` is stored.
    pub fn path_for(&self, shot: Shot, name: &str) -> PathBuf {
        let dir = if shot.is_mobile() {
            &self.mobile_dir
        } else {
            &self.desktop_dir
        };
        dir.join(format!("{name}_{}.png", shot.suffix()))
    }

    /// Create both directories and delete every image already in them.
    ///
    /// Returns the number of files removed. Non-image files and
    /// subdirectories are left alone.
    pub async fn prepare(&self) -> Result<usize, WebshotsError> {
        let mut removed = 0;
        for dir in [&self.desktop_dir, &self.mobile_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| WebshotsError::OutputWriteFailed {
                    path: dir.clone(),
                    source: e,
                })?;
            removed += clear_images(dir).await?;
        }
        if removed > 0 {
            debug!("Removed {} stale images", removed);
        }
        Ok(removed)
    }

    /// Write `bytes` for `shot` of page `name`.
    ///
    /// The bytes go to a temp file in the target directory which is then
    /// renamed over the final path, so a reader never sees a half-written
    /// image.
    pub async fn persist(
        &self,
        shot: Shot,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, PageError> {
        let path = self.path_for(shot, name);
        let target = path.clone();
        let data = bytes.to_vec();

        let written = tokio::task::spawn_blocking(move || write_atomic(&target, &data))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            .and_then(|r| r);

        match written {
            Ok(()) => {
                debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
                Ok(path)
            }
            Err(e) => Err(PageError::WriteFailed {
                path: path.display().to_string(),
                detail: e.to_string(),
            }),
        }
    }

    /// Remove an image written earlier in this run. Best effort.
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Discarded {}", path.display()),
            Err(e) => debug!("Could not discard {}: {}", path.display(), e),
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".webshots-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

async fn clear_images(dir: &Path) -> Result<usize, WebshotsError> {
    let io_err = |e: std::io::Error| WebshotsError::OutputWriteFailed {
        path: dir.to_path_buf(),
        source: e,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err)?;
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
        if is_file && is_image(&path) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| WebshotsError::OutputWriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            removed += 1;
        }
    }
    Ok(removed)
}
