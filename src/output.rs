use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
#[error("failed to write {}: {source}", .path.display())]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Directory rendered pages are written into.
///
/// Page identifiers are joined onto the root as given; they are not sanitized.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    /// Write `contents` to the page named `id`, replacing any existing file.
    pub async fn write_page(&self, id: &str, contents: &str) -> Result<PathBuf, WriteError> {
        let path = self.path_for(id);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| WriteError {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        tokio::fs::write(&path, contents)
            .await
            .map_err(|source| WriteError {
                path: path.clone(),
                source,
            })?;

        info!("Wrote {}", path.display());
        Ok(path)
    }
}
