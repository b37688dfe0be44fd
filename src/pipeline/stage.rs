//! Temporary artifact store: stage byte payloads as files a renderer can open.
//!
//! Both renderers take a filesystem path, not a byte stream, so every
//! document body and every intermediate PDF is written to a uniquely named
//! file first. Names come from `tempfile`'s random suffix and are created with
//! `O_EXCL`, so concurrent requests can never collide.
//!
//! A [`StagedArtifact`] owns its file. The pipeline calls
//! [`ArtifactStore::release`] once the consuming step is done; on every other
//! exit path (an error, or the request future being dropped when the client
//! disconnects) the artifact's `Drop` removes the file instead.

use crate::error::ServiceError;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, warn};

const PREFIX: &str = "htmlpdf-";

/// Creates and reclaims staged artifacts under one root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    live: Arc<AtomicUsize>,
}

/// A staged byte payload backed by a uniquely named file.
#[derive(Debug)]
pub struct StagedArtifact {
    path: TempPath,
    len: usize,
    _live: LiveGuard,
}

impl StagedArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of bytes written to the backing file.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Decrements the store's live count when its artifact goes away.
#[derive(Debug)]
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ArtifactStore {
    /// Stage files under `root`. The directory must already exist.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stage files under the system temp dir.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Artifacts created by this store that still exist.
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Write `bytes` to a new uniquely named file ending in `suffix`.
    ///
    /// The write has completed when this returns. If it fails, the partially
    /// written file is removed before the error is returned.
    pub async fn stage(&self, bytes: &[u8], suffix: &str) -> Result<StagedArtifact, ServiceError> {
        let file = tempfile::Builder::new()
            .prefix(PREFIX)
            .suffix(suffix)
            .tempfile_in(&self.root)
            .map_err(|e| {
                ServiceError::storage(format!("creating file in {}", self.root.display()), e)
            })?;

        let artifact = StagedArtifact {
            path: file.into_temp_path(),
            len: bytes.len(),
            _live: LiveGuard::new(&self.live),
        };

        tokio::fs::write(artifact.path(), bytes).await.map_err(|e| {
            ServiceError::storage(format!("writing {}", artifact.path().display()), e)
        })?;

        debug!(
            "Staged {} bytes at {}",
            artifact.len(),
            artifact.path().display()
        );
        Ok(artifact)
    }

    /// Remove the artifact's backing file.
    ///
    /// A file that is already gone counts as released. On any other error the
    /// artifact's `Drop` still gets a second attempt at the removal.
    pub async fn release(&self, artifact: StagedArtifact) -> Result<(), ServiceError> {
        let StagedArtifact { path, _live, .. } = artifact;
        let shown = path.display().to_string();

        match tokio::fs::remove_file(&*path).await {
            Ok(()) => debug!("Released {}", shown),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Staged file {} was already removed", shown);
            }
            Err(e) => return Err(ServiceError::storage(format!("removing {shown}"), e)),
        }
        // Already unlinked; keep `Drop` from trying again.
        let _ = path.keep();
        Ok(())
    }
}

/// File suffix for a staged document, chosen from its magic bytes.
///
/// The headless browser picks a MIME type from the extension, so a PDF staged
/// as `.html` would render as text.
pub fn document_suffix(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"%PDF-") {
        ".pdf"
    } else {
        ".html"
    }
}
