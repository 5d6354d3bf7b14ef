pub mod naming;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::models::{Artifact, ArtifactKind, CleanupTarget, ScratchBundle};

const ARTIFACT_SUBDIR: &str = "toolberry-artifacts";
const SCRATCH_SUBDIR: &str = "scratch";

/// Owner of the ephemeral artifact root.
///
/// The root is a dedicated `toolberry-artifacts` directory inside the
/// configured base, so sweeps never touch the base itself or anything else
/// stored next to it. Every artifact lives under `root` with a name that
/// embeds a disambiguator, so concurrent requests never share a path. The
/// whole root is swept at startup and shutdown to catch anything a failed
/// removal left behind.
pub struct EphemeralStore {
    root: PathBuf,
    seq: AtomicU64,
}

impl EphemeralStore {
    pub fn new(base: impl AsRef<Path>) -> Self {
        Self {
            root: base.as_ref().join(ARTIFACT_SUBDIR),
            seq: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Clear leftovers from a previous run and recreate the root
    pub async fn init(&self) -> Result<(), StoreError> {
        self.sweep_orphans().await;
        tokio::fs::create_dir_all(&self.root).await?;
        info!("Artifact root ready at {}", self.root.display());
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.sweep_orphans().await;
    }

    /// Recursively remove the whole root. Errors are logged, never returned.
    pub async fn sweep_orphans(&self) {
        match tokio::fs::remove_dir_all(&self.root).await {
            Ok(()) => info!("Swept artifact root {}", self.root.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("Artifact root {} absent, nothing to sweep", self.root.display())
            }
            Err(e) => warn!("Failed to sweep artifact root {}: {}", self.root.display(), e),
        }
    }

    /// `<unix-millis>-<seq>`, distinct for every call within this process
    fn next_token(&self) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", Utc::now().timestamp_millis(), seq)
    }

    /// Reserve a unique file path for a single-file artifact. Nothing is
    /// written yet; the caller produces the content at `location`.
    pub async fn allocate(&self, kind: ArtifactKind, input: &str) -> Result<Artifact, StoreError> {
        let file_name = naming::artifact_file_name(kind, input, &self.next_token());
        if !naming::is_safe_component(&file_name) {
            return Err(StoreError::UnsafeName(file_name));
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let location = self.root.join(file_name);
        debug!("Allocated {} artifact at {}", kind, location.display());

        Ok(Artifact {
            kind,
            cleanup: CleanupTarget::File(location.clone()),
            location,
            download_name: naming::download_name(kind, input),
        })
    }

    /// Create the request-scoped directory a Scratch project is assembled in
    pub async fn create_bundle(&self, project_id: &str) -> Result<ScratchBundle, StoreError> {
        let dir_name = format!("{}-{}", project_id, self.next_token());
        if project_id.len() > naming::MAX_PROJECT_ID_LEN
            || !project_id.chars().all(|c| c.is_ascii_digit())
            || !naming::is_safe_component(&dir_name)
        {
            return Err(StoreError::UnsafeName(dir_name));
        }

        let dir = self.root.join(SCRATCH_SUBDIR).join(dir_name);
        tokio::fs::create_dir_all(&dir).await?;
        debug!("Created scratch bundle {}", dir.display());

        Ok(ScratchBundle {
            project_id: project_id.to_string(),
            dir,
        })
    }

    /// Remove a cleanup target. Absence is success, so this is idempotent.
    pub async fn remove(&self, target: &CleanupTarget) -> Result<(), StoreError> {
        self.check_contained(target.path())?;

        let result = match target {
            CleanupTarget::File(path) => tokio::fs::remove_file(path).await,
            CleanupTarget::Directory(path) => tokio::fs::remove_dir_all(path).await,
        };
        match result {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    /// Best-effort removal; a failure leaves the target for the next sweep
    pub async fn dispose(&self, target: &CleanupTarget) {
        match self.remove(target).await {
            Ok(()) => debug!("Disposed {}", target.path().display()),
            Err(e) => warn!(
                "Failed to delete {} (left for sweep): {}",
                target.path().display(),
                e
            ),
        }
    }

    /// Synchronous variant for drop paths that run outside a tokio runtime
    pub fn dispose_blocking(&self, target: &CleanupTarget) {
        if let Err(e) = self.check_contained(target.path()) {
            warn!("Refusing to delete {}: {}", target.path().display(), e);
            return;
        }

        let result = match target {
            CleanupTarget::File(path) => std::fs::remove_file(path),
            CleanupTarget::Directory(path) => std::fs::remove_dir_all(path),
        };
        match result {
            Err(e) if e.kind() != io::ErrorKind::NotFound => warn!(
                "Failed to delete {} (left for sweep): {}",
                target.path().display(),
                e
            ),
            _ => debug!("Disposed {}", target.path().display()),
        }
    }

    fn check_contained(&self, path: &Path) -> Result<(), StoreError> {
        let escapes = path
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir));
        if escapes || !path.starts_with(&self.root) || path == self.root {
            return Err(StoreError::OutsideRoot(path.to_path_buf()));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unsafe artifact name: {0}")]
    UnsafeName(String),
    #[error("Path is outside the artifact root: {0}")]
    OutsideRoot(PathBuf),
    #[error("File system error: {0}")]
    Io(#[from] io::Error),
}
