use std::path::{Path, PathBuf};

/// Kind of short-lived output produced for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    PageSnapshot,
    ProjectArchive,
    QrImage,
}

impl ArtifactKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactKind::PageSnapshot => "html",
            ArtifactKind::ProjectArchive => "sb3",
            ArtifactKind::QrImage => "png",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ArtifactKind::PageSnapshot => "text/html; charset=utf-8",
            ArtifactKind::ProjectArchive => "application/x.scratch.sb3",
            ArtifactKind::QrImage => "image/png",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::PageSnapshot => write!(f, "page_snapshot"),
            ArtifactKind::ProjectArchive => write!(f, "project_archive"),
            ArtifactKind::QrImage => write!(f, "qr_image"),
        }
    }
}

/// What has to be removed once an artifact is done with
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupTarget {
    File(PathBuf),
    Directory(PathBuf),
}

impl CleanupTarget {
    pub fn path(&self) -> &Path {
        match self {
            CleanupTarget::File(path) | CleanupTarget::Directory(path) => path,
        }
    }
}

/// A file on disk that satisfies exactly one request.
///
/// Lifecycle is created -> delivered -> deleted. Ownership moves into
/// `delivery::deliver_and_dispose`, which guarantees the cleanup target
/// is removed once the body stream ends.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub location: PathBuf,
    pub download_name: String,
    pub cleanup: CleanupTarget,
}

/// Request-owned directory holding `project.json` and the `.sb3` built from it.
/// Removed as a unit.
#[derive(Debug, Clone)]
pub struct ScratchBundle {
    pub project_id: String,
    pub dir: PathBuf,
}

impl ScratchBundle {
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join("project.json")
    }

    pub fn archive_path(&self) -> PathBuf {
        self.dir.join("project.sb3")
    }

    pub fn cleanup_target(&self) -> CleanupTarget {
        CleanupTarget::Directory(self.dir.clone())
    }

    /// Hand the finished archive over for delivery; cleanup still covers the whole directory
    pub fn into_artifact(self) -> Artifact {
        let location = self.archive_path();
        let cleanup = self.cleanup_target();
        Artifact {
            kind: ArtifactKind::ProjectArchive,
            location,
            download_name: format!("scratch-project-{}.sb3", self.project_id),
            cleanup,
        }
    }
}
