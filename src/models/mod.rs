pub mod artifact;
pub mod config;

pub use artifact::{Artifact, ArtifactKind, CleanupTarget, ScratchBundle};
pub use config::{AppConfig, QrOptions};
