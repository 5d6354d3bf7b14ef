use std::io;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    http::header,
    response::{IntoResponse, Response},
};
use futures::stream;
use tokio::{fs::File, io::AsyncReadExt};
use tracing::{info, warn};

use crate::models::{Artifact, CleanupTarget};
use crate::store::EphemeralStore;

const CHUNK_SIZE: usize = 64 * 1024;

/// Removes its target exactly once, when dropped.
///
/// The guard travels inside the response body stream, so it drops only
/// after the last chunk was read, a read failed, or the transport gave up
/// on the body.
pub struct DisposeGuard {
    store: Arc<EphemeralStore>,
    target: Option<CleanupTarget>,
    download_name: String,
    delivered: bool,
}

impl DisposeGuard {
    pub fn new(store: Arc<EphemeralStore>, target: CleanupTarget, download_name: String) -> Self {
        Self {
            store,
            target: Some(target),
            download_name,
            delivered: false,
        }
    }

    fn mark_delivered(&mut self) {
        self.delivered = true;
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        let Some(target) = self.target.take() else {
            return;
        };

        if self.delivered {
            info!("Delivered {}", self.download_name);
        } else {
            warn!("Delivery of {} did not complete", self.download_name);
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = Arc::clone(&self.store);
                handle.spawn(async move { store.dispose(&target).await });
            }
            Err(_) => self.store.dispose_blocking(&target),
        }
    }
}

/// Stream `artifact` to the caller as an attachment and remove it afterward.
///
/// Removal happens whether transmission succeeds, fails, or the caller
/// disconnects. If the file cannot even be opened it is removed right away
/// and the I/O error is returned.
pub async fn deliver_and_dispose(
    store: Arc<EphemeralStore>,
    artifact: Artifact,
) -> io::Result<Response> {
    let guard = DisposeGuard::new(store, artifact.cleanup.clone(), artifact.download_name.clone());

    let file = File::open(&artifact.location).await?;
    let len = file.metadata().await?.len();

    let body = stream::unfold(Some((file, guard)), |state| async move {
        let (mut file, mut guard) = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => {
                drop(file);
                guard.mark_delivered();
                None
            }
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some((file, guard))))
            }
            Err(e) => {
                warn!("Failed to read {}: {}", guard.download_name, e);
                Some((Err(e), None))
            }
        }
    });

    let disposition = format!("attachment; filename=\"{}\"", artifact.download_name);
    Ok((
        [
            (header::CONTENT_TYPE, artifact.kind.content_type().to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(body),
    )
        .into_response())
}
