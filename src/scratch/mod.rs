pub mod client;
pub mod pack;

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Response,
};
use futures::StreamExt;
use tracing::{error, info, warn};

use crate::delivery::deliver_and_dispose;
use crate::error::{ApiError, FailureClass};
use crate::models::ScratchBundle;
use crate::store::naming;
use crate::AppState;

pub use client::{ScratchClient, ScratchError};
use pack::PackError;

const MSG_MISSING_ID: &str = "Please enter a project ID or URL.";
const MSG_NOT_SHARED: &str = "This project is not shared publicly.";
const MSG_NOT_FOUND: &str = "Project not found. Please check the ID.";
const MSG_FAILED: &str = "Failed to fetch the Scratch project.";

/// Parallel asset downloads per project
const ASSET_CONCURRENCY: usize = 8;

pub fn routes() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/scratch-download", axum::routing::get(missing_project_id))
        .route("/scratch-download/", axum::routing::get(missing_project_id))
        .route("/scratch-download/:project_id", axum::routing::get(download_project))
}

async fn missing_project_id() -> ApiError {
    ApiError::new(FailureClass::InvalidInput, MSG_MISSING_ID)
}

/// GET /scratch-download/:project_id
/// Package a shared project as `scratch-project-<id>.sb3`
async fn download_project(
    State(state): State<AppState>,
    Path(input): Path<String>,
) -> Result<Response, ApiError> {
    let Some(project_id) = naming::extract_project_id(&input) else {
        return Err(ApiError::new(FailureClass::InvalidInput, MSG_MISSING_ID));
    };

    let bundle = state.store.create_bundle(&project_id).await.map_err(|e| {
        error!(endpoint = "scratch", %project_id, "Failed to create bundle: {}", e);
        ApiError::new(FailureClass::LocalIo, MSG_FAILED)
    })?;

    if let Err(err) = assemble(&state, &bundle).await {
        state.store.dispose(&bundle.cleanup_target()).await;
        return Err(err);
    }

    deliver_and_dispose(Arc::clone(&state.store), bundle.into_artifact())
        .await
        .map_err(|e| {
            error!(endpoint = "scratch", %project_id, "Failed to deliver archive: {}", e);
            ApiError::new(FailureClass::LocalIo, MSG_FAILED)
        })
}

/// Fetch metadata and project JSON into the bundle, then finalize the archive
async fn assemble(state: &AppState, bundle: &ScratchBundle) -> Result<(), ApiError> {
    let project_id = bundle.project_id.as_str();
    let scratch = &state.scratch;

    let token = scratch
        .project_token(project_id)
        .await
        .map_err(|e| remote_failure(project_id, &e))?;
    let Some(token) = token else {
        info!(endpoint = "scratch", %project_id, "Project is not shared");
        return Err(ApiError::new(FailureClass::InvalidInput, MSG_NOT_SHARED));
    };

    let project = scratch
        .project_json(project_id, &token)
        .await
        .map_err(|e| remote_failure(project_id, &e))?;

    let pretty = serde_json::to_vec_pretty(&project).map_err(|e| {
        error!(endpoint = "scratch", %project_id, "Failed to encode project.json: {}", e);
        ApiError::new(FailureClass::LocalIo, MSG_FAILED)
    })?;
    tokio::fs::write(bundle.metadata_path(), pretty)
        .await
        .map_err(|e| local_failure(project_id, PackError::Io(e)))?;

    let assets = if state.config.scratch_include_assets {
        fetch_assets(scratch, project_id, &project).await
    } else {
        Vec::new()
    };

    let archive_path = bundle.archive_path();
    let metadata_path = bundle.metadata_path();
    tokio::task::spawn_blocking(move || pack::write_sb3(&archive_path, &metadata_path, &assets))
        .await
        .map_err(PackError::from)
        .and_then(std::convert::identity)
        .map_err(|e| local_failure(project_id, e))?;

    info!(endpoint = "scratch", %project_id, "Archive ready");
    Ok(())
}

/// Assets that fail to download are left out of the archive
async fn fetch_assets(
    scratch: &ScratchClient,
    project_id: &str,
    project: &serde_json::Value,
) -> Vec<(String, axum::body::Bytes)> {
    futures::stream::iter(pack::collect_asset_names(project))
        .map(|name| async move {
            match scratch.asset(&name).await {
                Ok(data) => Some((name, data)),
                Err(e) => {
                    warn!(endpoint = "scratch", %project_id, asset = %name, "Skipping asset: {}", e);
                    None
                }
            }
        })
        .buffer_unordered(ASSET_CONCURRENCY)
        .filter_map(|asset| async move { asset })
        .collect()
        .await
}

fn remote_failure(project_id: &str, e: &ScratchError) -> ApiError {
    error!(endpoint = "scratch", %project_id, "Scratch request failed: {}", e);
    match e.class() {
        FailureClass::NotFound => ApiError::new(FailureClass::NotFound, MSG_NOT_FOUND),
        _ => ApiError::new(FailureClass::RemoteOther, MSG_FAILED),
    }
}

fn local_failure(project_id: &str, e: PackError) -> ApiError {
    error!(endpoint = "scratch", %project_id, "Failed to build archive: {}", e);
    ApiError::new(FailureClass::LocalIo, MSG_FAILED)
}
