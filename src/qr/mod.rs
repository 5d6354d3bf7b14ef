pub mod render;

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::delivery::deliver_and_dispose;
use crate::error::{ApiError, FailureClass};
use crate::models::ArtifactKind;
use crate::store::naming;
use crate::AppState;

pub use render::QrError;

const MSG_MISSING_TEXT: &str = "Please enter text or a URL.";
const MSG_FAILED: &str = "Failed to generate the QR code.";

#[derive(Debug, Deserialize)]
pub struct QrParams {
    pub text: Option<String>,
}

pub fn routes() -> axum::Router<AppState> {
    axum::Router::new().route("/qrcode", axum::routing::get(generate_qrcode))
}

/// GET /qrcode?text=
/// Render text (bare domains get `https://`) as `qrcode.png`
async fn generate_qrcode(
    State(state): State<AppState>,
    params: Result<Query<QrParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        warn!(endpoint = "qrcode", "Rejected query string: {}", rejection);
        ApiError::new(FailureClass::InvalidInput, MSG_MISSING_TEXT)
    })?;
    let Some(raw) = params.text.filter(|t| !t.is_empty()) else {
        return Err(ApiError::new(FailureClass::InvalidInput, MSG_MISSING_TEXT));
    };
    let text = naming::complete_url(&raw).into_owned();

    let artifact = state
        .store
        .allocate(ArtifactKind::QrImage, &text)
        .await
        .map_err(|e| failure("allocate", &e))?;

    let options = state.config.qr.clone();
    let rendered = tokio::task::spawn_blocking(move || render::render_png(&text, &options))
        .await
        .map_err(QrError::from)
        .and_then(std::convert::identity);

    let written = match rendered {
        Ok(png) => tokio::fs::write(&artifact.location, png)
            .await
            .map_err(|e| failure("write", &e)),
        Err(e) => Err(failure("render", &e)),
    };
    if let Err(err) = written {
        state.store.dispose(&artifact.cleanup).await;
        return Err(err);
    }

    info!(endpoint = "qrcode", location = %artifact.location.display(), "QR image ready");

    deliver_and_dispose(Arc::clone(&state.store), artifact)
        .await
        .map_err(|e| failure("deliver", &e))
}

fn failure(stage: &str, e: &dyn std::error::Error) -> ApiError {
    error!(endpoint = "qrcode", stage, "QR generation failed: {}", e);
    ApiError::new(FailureClass::LocalIo, MSG_FAILED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::stub::StubFetcher;
    use crate::testing::{test_state, wait_until_empty};
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    async fn get(state: AppState, uri: &str) -> Response {
        crate::router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hello_renders_png() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let state = test_state(&temp_dir, fetcher.clone()).await;
        let root = state.store.root().to_path_buf();

        let response = get(state, "/qrcode?text=hello").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"qrcode.png\""
        );

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.starts_with(&[0x89, b'P', b'N', b'G']));
        assert!(image::load_from_memory(&body).is_ok());

        assert!(fetcher.calls().is_empty());
        assert!(wait_until_empty(&root).await);
    }

    #[tokio::test]
    async fn test_missing_text() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state = test_state(&temp_dir, Arc::new(StubFetcher::new())).await;

        for uri in ["/qrcode", "/qrcode?text="] {
            let response = get(state.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_repeated_text_key_gets_json_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state = test_state(&temp_dir, Arc::new(StubFetcher::new())).await;

        let response = get(state, "/qrcode?text=a&text=b").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "invalid_input");
        assert_eq!(json["message"], MSG_MISSING_TEXT);
    }

    #[tokio::test]
    async fn test_oversized_text_fails_and_cleans_up() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state = test_state(&temp_dir, Arc::new(StubFetcher::new())).await;
        let root = state.store.root().to_path_buf();

        let uri = format!("/qrcode?text={}", "x".repeat(8000));
        let response = get(state, &uri).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(wait_until_empty(&root).await);
    }

    #[tokio::test]
    async fn test_concurrent_requests_use_distinct_paths() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let state = test_state(&temp_dir, Arc::new(StubFetcher::new())).await;

        let a = state.store.allocate(ArtifactKind::QrImage, "one").await.unwrap();
        let b = state.store.allocate(ArtifactKind::QrImage, "two").await.unwrap();
        assert_ne!(a.location, b.location);

        let (first, second) = tokio::join!(
            get(state.clone(), "/qrcode?text=one"),
            get(state.clone(), "/qrcode?text=two")
        );
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(second.status(), StatusCode::OK);
    }
}
