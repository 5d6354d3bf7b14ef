use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::Response,
};
use reqwest::Url;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::delivery::deliver_and_dispose;
use crate::error::{ApiError, FailureClass};
use crate::fetch::{FetchError, FetchOptions};
use crate::models::ArtifactKind;
use crate::store::naming;
use crate::AppState;

const MSG_MISSING_URL: &str = "Please enter a URL.";
const MSG_INVALID_URL: &str = "Please enter a valid http(s) URL.";
const MSG_HOST_NOT_FOUND: &str = "URL not found. Please enter a valid URL.";
const MSG_PAGE_NOT_FOUND: &str = "Page not found. Please check the URL.";
const MSG_TIMEOUT: &str = "The connection timed out. Please try again.";
const MSG_UNREACHABLE: &str = "Could not connect to the server. Please check the URL.";
const MSG_FORBIDDEN: &str = "Access denied. This page cannot be downloaded.";
const MSG_FAILED: &str = "Failed to fetch the HTML. Please check the URL.";

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub url: Option<String>,
}

pub fn routes() -> axum::Router<AppState> {
    axum::Router::new().route("/download", axum::routing::get(download_page))
}

/// GET /download?url=
/// Fetch a page and return it as `<sanitized-url>.html`
async fn download_page(
    State(state): State<AppState>,
    params: Result<Query<DownloadParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|rejection| {
        warn!(endpoint = "download", "Rejected query string: {}", rejection);
        ApiError::new(FailureClass::InvalidInput, MSG_MISSING_URL)
    })?;
    let raw = params.url.as_deref().map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(ApiError::new(FailureClass::InvalidInput, MSG_MISSING_URL));
    }

    let url = naming::complete_url(raw).into_owned();
    match Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        _ => {
            info!(endpoint = "download", %url, "Rejected URL");
            return Err(ApiError::new(FailureClass::InvalidInput, MSG_INVALID_URL));
        }
    }

    let options = FetchOptions::new(state.config.page_timeout).accept_redirect_status();
    let page = state.fetcher.fetch(&url, &options).await.map_err(|e| {
        error!(endpoint = "download", %url, "Fetch failed: {}", e);
        fetch_failure(&e)
    })?;

    let artifact = state
        .store
        .allocate(ArtifactKind::PageSnapshot, &url)
        .await
        .map_err(|e| {
            error!(endpoint = "download", %url, "Failed to allocate artifact: {}", e);
            ApiError::new(FailureClass::LocalIo, MSG_FAILED)
        })?;

    if let Err(e) = tokio::fs::write(&artifact.location, &page).await {
        error!(endpoint = "download", %url, "Failed to write snapshot: {}", e);
        state.store.dispose(&artifact.cleanup).await;
        return Err(ApiError::new(FailureClass::LocalIo, MSG_FAILED));
    }

    info!(endpoint = "download", %url, bytes = page.len(), "Snapshot saved");

    deliver_and_dispose(Arc::clone(&state.store), artifact)
        .await
        .map_err(|e| {
            error!(endpoint = "download", %url, "Failed to deliver snapshot: {}", e);
            ApiError::new(FailureClass::LocalIo, MSG_FAILED)
        })
}

fn fetch_failure(e: &FetchError) -> ApiError {
    let message = match e {
        FetchError::HostNotFound(_) => MSG_HOST_NOT_FOUND,
        _ => match e.class() {
            FailureClass::InvalidInput => MSG_INVALID_URL,
            FailureClass::NotFound => MSG_PAGE_NOT_FOUND,
            FailureClass::Forbidden => MSG_FORBIDDEN,
            FailureClass::Unreachable => MSG_UNREACHABLE,
            FailureClass::Timeout => MSG_TIMEOUT,
            FailureClass::RemoteOther | FailureClass::LocalIo => MSG_FAILED,
        },
    };
    ApiError::new(e.class(), message)
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
    use reqwest::StatusCode as RemoteStatus;
    use tower::ServiceExt;

    async fn get(state: AppState, uri: &str) -> Response {
        crate::router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_missing_url_makes_no_remote_call() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let state = test_state(&temp_dir, fetcher.clone()).await;

        for uri in ["/download", "/download?url=", "/download?url=%20%20"] {
            let response = get(state.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            let json = json_body(response).await;
            assert_eq!(json["error"], "invalid_input");
            assert_eq!(json["message"], MSG_MISSING_URL);
        }

        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_repeated_url_key_gets_json_error() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let state = test_state(&temp_dir, fetcher.clone()).await;

        let response = get(state, "/download?url=a.com&url=b.com").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        let json = json_body(response).await;
        assert_eq!(json["error"], "invalid_input");
        assert_eq!(json["message"], MSG_MISSING_URL);
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_non_http_input_is_rejected() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fetcher = Arc::new(StubFetcher::new());
        let state = test_state(&temp_dir, fetcher.clone()).await;

        for uri in ["/download?url=hello", "/download?url=ftp%3A%2F%2Fexample.com"] {
            let response = get(state.clone(), uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
        }
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_bare_domain_is_completed_and_delivered() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let fetcher =
            Arc::new(StubFetcher::new().respond("https://example.com", "<html>hi</html>"));
        let state = test_state(&temp_dir, fetcher.clone()).await;
        let root = state.store.root().to_path_buf();

        let response = get(state, "/download?url=example.com").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"https___example_com.html\""
        );
        assert_eq!(fetcher.calls(), vec!["https://example.com"]);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(body.as_ref(), b"<html>hi</html>");
        assert!(wait_until_empty(&root).await);
    }

    #[tokio::test]
    async fn test_failures_are_classified() {
        let cases = [
            (
                FetchError::HostNotFound("nope.invalid".into()),
                StatusCode::NOT_FOUND,
                MSG_HOST_NOT_FOUND,
            ),
            (
                FetchError::Status(RemoteStatus::NOT_FOUND),
                StatusCode::NOT_FOUND,
                MSG_PAGE_NOT_FOUND,
            ),
            (
                FetchError::Status(RemoteStatus::FORBIDDEN),
                StatusCode::FORBIDDEN,
                MSG_FORBIDDEN,
            ),
            (FetchError::Timeout, StatusCode::REQUEST_TIMEOUT, MSG_TIMEOUT),
            (
                FetchError::Connect("refused".into()),
                StatusCode::SERVICE_UNAVAILABLE,
                MSG_UNREACHABLE,
            ),
            (
                FetchError::Status(RemoteStatus::BAD_GATEWAY),
                StatusCode::INTERNAL_SERVER_ERROR,
                MSG_FAILED,
            ),
        ];

        for (error, status, message) in cases {
            let temp_dir = tempfile::TempDir::new().unwrap();
            let fetcher = StubFetcher::new().fail("https://nope.invalid/page", error);
            let state = test_state(&temp_dir, Arc::new(fetcher)).await;
            let root = state.store.root().to_path_buf();

            let response = get(state, "/download?url=https%3A%2F%2Fnope.invalid%2Fpage").await;
            assert_eq!(response.status(), status);
            let json = json_body(response).await;
            assert_eq!(json["message"], message);
            assert!(wait_until_empty(&root).await);
        }
    }
}
