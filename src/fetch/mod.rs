use std::ops::RangeInclusive;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::{redirect, Client, StatusCode};
use tracing::debug;

use crate::error::FailureClass;

#[cfg(test)]
pub mod stub;

/// Per-call fetch parameters
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub timeout: Duration,
    /// Final status codes treated as success after redirects are followed
    pub accepted_status: RangeInclusive<u16>,
}

impl FetchOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            accepted_status: 200..=299,
        }
    }

    pub fn accept_redirect_status(mut self) -> Self {
        self.accepted_status = 200..=399;
        self
    }
}

/// Remote fetch capability the handlers depend on
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Bytes, FetchError>;
}

/// `Fetcher` backed by a shared reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(max_redirects: usize) -> Result<Self, FetchError> {
        let client = Client::builder()
            .redirect(redirect::Policy::limited(max_redirects))
            .user_agent(concat!("toolberry-api/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FetchError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<Bytes, FetchError> {
        debug!("Fetching {} (timeout {:?})", url, options.timeout);

        let response = self
            .client
            .get(url)
            .timeout(options.timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !options.accepted_status.contains(&status.as_u16()) {
            return Err(FetchError::Status(status));
        }

        response.bytes().await.map_err(FetchError::from_reqwest)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Host could not be resolved: {0}")]
    HostNotFound(String),
    #[error("Remote returned status {0}")]
    Status(StatusCode),
    #[error("Connection failed: {0}")]
    Connect(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
}

impl FetchError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return FetchError::Timeout;
        }

        let host = e
            .url()
            .and_then(|u| u.host_str())
            .unwrap_or("unknown")
            .to_string();

        if e.is_builder() {
            FetchError::InvalidUrl(e.to_string())
        } else if e.is_connect() {
            if is_dns_failure(&e) {
                FetchError::HostNotFound(host)
            } else {
                FetchError::Connect(format!("{}: {}", host, e.without_url()))
            }
        } else {
            FetchError::Transport(e.without_url().to_string())
        }
    }

    pub fn class(&self) -> FailureClass {
        match self {
            FetchError::InvalidUrl(_) => FailureClass::InvalidInput,
            FetchError::HostNotFound(_) => FailureClass::NotFound,
            FetchError::Status(StatusCode::NOT_FOUND) => FailureClass::NotFound,
            FetchError::Status(StatusCode::FORBIDDEN) => FailureClass::Forbidden,
            FetchError::Status(_) => FailureClass::RemoteOther,
            FetchError::Connect(_) => FailureClass::Unreachable,
            FetchError::Timeout => FailureClass::Timeout,
            FetchError::Transport(_) => FailureClass::RemoteOther,
        }
    }
}

/// hyper reports resolver failures only through the error's source chain
fn is_dns_failure(e: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(e);
    while let Some(err) = current {
        let text = err.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        current = err.source();
    }
    false
}
