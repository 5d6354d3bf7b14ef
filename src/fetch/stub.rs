//! In-memory `Fetcher` for handler tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::StatusCode;

use super::{FetchError, FetchOptions, Fetcher};

/// Answers from a fixed URL table and records every requested URL.
/// Unknown URLs answer 404.
#[derive(Default)]
pub struct StubFetcher {
    responses: Mutex<HashMap<String, Result<Bytes, FetchError>>>,
    calls: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, url: &str, body: impl Into<Bytes>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(body.into()));
        self
    }

    pub fn fail(self, url: &str, error: FetchError) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(error));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, url: &str, _options: &FetchOptions) -> Result<Bytes, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or(Err(FetchError::Status(StatusCode::NOT_FOUND)))
    }
}
