use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::FailureClass;
use crate::fetch::{FetchError, FetchOptions, Fetcher};
use crate::models::AppConfig;

/// Subset of `GET /projects/:id` we rely on
#[derive(Debug, Deserialize)]
struct ProjectMeta {
    #[serde(default)]
    project_token: Option<String>,
}

/// Scratch metadata, project and asset endpoints on top of a `Fetcher`
pub struct ScratchClient {
    fetcher: Arc<dyn Fetcher>,
    api_base: String,
    projects_base: String,
    assets_base: String,
    meta_timeout: Duration,
    project_timeout: Duration,
}

impl ScratchClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, config: &AppConfig) -> Self {
        Self {
            fetcher,
            api_base: config.scratch_api_base.trim_end_matches('/').to_string(),
            projects_base: config.scratch_projects_base.trim_end_matches('/').to_string(),
            assets_base: config.scratch_assets_base.trim_end_matches('/').to_string(),
            meta_timeout: config.scratch_meta_timeout,
            project_timeout: config.scratch_project_timeout,
        }
    }

    /// Access token for a shared project; `None` when the project is not public
    pub async fn project_token(&self, project_id: &str) -> Result<Option<String>, ScratchError> {
        let url = format!("{}/projects/{}", self.api_base, project_id);
        let body = self
            .fetcher
            .fetch(&url, &FetchOptions::new(self.meta_timeout))
            .await?;

        let meta: ProjectMeta = serde_json::from_slice(&body).map_err(ScratchError::Decode)?;
        Ok(meta.project_token.filter(|t| !t.is_empty()))
    }

    pub async fn project_json(
        &self,
        project_id: &str,
        token: &str,
    ) -> Result<serde_json::Value, ScratchError> {
        let mut url = Url::parse(&format!("{}/{}", self.projects_base, project_id))
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        url.query_pairs_mut().append_pair("token", token);

        let body = self
            .fetcher
            .fetch(url.as_str(), &FetchOptions::new(self.project_timeout))
            .await?;
        serde_json::from_slice(&body).map_err(ScratchError::Decode)
    }

    /// Raw costume or sound file by its `md5ext` name
    pub async fn asset(&self, md5ext: &str) -> Result<Bytes, ScratchError> {
        let url = format!("{}/internalapi/asset/{}/get/", self.assets_base, md5ext);
        Ok(self
            .fetcher
            .fetch(&url, &FetchOptions::new(self.project_timeout))
            .await?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScratchError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("Unexpected response from Scratch: {0}")]
    Decode(serde_json::Error),
}

impl ScratchError {
    /// Only an answer from Scratch itself says the project is missing. An
    /// unresolvable Scratch host is an outage, not an unknown id.
    pub fn class(&self) -> FailureClass {
        match self {
            ScratchError::Fetch(FetchError::Status(StatusCode::NOT_FOUND)) => FailureClass::NotFound,
            _ => FailureClass::RemoteOther,
        }
    }
}
