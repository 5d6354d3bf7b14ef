//! Shared helpers for handler tests.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::fetch::stub::StubFetcher;
use crate::models::AppConfig;
use crate::store::EphemeralStore;
use crate::AppState;

/// Poll for removal; cleanup runs on a spawned task after the body ends
pub async fn wait_until_gone(path: &Path) -> bool {
    for _ in 0..100 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Every file and directory below `root`, recursively
pub fn entries_under(root: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(root) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                found.extend(entries_under(&path));
            }
            found.push(path);
        }
    }
    found
}

/// Wait until the artifact root holds nothing but the empty `scratch` directory
pub async fn wait_until_empty(root: &Path) -> bool {
    for _ in 0..100 {
        let leftovers: Vec<_> = entries_under(root)
            .into_iter()
            .filter(|p| !(p.is_dir() && p.file_name().is_some_and(|n| n == "scratch")))
            .collect();
        if leftovers.is_empty() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

pub async fn test_state(temp_dir: &tempfile::TempDir, fetcher: Arc<StubFetcher>) -> AppState {
    let config = AppConfig {
        temp_dir: temp_dir.path().join("artifacts"),
        public_dir: temp_dir.path().join("public"),
        scratch_api_base: "https://api.scratch.test".to_string(),
        scratch_projects_base: "https://projects.scratch.test".to_string(),
        scratch_assets_base: "https://assets.scratch.test".to_string(),
        ..AppConfig::default()
    };

    let store = Arc::new(EphemeralStore::new(&config.temp_dir));
    store.init().await.unwrap();

    AppState::new(config, store, fetcher)
}
