use std::path::PathBuf;
use std::time::Duration;

use qrcode::EcLevel;

/// Rendering parameters for generated QR images
#[derive(Debug, Clone)]
pub struct QrOptions {
    pub size: u32,
    /// Quiet zone width in modules
    pub margin: u32,
    pub dark: [u8; 3],
    pub light: [u8; 3],
    pub ec_level: EcLevel,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            size: 500,
            margin: 2,
            dark: [0x00, 0x00, 0x00],
            light: [0xff, 0xff, 0xff],
            ec_level: EcLevel::M,
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub temp_dir: PathBuf,
    pub public_dir: PathBuf,
    pub page_timeout: Duration,
    pub scratch_meta_timeout: Duration,
    pub scratch_project_timeout: Duration,
    pub max_redirects: usize,
    /// How long in-flight responses may drain after a shutdown signal
    pub shutdown_grace: Duration,
    pub scratch_api_base: String,
    pub scratch_projects_base: String,
    pub scratch_assets_base: String,
    pub scratch_include_assets: bool,
    pub qr: QrOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            temp_dir: PathBuf::from("temp"),
            public_dir: PathBuf::from("public"),
            page_timeout: Duration::from_secs(15),
            scratch_meta_timeout: Duration::from_secs(10),
            scratch_project_timeout: Duration::from_secs(15),
            max_redirects: 5,
            shutdown_grace: Duration::from_secs(10),
            scratch_api_base: "https://api.scratch.mit.edu".to_string(),
            scratch_projects_base: "https://projects.scratch.mit.edu".to_string(),
            scratch_assets_base: "https://assets.scratch.mit.edu".to_string(),
            scratch_include_assets: true,
            qr: QrOptions::default(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with `PORT`, `TOOLBERRY_TEMP_DIR` and `TOOLBERRY_PUBLIC_DIR`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT") {
            match port.trim().parse() {
                Ok(port) => config.port = port,
                Err(_) => tracing::warn!("Ignoring invalid PORT value {:?}", port),
            }
        }
        if let Some(dir) = lookup("TOOLBERRY_TEMP_DIR").filter(|d| !d.is_empty()) {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("TOOLBERRY_PUBLIC_DIR").filter(|d| !d.is_empty()) {
            config.public_dir = PathBuf::from(dir);
        }

        config
    }
}
