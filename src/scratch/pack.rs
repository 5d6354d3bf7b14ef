use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use axum::body::Bytes;
use serde_json::Value;
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

/// `md5ext` names of every costume and sound referenced by an sb3 project
pub fn collect_asset_names(project: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    let Some(targets) = project.get("targets").and_then(Value::as_array) else {
        return names;
    };

    for target in targets {
        for key in ["costumes", "sounds"] {
            let Some(entries) = target.get(key).and_then(Value::as_array) else {
                continue;
            };
            for entry in entries {
                let name = entry
                    .get("md5ext")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or_else(|| {
                        let id = entry.get("assetId")?.as_str()?;
                        let format = entry.get("dataFormat")?.as_str()?;
                        Some(format!("{}.{}", id, format))
                    });
                if let Some(name) = name.filter(|n| is_valid_asset_name(n)) {
                    names.insert(name);
                }
            }
        }
    }

    names
}

/// `<alnum>.<alnum>` and nothing else, so it is safe as a URL segment and zip entry
pub fn is_valid_asset_name(name: &str) -> bool {
    match name.split_once('.') {
        Some((stem, ext)) => {
            !stem.is_empty()
                && !ext.is_empty()
                && stem.chars().all(|c| c.is_ascii_alphanumeric())
                && ext.chars().all(|c| c.is_ascii_alphanumeric())
        }
        None => false,
    }
}

/// Write the `.sb3` zip: the metadata document as `project.json` plus any assets.
/// Blocking; run it on the blocking pool.
pub fn write_sb3(
    archive_path: &Path,
    metadata_path: &Path,
    assets: &[(String, Bytes)],
) -> Result<(), PackError> {
    let project_json = std::fs::read(metadata_path)?;

    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9));

    let mut zip = ZipWriter::new(File::create(archive_path)?);
    zip.start_file("project.json", options)?;
    zip.write_all(&project_json)?;

    for (name, data) in assets {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }

    zip.finish()?.sync_all()?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum PackError {
    #[error("File system error: {0}")]
    Io(#[from] io::Error),
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("Archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
