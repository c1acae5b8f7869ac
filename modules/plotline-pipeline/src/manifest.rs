use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use plotline_common::Result;

pub const MANIFEST_FILE: &str = "manifest.json";

/// One output document listed for the viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub label: String,
}

/// Every `*.json` document in `output_dir` except the manifest, sorted by file name.
pub fn scan(output_dir: &Path) -> Result<Vec<ManifestEntry>> {
    let mut names: Vec<String> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| name.ends_with(".json") && name != MANIFEST_FILE)
        .collect();
    names.sort();

    Ok(names
        .into_iter()
        .map(|name| ManifestEntry {
            path: output_dir.join(&name).display().to_string(),
            label: name.trim_end_matches(".json").to_string(),
        })
        .collect())
}

/// Rebuild `manifest.json` from the current contents of `output_dir`.
pub fn write_manifest(output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let entries = scan(output_dir)?;
    let path = output_dir.join(MANIFEST_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(&entries)?)?;
    info!(path = %path.display(), documents = entries.len(), "Manifest regenerated");
    Ok(path)
}
