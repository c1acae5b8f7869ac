//! Push exported CSVs into an Atlas custom dataset.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use atlas_client::{ColumnMapping, ContentBatch};

use crate::traits::DatasetStore;

/// What a directory upload did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    /// Dataset the rows went to. `None` when nothing was uploaded.
    pub dataset_id: Option<String>,
    pub files_uploaded: usize,
    pub files_skipped: usize,
    pub rows_uploaded: usize,
}

/// Return `dataset_id` if Atlas already lists it, otherwise create a dataset named `name`.
pub async fn ensure_dataset(
    store: &dyn DatasetStore,
    dataset_id: Option<&str>,
    name: &str,
    mapping: &ColumnMapping,
) -> atlas_client::Result<String> {
    if let Some(id) = dataset_id.filter(|id| !id.is_empty()) {
        let datasets = store.list_datasets().await?;
        if datasets.iter().any(|d| d.id == id) {
            info!(dataset_id = id, "Using existing dataset");
            return Ok(id.to_string());
        }
        info!(dataset_id = id, "Dataset not found, creating a new one");
    }

    store.create_dataset(name, mapping).await
}

/// Read a CSV with a header row into header→value rows.
pub fn read_csv(path: &Path) -> Result<ContentBatch> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;
    let headers = reader.headers()?.clone();

    let mut content = Vec::new();
    for record in reader.records() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        let row: BTreeMap<String, String> = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.to_string(), v.to_string()))
            .collect();
        content.push(row);
    }
    Ok(ContentBatch { content })
}

/// Upload every CSV in `csv_dir` to one dataset, creating it on first use.
///
/// Files that fail to parse are skipped. Upload failures abort.
pub async fn push_csv_dir(
    store: &dyn DatasetStore,
    csv_dir: &Path,
    name: &str,
    dataset_id: Option<&str>,
    mapping: &ColumnMapping,
) -> Result<UploadSummary> {
    let mut files: Vec<_> = std::fs::read_dir(csv_dir)
        .with_context(|| format!("listing {}", csv_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| path.file_name().is_some_and(|n| n != ".DS_Store"))
        .collect();
    files.sort();

    info!(dir = %csv_dir.display(), files = files.len(), "Uploading data");
    let mut summary = UploadSummary::default();

    for path in files {
        let batch = match read_csv(&path) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Skipping unreadable CSV");
                summary.files_skipped += 1;
                continue;
            }
        };

        let id = match &summary.dataset_id {
            Some(id) => id.clone(),
            None => {
                let id = ensure_dataset(store, dataset_id, name, mapping).await?;
                summary.dataset_id = Some(id.clone());
                id
            }
        };

        store
            .upload_content(&id, &batch)
            .await
            .with_context(|| format!("uploading {}", path.display()))?;
        info!(file = %path.display(), rows = batch.len(), dataset_id = id.as_str(), "Uploaded");
        summary.files_uploaded += 1;
        summary.rows_uploaded += batch.len();
    }

    info!(
        files = summary.files_uploaded,
        skipped = summary.files_skipped,
        rows = summary.rows_uploaded,
        "Finished uploading data"
    );
    Ok(summary)
}
