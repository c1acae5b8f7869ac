pub mod error;
pub mod types;

pub use error::{AtlasError, Result};
pub use types::{
    ApiResponse, ColumnKind, ColumnMapping, ColumnSpec, ColumnTraits, ContentBatch,
    DatasetSummary,
};

use reqwest::Response;
use types::CreatedDataset;

const BASE_URL: &str = "https://atlas.infegy.com/api/v3";

/// Client for Atlas custom datasets. Atlas authenticates with an `api_key` query parameter.
pub struct AtlasClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl AtlasClient {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(BASE_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// All custom datasets visible to this key.
    pub async fn list_datasets(&self) -> Result<Vec<DatasetSummary>> {
        let url = format!("{}/custom-dataset/list", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let api_resp: ApiResponse<Vec<DatasetSummary>> = resp.json().await?;
        Ok(api_resp.output)
    }

    /// Initialize a dataset with a column mapping. Returns the new dataset id.
    pub async fn create_dataset(&self, title: &str, mapping: &ColumnMapping) -> Result<String> {
        let url = format!("{}/custom-dataset", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[("api_key", self.api_key.as_str()), ("title", title)])
            .json(mapping)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let api_resp: ApiResponse<CreatedDataset> = resp.json().await?;
        tracing::info!(title, dataset_id = %api_resp.output.id, "Created Atlas dataset");
        Ok(api_resp.output.id)
    }

    /// Push one batch of rows into a dataset.
    pub async fn upload_content(&self, dataset_id: &str, batch: &ContentBatch) -> Result<()> {
        let url = format!("{}/custom-dataset/content", self.base_url);
        let resp = self
            .client
            .post(&url)
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("dry_run", "0"),
                ("id", dataset_id),
                ("ignore_errors", "0"),
            ])
            .json(batch)
            .send()
            .await?;

        ensure_success(resp).await?;
        tracing::debug!(dataset_id, rows = batch.len(), "Uploaded content batch");
        Ok(())
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(AtlasError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp)
}
