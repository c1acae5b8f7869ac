// Trait seams for the two vendor APIs.
//
// AnalyticsApi: Starscape async jobs and aggregations.
// DatasetStore: Atlas custom datasets.
//
// Real clients implement these directly; simulated runs and tests swap in
// in-process implementations (simulate.rs, testing.rs).

use async_trait::async_trait;
use serde_json::Value;

use atlas_client::{AtlasClient, ColumnMapping, ContentBatch, DatasetSummary};
use starscape_client::{
    Endpoint, JobToken, QueryRequest, StarscapeClient, Submission, VolumePoint,
};

// ---------------------------------------------------------------------------
// AnalyticsApi
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AnalyticsApi: Send + Sync {
    /// Start an async analysis and return its token.
    async fn submit(
        &self,
        endpoint: Endpoint,
        request: &QueryRequest,
    ) -> starscape_client::Result<Submission>;

    /// Fetch the current payload of a job once.
    async fn job_status(&self, token: &JobToken) -> starscape_client::Result<Value>;

    /// Daily post volume for a query.
    async fn daily_volume(
        &self,
        query: &Value,
        dataset_id: Option<&str>,
        window_days: u32,
    ) -> starscape_client::Result<Vec<VolumePoint>>;
}

#[async_trait]
impl AnalyticsApi for StarscapeClient {
    async fn submit(
        &self,
        endpoint: Endpoint,
        request: &QueryRequest,
    ) -> starscape_client::Result<Submission> {
        self.submit(endpoint, request).await
    }

    async fn job_status(&self, token: &JobToken) -> starscape_client::Result<Value> {
        self.job_status(token).await
    }

    async fn daily_volume(
        &self,
        query: &Value,
        dataset_id: Option<&str>,
        window_days: u32,
    ) -> starscape_client::Result<Vec<VolumePoint>> {
        self.daily_volume(query, dataset_id, window_days).await
    }
}

// ---------------------------------------------------------------------------
// DatasetStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DatasetStore: Send + Sync {
    async fn list_datasets(&self) -> atlas_client::Result<Vec<DatasetSummary>>;

    /// Create a dataset and return its id.
    async fn create_dataset(
        &self,
        title: &str,
        mapping: &ColumnMapping,
    ) -> atlas_client::Result<String>;

    async fn upload_content(
        &self,
        dataset_id: &str,
        batch: &ContentBatch,
    ) -> atlas_client::Result<()>;
}

#[async_trait]
impl DatasetStore for AtlasClient {
    async fn list_datasets(&self) -> atlas_client::Result<Vec<DatasetSummary>> {
        self.list_datasets().await
    }

    async fn create_dataset(
        &self,
        title: &str,
        mapping: &ColumnMapping,
    ) -> atlas_client::Result<String> {
        self.create_dataset(title, mapping).await
    }

    async fn upload_content(
        &self,
        dataset_id: &str,
        batch: &ContentBatch,
    ) -> atlas_client::Result<()> {
        self.upload_content(dataset_id, batch).await
    }
}
