pub mod error;
pub mod types;

pub use error::{Result, StarscapeError};
pub use types::{
    classify_status, output_items, AggregateRequest, Aggregation, Endpoint, JobOutcome,
    JobToken, QueryRequest, StatusCheck, Submission, SummaryStats, VolumePoint,
    AI_FAILURE_MESSAGE,
};

use chrono::{Duration, Utc};
use reqwest::header::ACCEPT;
use reqwest::Response;
use serde_json::Value;
use types::{Histogram, SubmitResponse, DAILY_VOLUME_AGG};

const BASE_URL: &str = "https://starscape.infegy.com/api";

pub struct StarscapeClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl StarscapeClient {
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

    /// Start an async analysis. Fails when the response is not a success or carries no token.
    pub async fn submit(&self, endpoint: Endpoint, request: &QueryRequest) -> Result<Submission> {
        let url = format!("{}/{}", self.base_url, endpoint.path());
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .json(request)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let body: SubmitResponse = resp.json().await?;
        let token = body
            .token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| StarscapeError::MissingToken {
                endpoint: endpoint.path().to_string(),
            })?;

        tracing::info!(%endpoint, token = token.as_str(), "Retrieved job token");
        Ok(Submission {
            token: JobToken::new(token),
            stats: body.stats,
        })
    }

    /// Fetch the current state of a job once. Callers decide whether to poll again.
    pub async fn job_status(&self, token: &JobToken) -> Result<Value> {
        let url = format!("{}/ai-async/{}", self.base_url, token);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        Ok(resp.json().await?)
    }

    /// Daily post volume for a query over the last `window_days` days.
    pub async fn daily_volume(
        &self,
        query: &Value,
        dataset_id: Option<&str>,
        window_days: u32,
    ) -> Result<Vec<VolumePoint>> {
        let end = Utc::now();
        let start = end - Duration::days(i64::from(window_days));
        let request = AggregateRequest::daily_volume(
            query.clone(),
            dataset_id.map(str::to_string),
            start,
            end,
        );

        let url = format!("{}/query/agg", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await?;

        let resp = ensure_success(resp).await?;
        let mut body: Value = resp.json().await?;
        let histogram = body
            .get_mut(DAILY_VOLUME_AGG)
            .map(Value::take)
            .ok_or_else(|| StarscapeError::Parse(format!("missing {DAILY_VOLUME_AGG} aggregation")))?;
        let histogram: Histogram = serde_json::from_value(histogram)?;

        tracing::debug!(buckets = histogram.buckets.len(), "Fetched daily volume");
        Ok(histogram
            .buckets
            .into_iter()
            .map(|bucket| (bucket.key, bucket.count))
            .collect())
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(StarscapeError::Api {
            status: status.as_u16(),
            message: body,
        });
    }
    Ok(resp)
}
