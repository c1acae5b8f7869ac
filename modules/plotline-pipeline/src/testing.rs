// Test mocks for the plotline pipeline.
//
// Two mocks matching the two trait boundaries:
// - MockAnalytics (AnalyticsApi): scripted submissions and status sequences
// - MockDatasets (DatasetStore): in-memory dataset list that records uploads
//
// Plus small builders for narrative and persona payloads.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use atlas_client::{AtlasError, ColumnMapping, ContentBatch, DatasetSummary};
use starscape_client::{
    Endpoint, JobToken, QueryRequest, StarscapeError, Submission, SummaryStats, VolumePoint,
    AI_FAILURE_MESSAGE,
};

use crate::traits::{AnalyticsApi, DatasetStore};

// ---------------------------------------------------------------------------
// Payload helpers
// ---------------------------------------------------------------------------

/// A `contains` query on the post body.
pub fn body_query(keyword: &str) -> Value {
    json!({ "op": "contains", "field": "body", "value": keyword })
}

/// A narrative object as Starscape returns it.
pub fn narrative_json(title: &str, query: Option<Value>) -> Value {
    match query {
        Some(q) => json!({ "title": title, "summary": format!("About {title}"), "query": q }),
        None => json!({ "title": title, "summary": format!("About {title}") }),
    }
}

pub fn complete_narratives(narratives: Vec<Value>) -> Value {
    json!({ "complete": true, "output": { "narratives": narratives } })
}

pub fn complete_personas(personas: Vec<Value>) -> Value {
    json!({ "complete": true, "output": { "personas": personas } })
}

pub fn persona_json(title: &str, m: u32, f: u32, n: u32) -> Value {
    json!({ "title": title, "gender": { "m": m, "f": f, "n": n } })
}

pub fn pending() -> Value {
    json!({ "complete": false })
}

pub fn ai_failure() -> Value {
    json!({ "error": AI_FAILURE_MESSAGE })
}

// ---------------------------------------------------------------------------
// MockAnalytics
// ---------------------------------------------------------------------------

enum SubmitScript {
    Token { token: String, stats: SummaryStats },
    Reject { status: u16 },
    NoToken,
}

/// Scripted Starscape. Submissions are keyed by (endpoint, query); unregistered
/// submissions and tokens fail with a 404 `Api` error.
///
/// Each token replays its status sequence in order and then repeats the last entry.
pub struct MockAnalytics {
    submits: HashMap<(Endpoint, String), SubmitScript>,
    statuses: HashMap<String, Vec<Value>>,
    volumes: HashMap<String, Vec<VolumePoint>>,
    submitted: Mutex<Vec<(Endpoint, QueryRequestRecord)>>,
    status_fetches: Mutex<HashMap<String, usize>>,
}

/// What a submit call was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequestRecord {
    pub query: Value,
    pub dataset_id: Option<String>,
}

impl Default for MockAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnalytics {
    pub fn new() -> Self {
        Self {
            submits: HashMap::new(),
            statuses: HashMap::new(),
            volumes: HashMap::new(),
            submitted: Mutex::new(Vec::new()),
            status_fetches: Mutex::new(HashMap::new()),
        }
    }

    /// Submitting `query` to `endpoint` yields `token`; the token then replays `statuses`.
    pub fn on_job(self, endpoint: Endpoint, query: &Value, token: &str, statuses: Vec<Value>) -> Self {
        self.on_job_with_stats(endpoint, query, token, SummaryStats::default(), statuses)
    }

    pub fn on_job_with_stats(
        mut self,
        endpoint: Endpoint,
        query: &Value,
        token: &str,
        stats: SummaryStats,
        statuses: Vec<Value>,
    ) -> Self {
        self.submits.insert(
            (endpoint, query.to_string()),
            SubmitScript::Token {
                token: token.to_string(),
                stats,
            },
        );
        self.statuses.insert(token.to_string(), statuses);
        self
    }

    /// Submitting `query` to `endpoint` fails with an HTTP status.
    pub fn reject_submit(mut self, endpoint: Endpoint, query: &Value, status: u16) -> Self {
        self.submits
            .insert((endpoint, query.to_string()), SubmitScript::Reject { status });
        self
    }

    /// Submitting `query` to `endpoint` succeeds but returns no token.
    pub fn omit_token(mut self, endpoint: Endpoint, query: &Value) -> Self {
        self.submits
            .insert((endpoint, query.to_string()), SubmitScript::NoToken);
        self
    }

    pub fn on_volume(mut self, query: &Value, points: Vec<VolumePoint>) -> Self {
        self.volumes.insert(query.to_string(), points);
        self
    }

    pub fn submitted(&self) -> Vec<(Endpoint, QueryRequestRecord)> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submit_count(&self, endpoint: Endpoint) -> usize {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|(e, _)| *e == endpoint)
            .count()
    }

    pub fn status_fetches(&self, token: &str) -> usize {
        self.status_fetches
            .lock()
            .unwrap()
            .get(token)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl AnalyticsApi for MockAnalytics {
    async fn submit(
        &self,
        endpoint: Endpoint,
        request: &QueryRequest,
    ) -> starscape_client::Result<Submission> {
        self.submitted.lock().unwrap().push((
            endpoint,
            QueryRequestRecord {
                query: request.query.clone(),
                dataset_id: request.dataset_id.clone(),
            },
        ));

        match self.submits.get(&(endpoint, request.query.to_string())) {
            Some(SubmitScript::Token { token, stats }) => Ok(Submission {
                token: JobToken::new(token.clone()),
                stats: stats.clone(),
            }),
            Some(SubmitScript::Reject { status }) => Err(StarscapeError::Api {
                status: *status,
                message: "rejected by mock".to_string(),
            }),
            Some(SubmitScript::NoToken) => Err(StarscapeError::MissingToken {
                endpoint: endpoint.path().to_string(),
            }),
            None => Err(StarscapeError::Api {
                status: 404,
                message: format!("no mock submission for {endpoint} {}", request.query),
            }),
        }
    }

    async fn job_status(&self, token: &JobToken) -> starscape_client::Result<Value> {
        let attempt = {
            let mut fetches = self.status_fetches.lock().unwrap();
            let count = fetches.entry(token.as_str().to_string()).or_insert(0);
            *count += 1;
            *count - 1
        };

        let sequence = self
            .statuses
            .get(token.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StarscapeError::Api {
                status: 404,
                message: format!("no mock status for token {token}"),
            })?;
        Ok(sequence[attempt.min(sequence.len() - 1)].clone())
    }

    async fn daily_volume(
        &self,
        query: &Value,
        _dataset_id: Option<&str>,
        _window_days: u32,
    ) -> starscape_client::Result<Vec<VolumePoint>> {
        self.volumes
            .get(&query.to_string())
            .cloned()
            .ok_or_else(|| StarscapeError::Api {
                status: 500,
                message: "no mock volume".to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// MockDatasets
// ---------------------------------------------------------------------------

/// In-memory Atlas. Created datasets get ids `ds_mock_1`, `ds_mock_2`, ...
#[derive(Default)]
pub struct MockDatasets {
    datasets: Mutex<Vec<DatasetSummary>>,
    uploads: Mutex<Vec<(String, ContentBatch)>>,
    fail_uploads: bool,
}

impl MockDatasets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dataset(self, id: &str) -> Self {
        self.datasets.lock().unwrap().push(DatasetSummary {
            id: id.to_string(),
            title: None,
            extra: Default::default(),
        });
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.fail_uploads = true;
        self
    }

    pub fn dataset_ids(&self) -> Vec<String> {
        self.datasets
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn uploads(&self) -> Vec<(String, ContentBatch)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl DatasetStore for MockDatasets {
    async fn list_datasets(&self) -> atlas_client::Result<Vec<DatasetSummary>> {
        Ok(self.datasets.lock().unwrap().clone())
    }

    async fn create_dataset(
        &self,
        title: &str,
        _mapping: &ColumnMapping,
    ) -> atlas_client::Result<String> {
        let mut datasets = self.datasets.lock().unwrap();
        let id = format!("ds_mock_{}", datasets.len() + 1);
        datasets.push(DatasetSummary {
            id: id.clone(),
            title: Some(title.to_string()),
            extra: Default::default(),
        });
        Ok(id)
    }

    async fn upload_content(
        &self,
        dataset_id: &str,
        batch: &ContentBatch,
    ) -> atlas_client::Result<()> {
        if self.fail_uploads {
            return Err(AtlasError::Api {
                status: 503,
                message: "upload rejected by mock".to_string(),
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((dataset_id.to_string(), batch.clone()));
        Ok(())
    }
}
