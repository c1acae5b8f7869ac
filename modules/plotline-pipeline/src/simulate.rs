// In-process stand-ins for Starscape and Atlas used by `--simulate`.
//
// The pipeline runs unchanged against these: tokens are random, every job
// completes on its first status fetch, and payloads have the same shape the
// real API returns.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, SecondsFormat, Utc};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tracing::info;

use atlas_client::{ColumnMapping, ContentBatch, DatasetSummary};
use starscape_client::{
    Endpoint, JobToken, QueryRequest, StarscapeError, Submission, SummaryStats, VolumePoint,
};

use crate::traits::{AnalyticsApi, DatasetStore};

const TOPICS: &[(&str, &str)] = &[
    ("Tariff negotiations", "tariff"),
    ("Housing affordability", "rent"),
    ("School board elections", "school board"),
    ("Wildfire recovery funding", "wildfire"),
    ("Transit fare changes", "transit"),
    ("Local hospital closures", "hospital"),
    ("Minimum wage ballot measure", "minimum wage"),
    ("Water rights dispute", "water rights"),
];

const PERSONAS: &[&str] = &[
    "Concerned parents",
    "Retired veterans",
    "Small business owners",
    "College activists",
    "Rural commuters",
    "Healthcare workers",
];

/// Random alphanumeric token of `len` characters.
pub fn generate_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

// ---------------------------------------------------------------------------
// SimulatedAnalytics
// ---------------------------------------------------------------------------

pub struct SimulatedAnalytics {
    jobs: Mutex<HashMap<JobToken, Endpoint>>,
    narratives_per_summary: usize,
    personas_per_narrative: usize,
}

impl Default for SimulatedAnalytics {
    fn default() -> Self {
        Self::new(5, 3)
    }
}

impl SimulatedAnalytics {
    pub fn new(narratives_per_summary: usize, personas_per_narrative: usize) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            narratives_per_summary,
            personas_per_narrative,
        }
    }

    fn endpoint_for(&self, token: &JobToken) -> Option<Endpoint> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(token)
            .copied()
    }
}

fn fabricate_stats() -> SummaryStats {
    let mut rng = rand::rng();
    let now = Utc::now();
    SummaryStats {
        total_count: Some(json!(rng.random_range(5_000..250_000))),
        positivity: Some(json!((rng.random_range(20..80) as f64) / 100.0)),
        min_timestamp: Some(json!((now - Duration::days(21)).to_rfc3339_opts(SecondsFormat::Secs, true))),
        max_timestamp: Some(json!(now.to_rfc3339_opts(SecondsFormat::Secs, true))),
    }
}

fn fabricate_narratives(count: usize) -> Value {
    let mut rng = rand::rng();
    let narratives: Vec<Value> = (0..count)
        .map(|_| {
            let (title, keyword) = TOPICS[rng.random_range(0..TOPICS.len())];
            json!({
                "title": title,
                "summary": format!("Conversation about {keyword} is growing across news and social posts."),
                "positivity": (rng.random_range(10..90) as f64) / 100.0,
                "query": { "op": "contains", "field": "body", "value": keyword },
            })
        })
        .collect();
    json!({ "complete": true, "output": { "narratives": narratives } })
}

fn fabricate_personas(count: usize) -> Value {
    let mut rng = rand::rng();
    let personas: Vec<Value> = (0..count)
        .map(|_| {
            let title = PERSONAS[rng.random_range(0..PERSONAS.len())];
            let m: u32 = rng.random_range(0..=100);
            let f: u32 = rng.random_range(0..=(100 - m));
            json!({ "title": title, "gender": { "m": m, "f": f, "n": 100 - m - f } })
        })
        .collect();
    json!({ "complete": true, "output": { "personas": personas } })
}

fn fabricate_volume(window_days: u32) -> Vec<VolumePoint> {
    let mut rng = rand::rng();
    let today = Utc::now().date_naive();
    (0..window_days)
        .rev()
        .map(|back| {
            let day = today - Duration::days(i64::from(back));
            (json!(day.format("%Y-%m-%d").to_string()), rng.random_range(50..5_000))
        })
        .collect()
}

#[async_trait]
impl AnalyticsApi for SimulatedAnalytics {
    async fn submit(
        &self,
        endpoint: Endpoint,
        _request: &QueryRequest,
    ) -> starscape_client::Result<Submission> {
        let token = JobToken::new(generate_token(32));
        info!(%endpoint, %token, "Token retrieved");
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(token.clone(), endpoint);
        Ok(Submission {
            token,
            stats: fabricate_stats(),
        })
    }

    async fn job_status(&self, token: &JobToken) -> starscape_client::Result<Value> {
        match self.endpoint_for(token) {
            Some(Endpoint::Summary) => Ok(fabricate_narratives(self.narratives_per_summary)),
            Some(Endpoint::Personas) => Ok(fabricate_personas(self.personas_per_narrative)),
            None => Err(StarscapeError::Api {
                status: 404,
                message: format!("unknown token {token}"),
            }),
        }
    }

    async fn daily_volume(
        &self,
        _query: &Value,
        _dataset_id: Option<&str>,
        window_days: u32,
    ) -> starscape_client::Result<Vec<VolumePoint>> {
        Ok(fabricate_volume(window_days))
    }
}

// ---------------------------------------------------------------------------
// SimulatedDatasets
// ---------------------------------------------------------------------------

/// Accepts uploads without storing them and hands out fabricated dataset ids.
#[derive(Default)]
pub struct SimulatedDatasets;

#[async_trait]
impl DatasetStore for SimulatedDatasets {
    async fn list_datasets(&self) -> atlas_client::Result<Vec<DatasetSummary>> {
        Ok(Vec::new())
    }

    async fn create_dataset(
        &self,
        title: &str,
        _mapping: &ColumnMapping,
    ) -> atlas_client::Result<String> {
        let id = format!("ds_{}", generate_token(11));
        info!(title, dataset_id = id.as_str(), "Dataset ID");
        Ok(id)
    }

    async fn upload_content(
        &self,
        dataset_id: &str,
        batch: &ContentBatch,
    ) -> atlas_client::Result<()> {
        info!(dataset_id, rows = batch.len(), "Simulated upload");
        Ok(())
    }
}
