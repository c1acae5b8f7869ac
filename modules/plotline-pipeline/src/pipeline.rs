use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{info, warn};

use plotline_common::{Config, PlotlineError};
use starscape_client::{Endpoint, JobOutcome, QueryRequest};

use crate::assemble::{assemble, write_output};
use crate::enrich::{Enricher, EnrichmentReport, EnrichmentSettings};
use crate::jobs::{JobRunner, PollPolicy};
use crate::manifest::write_manifest;
use crate::narrative::narratives_from_payload;
use crate::traits::AnalyticsApi;

/// Knobs for one collection run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub poll: PollPolicy,
    /// Only the first `narrative_limit` top-level narratives are enriched and kept.
    pub narrative_limit: usize,
    pub enrichment_delay: Duration,
    pub dataset_id: Option<String>,
    pub volume_window_days: Option<u32>,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            narrative_limit: 5,
            enrichment_delay: Duration::from_secs(1),
            dataset_id: None,
            volume_window_days: None,
        }
    }
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll: PollPolicy::from_config(config),
            narrative_limit: config.narrative_limit,
            enrichment_delay: config.enrichment_delay,
            dataset_id: None,
            volume_window_days: None,
        }
    }
}

/// Published in the last 21 days, tagged News and Politics, in English.
pub fn default_query() -> Value {
    json!({
        "op": "and",
        "values": [
            { "op": ">", "value": "-P21D", "field": "published" },
            { "op": "contains", "field": "taxonomies", "value": "News and Politics" },
            { "op": "contains", "field": "language", "value": "en" }
        ]
    })
}

/// Read a top-level query from a JSON file.
pub fn load_query(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading query file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing query file {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct Collected {
    pub document: Value,
    pub report: EnrichmentReport,
    pub timed_out: bool,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub output_path: PathBuf,
    pub manifest_path: PathBuf,
    pub report: EnrichmentReport,
}

pub struct Pipeline<'a> {
    api: &'a dyn AnalyticsApi,
    settings: RunSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(api: &'a dyn AnalyticsApi, settings: RunSettings) -> Self {
        Self { api, settings }
    }

    fn jobs(&self) -> JobRunner<'a> {
        JobRunner::new(self.api, self.settings.poll.clone())
    }

    /// Run the top-level analysis, enrich its narratives and assemble the document.
    ///
    /// Submission failures and an AI failure on the top-level job abort. A timeout
    /// continues with whatever narratives the last payload held.
    pub async fn collect(&self, query: &Value) -> Result<Collected> {
        let request = QueryRequest::scoped(query.clone(), self.settings.dataset_id.clone());
        let (submission, outcome) = self
            .jobs()
            .run(Endpoint::Summary, &request)
            .await
            .context("top-level summary request failed")?;

        let timed_out = matches!(outcome, JobOutcome::TimedOut(_));
        let result = match outcome {
            JobOutcome::AiFailure(message) => {
                return Err(PlotlineError::TopLevelAiFailure(message).into());
            }
            JobOutcome::TimedOut(payload) => {
                warn!("Top-level summary timed out, using partial results");
                payload
            }
            JobOutcome::Complete(payload) => payload,
        };

        let mut narratives = narratives_from_payload(&result, self.settings.narrative_limit);
        info!(count = narratives.len(), "Extracted narratives");

        let enricher = Enricher::new(
            self.api,
            self.jobs(),
            EnrichmentSettings {
                delay: self.settings.enrichment_delay,
                dataset_id: self.settings.dataset_id.clone(),
                volume_window_days: self.settings.volume_window_days,
            },
        );
        let report = enricher.enrich(&mut narratives).await;

        let document = assemble(result, &submission.stats, &narratives)?;
        Ok(Collected {
            document,
            report,
            timed_out,
        })
    }

    /// Collect, save as `<output_dir>/<name>.json` and regenerate the manifest.
    pub async fn run(&self, query: &Value, output_dir: &Path, name: &str) -> Result<RunSummary> {
        let collected = self.collect(query).await?;
        let output_path = write_output(output_dir, name, &collected.document)?;
        let manifest_path = write_manifest(output_dir)?;

        info!(
            path = %output_path.display(),
            nested_degraded = collected.report.nested_degraded,
            personas_degraded = collected.report.personas_degraded,
            timed_out = collected.timed_out,
            "Saved enriched narratives"
        );
        Ok(RunSummary {
            output_path,
            manifest_path,
            report: collected.report,
        })
    }
}
