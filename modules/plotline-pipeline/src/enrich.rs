//! Per-narrative enrichment: nested narratives, personas and daily volume.
//!
//! Each pass walks the narratives in order, one at a time. A narrative without
//! a query is left alone. A failure for one narrative becomes a placeholder on
//! that narrative and never stops the batch.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use starscape_client::{
    output_items, Endpoint, JobOutcome, QueryRequest, StarscapeError, VolumePoint,
};

use crate::jobs::JobRunner;
use crate::narrative::{
    personas_from_payload, Narrative, Persona, AI_FAILURE_PERSONA_TITLE,
    FETCH_FAILURE_PERSONA_TITLE,
};
use crate::traits::AnalyticsApi;

/// Why one narrative could not be enriched.
#[derive(Debug, Error)]
pub enum EnrichmentFailure {
    #[error("submission failed: {0}")]
    Submission(StarscapeError),

    #[error("polling failed: {0}")]
    Poll(StarscapeError),

    #[error("AI failed to generate output: {0}")]
    AiFailure(String),

    #[error("request failed: {0}")]
    Request(StarscapeError),
}

#[derive(Debug, Clone, Default)]
pub struct EnrichmentSettings {
    /// Pause after each narrative in the nested and volume passes.
    pub delay: Duration,
    /// Scope every sub-query to this dataset.
    pub dataset_id: Option<String>,
    /// Run the daily-volume pass over this many days. `None` skips it.
    pub volume_window_days: Option<u32>,
}

/// Counts of what each pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnrichmentReport {
    pub without_query: usize,
    pub nested_fetched: usize,
    pub nested_degraded: usize,
    pub personas_fetched: usize,
    pub personas_degraded: usize,
    pub volume_fetched: usize,
    pub volume_failed: usize,
}

pub struct Enricher<'a> {
    api: &'a dyn AnalyticsApi,
    jobs: JobRunner<'a>,
    settings: EnrichmentSettings,
}

impl<'a> Enricher<'a> {
    pub fn new(api: &'a dyn AnalyticsApi, jobs: JobRunner<'a>, settings: EnrichmentSettings) -> Self {
        Self {
            api,
            jobs,
            settings,
        }
    }

    /// Run every enabled pass over `narratives`, in place.
    pub async fn enrich(&self, narratives: &mut [Narrative]) -> EnrichmentReport {
        let mut report = EnrichmentReport {
            without_query: narratives.iter().filter(|n| n.query().is_none()).count(),
            ..Default::default()
        };

        info!(count = narratives.len(), "Enriching narratives with nested data");
        self.enrich_nested(narratives, &mut report).await;

        info!(count = narratives.len(), "Enriching narratives with personas");
        self.enrich_personas(narratives, &mut report).await;

        if let Some(window_days) = self.settings.volume_window_days {
            info!(count = narratives.len(), window_days, "Enriching narratives with daily volume");
            self.enrich_volume(narratives, window_days, &mut report).await;
        }

        report
    }

    pub async fn enrich_nested(&self, narratives: &mut [Narrative], report: &mut EnrichmentReport) {
        for narrative in narratives.iter_mut() {
            let Some(query) = narrative.query().cloned() else {
                info!(title = narrative.display_title(), "Skipping narrative (no query found)");
                continue;
            };

            match self.fetch_nested(query).await {
                Ok(nested) => {
                    info!(
                        title = narrative.display_title(),
                        count = nested.len(),
                        "Found nested narratives"
                    );
                    narrative.set_nested_narratives(nested);
                    report.nested_fetched += 1;
                }
                Err(e) => {
                    warn!(
                        title = narrative.display_title(),
                        error = %e,
                        "Nested narratives unavailable"
                    );
                    narrative.set_nested_narratives(Vec::new());
                    report.nested_degraded += 1;
                }
            }

            sleep(self.settings.delay).await;
        }
    }

    async fn fetch_nested(&self, query: Value) -> Result<Vec<Value>, EnrichmentFailure> {
        let outcome = self.run_job(Endpoint::Summary, query).await?;
        match outcome {
            JobOutcome::AiFailure(message) => Err(EnrichmentFailure::AiFailure(message)),
            JobOutcome::Complete(payload) | JobOutcome::TimedOut(payload) => {
                Ok(output_items(&payload, Endpoint::Summary.child_key()).to_vec())
            }
        }
    }

    pub async fn enrich_personas(
        &self,
        narratives: &mut [Narrative],
        report: &mut EnrichmentReport,
    ) {
        for narrative in narratives.iter_mut() {
            let Some(query) = narrative.query().cloned() else {
                info!(title = narrative.display_title(), "Skipping narrative (no query found)");
                continue;
            };

            match self.fetch_personas(query).await {
                Ok(personas) => {
                    info!(
                        title = narrative.display_title(),
                        count = personas.len(),
                        "Found personas"
                    );
                    narrative.set_personas(&personas);
                    report.personas_fetched += 1;
                }
                Err(e) => {
                    warn!(
                        title = narrative.display_title(),
                        error = %e,
                        "Personas unavailable"
                    );
                    let title = match e {
                        EnrichmentFailure::AiFailure(_) => AI_FAILURE_PERSONA_TITLE,
                        _ => FETCH_FAILURE_PERSONA_TITLE,
                    };
                    narrative.set_personas(&[Persona::placeholder(title)]);
                    report.personas_degraded += 1;
                }
            }
        }
    }

    async fn fetch_personas(&self, query: Value) -> Result<Vec<Persona>, EnrichmentFailure> {
        let outcome = self.run_job(Endpoint::Personas, query).await?;
        match outcome {
            JobOutcome::AiFailure(message) => Err(EnrichmentFailure::AiFailure(message)),
            JobOutcome::Complete(payload) | JobOutcome::TimedOut(payload) => {
                Ok(personas_from_payload(&payload))
            }
        }
    }

    /// Volume is optional data: a failure leaves the record without `volume_data`.
    pub async fn enrich_volume(
        &self,
        narratives: &mut [Narrative],
        window_days: u32,
        report: &mut EnrichmentReport,
    ) {
        for narrative in narratives.iter_mut() {
            let Some(query) = narrative.query() else {
                continue;
            };

            match self.fetch_volume(query, window_days).await {
                Ok(points) => {
                    narrative.set_volume_data(points);
                    report.volume_fetched += 1;
                }
                Err(e) => {
                    warn!(
                        title = narrative.display_title(),
                        error = %e,
                        "Failed to fetch volume data"
                    );
                    report.volume_failed += 1;
                }
            }

            sleep(self.settings.delay).await;
        }
    }

    async fn fetch_volume(
        &self,
        query: &Value,
        window_days: u32,
    ) -> Result<Vec<VolumePoint>, EnrichmentFailure> {
        self.api
            .daily_volume(query, self.settings.dataset_id.as_deref(), window_days)
            .await
            .map_err(EnrichmentFailure::Request)
    }

    async fn run_job(&self, endpoint: Endpoint, query: Value) -> Result<JobOutcome, EnrichmentFailure> {
        let request = QueryRequest::scoped(query, self.settings.dataset_id.clone());
        let submission = self
            .jobs
            .submit(endpoint, &request)
            .await
            .map_err(EnrichmentFailure::Submission)?;
        self.jobs
            .poll(endpoint, submission.token)
            .await
            .map_err(EnrichmentFailure::Poll)
    }
}
