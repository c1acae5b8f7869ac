use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error message Starscape returns when the model behind an async job gives up.
pub const AI_FAILURE_MESSAGE: &str = "The AI failed to generate valid output";

// --- Endpoints ---

/// Structured AI analyses that run as async jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Narrative summary. Used for the top-level query and for nested narratives.
    Summary,
    /// Social persona breakdown for a narrative's audience.
    Personas,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Summary => "query/ai-summary-structured/",
            Endpoint::Personas => "query/ai-social-personas-structured/",
        }
    }

    /// Key under `output` holding the items this analysis produces.
    pub fn child_key(self) -> &'static str {
        match self {
            Endpoint::Summary => "narratives",
            Endpoint::Personas => "personas",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Summary => f.write_str("summary"),
            Endpoint::Personas => f.write_str("personas"),
        }
    }
}

// --- Job submission ---

/// Opaque handle for one async analysis. Consumed by polling.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobToken(String);

impl JobToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body for the structured-analysis endpoints. The query is passed through untouched.
#[derive(Debug, Clone, Serialize)]
pub struct QueryRequest {
    pub query: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: Value) -> Self {
        Self {
            query,
            dataset_id: None,
        }
    }

    pub fn scoped(query: Value, dataset_id: Option<String>) -> Self {
        Self { query, dataset_id }
    }
}

/// Summary metadata returned alongside a job token. Forwarded verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    #[serde(default)]
    pub total_count: Option<Value>,
    #[serde(default)]
    pub positivity: Option<Value>,
    #[serde(default)]
    pub min_timestamp: Option<Value>,
    #[serde(default)]
    pub max_timestamp: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(flatten)]
    pub stats: SummaryStats,
}

/// A started job: its token plus whatever summary the submit call returned.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub token: JobToken,
    pub stats: SummaryStats,
}

// --- Job status ---

/// Terminal result of polling one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Complete(Value),
    AiFailure(String),
    /// The timeout elapsed first; carries the last payload seen.
    TimedOut(Value),
}

/// What a single status payload says about its job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusCheck {
    Failed(String),
    Complete,
    Pending,
}

/// Classify one `ai-async/{token}` payload.
///
/// An `error` field always wins. A boolean `complete` flag is authoritative when
/// present; only when the vendor omits it does the child-count heuristic apply.
pub fn classify_status(
    payload: &Value,
    child_key: &str,
    early_complete_min: Option<usize>,
) -> StatusCheck {
    if let Some(error) = payload.get("error").filter(|e| !e.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return StatusCheck::Failed(message);
    }

    match payload.get("complete").and_then(Value::as_bool) {
        Some(true) => StatusCheck::Complete,
        Some(false) => StatusCheck::Pending,
        None => match early_complete_min {
            Some(min) if min > 0 && output_items(payload, child_key).len() >= min => {
                StatusCheck::Complete
            }
            _ => StatusCheck::Pending,
        },
    }
}

/// Items under `output.<key>`, or an empty slice when absent or not a list.
pub fn output_items<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .get("output")
        .and_then(|output| output.get(key))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

// --- Aggregations ---

/// A `[bucket_key, count]` pair from a histogram.
pub type VolumePoint = (Value, u64);

/// Body for `query/agg`.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_id: Option<String>,
    pub timezone: String,
    pub query: Value,
    pub aggs: BTreeMap<String, Aggregation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Aggregation {
    pub op: String,
    pub field: String,
    pub interval: String,
    pub min: String,
    pub max: String,
}

pub(crate) const DAILY_VOLUME_AGG: &str = "daily_volume";

impl AggregateRequest {
    /// Daily histogram of `published` between `start` and `end`.
    pub fn daily_volume(
        query: Value,
        dataset_id: Option<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        let mut aggs = BTreeMap::new();
        aggs.insert(
            DAILY_VOLUME_AGG.to_string(),
            Aggregation {
                op: "histogram".to_string(),
                field: "published".to_string(),
                interval: "day".to_string(),
                min: start.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
                max: end.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            },
        );
        Self {
            dataset_id,
            timezone: "Etc/UTC".to_string(),
            query,
            aggs,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Histogram {
    #[serde(rename = "_buckets")]
    pub buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HistogramBucket {
    #[serde(rename = "_key")]
    pub key: Value,
    #[serde(rename = "_count")]
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn error_field_is_failure_even_when_complete() {
        let payload = json!({ "error": AI_FAILURE_MESSAGE, "complete": true });
        assert_eq!(
            classify_status(&payload, "narratives", None),
            StatusCheck::Failed(AI_FAILURE_MESSAGE.to_string())
        );
    }

    #[test]
    fn null_error_is_ignored() {
        let payload = json!({ "error": null, "complete": true });
        assert_eq!(classify_status(&payload, "narratives", None), StatusCheck::Complete);
    }

    #[test]
    fn explicit_false_beats_heuristic() {
        let payload = json!({
            "complete": false,
            "output": { "narratives": [{}, {}, {}, {}, {}] }
        });
        assert_eq!(classify_status(&payload, "narratives", Some(3)), StatusCheck::Pending);
    }

    #[test]
    fn heuristic_completes_when_flag_missing() {
        let payload = json!({ "output": { "narratives": [{}, {}, {}] } });
        assert_eq!(classify_status(&payload, "narratives", Some(3)), StatusCheck::Complete);
        assert_eq!(classify_status(&payload, "narratives", Some(4)), StatusCheck::Pending);
        assert_eq!(classify_status(&payload, "narratives", None), StatusCheck::Pending);
    }

    #[test]
    fn heuristic_counts_the_endpoint_child_key() {
        let payload = json!({ "output": { "narratives": [{}, {}] } });
        assert_eq!(classify_status(&payload, "personas", Some(1)), StatusCheck::Pending);
    }

    #[test]
    fn non_string_error_is_rendered() {
        let payload = json!({ "error": { "code": 7 } });
        assert_eq!(
            classify_status(&payload, "narratives", None),
            StatusCheck::Failed(r#"{"code":7}"#.to_string())
        );
    }

    #[test]
    fn submit_response_reads_token_and_stats() {
        let resp: SubmitResponse = serde_json::from_value(json!({
            "token": "abc",
            "total_count": 1200,
            "positivity": 0.41,
            "min_timestamp": "2025-01-01T00:00:00Z",
            "unrelated": true
        }))
        .unwrap();
        assert_eq!(resp.token.as_deref(), Some("abc"));
        assert_eq!(resp.stats.total_count, Some(json!(1200)));
        assert_eq!(resp.stats.max_timestamp, None);
    }

    #[test]
    fn daily_volume_request_shape() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 1, 31, 12, 30, 0).unwrap();
        let req = AggregateRequest::daily_volume(json!({"op": "and"}), None, start, end);
        let body = serde_json::to_value(&req).unwrap();
        assert!(body.get("dataset_id").is_none());
        assert_eq!(body["timezone"], "Etc/UTC");
        assert_eq!(body["aggs"]["daily_volume"]["min"], "2025-01-01T00:00:00Z");
        assert_eq!(body["aggs"]["daily_volume"]["max"], "2025-01-31T12:30:00Z");
        assert_eq!(body["aggs"]["daily_volume"]["interval"], "day");
    }
}
