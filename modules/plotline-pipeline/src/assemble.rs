use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::info;

use plotline_common::Result;
use starscape_client::SummaryStats;

use crate::narrative::Narrative;

/// Merge enriched narratives and summary metadata into the top-level payload's `output`.
pub fn assemble(
    result: Value,
    stats: &SummaryStats,
    narratives: &[Narrative],
) -> Result<Value> {
    let mut root = match result {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut output = match root.remove("output") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    output.insert("narratives".to_string(), serde_json::to_value(narratives)?);
    output.insert("total_count".to_string(), stat(&stats.total_count));
    output.insert("positivity".to_string(), stat(&stats.positivity));
    output.insert("min_timestamp".to_string(), stat(&stats.min_timestamp));
    output.insert("max_timestamp".to_string(), stat(&stats.max_timestamp));

    root.insert("output".to_string(), Value::Object(output));
    Ok(Value::Object(root))
}

fn stat(value: &Option<Value>) -> Value {
    value.clone().unwrap_or(Value::Null)
}

/// Path of the document for dataset `name` inside `output_dir`.
pub fn output_path(output_dir: &Path, name: &str) -> PathBuf {
    output_dir.join(format!("{name}.json"))
}

/// Write `document` as pretty-printed JSON, creating `output_dir` if needed.
pub fn write_output(output_dir: &Path, name: &str, document: &Value) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_path(output_dir, name);
    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(&path, json)?;
    info!(path = %path.display(), "Results saved");
    Ok(path)
}

pub fn read_output(path: &Path) -> Result<Value> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::Persona;
    use serde_json::json;

    fn stats() -> SummaryStats {
        SummaryStats {
            total_count: Some(json!(48213)),
            positivity: Some(json!(0.37)),
            min_timestamp: Some(json!("2025-02-01T00:00:00Z")),
            max_timestamp: Some(json!("2025-02-21T23:59:59Z")),
        }
    }

    fn enriched() -> Vec<Narrative> {
        let mut narrative = Narrative::new(json!({
            "title": "Housing costs",
            "query": {"op": "contains", "field": "body", "value": "rent"}
        }));
        narrative.set_nested_narratives(vec![json!({"title": "Rent control"})]);
        narrative.set_personas(&[Persona::new(
            "Young renters",
            json!({"m": 40, "f": 55, "n": 5}),
        )]);
        vec![narrative]
    }

    #[test]
    fn merges_stats_and_narratives_into_output() {
        let result = json!({
            "complete": true,
            "output": { "narratives": [{"title": "stale"}], "summary": "keep me" }
        });
        let doc = assemble(result, &stats(), &enriched()).unwrap();

        assert_eq!(doc["complete"], true);
        assert_eq!(doc["output"]["summary"], "keep me");
        assert_eq!(doc["output"]["total_count"], 48213);
        assert_eq!(doc["output"]["positivity"], 0.37);
        assert_eq!(doc["output"]["max_timestamp"], "2025-02-21T23:59:59Z");
        assert_eq!(doc["output"]["narratives"][0]["title"], "Housing costs");
        assert_eq!(doc["output"]["narratives"][0]["personas"][0]["color"], "pink");
    }

    #[test]
    fn missing_stats_become_null() {
        let doc = assemble(json!({"output": {}}), &SummaryStats::default(), &[]).unwrap();
        assert_eq!(doc["output"]["total_count"], Value::Null);
        assert_eq!(doc["output"]["narratives"], json!([]));
    }

    #[test]
    fn creates_output_section_when_absent() {
        let doc = assemble(json!("garbage"), &stats(), &enriched()).unwrap();
        assert!(doc["output"].is_object());
        assert_eq!(doc["output"]["narratives"].as_array().map(Vec::len), Some(1));
    }

    #[test]
    fn written_document_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let doc = assemble(json!({"output": {}}), &stats(), &enriched()).unwrap();

        let path = write_output(&dir.path().join("plotline_data"), "housing", &doc).unwrap();
        assert!(path.ends_with("plotline_data/housing.json"));
        assert_eq!(read_output(&path).unwrap(), doc);
    }

    #[test]
    fn serialization_is_stable() {
        let doc = assemble(json!({"output": {}}), &stats(), &enriched()).unwrap();
        let first = serde_json::to_string_pretty(&doc).unwrap();
        let second = serde_json::to_string_pretty(&read_back(&first)).unwrap();
        assert_eq!(first, second);
    }

    fn read_back(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }
}
