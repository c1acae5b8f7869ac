use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wrapper for Atlas API responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub output: T,
}

/// One entry of `custom-dataset/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedDataset {
    pub id: String,
}

/// Field mapping a dataset is initialized with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub columns: Vec<ColumnSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traits: Option<ColumnTraits>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnKind {
    Keyword,
    Timestamp,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnTraits {
    pub analyze: bool,
}

impl ColumnSpec {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            traits: None,
        }
    }

    pub fn analyzed(mut self) -> Self {
        self.traits = Some(ColumnTraits { analyze: true });
        self
    }
}

impl ColumnMapping {
    /// Mapping for exported video-comment CSVs. Only the comment text is analyzed.
    pub fn video_comments() -> Self {
        Self {
            columns: vec![
                ColumnSpec::new("Video_Title", ColumnKind::Keyword),
                ColumnSpec::new("Video_Date", ColumnKind::Timestamp),
                ColumnSpec::new("Video_URL", ColumnKind::Text),
                ColumnSpec::new("Comment_Timestamp", ColumnKind::Timestamp),
                ColumnSpec::new("Comment_Author", ColumnKind::Keyword),
                ColumnSpec::new("Comment_Text", ColumnKind::Text).analyzed(),
            ],
        }
    }
}

/// Rows for `custom-dataset/content`, one header→value map per CSV row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentBatch {
    pub content: Vec<BTreeMap<String, String>>,
}

impl ContentBatch {
    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn video_comment_mapping_serializes_like_atlas_expects() {
        let body = serde_json::to_value(ColumnMapping::video_comments()).unwrap();
        assert_eq!(body["columns"][0], json!({"name": "Video_Title", "type": "keyword"}));
        assert_eq!(
            body["columns"][5],
            json!({"name": "Comment_Text", "type": "text", "traits": {"analyze": true}})
        );
    }

    #[test]
    fn dataset_summary_keeps_unknown_fields() {
        let ds: DatasetSummary = serde_json::from_value(json!({
            "id": "ds_abc",
            "title": "comments",
            "doc_count": 12
        }))
        .unwrap();
        assert_eq!(ds.id, "ds_abc");
        assert_eq!(ds.extra.get("doc_count"), Some(&json!(12)));
    }
}
