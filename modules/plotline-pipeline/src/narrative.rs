//! Narrative records and the persona breakdowns attached to them.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use starscape_client::{output_items, VolumePoint};
use tracing::warn;

pub const UNKNOWN_PERSONA_TITLE: &str = "Unknown Persona";
pub const AI_FAILURE_PERSONA_TITLE: &str = "Error: AI failed to generate output";
pub const FETCH_FAILURE_PERSONA_TITLE: &str = "Error fetching personas";

const NESTED_KEY: &str = "nested_narratives";
const PERSONAS_KEY: &str = "personas";
const VOLUME_KEY: &str = "volume_data";

/// A narrative record from a summary analysis.
///
/// The vendor record is held as-is. `title` and `query` are read through
/// accessors and enrichment writes only its own keys, so every other field
/// (explicit nulls and unexpected shapes included) is written back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Narrative(Value);

impl Narrative {
    pub fn new(record: Value) -> Self {
        Self(record)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn title(&self) -> Option<&str> {
        self.0.get("title").and_then(Value::as_str)
    }

    pub fn display_title(&self) -> &str {
        self.title().unwrap_or("<untitled>")
    }

    /// The narrative's query, unless it is missing or empty.
    pub fn query(&self) -> Option<&Value> {
        self.0.get("query").filter(|q| !is_empty_query(q))
    }

    pub fn nested_narratives(&self) -> Option<&[Value]> {
        self.0
            .get(NESTED_KEY)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
    }

    /// Attached personas, if present and in the shape this pipeline writes.
    pub fn personas(&self) -> Option<Vec<Persona>> {
        self.0
            .get(PERSONAS_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn volume_data(&self) -> Option<Vec<VolumePoint>> {
        self.0
            .get(VOLUME_KEY)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_nested_narratives(&mut self, nested: Vec<Value>) {
        self.set(NESTED_KEY, Value::Array(nested));
    }

    pub fn set_personas(&mut self, personas: &[Persona]) {
        self.set(
            PERSONAS_KEY,
            Value::Array(personas.iter().map(Persona::to_value).collect()),
        );
    }

    pub fn set_volume_data(&mut self, points: Vec<VolumePoint>) {
        let points = points
            .into_iter()
            .map(|(date, count)| Value::Array(vec![date, count.into()]))
            .collect();
        self.set(VOLUME_KEY, Value::Array(points));
    }

    // Non-object records never have a query, so nothing is ever set on them.
    fn set(&mut self, key: &str, value: Value) {
        if let Value::Object(record) = &mut self.0 {
            record.insert(key.to_string(), value);
        }
    }
}

impl From<Value> for Narrative {
    fn from(record: Value) -> Self {
        Self(record)
    }
}

pub fn is_empty_query(query: &Value) -> bool {
    match query {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// The first `limit` records under `output.narratives`.
///
/// Records are never rejected. One that is not an object is kept verbatim and
/// is skipped by enrichment, since it has no query.
pub fn narratives_from_payload(payload: &Value, limit: usize) -> Vec<Narrative> {
    output_items(payload, "narratives")
        .iter()
        .take(limit)
        .map(|record| {
            if !record.is_object() {
                warn!(%record, "Narrative record is not an object, passing it through");
            }
            Narrative::new(record.clone())
        })
        .collect()
}

// --- Personas ---

/// Numeric reading of a vendor `gender` object. Missing or non-numeric shares count as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenderSplit {
    pub m: f64,
    pub f: f64,
    pub n: f64,
}

impl GenderSplit {
    pub fn from_value(gender: &Value) -> Self {
        let share = |key: &str| gender.get(key).and_then(Value::as_f64).unwrap_or(0.0);
        Self {
            m: share("m"),
            f: share("f"),
            n: share("n"),
        }
    }
}

/// Display tag derived from a persona's gender split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PersonaColor {
    #[serde(rename = "blue")]
    MaleLeaning,
    #[serde(rename = "pink")]
    FemaleLeaning,
    #[serde(rename = "purple")]
    Neutral,
    /// Placeholder personas that stand in for a failed analysis.
    #[serde(rename = "gray")]
    Unavailable,
}

impl PersonaColor {
    pub fn for_split(gender: &GenderSplit) -> Self {
        if gender.m > gender.f {
            PersonaColor::MaleLeaning
        } else if gender.f > gender.m {
            PersonaColor::FemaleLeaning
        } else {
            PersonaColor::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PersonaColor::MaleLeaning => "blue",
            PersonaColor::FemaleLeaning => "pink",
            PersonaColor::Neutral => "purple",
            PersonaColor::Unavailable => "gray",
        }
    }
}

/// One persona. `gender` is the vendor object, kept verbatim for output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub title: String,
    pub gender: Value,
    pub color: PersonaColor,
}

fn zero_split() -> Value {
    json!({ "m": 0, "f": 0, "n": 0 })
}

impl Persona {
    pub fn new(title: impl Into<String>, gender: Value) -> Self {
        Self {
            title: title.into(),
            color: PersonaColor::for_split(&GenderSplit::from_value(&gender)),
            gender,
        }
    }

    /// Sentinel entry recorded in place of a persona list that could not be fetched.
    pub fn placeholder(title: &str) -> Self {
        Self {
            title: title.to_string(),
            gender: zero_split(),
            color: PersonaColor::Unavailable,
        }
    }

    /// Build from one vendor persona object. Missing titles and splits get defaults.
    pub fn from_vendor(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let title = object
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_PERSONA_TITLE);
        let gender = object.get("gender").cloned().unwrap_or_else(zero_split);
        Some(Self::new(title, gender))
    }

    pub fn to_value(&self) -> Value {
        json!({
            "title": self.title,
            "gender": self.gender,
            "color": self.color.as_str(),
        })
    }
}

/// Personas under `output.personas`, color-tagged. Entries that are not objects are dropped.
pub fn personas_from_payload(payload: &Value) -> Vec<Persona> {
    output_items(payload, "personas")
        .iter()
        .filter_map(Persona::from_vendor)
        .collect()
}
