//! Core domain types for PaperLens record batches.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::schema::AiFields;

/// Key under which the analysis is attached to each record.
pub const AI_FIELD: &str = "AI";

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One harvested paper record.
///
/// The record is an opaque JSON object: only `id` is required, `summary` is
/// read when present, and every other field passes through verbatim in its
/// original key order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct Record {
    id: String,
    fields: Map<String, Value>,
}

impl TryFrom<Map<String, Value>> for Record {
    type Error = String;

    fn try_from(fields: Map<String, Value>) -> std::result::Result<Self, Self::Error> {
        let id = match fields.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) => return Err(format!("`id` must be a string, got {other}")),
            None => return Err("missing `id` field".into()),
        };
        Ok(Self { id, fields })
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

impl Record {
    /// Unique identifier, used as the dedup key and in every log line.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Source text handed to the generation service.
    pub fn summary(&self) -> Option<&str> {
        self.fields.get("summary").and_then(Value::as_str)
    }

    /// Look up any pass-through field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// The attached analysis object, if any.
    pub fn ai(&self) -> Option<&Value> {
        self.fields.get(AI_FIELD)
    }

    /// Attach the analysis under `AI`, replacing any existing value.
    pub fn with_analysis(mut self, ai: &AiFields) -> Self {
        self.fields.insert(AI_FIELD.into(), ai.to_value());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_requires_string_id() {
        let ok: Record = serde_json::from_str(r#"{"id":"2401.00001","summary":"x"}"#).unwrap();
        assert_eq!(ok.id(), "2401.00001");
        assert_eq!(ok.summary(), Some("x"));

        assert!(serde_json::from_str::<Record>(r#"{"summary":"x"}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"{"id":42,"summary":"x"}"#).is_err());
        assert!(serde_json::from_str::<Record>(r#"["id"]"#).is_err());
    }

    #[test]
    fn record_without_summary_still_loads() {
        let rec: Record = serde_json::from_str(r#"{"id":"a","title":"T"}"#).unwrap();
        assert_eq!(rec.summary(), None);
        assert_eq!(rec.get("title"), Some(&Value::String("T".into())));
    }

    #[test]
    fn pass_through_fields_keep_order() {
        let line = r#"{"id":"a","title":"T","authors":["x","y"],"summary":"S","categories":["cs.AI"]}"#;
        let rec: Record = serde_json::from_str(line).unwrap();
        assert_eq!(serde_json::to_string(&rec).unwrap(), line);
    }

    #[test]
    fn with_analysis_appends_ai_field() {
        let rec: Record = serde_json::from_str(r#"{"id":"a","summary":"S"}"#).unwrap();
        let rec = rec.with_analysis(&AiFields::total_failure());

        let json = serde_json::to_string(&rec).unwrap();
        assert!(json.starts_with(r#"{"id":"a","summary":"S","AI":{"#));

        let ai = rec.ai().and_then(Value::as_object).unwrap();
        assert_eq!(ai.len(), 11);
    }
}
