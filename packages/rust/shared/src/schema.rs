//! The analysis schema: what the generation service is asked to fill in,
//! what gets emitted under `AI`, and the placeholder sets used when real
//! analysis is unavailable.
//!
//! The service sees a nested shape ([`AnalysisResult`] with a `value` block).
//! Output records always carry the flattened 11-field [`AiFields`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name of the function the service is forced to call.
pub const FUNCTION_NAME: &str = "Structure";

/// The 11 leaf fields of the schema, in output order.
pub const FIELD_NAMES: [&str; 11] = [
    "core_problem",
    "key_insight",
    "method",
    "method_formula",
    "core_finding",
    "mechanism_insight",
    "action_value",
    "transferability",
    "value_score",
    "summary_core",
    "summary_layman",
];

/// Placeholder used for every field when a record could not be processed at all.
pub const TOTAL_FAILURE_SENTINEL: &str = "processing failed";

/// Per-field placeholders used when the service replied but a field could not
/// be extracted. Indexed like [`FIELD_NAMES`].
const PARTIAL_FAILURE_SENTINELS: [&str; 11] = [
    "core problem extraction failed",
    "key insight analysis failed",
    "method extraction failed",
    "method formula generation failed",
    "core finding extraction failed",
    "mechanism insight analysis failed",
    "action value assessment failed",
    "transferability analysis failed",
    "value score assessment failed",
    "core summary generation failed",
    "plain-language summary generation failed",
];

/// Partial-failure placeholder for a field, if the field is part of the schema.
pub fn partial_failure_sentinel(field: &str) -> Option<&'static str> {
    FIELD_NAMES
        .iter()
        .position(|name| *name == field)
        .map(|i| PARTIAL_FAILURE_SENTINELS[i])
}

/// Whether `text` is one of the placeholders of either set.
pub fn is_sentinel(text: &str) -> bool {
    text == TOTAL_FAILURE_SENTINEL || PARTIAL_FAILURE_SENTINELS.contains(&text)
}

// ---------------------------------------------------------------------------
// Service-facing shape
// ---------------------------------------------------------------------------

/// Practical value assessment block nested under `value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueAssessment {
    pub mechanism_insight: String,
    pub action_value: String,
    pub transferability: String,
    pub value_score: String,
}

/// Structured analysis of one paper, as returned by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub core_problem: String,
    pub key_insight: String,
    pub method: String,
    pub method_formula: String,
    pub core_finding: String,
    pub value: ValueAssessment,
    pub summary_core: String,
    pub summary_layman: String,
}

impl AnalysisResult {
    /// JSON schema sent as the function `parameters`.
    pub fn json_schema() -> Value {
        json!({
            "type": "object",
            "description": "Paper analysis distilled from an engineering point of view.",
            "properties": {
                "core_problem": {
                    "type": "string",
                    "description": "Root problem: the most critical contradiction or knowledge gap the paper targets."
                },
                "key_insight": {
                    "type": "string",
                    "description": "Angle of attack: the key insight or new hypothesis that sets the authors apart."
                },
                "method": {
                    "type": "string",
                    "description": "Key method: the core mechanism used to validate the insight and solve the problem."
                },
                "method_formula": {
                    "type": "string",
                    "description": "The key method abstracted into one short textual formula, e.g. new algorithm = (feature A + feature B) * weight C."
                },
                "core_finding": {
                    "type": "string",
                    "description": "Core finding: the new knowledge or answer the paper arrives at."
                },
                "value": {
                    "type": "object",
                    "description": "Practical value of the finding.",
                    "properties": {
                        "mechanism_insight": {
                            "type": "string",
                            "description": "Which counter-intuitive mechanism or underlying rule is revealed, and how it changes the mental model of the field."
                        },
                        "action_value": {
                            "type": "string",
                            "description": "Incremental (1-3x), leapfrog (5-10x) or new paradigm? Give immediately testable heuristics."
                        },
                        "transferability": {
                            "type": "string",
                            "description": "Three other domains the mechanism transfers to (structural isomorphism, not surface analogy)."
                        },
                        "value_score": {
                            "type": "string",
                            "description": "High value (read now), medium value (interesting, not urgent) or low value (skip)."
                        }
                    },
                    "required": ["mechanism_insight", "action_value", "transferability", "value_score"]
                },
                "summary_core": {
                    "type": "string",
                    "description": "One sentence fusing problem, insight, method and finding."
                },
                "summary_layman": {
                    "type": "string",
                    "description": "One sentence a ten-year-old could follow, using an analogy."
                }
            },
            "required": [
                "core_problem", "key_insight", "method", "method_formula",
                "core_finding", "value", "summary_core", "summary_layman"
            ]
        })
    }
}

// ---------------------------------------------------------------------------
// Emitted shape
// ---------------------------------------------------------------------------

/// The flattened analysis attached to every output record under `AI`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiFields {
    pub core_problem: String,
    pub key_insight: String,
    pub method: String,
    pub method_formula: String,
    pub core_finding: String,
    pub mechanism_insight: String,
    pub action_value: String,
    pub transferability: String,
    pub value_score: String,
    pub summary_core: String,
    pub summary_layman: String,
}

impl AiFields {
    /// Every field set to its "field extraction failed" placeholder.
    pub fn partial_failure() -> Self {
        let mut fields = Self::filled(TOTAL_FAILURE_SENTINEL);
        for (name, sentinel) in FIELD_NAMES.iter().zip(PARTIAL_FAILURE_SENTINELS) {
            fields.set(name, sentinel);
        }
        fields
    }

    /// Every field set to the "processing failed entirely" placeholder.
    pub fn total_failure() -> Self {
        Self::filled(TOTAL_FAILURE_SENTINEL)
    }

    fn filled(text: &str) -> Self {
        Self {
            core_problem: text.into(),
            key_insight: text.into(),
            method: text.into(),
            method_formula: text.into(),
            core_finding: text.into(),
            mechanism_insight: text.into(),
            action_value: text.into(),
            transferability: text.into(),
            value_score: text.into(),
            summary_core: text.into(),
            summary_layman: text.into(),
        }
    }

    fn slot_mut(&mut self, field: &str) -> Option<&mut String> {
        Some(match field {
            "core_problem" => &mut self.core_problem,
            "key_insight" => &mut self.key_insight,
            "method" => &mut self.method,
            "method_formula" => &mut self.method_formula,
            "core_finding" => &mut self.core_finding,
            "mechanism_insight" => &mut self.mechanism_insight,
            "action_value" => &mut self.action_value,
            "transferability" => &mut self.transferability,
            "value_score" => &mut self.value_score,
            "summary_core" => &mut self.summary_core,
            "summary_layman" => &mut self.summary_layman,
            _ => return None,
        })
    }

    /// Read a field by name.
    pub fn get(&self, field: &str) -> Option<&str> {
        let value = match field {
            "core_problem" => &self.core_problem,
            "key_insight" => &self.key_insight,
            "method" => &self.method,
            "method_formula" => &self.method_formula,
            "core_finding" => &self.core_finding,
            "mechanism_insight" => &self.mechanism_insight,
            "action_value" => &self.action_value,
            "transferability" => &self.transferability,
            "value_score" => &self.value_score,
            "summary_core" => &self.summary_core,
            "summary_layman" => &self.summary_layman,
            _ => return None,
        };
        Some(value)
    }

    /// Overwrite a field by name. Returns `false` for names outside the schema.
    pub fn set(&mut self, field: &str, value: impl Into<String>) -> bool {
        match self.slot_mut(field) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    /// `(name, value)` pairs in output order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        FIELD_NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }

    /// JSON object form, keys in output order.
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .iter()
            .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
            .collect();
        Value::Object(map)
    }
}

impl From<AnalysisResult> for AiFields {
    fn from(result: AnalysisResult) -> Self {
        Self {
            core_problem: result.core_problem,
            key_insight: result.key_insight,
            method: result.method,
            method_formula: result.method_formula,
            core_finding: result.core_finding,
            mechanism_insight: result.value.mechanism_insight,
            action_value: result.value.action_value,
            transferability: result.value.transferability,
            value_score: result.value.value_score,
            summary_core: result.summary_core,
            summary_layman: result.summary_layman,
        }
    }
}
